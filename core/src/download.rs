//! Filename recovery from `Content-Disposition` headers.

use content_disposition::parse_content_disposition;

/// The suggested filename in a `Content-Disposition` value.
///
/// An RFC 5987 `filename*` parameter wins over a plain `filename`. A value
/// that starts straight with parameters, with no disposition type, is read
/// as an attachment. Returns `None` when no non-empty name is found.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let disposition_type = value.split(';').next().unwrap_or_default();
    let parsed = if disposition_type.contains('=') {
        parse_content_disposition(&format!("attachment; {value}"))
    } else {
        parse_content_disposition(value)
    };

    parsed
        .filename_full()
        .map(|name| name.trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|name| !name.is_empty())
}
