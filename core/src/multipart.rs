//! `multipart/form-data` encoding for file uploads.
//!
//! Framing is done by ureq's form encoder; the encoded bytes are then carried
//! as a `RequestBody::Raw` so uploads go through the same request path as
//! every other call.

use std::fs;
use std::io::Read;
use std::path::Path;

use ureq::unversioned::multipart::{Form, Part};

use crate::error::ApiError;
use crate::http::RequestBody;

/// A file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl FilePart {
    /// Content type is guessed from the filename's extension.
    pub fn new(filename: &str, content: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: mime_guess::from_path(filename)
                .first_or_octet_stream()
                .to_string(),
            content,
        }
    }

    /// Read a file from disk, naming the part after the file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(&filename, content))
    }
}

/// A multipart form under construction.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<(String, FilePart)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, field: &str, part: FilePart) -> Self {
        self.parts.push((field.to_string(), part));
        self
    }

    /// Encode the form into a raw body carrying its own content type.
    pub fn into_body(self) -> Result<RequestBody, ApiError> {
        let mut form = Form::new();
        for (field, file) in &self.parts {
            let part = Part::bytes(&file.content)
                .file_name(&file.filename)
                .mime_str(&file.content_type)
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
            form = form.part(field.as_str(), part);
        }

        let content_type = format!("multipart/form-data; boundary={}", form.boundary());
        let mut bytes = Vec::new();
        form.read_to_end(&mut bytes)?;

        Ok(RequestBody::Raw {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(form: MultipartForm) -> (String, String) {
        let RequestBody::Raw { bytes, content_type } = form.into_body().unwrap() else {
            panic!("expected raw body");
        };
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        (boundary, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[test]
    fn encodes_single_file_field() {
        let form = MultipartForm::new().file("file", FilePart::new("users.xlsx", b"PK\x03\x04".to_vec()));
        let (boundary, text) = encode(form);

        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("name=\"file\"; filename=\"users.xlsx\""));
        assert!(text.contains("Content-Type: application/vnd.openxmlformats-officedocument.spreadsheetml.sheet\r\n"));
        assert!(text.contains("PK\u{3}\u{4}"));
        assert!(text.ends_with(&format!("\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn boundaries_are_unique() {
        let (first, _) = encode(MultipartForm::new());
        let (second, _) = encode(MultipartForm::new());
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(
            FilePart::new("rooms.unknownext", Vec::new()).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn invalid_content_type_is_rejected() {
        let mut part = FilePart::new("users.csv", b"a".to_vec());
        part.content_type = "not a mime".to_string();
        let err = MultipartForm::new().file("file", part).into_body().unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.csv");
        std::fs::write(&path, "building,room\nA,101\n").unwrap();

        let part = FilePart::from_path(&path).unwrap();
        assert_eq!(part.filename, "rooms.csv");
        assert_eq!(part.content_type, "text/csv");
        assert_eq!(part.content, b"building,room\nA,101\n");
    }

    #[test]
    fn from_path_missing_file_is_io_error() {
        let err = FilePart::from_path("/definitely/not/here.xlsx").unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
    }
}
