//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Settings for an `HttpClient`.
///
/// Every field has a default, so a partial JSON document deserializes into a
/// usable configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for every request path. An empty string keeps paths relative.
    pub base_url: String,
    /// Where the host is sent when the session is gone.
    pub login_path: String,
    /// Used for exports whose response carries no usable filename.
    pub export_filename: String,
    /// Delay before the redirect that follows a denied admin check.
    pub admin_redirect_delay_ms: u64,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn admin_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.admin_redirect_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            login_path: "/login".to_string(),
            export_filename: "allocation-statistics.xlsx".to_string(),
            admin_redirect_delay_ms: 2000,
        }
    }
}
