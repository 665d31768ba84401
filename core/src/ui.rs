//! Page guards and presentation helpers built on a client's session.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::client::HttpClient;
use crate::host::{Host, Severity};
use crate::session::Session;
use crate::types::User;

const DATE_FORMAT: &str = "%Y/%-m/%-d %H:%M:%S";

/// The cached user, or `None` when nothing usable is stored.
pub fn get_current_user(session: &Session) -> Option<User> {
    session.user()
}

pub fn is_admin(session: &Session) -> bool {
    get_current_user(session).is_some_and(|user| user.is_admin)
}

/// Allow the page only when a token is present; otherwise send the host to
/// the login page.
pub fn require_auth(client: &HttpClient) -> bool {
    if client.token().is_some() {
        return true;
    }
    client.host().navigate(&client.config().login_path);
    false
}

/// Allow the page only for administrators.
///
/// A cached non-admin (or missing) user is re-checked against the server
/// profile once, since roles can change after the cache was written.
pub fn require_admin(client: &mut HttpClient) -> bool {
    if !require_auth(client) {
        return false;
    }
    if is_admin(client.session()) {
        return true;
    }

    match client.get_profile() {
        Ok(payload) => {
            if let Some(user) = payload.get("user").filter(|user| !user.is_null()) {
                if let Err(e) = client.session().set_user(user) {
                    tracing::warn!(error = %e, "failed to cache refreshed profile");
                }
                if user.get("is_admin").and_then(Value::as_bool) == Some(true) {
                    return true;
                }
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to fetch profile"),
    }

    let host = client.host();
    host.alert("admin privileges required", Severity::Error);
    host.navigate_after(&client.config().login_path, client.config().admin_redirect_delay());
    false
}

pub fn show_alert(host: &dyn Host, message: &str, severity: Severity) {
    host.alert(message, severity);
}

/// A control that can display a busy state.
pub trait Button {
    fn label(&self) -> String;
    fn set_label(&mut self, label: &str);
    fn set_disabled(&mut self, disabled: bool);
}

/// Keeps a button in its busy state until dropped.
pub struct LoadingGuard<'a, B: Button + ?Sized> {
    button: &'a mut B,
    original: String,
}

impl<B: Button + ?Sized> Drop for LoadingGuard<'_, B> {
    fn drop(&mut self) {
        self.button.set_label(&self.original);
        self.button.set_disabled(false);
    }
}

/// Disable `button` and show a busy label; dropping the guard restores it.
pub fn show_loading<B: Button + ?Sized>(button: &mut B) -> LoadingGuard<'_, B> {
    let original = button.label();
    button.set_label("Processing...");
    button.set_disabled(true);
    LoadingGuard { button, original }
}

/// Render a server timestamp for display.
///
/// Timestamps with an offset are shown in local time; naive ones as given.
/// Empty input gives an empty string, unparsable input `Invalid Date`.
pub fn format_date(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Local).format(DATE_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, pattern) {
            return parsed.format(DATE_FORMAT).to_string();
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return midnight.format(DATE_FORMAT).to_string();
    }
    "Invalid Date".to_string()
}
