//! DTOs for the dormitory API.
//!
//! Business payloads (rooms, buildings, allocations, lottery results) are
//! passed through as `serde_json::Value`; only the shapes this crate builds
//! or inspects itself are typed here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The cached user record.
///
/// Only `is_admin` is relied upon. Every other field the server sends is
/// kept in `extra` so the record round-trips unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResetPasswordRequest<'a> {
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SelectBedRequest {
    pub bed_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChangeBedRequest {
    pub new_bed_id: i64,
}

/// Result of a completed export download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub size: usize,
}
