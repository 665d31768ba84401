//! Client library for the dormitory room-allocation API.
//!
//! # Overview
//! `HttpClient` wraps every call to the backend. It attaches the bearer token
//! kept in an explicit `Session`, sends structured bodies as JSON, and turns
//! HTTP statuses into typed `ApiError`s. A 401 answer logs the session out and
//! sends the `Host` to the login page before the error reaches the caller.
//!
//! # Design
//! - Requests are built as plain data (`HttpRequest`) and executed by a
//!   `Transport`; `UreqTransport` is the production one.
//! - Page-level side effects (navigation, alerts, downloads) go through the
//!   injected `Host`, so nothing here needs a browser.
//! - Endpoint methods in `api` are thin, fixed-path calls; payloads are
//!   passed through as `serde_json::Value`.
//! - `ui` holds the auth guards and the small presentation helpers.

mod api;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod host;
pub mod http;
pub mod multipart;
pub mod session;
pub mod types;
pub mod ui;

#[cfg(test)]
mod testing;

pub use client::{HttpClient, RequestOptions};
pub use config::ClientConfig;
pub use error::{ApiError, TransportError};
pub use host::{HeadlessHost, Host, HostEvent, Severity};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport, UreqTransport};
pub use multipart::{FilePart, MultipartForm};
pub use session::{FileStorage, MemoryStorage, Session, Storage};
pub use types::{ExportedFile, User};
