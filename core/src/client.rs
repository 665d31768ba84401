//! The single choke point for every outbound request.
//!
//! # Design
//! `HttpClient` owns the in-memory bearer token, an explicit `Session` for
//! the persisted copy, a `Transport` for I/O and a `Host` for page-level side
//! effects. Each request goes through two halves:
//!
//! - `build_request` is pure: it merges headers, encodes the body and forms
//!   the URL.
//! - `send` executes the request and classifies the status. A 401 clears the
//!   session and redirects to the login page before the error is returned,
//!   so a caller that ignores the error still ends up logged out.
//!
//! Requests are issued one at a time on the calling thread. Nothing is
//! retried, cached or deduplicated.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::host::Host;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport, UreqTransport};
use crate::session::Session;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }
}

/// Stateful client for the dormitory API.
pub struct HttpClient {
    config: ClientConfig,
    session: Session,
    token: Option<String>,
    transport: Box<dyn Transport>,
    host: Arc<dyn Host>,
}

impl HttpClient {
    /// A client using the blocking `ureq` transport.
    pub fn new(config: ClientConfig, session: Session, host: Arc<dyn Host>) -> Self {
        Self::with_transport(config, session, host, Box::new(UreqTransport::new()))
    }

    pub fn with_transport(
        mut config: ClientConfig,
        session: Session,
        host: Arc<dyn Host>,
        transport: Box<dyn Transport>,
    ) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let token = session.token();
        Self {
            config,
            session,
            token,
            transport,
            host,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    /// The in-memory token. It may be stale until the server accepts it.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Build the wire request for `path` without sending it.
    ///
    /// Header precedence, lowest first: the JSON content type (or the raw
    /// body's own type), caller headers, then the bearer token.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let RequestOptions {
            headers: caller_headers,
            body,
            query,
        } = options;

        let mut headers = Vec::new();
        let body = match body {
            None => {
                set_header(&mut headers, "Content-Type", JSON_CONTENT_TYPE);
                None
            }
            Some(RequestBody::Json(value)) => {
                set_header(&mut headers, "Content-Type", JSON_CONTENT_TYPE);
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| ApiError::Serialization(e.to_string()))?;
                Some(bytes)
            }
            Some(RequestBody::Raw {
                bytes,
                content_type,
            }) => {
                set_header(&mut headers, "Content-Type", &content_type);
                Some(bytes)
            }
        };
        for (name, value) in &caller_headers {
            set_header(&mut headers, name, value);
        }
        if let Some(token) = &self.token {
            set_header(&mut headers, "Authorization", &format!("Bearer {token}"));
        }

        let mut url = format!("{}{}", self.config.base_url, path);
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&query)
                .finish();
            url.push(if path.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Send a request and return the raw response once its status has been
    /// classified as success.
    pub fn send(
        &mut self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        self.send_with_label(method, path, options, "request failed")
    }

    pub(crate) fn send_with_label(
        &mut self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
        failure_label: &str,
    ) -> Result<HttpResponse, ApiError> {
        let request = self.build_request(method, path, options)?;
        tracing::debug!(method = method.as_str(), url = %request.url, "sending request");

        let response = self.transport.execute(request).map_err(|e| {
            tracing::warn!(method = method.as_str(), path, error = %e, "transport failed");
            ApiError::from(e)
        })?;
        tracing::debug!(method = method.as_str(), path, status = response.status, "received response");

        self.check_status(&response, failure_label)?;
        Ok(response)
    }

    /// Send a request and decode the JSON payload of a successful response.
    pub fn request(
        &mut self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let response = self.send(method, path, options)?;
        decode_json(&response)
    }

    /// GET with query parameters, in the order given.
    pub fn get(&mut self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let options = params
            .iter()
            .fold(RequestOptions::new(), |options, (name, value)| {
                options.query(name, value)
            });
        self.request(HttpMethod::Get, path, options)
    }

    pub fn post<B: Serialize + ?Sized>(&mut self, path: &str, body: &B) -> Result<Value, ApiError> {
        let options = RequestOptions::new().json(to_json(body)?);
        self.request(HttpMethod::Post, path, options)
    }

    pub fn put<B: Serialize + ?Sized>(&mut self, path: &str, body: &B) -> Result<Value, ApiError> {
        let options = RequestOptions::new().json(to_json(body)?);
        self.request(HttpMethod::Put, path, options)
    }

    pub fn delete(&mut self, path: &str) -> Result<Value, ApiError> {
        self.request(HttpMethod::Delete, path, RequestOptions::new())
    }

    /// Remember `token` in memory and in the session.
    pub fn set_token(&mut self, token: &str) -> Result<(), ApiError> {
        self.token = Some(token.to_string());
        self.session.set_token(token)
    }

    /// Forget the token and the cached user. Local only; the server is not
    /// told.
    pub fn logout(&mut self) -> Result<(), ApiError> {
        self.token = None;
        self.session.clear()?;
        tracing::info!("session cleared");
        Ok(())
    }

    /// Ask the server whether the current token is still good.
    ///
    /// Returns `false` without a request when there is no token. Any failure
    /// logs out and returns `false`.
    pub fn verify_token(&mut self) -> bool {
        if self.token.is_none() {
            return false;
        }
        match self.get("/api/auth/verify-token", &[]) {
            Ok(payload) => payload.get("valid").and_then(Value::as_bool).unwrap_or(false),
            Err(e) => {
                tracing::warn!(error = %e, "token verification failed");
                if let Err(e) = self.logout() {
                    tracing::error!(error = %e, "failed to clear session");
                }
                false
            }
        }
    }

    /// Reload the token from the session after it was changed elsewhere.
    pub fn update_token(&mut self) {
        self.token = self.session.token();
    }

    fn check_status(&mut self, response: &HttpResponse, failure_label: &str) -> Result<(), ApiError> {
        match response.status {
            401 => {
                self.expire_session();
                Err(ApiError::Auth)
            }
            403 => Err(ApiError::Permission),
            status if !response.is_success() => {
                let message = error_message(&response.body)
                    .unwrap_or_else(|| format!("{failure_label} ({status})"));
                Err(ApiError::Api { status, message })
            }
            _ => Ok(()),
        }
    }

    fn expire_session(&mut self) {
        tracing::warn!("server rejected credentials, clearing session");
        if let Err(e) = self.logout() {
            tracing::error!(error = %e, "failed to clear session");
        }
        let login = self.config.login_path.as_str();
        if self.host.current_path() != login {
            self.host.navigate(login);
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

/// Replace any header named `name` (ignoring case), or append it.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn decode_json(response: &HttpResponse) -> Result<Value, ApiError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// The server's `error` field, if the body is JSON and carries a non-empty one.
fn error_message(body: &[u8]) -> Option<String> {
    let payload: Value = serde_json::from_slice(body).ok()?;
    payload
        .get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
