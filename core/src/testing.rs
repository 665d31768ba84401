//! Scripted transport and client harness shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use crate::client::HttpClient;
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::host::HeadlessHost;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::session::Session;

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<HttpResponse, TransportError>>,
    requests: Vec<HttpRequest>,
    downloads: Option<TempDir>,
}

/// Transport that records requests and answers from a queue.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    script: Rc<RefCell<Script>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, response: HttpResponse) {
        self.script.borrow_mut().responses.push_back(Ok(response));
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.script
            .borrow_mut()
            .responses
            .push_back(Err(TransportError(reason.to_string())));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.script.borrow().requests.clone()
    }
}

impl Transport for FakeTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.borrow_mut();
        script.requests.push(request);
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted response".to_string())))
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.to_string().into_bytes(),
    }
}

/// A client against `http://dorm.test` whose host sits at `path`.
///
/// Downloads land in a fresh temporary directory that is removed once the
/// client and transport are dropped.
pub(crate) fn harness(
    path: &str,
    token: Option<&str>,
) -> (HttpClient, FakeTransport, Arc<HeadlessHost>) {
    let downloads = tempfile::tempdir().unwrap();
    let (client, transport, host) = harness_in(path, token, downloads.path());
    transport.script.borrow_mut().downloads = Some(downloads);
    (client, transport, host)
}

/// Like `harness`, with downloads saved under `download_dir`.
pub(crate) fn harness_in(
    path: &str,
    token: Option<&str>,
    download_dir: &Path,
) -> (HttpClient, FakeTransport, Arc<HeadlessHost>) {
    let session = Session::in_memory();
    if let Some(token) = token {
        session.set_token(token).unwrap();
    }
    let transport = FakeTransport::new();
    let host = Arc::new(HeadlessHost::new(path, download_dir));
    let client = HttpClient::with_transport(
        ClientConfig::new("http://dorm.test"),
        session,
        host.clone(),
        Box::new(transport.clone()),
    );
    (client, transport, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_harness_downloads_into_its_own_directory() {
        let (first, first_transport, first_host) = harness("/", None);
        let (_second, _, second_host) = harness("/", None);

        let dir = first_host.download_dir().to_path_buf();
        assert_ne!(dir, second_host.download_dir());
        assert!(dir.exists());

        drop((first, first_transport, first_host));
        assert!(!dir.exists());
    }
}
