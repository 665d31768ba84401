//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background thread,
//! then drives `HttpClient` over real HTTP through `UreqTransport`. The
//! server state is shared with the test so it can revoke tokens or change
//! roles behind the client's back.

use std::sync::Arc;

use dorm_client::ui::{require_admin, require_auth};
use dorm_client::{
    ApiError, ClientConfig, FilePart, HeadlessHost, Host, HostEvent, HttpClient, Session,
};
use mock_server::{Db, Store, EXPORT_FILENAME};
use tokio::sync::RwLock;

fn spawn_server() -> (String, Db) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    let server_db = db.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, server_db).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), db)
}

fn client_at(base_url: &str, page: &str, download_dir: &std::path::Path) -> (HttpClient, Arc<HeadlessHost>) {
    let host = Arc::new(HeadlessHost::new(page, download_dir));
    let client = HttpClient::new(ClientConfig::new(base_url), Session::in_memory(), host.clone());
    (client, host)
}

#[test]
fn login_profile_and_verify() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/login", dir.path());

    assert!(!client.verify_token(), "no token yet");
    assert!(!require_auth(&client));
    assert_eq!(host.navigations(), vec!["/login".to_string()]);

    let payload = client.login("alice", "secret").unwrap();
    let token = payload["access_token"].as_str().unwrap();
    assert_eq!(client.token(), Some(token));
    assert_eq!(client.session().token().as_deref(), Some(token));
    assert_eq!(client.session().user().unwrap().username.as_deref(), Some("alice"));

    let profile = client.get_profile().unwrap();
    assert_eq!(profile["user"]["username"], "alice");
    assert!(client.verify_token());

    client.change_password("secret", "better-secret").unwrap();
    let err = client.change_password("wrong", "whatever1").unwrap_err();
    assert_eq!(err.to_string(), "old password is incorrect");
    assert_eq!(err.status(), Some(400));
}

#[test]
fn wrong_credentials_on_login_page_do_not_redirect() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/login", dir.path());

    let err = client.login("alice", "bad").unwrap_err();
    assert!(matches!(err, ApiError::Auth));
    assert!(client.token().is_none());
    assert!(host.events().is_empty());
}

#[test]
fn revoked_token_clears_session_and_redirects() {
    let (base_url, db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/lottery", dir.path());
    client.login("alice", "secret").unwrap();

    db.blocking_write().revoke_tokens("alice");

    let err = client.get_profile().unwrap_err();
    assert!(matches!(err, ApiError::Auth));
    assert!(client.token().is_none());
    assert!(client.session().token().is_none());
    assert!(client.session().user().is_none());
    assert_eq!(host.navigations(), vec!["/login".to_string()]);
    assert_eq!(host.current_path(), "/login");
}

#[test]
fn student_gets_permission_error_without_losing_session() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/admin", dir.path());
    client.login("alice", "secret").unwrap();

    let err = client.get_users(1, 20, "").unwrap_err();
    assert!(matches!(err, ApiError::Permission));
    assert!(client.session().token().is_some());
    assert!(client.session().user().is_some());
    assert!(host.events().is_empty());
}

#[test]
fn require_admin_picks_up_server_side_promotion() {
    let (base_url, db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/admin", dir.path());
    client.login("alice", "secret").unwrap();
    assert!(!client.session().user().unwrap().is_admin);

    db.blocking_write().set_admin("alice", true);

    assert!(require_admin(&mut client));
    assert!(client.session().user().unwrap().is_admin);
    assert!(host.events().is_empty());
}

#[test]
fn require_admin_denies_student() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/admin", dir.path());
    client.login("alice", "secret").unwrap();

    assert!(!require_admin(&mut client));
    let events = host.events();
    assert!(matches!(events[0], HostEvent::Alert { .. }));
    assert!(matches!(
        &events[1],
        HostEvent::Navigate { path, delay: Some(_) } if path == "/login"
    ));
}

#[test]
fn admin_import_and_export() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&base_url, "/admin", dir.path());
    client.login("admin", "admin123").unwrap();

    let csv = b"username,name,password\ncarol,Carol,pw1234\n".to_vec();
    let result = client.import_users(FilePart::new("users.csv", csv)).unwrap();
    assert_eq!(result["imported"], 1);

    let users = client.get_users(1, 20, "car").unwrap();
    assert_eq!(users["users"][0]["username"], "carol");

    client.create_building(&serde_json::json!({"name": "North Hall"})).unwrap();
    let buildings = client.get_buildings().unwrap();
    assert_eq!(buildings["buildings"][0]["name"], "North Hall");

    let exported = client.export_allocations().unwrap();
    assert_eq!(exported.filename, EXPORT_FILENAME);
    let saved = std::fs::read(dir.path().join(EXPORT_FILENAME)).unwrap();
    assert_eq!(saved.len(), exported.size);
    assert!(saved.starts_with(b"username,name,bed\n"));
    assert!(host
        .events()
        .iter()
        .any(|e| matches!(e, HostEvent::SaveFile { filename, .. } if filename == EXPORT_FILENAME)));
}

#[test]
fn export_larger_than_ten_mebibytes_is_saved() {
    let (base_url, db) = spawn_server();
    db.blocking_write().add_students(400_000);
    let dir = tempfile::tempdir().unwrap();
    let (mut client, _) = client_at(&base_url, "/admin", dir.path());
    client.login("admin", "admin123").unwrap();

    let exported = client.export_allocations().unwrap();
    assert!(exported.size > 10 * 1024 * 1024, "size {}", exported.size);
    assert_eq!(exported.filename, EXPORT_FILENAME);
    let saved = std::fs::metadata(dir.path().join(EXPORT_FILENAME)).unwrap();
    assert_eq!(saved.len() as usize, exported.size);
}

#[test]
fn room_selection_conflict_uses_server_message() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut alice, _) = client_at(&base_url, "/select", dir.path());
    let (mut admin, _) = client_at(&base_url, "/select", dir.path());
    alice.login("alice", "secret").unwrap();
    admin.login("admin", "admin123").unwrap();

    alice.select_room(12).unwrap();
    let err = admin.select_room(12).unwrap_err();
    assert_eq!(err.to_string(), "bed already taken");
    assert_eq!(err.status(), Some(409));
}

#[test]
fn unknown_route_reports_status() {
    let (base_url, _db) = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let (mut client, _) = client_at(&base_url, "/", dir.path());

    let err = client.get_lottery_settings().unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
}

#[test]
fn unreachable_server_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let (mut client, host) = client_at(&format!("http://127.0.0.1:{port}"), "/", dir.path());
    client.set_token("kept").unwrap();

    let err = client.get_profile().unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(err.to_string(), "network connection failed, please check your network");
    assert_eq!(client.token(), Some("kept"));
    assert!(host.events().is_empty());
}
