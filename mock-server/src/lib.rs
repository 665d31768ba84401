//! In-memory stand-in for the dormitory allocation backend.
//!
//! Serves the subset of the REST API the client's integration tests drive:
//! login and token checks, profile, password change, user listing and
//! import, buildings, room selection and the allocation export. Tokens are
//! random UUIDs held in memory; nothing survives a restart.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Filename advertised by the export endpoint.
pub const EXPORT_FILENAME: &str = "allocations-report.xlsx";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Clone, Debug)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
pub struct Store {
    accounts: HashMap<i64, Account>,
    tokens: HashMap<String, i64>,
    buildings: Vec<Value>,
    beds: HashMap<i64, i64>,
    next_id: i64,
}

impl Store {
    /// Two accounts: `alice`/`secret` (student) and `admin`/`admin123`.
    pub fn seeded() -> Self {
        let mut store = Store {
            next_id: 1,
            ..Store::default()
        };
        store.add_account("alice", "Alice", "secret", false);
        store.add_account("admin", "Administrator", "admin123", true);
        store
    }

    fn add_account(&mut self, username: &str, name: &str, password: &str, is_admin: bool) -> User {
        let user = User {
            id: self.next_id,
            username: username.to_string(),
            name: name.to_string(),
            is_admin,
            created_at: "2024-09-01T08:00:00".to_string(),
        };
        self.next_id += 1;
        self.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    fn find_by_username(&self, username: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.user.username == username)
    }

    /// Revoke every token issued to `username`.
    pub fn revoke_tokens(&mut self, username: &str) {
        let Some(id) = self.find_by_username(username).map(|a| a.user.id) else {
            return;
        };
        self.tokens.retain(|_, owner| *owner != id);
    }

    /// Register `count` generated student accounts, `student1`..`studentN`.
    pub fn add_students(&mut self, count: usize) {
        for n in 1..=count {
            let username = format!("student{n}");
            let name = format!("Student {n}");
            self.add_account(&username, &name, "123456", false);
        }
    }

    /// Flip the admin flag of `username` server-side.
    pub fn set_admin(&mut self, username: &str, is_admin: bool) {
        if let Some(account) = self
            .accounts
            .values_mut()
            .find(|a| a.user.username == username)
        {
            account.user.is_admin = is_admin;
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

type Failure = (StatusCode, Json<Value>);

fn failure(status: StatusCode, message: &str) -> Failure {
    (status, Json(json!({ "error": message })))
}

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Store::seeded())))
}

/// Router over caller-owned state, so tests can reach into the store.
pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/profile", get(profile))
        .route("/api/auth/verify-token", get(verify_token))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/import", post(import_users))
        .route("/api/admin/buildings", get(list_buildings).post(create_building))
        .route("/api/admin/export-allocations", get(export_allocations))
        .route("/api/room-selection/select", post(select_room))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

async fn authenticate(db: &Db, headers: &HeaderMap) -> Result<User, Failure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "missing token"))?;

    let store = db.read().await;
    store
        .tokens
        .get(token)
        .and_then(|id| store.accounts.get(id))
        .map(|account| account.user.clone())
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "token invalid or expired"))
}

async fn authenticate_admin(db: &Db, headers: &HeaderMap) -> Result<User, Failure> {
    let user = authenticate(db, headers).await?;
    if !user.is_admin {
        return Err(failure(StatusCode::FORBIDDEN, "admin privileges required"));
    }
    Ok(user)
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login(State(db): State<Db>, Json(input): Json<Credentials>) -> Result<Json<Value>, Failure> {
    if input.username.is_empty() || input.password.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "username and password are required"));
    }
    let mut store = db.write().await;
    let user = match store.find_by_username(&input.username) {
        Some(account) if account.password == input.password => account.user.clone(),
        _ => return Err(failure(StatusCode::UNAUTHORIZED, "invalid username or password")),
    };
    let token = Uuid::new_v4().to_string();
    store.tokens.insert(token.clone(), user.id);
    tracing::info!(username = %user.username, "login");

    Ok(Json(json!({
        "message": "login successful",
        "access_token": token,
        "user": user,
    })))
}

#[derive(Deserialize)]
struct Registration {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Registration>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    if input.username.is_empty() || input.password.is_empty() || input.name.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "username, password and name are required"));
    }
    let mut store = db.write().await;
    if store.find_by_username(&input.username).is_some() {
        return Err(failure(StatusCode::CONFLICT, "username already exists"));
    }
    if input.password.len() < 6 {
        return Err(failure(StatusCode::BAD_REQUEST, "password must be at least 6 characters"));
    }
    store.add_account(&input.username, &input.name, &input.password, false);
    Ok((StatusCode::CREATED, Json(json!({ "message": "registered" }))))
}

async fn profile(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    let user = authenticate(&db, &headers).await?;
    Ok(Json(json!({ "user": user })))
}

async fn verify_token(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    let user = authenticate(&db, &headers).await?;
    Ok(Json(json!({ "valid": true, "user": user })))
}

#[derive(Deserialize)]
struct PasswordChange {
    #[serde(default)]
    old_password: String,
    #[serde(default)]
    new_password: String,
}

async fn change_password(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<PasswordChange>,
) -> Result<Json<Value>, Failure> {
    let user = authenticate(&db, &headers).await?;
    let mut store = db.write().await;
    let account = store
        .accounts
        .get_mut(&user.id)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "user not found"))?;
    if account.password != input.old_password {
        return Err(failure(StatusCode::BAD_REQUEST, "old password is incorrect"));
    }
    if input.new_password.len() < 6 {
        return Err(failure(StatusCode::BAD_REQUEST, "password must be at least 6 characters"));
    }
    account.password = input.new_password;
    Ok(Json(json!({ "message": "password changed" })))
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(default = "first_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
    #[serde(default)]
    search: String,
}

fn first_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

async fn list_users(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, Failure> {
    authenticate_admin(&db, &headers).await?;
    let store = db.read().await;
    let mut users: Vec<User> = store
        .accounts
        .values()
        .map(|a| a.user.clone())
        .filter(|u| query.search.is_empty() || u.username.contains(&query.search) || u.name.contains(&query.search))
        .collect();
    users.sort_by_key(|u| u.id);
    let total = users.len();
    let page: Vec<User> = users
        .into_iter()
        .skip(query.page.saturating_sub(1) * query.per_page)
        .take(query.per_page)
        .collect();

    Ok(Json(json!({
        "users": page,
        "total": total,
        "page": query.page,
        "per_page": query.per_page,
    })))
}

async fn import_users(
    State(db): State<Db>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, Failure> {
    authenticate_admin(&db, &headers).await?;
    let bad_request = |e: axum::extract::multipart::MultipartError| failure(StatusCode::BAD_REQUEST, &e.to_string());

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(bad_request)?;
        let text = String::from_utf8_lossy(&bytes);

        let mut store = db.write().await;
        let mut imported = 0;
        // First line is the header row: username,name,password
        for line in text.lines().skip(1).filter(|l| !l.trim().is_empty()) {
            let mut cols = line.split(',').map(str::trim);
            let (Some(username), Some(name)) = (cols.next(), cols.next()) else {
                continue;
            };
            if store.find_by_username(username).is_some() {
                continue;
            }
            let password = cols.next().filter(|p| !p.is_empty()).unwrap_or("123456");
            store.add_account(username, name, password, false);
            imported += 1;
        }
        return Ok(Json(json!({
            "message": "import finished",
            "filename": filename,
            "imported": imported,
        })));
    }
    Err(failure(StatusCode::BAD_REQUEST, "no file uploaded"))
}

async fn list_buildings(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    authenticate_admin(&db, &headers).await?;
    let store = db.read().await;
    Ok(Json(json!({ "buildings": store.buildings })))
}

async fn create_building(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(mut input): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    authenticate_admin(&db, &headers).await?;
    if input.get("name").and_then(Value::as_str).map_or(true, str::is_empty) {
        return Err(failure(StatusCode::BAD_REQUEST, "building name is required"));
    }
    let mut store = db.write().await;
    let id = store.buildings.len() as i64 + 1;
    input["id"] = json!(id);
    store.buildings.push(input.clone());
    Ok((StatusCode::CREATED, Json(json!({ "message": "building created", "building": input }))))
}

async fn export_allocations(State(db): State<Db>, headers: HeaderMap) -> Result<Response, Failure> {
    authenticate_admin(&db, &headers).await?;
    let store = db.read().await;
    let mut sheet = String::from("username,name,bed\n");
    let mut rows: Vec<_> = store.accounts.values().collect();
    rows.sort_by_key(|a| a.user.id);
    for account in rows {
        let bed = store
            .beds
            .get(&account.user.id)
            .map(|b| b.to_string())
            .unwrap_or_default();
        sheet.push_str(&format!("{},{},{}\n", account.user.username, account.user.name, bed));
    }

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        sheet.into_bytes(),
    )
        .into_response())
}

#[derive(Deserialize)]
struct BedChoice {
    bed_id: i64,
}

async fn select_room(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<BedChoice>,
) -> Result<Json<Value>, Failure> {
    let user = authenticate(&db, &headers).await?;
    let mut store = db.write().await;
    if store.beds.contains_key(&user.id) {
        return Err(failure(StatusCode::BAD_REQUEST, "you have already selected a bed"));
    }
    if store.beds.values().any(|bed| *bed == input.bed_id) {
        return Err(failure(StatusCode::CONFLICT, "bed already taken"));
    }
    store.beds.insert(user.id, input.bed_id);
    Ok(Json(json!({ "message": "bed selected", "bed_id": input.bed_id })))
}
