//! In-process stand-in for the scheduler backend, used by API and view tests.
//!
//! Binds an axum router to `127.0.0.1:0` and keeps its state behind a mutex
//! so tests can seed data, change response shapes and inspect every request
//! the client sent.

use axum::body::{to_bytes, Body};
use axum::extract::{Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use std::io;
use tokio::sync::oneshot;

use crate::api::auth::{LoginRequest, RegisterRequest};
use crate::api::{ApiClient, AuthHeader, TENANT_HEADER};
use crate::config::{ApiConfig, Config};
use crate::session::User;
use crate::storage::{KeyValueStore, MemoryStore, StorageError};
use crate::AppContext;

pub const STUB_PASSWORD: &str = "secret123";

/// Key the stub uses for `GET /scheduled` responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Envelope {
    #[default]
    Data,
    Messages,
    /// A top-level array with no envelope object
    Bare,
}

/// One request as the stub received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub tenant: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct StubUser {
    user: User,
    password: String,
}

#[derive(Debug, Clone)]
struct StubInvite {
    org_id: String,
    email: String,
    role: String,
}

#[derive(Debug, Default)]
struct StubState {
    users: Vec<StubUser>,
    orgs: HashMap<String, Value>,
    invites: HashMap<String, StubInvite>,
    scheduled: HashMap<String, Vec<Value>>,
    delivered: Vec<Value>,
    failed: Vec<Value>,
    requests: Vec<RecordedRequest>,
    envelope: Envelope,
    id_only_create: bool,
    delays: HashMap<String, Duration>,
    history_delay: Option<Duration>,
}

type Shared = Arc<Mutex<StubState>>;

/// In-memory storage that fails `set` for chosen keys
#[derive(Debug, Default)]
pub struct RejectingStore {
    inner: MemoryStore,
    rejected: Mutex<HashSet<String>>,
}

impl RejectingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, key: &str) {
        self.rejected.lock().insert(key.to_string());
    }

    pub fn accept_all(&self) {
        self.rejected.lock().clear();
    }
}

impl KeyValueStore for RejectingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.rejected.lock().contains(key) {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "write rejected"),
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

pub struct StubBackend {
    base_url: String,
    state: Shared,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubBackend {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(StubState::default()));
        let app = Router::new()
            .route("/auth/register", post(register))
            .route("/auth/login", post(login))
            .route("/orgs", post(create_org))
            .route("/orgs/accept-invite", post(accept_invite))
            .route("/orgs/:id/invite", post(invite))
            .route("/scheduled", get(list_scheduled).post(create_scheduled))
            .route(
                "/scheduled/:id",
                put(update_scheduled).delete(delete_scheduled),
            )
            .route("/delivered", get(list_delivered))
            .route("/failed", get(list_failed))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> Config {
        Config {
            api: ApiConfig {
                base_url: self.base_url.clone(),
                timeout_secs: 5,
            },
            ..Config::default()
        }
    }

    /// A client with its own, empty credential slot
    pub fn api_client(&self) -> ApiClient {
        ApiClient::new(&self.config().api, AuthHeader::new()).unwrap()
    }

    /// Register and log in `email`, returning a client that carries the bearer
    pub async fn logged_in_client(&self, email: &str) -> (ApiClient, User) {
        let api = self.api_client();
        let name = email.split('@').next().unwrap_or(email).to_string();
        api.register(&RegisterRequest {
            email: email.to_string(),
            password: STUB_PASSWORD.to_string(),
            name,
        })
        .await
        .unwrap();
        let login = api
            .login(&LoginRequest {
                email: email.to_string(),
                password: STUB_PASSWORD.to_string(),
            })
            .await
            .unwrap();
        api.auth_header().set_bearer(&login.token).unwrap();
        (api, login.user)
    }

    /// Application context over in-memory storage
    pub fn context(&self) -> Arc<AppContext> {
        self.context_with(Arc::new(MemoryStore::new()))
    }

    /// Application context over the given storage, hydrating from it
    pub fn context_with(&self, storage: Arc<dyn KeyValueStore>) -> Arc<AppContext> {
        AppContext::with_storage(self.config(), storage).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests whose path starts with `prefix`
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Body of the most recent request sent to exactly `path`
    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.state
            .lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.path == path)
            .and_then(|r| r.body.clone())
    }

    pub fn set_envelope(&self, envelope: Envelope) {
        self.state.lock().envelope = envelope;
    }

    /// Answer `POST /scheduled` with `{success, id}` only
    pub fn set_id_only_create(&self, enabled: bool) {
        self.state.lock().id_only_create = enabled;
    }

    /// Hold every `GET /scheduled` for `org_id` for `delay`
    pub fn slow_down(&self, org_id: &str, delay: Duration) {
        self.state.lock().delays.insert(org_id.to_string(), delay);
    }

    /// Hold every `GET /delivered` and `GET /failed` for `delay`
    pub fn slow_history(&self, delay: Duration) {
        self.state.lock().history_delay = Some(delay);
    }

    /// Seed one delivered and one failed message
    pub fn seed_history(&self) {
        let mut state = self.state.lock();
        state.delivered.push(json!({
            "id": "d-1",
            "recipient": "+5511999999999",
            "message": "Delivered hello",
            "sentAt": 1_700_000_000_000_i64,
            "channel": "whatsapp"
        }));
        state.failed.push(json!({
            "id": "f-1",
            "recipient": "+5511000000000",
            "message": "Failed hello",
            "failedAt": 1_700_000_100_000_i64,
            "channel": "sms",
            "error": "Invalid number"
        }));
    }

    /// Scheduled messages the stub holds for a tenant
    pub fn scheduled(&self, org_id: &str) -> Vec<Value> {
        self.state
            .lock()
            .scheduled
            .get(org_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
    state.lock().requests.push(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        authorization: header(&parts.headers, AUTHORIZATION.as_str()),
        tenant: header(&parts.headers, TENANT_HEADER),
        body: serde_json::from_slice(&bytes).ok(),
    });
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Resolve the bearer token to a user id
fn authenticate(state: &StubState, headers: &HeaderMap) -> Result<String, Response> {
    let user_id = header(headers, AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer jwt-").map(str::to_string))
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Missing or invalid token"))?;
    if state.users.iter().any(|u| u.user.id == user_id) {
        Ok(user_id)
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "Missing or invalid token"))
    }
}

fn tenant(headers: &HeaderMap) -> Result<String, Response> {
    header(headers, TENANT_HEADER)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "Missing x-tenant-id header"))
}

fn field<'a>(body: &'a Value, name: &str) -> &'a str {
    body.get(name).and_then(Value::as_str).unwrap_or_default()
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock();
    let email = field(&body, "email");
    if state.users.iter().any(|u| u.user.email == email) {
        return error(StatusCode::CONFLICT, "Email already registered");
    }
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        name: field(&body, "name").to_string(),
    };
    state.users.push(StubUser {
        user: user.clone(),
        password: field(&body, "password").to_string(),
    });
    (StatusCode::CREATED, Json(json!(user))).into_response()
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let state = state.lock();
    let email = field(&body, "email");
    let password = field(&body, "password");
    match state
        .users
        .iter()
        .find(|u| u.user.email == email && u.password == password)
    {
        Some(found) => Json(json!({
            "token": format!("jwt-{}", found.user.id),
            "user": found.user,
        }))
        .into_response(),
        None => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn create_org(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let name = field(&body, "name");
    if name.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Name is required");
    }
    let org_id = uuid::Uuid::new_v4().to_string();
    let org = json!({ "id": org_id, "name": name, "ownerUserId": user_id });
    state.orgs.insert(org_id.clone(), org.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "org": org,
            "membership": { "userId": user_id, "orgId": org_id, "role": "admin" },
        })),
    )
        .into_response()
}

async fn invite(
    State(state): State<Shared>,
    Path(org_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }
    if !state.orgs.contains_key(&org_id) {
        return error(StatusCode::NOT_FOUND, "Organization not found");
    }
    let invite = StubInvite {
        org_id: org_id.clone(),
        email: field(&body, "email").to_string(),
        role: body
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("member")
            .to_string(),
    };
    let token = format!("inv-{}", uuid::Uuid::new_v4().simple());
    let response = json!({
        "invite": { "orgId": invite.org_id, "email": invite.email, "role": invite.role },
        "inviteToken": token,
    });
    state.invites.insert(token, invite);
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn accept_invite(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock();
    let Some(invite) = state.invites.remove(field(&body, "inviteToken")) else {
        return error(StatusCode::BAD_REQUEST, "Invalid invite token");
    };
    let Some(user) = state.users.iter().find(|u| u.user.email == invite.email) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };
    Json(json!({
        "orgId": invite.org_id,
        "userId": user.user.id,
        "role": invite.role,
    }))
    .into_response()
}

/// Check the request and look up any configured delay, without holding the lock
fn scheduled_delay(state: &Shared, headers: &HeaderMap) -> Result<Option<Duration>, Response> {
    let state = state.lock();
    authenticate(&state, headers)?;
    let org_id = tenant(headers)?;
    Ok(state.delays.get(&org_id).copied())
}

async fn list_scheduled(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match scheduled_delay(&state, &headers) {
        Ok(Some(delay)) => tokio::time::sleep(delay).await,
        Ok(None) => {}
        Err(response) => return response,
    }

    let state = state.lock();
    let org_id = match tenant(&headers) {
        Ok(org_id) => org_id,
        Err(response) => return response,
    };
    let messages = Value::Array(state.scheduled.get(&org_id).cloned().unwrap_or_default());
    let body = match state.envelope {
        Envelope::Data => json!({ "data": messages }),
        Envelope::Messages => json!({ "messages": messages }),
        Envelope::Bare => messages,
    };
    Json(body).into_response()
}

async fn create_scheduled(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }
    let org_id = match tenant(&headers) {
        Ok(org_id) => org_id,
        Err(response) => return response,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let mut record = body.as_object().cloned().unwrap_or_default();
    record.insert("id".to_string(), json!(id));
    record.insert("status".to_string(), json!("pending"));
    let record = Value::Object(record);
    state.scheduled.entry(org_id).or_default().push(record.clone());

    let response = if state.id_only_create {
        json!({ "success": true, "id": id })
    } else {
        json!({ "success": true, "id": id, "data": record })
    };
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn update_scheduled(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }
    let org_id = match tenant(&headers) {
        Ok(org_id) => org_id,
        Err(response) => return response,
    };
    let Some(record) = state
        .scheduled
        .get_mut(&org_id)
        .and_then(|messages| messages.iter_mut().find(|m| m["id"] == json!(id)))
    else {
        return error(StatusCode::NOT_FOUND, "Message not found");
    };

    let changes: Map<String, Value> = body.as_object().cloned().unwrap_or_default();
    if let Some(fields) = record.as_object_mut() {
        for (key, value) in changes {
            if key != "id" {
                fields.insert(key, value);
            }
        }
    }
    Json(json!({ "data": record })).into_response()
}

async fn delete_scheduled(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock();
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }
    let org_id = match tenant(&headers) {
        Ok(org_id) => org_id,
        Err(response) => return response,
    };
    let messages = state.scheduled.entry(org_id).or_default();
    let before = messages.len();
    messages.retain(|m| m["id"] != json!(id));
    if messages.len() == before {
        return error(StatusCode::NOT_FOUND, "Message not found");
    }
    Json(json!({ "success": true, "id": id })).into_response()
}

/// Check the token and look up the history delay, without holding the lock
fn history_delay(state: &Shared, headers: &HeaderMap) -> Result<Option<Duration>, Response> {
    let state = state.lock();
    authenticate(&state, headers)?;
    Ok(state.history_delay)
}

async fn list_delivered(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match history_delay(&state, &headers) {
        Ok(Some(delay)) => tokio::time::sleep(delay).await,
        Ok(None) => {}
        Err(response) => return response,
    }
    let state = state.lock();
    Json(json!({ "messages": state.delivered })).into_response()
}

async fn list_failed(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match history_delay(&state, &headers) {
        Ok(Some(delay)) => tokio::time::sleep(delay).await,
        Ok(None) => {}
        Err(response) => return response,
    }
    let state = state.lock();
    Json(json!({ "messages": state.failed })).into_response()
}
