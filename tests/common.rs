#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use medtrack_session::config::Config;
use medtrack_session::storage::{MemoryPreferenceStore, PreferenceStore};
use medtrack_session::{ClientBuilder, SessionContext};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;

static INIT: Once = Once::new();

pub const PASSWORD: &str = "correct-horse";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("medtrack_session=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Server-side view of the session that the mock backend enforces.
#[derive(Debug)]
pub struct BackendState {
    access_token: Mutex<String>,
    refresh_token: Mutex<String>,
    generation: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    seen: Mutex<Vec<(String, Option<String>)>>,
}

impl BackendState {
    fn new() -> Self {
        Self {
            access_token: Mutex::new("access-0".to_string()),
            refresh_token: Mutex::new("refresh-0".to_string()),
            generation: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(50),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Invalidates the current access token so the next protected call gets a 401.
    pub fn expire_access_token(&self) {
        *self.access_token.lock().unwrap() = "access-expired-on-server".to_string();
    }

    pub fn access_token(&self) -> String {
        self.access_token.lock().unwrap().clone()
    }

    /// Authorization header seen for each request to `path`.
    pub fn auth_headers_for(&self, path: &str) -> Vec<Option<String>> {
        self.seen.lock().unwrap().iter().filter(|(p, _)| p == path).map(|(_, auth)| auth.clone()).collect()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        self.auth_headers_for(path).len()
    }

    fn record(&self, path: &str, headers: &HeaderMap) {
        let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
        self.seen.lock().unwrap().push((path.to_string(), auth));
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token());
        headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
    }

    fn rotate(&self) -> (String, String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{generation}");
        let refresh = format!("refresh-{generation}");
        *self.access_token.lock().unwrap() = access.clone();
        *self.refresh_token.lock().unwrap() = refresh.clone();
        (access, refresh)
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        setup_tracing();
        let state = Arc::new(BackendState::new());

        let app = Router::new()
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/refresh-token", post(refresh))
            .route("/api/v1/auth/logout", post(logout))
            .route("/api/v1/users/me", get(me))
            .route("/api/v1/reminders", get(reminders))
            .route("/api/v1/medicines/{id}", get(medicine))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}"), state }
    }

    pub async fn client(&self) -> SessionContext {
        self.client_with_store(Arc::new(MemoryPreferenceStore::new())).await
    }

    pub async fn client_with_store(&self, prefs: Arc<dyn PreferenceStore>) -> SessionContext {
        ClientBuilder::new(Config::for_base_url(&self.base_url)).with_preference_store(prefs).build().await.unwrap()
    }
}

fn user_json() -> Value {
    json!({ "id": 7, "username": "alice", "email": "alice@example.com", "fullName": "Alice Doe" })
}

async fn login(State(state): State<Arc<BackendState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("/api/v1/auth/login", &headers);
    if body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "message": "Invalid credentials" })))
            .into_response();
    }

    let (access, refresh) = state.rotate();
    Json(json!({
        "success": true,
        "message": "Login successful",
        "data": { "accessToken": access, "refreshToken": refresh, "tokenType": "Bearer", "user": user_json() }
    }))
    .into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("/api/v1/auth/refresh-token", &headers);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    // Widen the window in which concurrent 401s could race each other.
    tokio::time::sleep(Duration::from_millis(state.refresh_delay_ms.load(Ordering::SeqCst))).await;

    let current = state.refresh_token.lock().unwrap().clone();
    if state.refresh_fails.load(Ordering::SeqCst) || body["refreshToken"] != current.as_str() {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "message": "Refresh token expired" })))
            .into_response();
    }

    let (access, refresh) = state.rotate();
    Json(json!({ "accessToken": access, "refreshToken": refresh, "tokenType": "Bearer" })).into_response()
}

async fn logout(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/api/v1/auth/logout", &headers);
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": true, "message": "Logged out" })).into_response()
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/api/v1/users/me", &headers);
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "success": true, "data": user_json() })).into_response()
}

async fn reminders(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/api/v1/reminders", &headers);
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "message": "Token expired" })))
            .into_response();
    }
    Json(json!({ "success": true, "data": [{ "id": 1, "time": "08:00" }] })).into_response()
}

async fn medicine(State(state): State<Arc<BackendState>>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    state.record(&format!("/api/v1/medicines/{id}"), &headers);
    Json(json!({ "id": id, "name": "Ibuprofen" })).into_response()
}
