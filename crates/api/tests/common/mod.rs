//! Shared harness for the API integration tests.
//!
//! Builds the production router on top of the in-memory stores, so the full
//! middleware stack is exercised without a database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use vigil_api::auth::jwt::JwtConfig;
use vigil_api::auth::password::hash_password;
use vigil_api::config::{ServerConfig, SessionPolicy};
use vigil_api::router::build_app_router;
use vigil_api::state::{AppState, Stores};
use vigil_db::memory::{MemoryConnectionMirror, MemoryTokenStore, MemoryUserDirectory};
use vigil_db::models::user::{CreateUser, User};

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Test JWT config with a known secret and default lifetimes.
pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_SECRET.to_string(),
        access_token_expiry_mins: 15,
        refresh_token_expiry_days: 7,
        issuer: None,
        audience: None,
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        instance_id: "test".to_string(),
        token_sweep_interval_secs: 3600,
        jwt: test_jwt_config(),
        session: SessionPolicy::default(),
    }
}

/// A running app plus direct handles on its stores.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub tokens: Arc<MemoryTokenStore>,
    pub users: Arc<MemoryUserDirectory>,
    pub mirror: Arc<MemoryConnectionMirror>,
}

impl TestApp {
    /// A fresh clone of the router for one `oneshot` call.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let tokens = Arc::new(MemoryTokenStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let mirror = Arc::new(MemoryConnectionMirror::new());

    let state = AppState::new(
        config.clone(),
        Stores {
            tokens: tokens.clone(),
            users: users.clone(),
            connections: mirror.clone(),
        },
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        tokens,
        users,
        mirror,
    }
}

/// Create a user whose password is [`TEST_PASSWORD`].
pub async fn create_user(users: &MemoryUserDirectory, username: &str) -> User {
    let password_hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    users
        .insert(CreateUser {
            username: username.to_string(),
            password_hash,
        })
        .await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST with a Bearer token and no body at all.
pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Log in through the API and return the session response.
pub async fn login(app: Router, username: &str, password: &str) -> serde_json::Value {
    let body = serde_json::json!({ "username": username, "password": password });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), 200, "login should succeed");
    body_json(response).await
}
