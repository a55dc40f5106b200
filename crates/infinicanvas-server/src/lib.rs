//! Infinicanvas development backend
//!
//! An in-memory stand-in for the hosted auth, database and object storage
//! service the cloud client talks to. Everything lives in `DashMap` tables
//! and is lost when the process exits.
//!
//! ## Endpoints
//!
//! ```text
//! POST   /auth/v1/signup
//! POST   /auth/v1/token?grant_type=password|refresh_token
//! GET    /auth/v1/user
//! POST   /auth/v1/logout
//! GET    /rest/v1/{table}     (eq. filters, order, select)
//! POST   /rest/v1/{table}
//! PATCH  /rest/v1/{table}
//! DELETE /rest/v1/{table}
//! POST   /storage/v1/object/{bucket}/{*path}
//! GET    /storage/v1/object/public/{bucket}/{*path}
//! GET    /health
//! ```

mod auth;
mod objects;
mod rest;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use std::sync::Arc;

pub use auth::{SessionResponse, UserResponse};

/// Lifetime of an access token.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// The only object bucket.
pub const IMAGE_BUCKET: &str = "canvas-images";

/// Registered account.
struct User {
    id: String,
    email: String,
    salt: String,
    password_hash: blake3::Hash,
    created_at: DateTime<Utc>,
}

/// Issued access token.
struct Session {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Uploaded object.
struct StoredObject {
    content_type: String,
    data: bytes::Bytes,
}

/// Shared application state
pub struct AppState {
    anon_key: String,
    session_ttl: Duration,
    /// Accounts keyed by email
    users: DashMap<String, User>,
    /// Access token -> session
    sessions: DashMap<String, Session>,
    /// Refresh token -> user id
    refresh_tokens: DashMap<String, String>,
    /// Rows keyed by id
    canvases: DashMap<String, Value>,
    canvas_versions: DashMap<String, Value>,
    /// Objects keyed by `<bucket>/<path>`
    objects: DashMap<String, StoredObject>,
}

impl AppState {
    /// Create an empty backend that accepts requests carrying `anon_key`.
    pub fn new(anon_key: impl Into<String>) -> Self {
        Self {
            anon_key: anon_key.into(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            users: DashMap::new(),
            sessions: DashMap::new(),
            refresh_tokens: DashMap::new(),
            canvases: DashMap::new(),
            canvas_versions: DashMap::new(),
            objects: DashMap::new(),
        }
    }

    /// Override how long access tokens stay valid.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Check the `apikey` header.
    fn check_api_key(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let key = headers.get("apikey").and_then(|v| v.to_str().ok());
        if key == Some(self.anon_key.as_str()) {
            Ok(())
        } else {
            Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid API key"))
        }
    }

    /// Check the api key and resolve the bearer token to a user id.
    fn authenticate(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        self.check_api_key(headers)?;
        let token = bearer_token(headers)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;
        let session = self
            .sessions
            .get(token)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Invalid JWT"))?;
        if session.expires_at <= Utc::now() {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "JWT expired"));
        }
        Ok(session.user_id.clone())
    }

    /// Like [`AppState::authenticate`] but a missing token means anonymous.
    fn optional_user(&self, headers: &HeaderMap) -> Result<Option<String>, ApiError> {
        if bearer_token(headers).is_none() {
            self.check_api_key(headers)?;
            return Ok(None);
        }
        self.authenticate(headers).map(Some)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Current time in the format rows carry.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Error response: `{ "message": ... }` with a status code.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

/// Build the router for a backend.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/v1/signup", post(auth::signup))
        .route("/auth/v1/token", post(auth::token))
        .route("/auth/v1/user", get(auth::user))
        .route("/auth/v1/logout", post(auth::logout))
        .route(
            "/rest/v1/{table}",
            get(rest::select)
                .post(rest::insert)
                .patch(rest::update)
                .delete(rest::remove),
        )
        .route(
            "/storage/v1/object/public/{bucket}/{*path}",
            get(objects::download),
        )
        .route("/storage/v1/object/{bucket}/{*path}", post(objects::upload))
        .with_state(state)
}

/// Health check
async fn health() -> &'static str {
    "ok"
}
