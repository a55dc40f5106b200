//! Email/password accounts and bearer sessions.

use crate::{ApiError, AppState, Session, User};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shortest password accepted at sign-up.
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub(crate) struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenQuery {
    grant_type: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

/// Tokens handed out on sign-in and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    /// Unix seconds
    pub expires_at: i64,
    pub refresh_token: String,
    pub user: UserResponse,
}

fn hash_password(salt: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn issue_session(state: &AppState, user: &User) -> SessionResponse {
    let access_token = new_token();
    let refresh_token = new_token();
    let expires_at = Utc::now() + state.session_ttl;

    state.sessions.insert(
        access_token.clone(),
        Session {
            user_id: user.id.clone(),
            expires_at,
        },
    );
    state
        .refresh_tokens
        .insert(refresh_token.clone(), user.id.clone());

    SessionResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.session_ttl.num_seconds(),
        expires_at: expires_at.timestamp(),
        refresh_token,
        user: user.into(),
    }
}

fn find_user_by_id<T>(state: &AppState, id: &str, f: impl FnOnce(&User) -> T) -> Option<T> {
    state
        .users
        .iter()
        .find(|entry| entry.value().id == id)
        .map(|entry| f(entry.value()))
}

/// POST /auth/v1/signup
pub(crate) async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>, ApiError> {
    state.check_api_key(&headers)?;

    let email = normalize_email(&credentials.email);
    if !email.contains('@') {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Unable to validate email address: invalid format",
        ));
    }
    if credentials.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Password should be at least {} characters.", MIN_PASSWORD_LEN),
        ));
    }

    let entry = match state.users.entry(email.clone()) {
        Entry::Occupied(_) => {
            return Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "User already registered",
            ));
        }
        Entry::Vacant(entry) => entry,
    };

    let salt = new_token();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: hash_password(&salt, &credentials.password),
        salt,
        created_at: Utc::now(),
    };
    let user = entry.insert(user);
    info!("Registered user {}", user.id);

    Ok(Json(issue_session(&state, &user)))
}

/// POST /auth/v1/token
pub(crate) async fn token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SessionResponse>, ApiError> {
    state.check_api_key(&headers)?;

    let bad_request = |e: serde_json::Error| ApiError::new(StatusCode::BAD_REQUEST, e.to_string());
    match query.grant_type.as_str() {
        "password" => {
            let credentials: Credentials = serde_json::from_value(body).map_err(bad_request)?;
            let user = state
                .users
                .get(&normalize_email(&credentials.email))
                .filter(|user| {
                    hash_password(&user.salt, &credentials.password) == user.password_hash
                })
                .ok_or_else(|| {
                    ApiError::new(StatusCode::BAD_REQUEST, "Invalid login credentials")
                })?;
            info!("User {} signed in", user.id);
            Ok(Json(issue_session(&state, &user)))
        }
        "refresh_token" => {
            let request: RefreshRequest = serde_json::from_value(body).map_err(bad_request)?;
            let not_found = || {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "Invalid Refresh Token: Refresh Token Not Found",
                )
            };
            // refresh tokens are single use
            let (_, user_id) = state
                .refresh_tokens
                .remove(&request.refresh_token)
                .ok_or_else(not_found)?;
            find_user_by_id(&state, &user_id, |user| issue_session(&state, user))
                .map(Json)
                .ok_or_else(not_found)
        }
        other => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Unsupported grant type: {}", other),
        )),
    }
}

/// GET /auth/v1/user
pub(crate) async fn user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = state.authenticate(&headers)?;
    find_user_by_id(&state, &user_id, |u| UserResponse::from(u))
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "User not found"))
}

/// POST /auth/v1/logout
///
/// Revokes every access and refresh token of the caller.
pub(crate) async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user_id = state.authenticate(&headers)?;
    state.sessions.retain(|_, session| session.user_id != user_id);
    state.refresh_tokens.retain(|_, owner| *owner != user_id);
    info!("User {} signed out", user_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_salted() {
        let a = hash_password("salt-a", "hunter22");
        let b = hash_password("salt-b", "hunter22");
        assert_ne!(a, b);
        assert_eq!(a, hash_password("salt-a", "hunter22"));
        assert_ne!(a, hash_password("salt-a", "hunter23"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_issue_session() {
        let state = AppState::new("anon");
        let user = User {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            salt: "s".to_string(),
            password_hash: hash_password("s", "secret"),
            created_at: Utc::now(),
        };

        let session = issue_session(&state, &user);
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.id, "u1");
        assert!(session.expires_at > Utc::now().timestamp());
        assert_ne!(session.access_token, session.refresh_token);
        assert!(state.sessions.contains_key(&session.access_token));
        assert_eq!(
            state.refresh_tokens.get(&session.refresh_token).map(|id| id.value().clone()),
            Some("u1".to_string())
        );
    }
}
