//! HTTP client for the hosted backend: email/password auth, canvas rows and
//! image uploads.

use crate::config::BackendConfig;
use crate::error::{CloudError, CloudResult};
use chrono::{DateTime, Utc};
use infinicanvas_core::CanvasState;
use infinicanvas_core::storage::TokenStore;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use url::Url;

/// Bucket images are uploaded to.
pub const IMAGE_BUCKET: &str = "canvas-images";

/// Refresh the access token when it expires within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Asks the row API for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// A signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Tokens for a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
    /// Unix seconds
    pub expires_at: i64,
    pub refresh_token: String,
    pub user: User,
}

impl Session {
    /// Whether the access token expires within `secs` of `now` (unix seconds).
    pub fn expires_within(&self, secs: i64, now: i64) -> bool {
        self.expires_at - now <= secs
    }
}

/// A row of the `canvases` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub data: CanvasState,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of the `canvas_versions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasVersion {
    pub id: String,
    pub canvas_id: String,
    pub version_data: CanvasState,
    pub created_at: DateTime<Utc>,
}

/// Change in sign-in state reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

type AuthListener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, AuthListener)>,
}

/// Handle returned by [`BackendClient::on_auth_state_change`].
pub struct AuthSubscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl AuthSubscription {
    /// Stop receiving auth events.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct NewCanvas<'a> {
    user_id: &'a str,
    title: &'a str,
    data: &'a CanvasState,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<&'a str>,
}

#[derive(Serialize)]
struct CanvasChanges<'a> {
    data: &'a CanvasState,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct NewVersion<'a> {
    canvas_id: &'a str,
    version_data: &'a CanvasState,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Human-readable message from an error body.
fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .map(str::to_string);
    }
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}

/// Turn an error status into [`CloudError::Api`].
async fn check(response: Response) -> CloudResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    Err(CloudError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Client for the backend's auth, row and object APIs.
///
/// The session is kept in a [`TokenStore`] so a restart stays signed in, and
/// the access token is refreshed before any authenticated call that would
/// otherwise use a token about to expire.
pub struct BackendClient {
    base: Url,
    anon_key: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
    session: Mutex<Option<Session>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl BackendClient {
    /// Create a client, restoring any session saved in `tokens`.
    pub fn new(config: &BackendConfig, tokens: Arc<dyn TokenStore>) -> CloudResult<Self> {
        if !config.is_configured() {
            return Err(CloudError::NotConfigured);
        }
        let base = Url::parse(config.url.trim())?;
        let http = reqwest::Client::builder().build()?;

        let session = match tokens.token()? {
            Some(json) => match serde_json::from_str::<Session>(&json) {
                Ok(session) => Some(session),
                Err(e) => {
                    log::warn!("Discarding unreadable saved session: {}", e);
                    tokens.delete_token()?;
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            base,
            anon_key: config.anon_key.trim().to_string(),
            http,
            tokens,
            session: Mutex::new(session),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        })
    }

    /// Absolute URL for an API path, keeping any path prefix of the base URL.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", prefix, path));
        url
    }

    /// Public URL of an uploaded image, `path` being `<userId>/<fileName>`.
    pub fn public_url(&self, path: &str) -> String {
        self.endpoint(&format!("/storage/v1/object/public/{}/{}", IMAGE_BUCKET, path))
            .to_string()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
    }

    async fn authed(&self, method: Method, path: &str) -> CloudResult<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    /// Current session, if signed in.
    pub fn session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    /// User of the current session, without asking the backend.
    pub fn current_user(&self) -> Option<User> {
        lock(&self.session).as_ref().map(|s| s.user.clone())
    }

    fn require_user(&self) -> CloudResult<User> {
        self.current_user().ok_or(CloudError::NotAuthenticated)
    }

    /// A valid access token, refreshing the session when it is about to expire.
    async fn access_token(&self) -> CloudResult<String> {
        let session = self.session().ok_or(CloudError::NotAuthenticated)?;
        if session.expires_within(REFRESH_MARGIN_SECS, Utc::now().timestamp()) {
            log::debug!("Access token expires soon, refreshing");
            return Ok(self.refresh_session().await?.access_token);
        }
        Ok(session.access_token)
    }

    fn set_session(&self, session: Session, event: AuthEvent) -> CloudResult<()> {
        self.tokens.save_token(&serde_json::to_string(&session)?)?;
        *lock(&self.session) = Some(session.clone());
        self.notify(event, Some(&session));
        Ok(())
    }

    fn clear_session(&self) {
        if lock(&self.session).take().is_none() {
            return;
        }
        if let Err(e) = self.tokens.delete_token() {
            log::warn!("Could not delete saved session: {}", e);
        }
        self.notify(AuthEvent::SignedOut, None);
    }

    fn notify(&self, event: AuthEvent, session: Option<&Session>) {
        let listeners: Vec<AuthListener> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event, session);
        }
    }

    /// Register a callback for sign-in, sign-out and token refresh.
    pub fn on_auth_state_change<F>(&self, listener: F) -> AuthSubscription
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        let listener: AuthListener = Arc::new(listener);
        listeners.entries.push((id, listener));
        AuthSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    // --- Auth ---

    /// Create an account and sign in as it.
    pub async fn sign_up(&self, email: &str, password: &str) -> CloudResult<User> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&Credentials { email, password })
            .send()
            .await?;
        let session: Session = check(response).await?.json().await?;
        let user = session.user.clone();
        self.set_session(session, AuthEvent::SignedIn)?;
        log::info!("Signed up as {}", user.id);
        Ok(user)
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> CloudResult<User> {
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password })
            .send()
            .await?;
        let session: Session = check(response).await?.json().await?;
        let user = session.user.clone();
        self.set_session(session, AuthEvent::SignedIn)?;
        log::info!("Signed in as {}", user.id);
        Ok(user)
    }

    /// Revoke the session on the backend and forget it locally.
    ///
    /// The local session is dropped even when the backend call fails.
    pub async fn sign_out(&self) -> CloudResult<()> {
        let Some(session) = self.session() else {
            return Ok(());
        };

        let result = match self
            .request(Method::POST, "/auth/v1/logout")
            .bearer_auth(&session.access_token)
            .send()
            .await
        {
            Ok(response) => check(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        self.clear_session();

        if let Err(e) = &result {
            log::warn!("Sign-out request failed: {}", e);
        }
        result
    }

    /// Ask the backend who the current session belongs to.
    pub async fn get_user(&self) -> CloudResult<Option<User>> {
        if self.session().is_none() {
            return Ok(None);
        }
        let response = self.authed(Method::GET, "/auth/v1/user").await?.send().await?;
        let user: User = check(response).await?.json().await?;
        Ok(Some(user))
    }

    /// Exchange the refresh token for a new session.
    ///
    /// A rejected refresh token signs the user out.
    pub async fn refresh_session(&self) -> CloudResult<Session> {
        let refresh_token = self
            .session()
            .map(|s| s.refresh_token)
            .ok_or(CloudError::NotAuthenticated)?;

        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        match check(response).await {
            Ok(response) => {
                let session: Session = response.json().await?;
                self.set_session(session.clone(), AuthEvent::TokenRefreshed)?;
                log::debug!("Refreshed session for {}", session.user.id);
                Ok(session)
            }
            Err(e @ CloudError::Api { .. }) => {
                log::warn!("Session refresh rejected: {}", e);
                self.clear_session();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    // --- Canvases ---

    /// Insert a new canvas row owned by the current user.
    pub async fn save_canvas(
        &self,
        title: &str,
        state: &CanvasState,
        thumbnail_url: Option<&str>,
    ) -> CloudResult<Canvas> {
        let user = self.require_user()?;
        let response = self
            .authed(Method::POST, "/rest/v1/canvases")
            .await?
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&NewCanvas {
                user_id: &user.id,
                title,
                data: state,
                thumbnail_url,
            })
            .send()
            .await?;
        let canvas: Canvas = check(response).await?.json().await?;
        log::info!("Saved canvas {} ({} elements)", canvas.id, state.len());
        Ok(canvas)
    }

    /// Replace the document (and optionally the thumbnail) of a canvas.
    pub async fn update_canvas(
        &self,
        canvas_id: &str,
        state: &CanvasState,
        thumbnail_url: Option<&str>,
    ) -> CloudResult<()> {
        let user = self.require_user()?;
        let response = self
            .authed(Method::PATCH, "/rest/v1/canvases")
            .await?
            .query(&[("id", eq(canvas_id)), ("user_id", eq(&user.id))])
            .json(&CanvasChanges {
                data: state,
                thumbnail_url,
                updated_at: Utc::now(),
            })
            .send()
            .await?;
        check(response).await?;
        log::info!("Updated canvas {}", canvas_id);
        Ok(())
    }

    /// Record a snapshot of a canvas in its history.
    pub async fn save_canvas_version(
        &self,
        canvas_id: &str,
        state: &CanvasState,
    ) -> CloudResult<CanvasVersion> {
        self.require_user()?;
        let response = self
            .authed(Method::POST, "/rest/v1/canvas_versions")
            .await?
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&NewVersion {
                canvas_id,
                version_data: state,
            })
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// History of a canvas, newest first.
    pub async fn list_canvas_versions(&self, canvas_id: &str) -> CloudResult<Vec<CanvasVersion>> {
        self.require_user()?;
        let response = self
            .authed(Method::GET, "/rest/v1/canvas_versions")
            .await?
            .query(&[
                ("select", "*".to_string()),
                ("canvas_id", eq(canvas_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Canvases of the current user, most recently updated first.
    pub async fn get_user_canvases(&self) -> CloudResult<Vec<Canvas>> {
        let user = self.require_user()?;
        let response = self
            .authed(Method::GET, "/rest/v1/canvases")
            .await?
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(&user.id)),
                ("order", "updated_at.desc".to_string()),
            ])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch one canvas by id.
    pub async fn get_canvas(&self, canvas_id: &str) -> CloudResult<Canvas> {
        let path = "/rest/v1/canvases";
        let request = if self.session().is_some() {
            self.authed(Method::GET, path).await?
        } else {
            self.request(Method::GET, path)
        };
        let response = request
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&[("select", "*".to_string()), ("id", eq(canvas_id))])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Delete a canvas of the current user along with its history.
    pub async fn delete_canvas(&self, canvas_id: &str) -> CloudResult<()> {
        let user = self.require_user()?;
        let response = self
            .authed(Method::DELETE, "/rest/v1/canvases")
            .await?
            .query(&[("id", eq(canvas_id)), ("user_id", eq(&user.id))])
            .send()
            .await?;
        check(response).await?;
        log::info!("Deleted canvas {}", canvas_id);
        Ok(())
    }

    // --- Images ---

    /// Upload an image under the current user's folder and return its public URL.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> CloudResult<String> {
        let user = self.require_user()?;
        let path = format!("{}/{}", user.id, file_name);
        let size = bytes.len();
        let response = self
            .authed(
                Method::POST,
                &format!("/storage/v1/object/{}/{}", IMAGE_BUCKET, path),
            )
            .await?
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        log::info!("Uploaded {} ({} bytes)", path, size);
        Ok(self.public_url(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infinicanvas_core::storage::MemoryTokenStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(url: &str) -> BackendConfig {
        BackendConfig::new(url, "anon")
    }

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at,
            refresh_token: "refresh".to_string(),
            user: User {
                id: "u1".to_string(),
                email: Some("ada@example.com".to_string()),
                created_at: None,
            },
        }
    }

    #[test]
    fn test_expires_within() {
        let s = session(1_000);
        assert!(!s.expires_within(REFRESH_MARGIN_SECS, 900));
        assert!(s.expires_within(REFRESH_MARGIN_SECS, 940));
        assert!(s.expires_within(REFRESH_MARGIN_SECS, 2_000));
    }

    #[test]
    fn test_new_requires_configuration() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let result = BackendClient::new(&BackendConfig::default(), tokens.clone());
        assert!(matches!(result, Err(CloudError::NotConfigured)));

        let result = BackendClient::new(&config("not a url"), tokens);
        assert!(matches!(result, Err(CloudError::InvalidUrl(_))));
    }

    #[test]
    fn test_endpoint_and_public_url() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let client = BackendClient::new(&config("http://localhost:3030"), tokens.clone()).unwrap();
        assert_eq!(
            client.endpoint("/auth/v1/user").as_str(),
            "http://localhost:3030/auth/v1/user"
        );
        assert_eq!(
            client.public_url("u1/cat.png"),
            "http://localhost:3030/storage/v1/object/public/canvas-images/u1/cat.png"
        );

        let prefixed = BackendClient::new(&config("https://example.test/api/"), tokens).unwrap();
        assert_eq!(
            prefixed.endpoint("/rest/v1/canvases").as_str(),
            "https://example.test/api/rest/v1/canvases"
        );
        assert_eq!(
            prefixed.public_url("u1/my cat.png"),
            "https://example.test/api/storage/v1/object/public/canvas-images/u1/my%20cat.png"
        );
    }

    #[test]
    fn test_restores_saved_session() {
        let tokens = Arc::new(MemoryTokenStore::new());
        tokens
            .save_token(&serde_json::to_string(&session(i64::MAX)).unwrap())
            .unwrap();

        let client = BackendClient::new(&config("http://localhost:3030"), tokens).unwrap();
        assert_eq!(client.current_user().map(|u| u.id), Some("u1".to_string()));
    }

    #[test]
    fn test_discards_unreadable_session() {
        let tokens = Arc::new(MemoryTokenStore::new());
        tokens.save_token("{ not a session").unwrap();

        let client = BackendClient::new(&config("http://localhost:3030"), tokens.clone()).unwrap();
        assert!(client.current_user().is_none());
        assert_eq!(tokens.token().unwrap(), None);
    }

    #[test]
    fn test_auth_listeners() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let client = BackendClient::new(&config("http://localhost:3030"), tokens.clone()).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let subscription = client.on_auth_state_change(move |event, session| {
            seen.lock().unwrap().push((event, session.map(|s| s.user.id.clone())));
        });

        client.set_session(session(i64::MAX), AuthEvent::SignedIn).unwrap();
        assert!(tokens.token().unwrap().is_some());
        client.clear_session();
        assert_eq!(tokens.token().unwrap(), None);
        // already signed out, nothing to report
        client.clear_session();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                (AuthEvent::SignedIn, Some("u1".to_string())),
                (AuthEvent::SignedOut, None),
            ]
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let other = client.on_auth_state_change(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        client.set_session(session(i64::MAX), AuthEvent::TokenRefreshed).unwrap();
        assert_eq!(events.lock().unwrap().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        other.unsubscribe();
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message":"JWT expired"}"#).as_deref(),
            Some("JWT expired")
        );
        let grant_error =
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(grant_error).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message("Bad Gateway\n").as_deref(), Some("Bad Gateway"));
        assert_eq!(error_message("   "), None);
        assert_eq!(error_message("{}"), None);
    }
}
