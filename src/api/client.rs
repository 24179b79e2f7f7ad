//! CRM API client: authentication, session lifecycle and user CRUD.
//!
//! Every operation returns an `ApiResult`; transport failures are
//! classified at this boundary and never leak to callers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use super::auth::SessionStore;
use super::error::{ApiError, ApiResult};
use super::status::{self, Status};
use super::transport::{Body, HttpTransport, Progress, RequestOptions};
use super::types::{Credentials, NewUser, TokenResponse, User, UserUpdate};
use crate::config::ClientConfig;

const TOKEN_ENDPOINT: &str = "auth/token";
const WHOAMI_ENDPOINT: &str = "crm";
const USERS_ENDPOINT: &str = "crm/users/";

/// What a successful login writes to the session file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Remember {
    /// Nothing is persisted; the session lives in memory only.
    Nothing,
    /// Persist the bearer token.
    #[default]
    Token,
    /// Persist the bearer token and the email/password pair, enabling
    /// `CrmClient::reconnect` once the token expires.
    Credentials,
}

/// Async client for the CRM backend.
///
/// Holds the bearer token in memory (shared, last write wins) and mirrors
/// it to the session file so the next start can pick it up.
///
/// Session file access is small synchronous `std::fs` I/O under the store's
/// `std::sync::Mutex`, run inline on the calling task. On a current-thread
/// runtime it briefly blocks other tasks.
pub struct CrmClient {
    transport: HttpTransport,
    store: SessionStore,
    access_token: Arc<RwLock<Option<String>>>,
}

impl CrmClient {
    /// Create a client for `base_url` persisting its session at `session_file`.
    pub fn new(base_url: &str, session_file: impl Into<PathBuf>) -> Self {
        Self::with_transport(HttpTransport::new(base_url), SessionStore::new(session_file))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let transport =
            HttpTransport::with_timeouts(&config.base_url, config.timeout, config.connect_timeout);
        Self::with_transport(transport, SessionStore::new(config.session_file.clone()))
    }

    pub fn with_transport(transport: HttpTransport, store: SessionStore) -> Self {
        Self {
            transport,
            store,
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.store
    }

    /// Store the access token for authenticated requests.
    pub async fn set_access_token(&self, token: String) {
        *self.access_token.write().await = Some(token);
    }

    /// Clear the in-memory access token.
    pub async fn clear_access_token(&self) {
        *self.access_token.write().await = None;
    }

    pub async fn has_access_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// Classify the outcome of any operation on this client.
    pub fn verify_request<T>(response: &ApiResult<T>) -> Status {
        status::verify_request(response)
    }

    // ── Authentication ───────────────────────────────────────────────────

    /// Log in and persist the token to the session file.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<TokenResponse> {
        self.login_with(email, password, Remember::Token, None).await
    }

    /// Log in, choosing what gets persisted on success.
    ///
    /// POST auth/token with form fields `username`/`password`. Failing to
    /// write the session file is logged but does not fail the login.
    pub async fn login_with(
        &self,
        email: &str,
        password: &str,
        remember: Remember,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<TokenResponse> {
        log::debug!("Logging in as {}", email);

        let opts = RequestOptions::form([("username", email), ("password", password)])
            .with_progress(progress);
        let body = self.transport.post(TOKEN_ENDPOINT, opts).await?;
        let token: TokenResponse = decode(body)?;

        self.set_access_token(token.access_token.clone()).await;

        match remember {
            Remember::Nothing => {}
            Remember::Token => self.persist_token(&token.access_token),
            Remember::Credentials => {
                self.persist_token(&token.access_token);
                if let Err(e) = self
                    .store
                    .remember_credentials(&Credentials::new(email, password))
                {
                    log::warn!("Failed to remember credentials: {}", e);
                }
            }
        }

        log::info!("Login successful");
        Ok(token)
    }

    /// Check that the current session is accepted by the backend.
    ///
    /// With a token in memory the `crm` endpoint is probed once. Without one,
    /// the token is read from the session file exactly once and, if present,
    /// adopted and probed once. A missing or unreadable session file is
    /// deleted and reported as `ApiError::Credentials`. A token the backend
    /// rejects is dropped from memory and from the session file.
    pub async fn current_user_access(&self) -> ApiResult<serde_json::Value> {
        self.current_user_access_with_progress(None).await
    }

    pub async fn current_user_access_with_progress(
        &self,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<serde_json::Value> {
        let held = self.access_token.read().await.clone();
        let token = match held {
            Some(token) => token,
            None => {
                let token = self.load_stored_token()?;
                log::info!("Adopting stored session token");
                self.set_access_token(token.clone()).await;
                token
            }
        };

        let result = self.probe(token, progress).await;
        if matches!(result, Err(ApiError::Credentials)) {
            self.discard_stale_session().await;
        }
        result
    }

    /// Re-login with the credentials remembered in the session file.
    ///
    /// Returns `UserReconnected` on success and `ErrorDns` when the backend is
    /// unreachable. Credentials the backend rejects are forgotten and give
    /// `AccessTokenError`; any other failure keeps them and is classified
    /// like a regular response.
    pub async fn reconnect(&self) -> Status {
        let credentials = match self.store.credentials() {
            Ok(Some(c)) => c,
            Ok(None) => {
                log::info!("No remembered credentials, reconnect skipped");
                return Status::AccessTokenError;
            }
            Err(e) => {
                log::warn!("Session file unreadable, clearing it: {}", e);
                self.remove_session_file();
                return Status::AccessTokenError;
            }
        };

        let result = self
            .login_with(&credentials.email, &credentials.password, Remember::Token, None)
            .await;

        match result {
            Ok(_) => {
                log::info!("Session re-established from remembered credentials");
                Status::UserReconnected
            }
            Err(ApiError::Network) => Status::ErrorDns,
            Err(e) if e.is_wrong_login() || e == ApiError::Credentials => {
                log::warn!("Reconnect rejected, forgetting credentials: {}", e);
                if let Err(e) = self.store.forget_credentials() {
                    log::warn!("Failed to forget credentials: {}", e);
                }
                Status::AccessTokenError
            }
            Err(e) => {
                log::warn!("Reconnect failed, keeping credentials: {}", e);
                Status::from(&e)
            }
        }
    }

    /// Drop the in-memory token and delete the session file.
    pub async fn logout(&self) {
        log::info!("Logging out");
        self.clear_access_token().await;
        self.remove_session_file();
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub async fn create_user(&self, user: &NewUser) -> ApiResult<User> {
        self.create_user_with_progress(user, None).await
    }

    pub async fn create_user_with_progress(
        &self,
        user: &NewUser,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<User> {
        let opts = RequestOptions::json(to_json(user)?).with_progress(progress);
        self.send_authenticated(reqwest::Method::POST, USERS_ENDPOINT, opts).await
    }

    pub async fn get_user(&self, id: i64) -> ApiResult<User> {
        self.get_user_with_progress(id, None).await
    }

    pub async fn get_user_with_progress(
        &self,
        id: i64,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<User> {
        let opts = RequestOptions::default().with_progress(progress);
        self.send_authenticated(reqwest::Method::GET, &user_path(id), opts)
            .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> ApiResult<User> {
        self.get_user_by_email_with_progress(email, None).await
    }

    pub async fn get_user_by_email_with_progress(
        &self,
        email: &str,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<User> {
        let path = format!("crm/users/email/{}", urlencoding::encode(email));
        let opts = RequestOptions::default().with_progress(progress);
        self.send_authenticated(reqwest::Method::GET, &path, opts).await
    }

    /// PUT the user with all four fields. Fields missing from `update` are
    /// filled from the current record, fetched first.
    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> ApiResult<User> {
        self.update_user_with_progress(id, update, None).await
    }

    pub async fn update_user_with_progress(
        &self,
        id: i64,
        update: &UserUpdate,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<User> {
        let body = match update.complete() {
            Some(full) => full,
            None => {
                let current = self.get_user(id).await?;
                update.merge_onto(&current)
            }
        };
        let opts = RequestOptions::json(to_json(&body)?).with_progress(progress);
        self.send_authenticated(reqwest::Method::PUT, &user_path(id), opts)
            .await
    }

    /// Delete a user. The backend's confirmation body is passed through.
    pub async fn delete_user(&self, id: i64) -> ApiResult<serde_json::Value> {
        self.delete_user_with_progress(id, None).await
    }

    pub async fn delete_user_with_progress(
        &self,
        id: i64,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<serde_json::Value> {
        let opts = RequestOptions::default().with_progress(progress);
        let body = self.send(reqwest::Method::DELETE, &user_path(id), opts).await?;
        Ok(passthrough(body))
    }

    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.list_users_with_progress(None).await
    }

    pub async fn list_users_with_progress(
        &self,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<Vec<User>> {
        let opts = RequestOptions::default().with_progress(progress);
        self.send_authenticated(reqwest::Method::GET, USERS_ENDPOINT, opts)
            .await
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn send_authenticated<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        opts: RequestOptions<'_>,
    ) -> ApiResult<T> {
        decode(self.send(method, path, opts).await?)
    }

    /// Send with the current bearer token. The token lock is released
    /// before the request goes out.
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        opts: RequestOptions<'_>,
    ) -> ApiResult<Body> {
        let token = self.access_token.read().await.clone();
        let opts = opts.with_bearer(token);
        Ok(self.transport.request(method, path, opts).await?)
    }

    async fn probe(
        &self,
        token: String,
        progress: Option<Progress<'_>>,
    ) -> ApiResult<serde_json::Value> {
        let opts = RequestOptions::default()
            .with_bearer(Some(token))
            .with_progress(progress);
        let body = self.transport.get(WHOAMI_ENDPOINT, opts).await?;
        Ok(passthrough(body))
    }

    /// Token from the session file, or `Credentials` after removing a
    /// session file that has none or cannot be read.
    fn load_stored_token(&self) -> ApiResult<String> {
        match self.store.access_token() {
            Ok(Some(token)) => Ok(token),
            Ok(None) => {
                log::info!("No stored session token");
                self.remove_session_file();
                Err(ApiError::Credentials)
            }
            Err(e) => {
                log::warn!("Session file unreadable, clearing it: {}", e);
                self.remove_session_file();
                Err(ApiError::Credentials)
            }
        }
    }

    async fn discard_stale_session(&self) {
        log::warn!("Session token rejected by backend, discarding it");
        self.clear_access_token().await;
        if let Err(e) = self.store.forget_token() {
            log::warn!("Failed to drop stale token, clearing session file: {}", e);
            self.remove_session_file();
        }
    }

    fn persist_token(&self, token: &str) {
        if let Err(e) = self.store.set_access_token(token) {
            log::warn!("Failed to persist session token: {}", e);
        }
    }

    fn remove_session_file(&self) {
        if let Err(e) = self.store.clear() {
            log::warn!("Failed to delete session file {}: {}", self.store.path().display(), e);
        }
    }
}

fn user_path(id: i64) -> String {
    format!("{}{}", USERS_ENDPOINT, id)
}

fn to_json<T: Serialize>(value: &T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Unrecognized(e.to_string()))
}

/// Decode a successful body into `T`; any other shape is unrecognized.
fn decode<T: DeserializeOwned>(body: Body) -> ApiResult<T> {
    match body {
        Body::Json(v) => serde_json::from_value(v)
            .map_err(|e| ApiError::Unrecognized(format!("unexpected response shape: {}", e))),
        Body::Text(text) => Err(ApiError::Unrecognized(format!(
            "expected JSON, got {} bytes of text",
            text.len()
        ))),
    }
}

fn passthrough(body: Body) -> serde_json::Value {
    match body {
        Body::Json(v) => v,
        Body::Text(text) => serde_json::Value::String(text),
    }
}
