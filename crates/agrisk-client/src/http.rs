//! Authenticated HTTP transport
//!
//! Every authenticated request carries the stored bearer token. A 401 starts
//! a refresh that is serialized across all concurrent requests; the request
//! is then retried exactly once. A second 401, or any refresh failure, ends
//! the session: both token stores are cleared and the [`SessionListener`]
//! is told.

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::session::{LogOnlyListener, SessionListener};
use crate::store::TokenStore;
use agrisk_model::{
    CompletePasswordChangeRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, ResetPasswordRequest, TokenPair, Validate,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

const USER_AGENT_VALUE: &str = concat!("agrisk-client/", env!("CARGO_PKG_VERSION"));

const REFRESH_PATH: &str = "/api/auth/refresh-token";

/// REST client for the risk-assessment API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    tokens: TokenStore,
    listener: Arc<dyn SessionListener>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create client
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            tokens,
            listener: Arc::new(LogOnlyListener),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// With session-end listener
    #[must_use]
    pub fn with_session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Token store backing this client
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ---- sign-in flows (no bearer token) ----

    /// Sign in and store the issued tokens
    ///
    /// `remember_me` selects the durable store over the session store.
    pub async fn login(&self, request: &LoginRequest, remember_me: bool) -> Result<LoginResponse> {
        request.validate()?;
        let response = self
            .dispatch(Method::POST, "/api/auth/login", Some(request), None)
            .await?;
        let outcome: LoginResponse = decode(response).await?;
        if let LoginResponse::Authenticated(tokens) = &outcome {
            self.tokens.store(tokens, remember_me)?;
            tracing::info!(email = %request.email, "signed in");
        }
        Ok(outcome)
    }

    /// Replace a temporary password and store the issued tokens
    pub async fn complete_password_change(
        &self,
        request: &CompletePasswordChangeRequest,
        remember_me: bool,
    ) -> Result<()> {
        request.validate()?;
        let response = self
            .dispatch(
                Method::POST,
                "/api/auth/complete-password-change",
                Some(request),
                None,
            )
            .await?;
        let tokens: TokenPair = decode(response).await?;
        self.tokens.store(&tokens, remember_me)
    }

    /// Ask for a password-reset code
    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<()> {
        request.validate()?;
        let response = self
            .dispatch(Method::POST, "/api/auth/forgot-password", Some(request), None)
            .await?;
        expect_success(response).await
    }

    /// Set a new password with an emailed code
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<()> {
        request.validate()?;
        let response = self
            .dispatch(Method::POST, "/api/auth/reset-password", Some(request), None)
            .await?;
        expect_success(response).await
    }

    /// Sign out locally
    pub fn logout(&self) -> Result<()> {
        self.tokens.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    // ---- authenticated requests ----

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        decode(response).await
    }

    pub(crate) async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(method, path, Some(body)).await?;
        decode(response).await
    }

    pub(crate) async fn send_unit<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self.send(method, path, body).await?;
        expect_success(response).await
    }

    /// Send with the bearer token, refreshing and retrying once on 401
    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let token = self.tokens.access_token()?.ok_or(ApiError::Unauthorized)?;
        let response = self
            .dispatch(method.clone(), path, body, Some(&token))
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(%method, path, "access token rejected, refreshing");
        let fresh = self.refresh_after(&token).await?;

        let retried = self.dispatch(method.clone(), path, body, Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, path, "request rejected after refresh");
            self.expire_if_current(&fresh).await;
            return Err(ApiError::SessionExpired);
        }
        Ok(retried)
    }

    /// Obtain a token newer than `rejected`
    ///
    /// Callers queue on the refresh lock. Whoever gets it second finds the
    /// token already replaced and reuses it instead of refreshing again, or
    /// finds the stores empty because the session already ended. A failed
    /// refresh ends the session while the lock is still held, so the
    /// listener hears about each rejected token once.
    async fn refresh_after(&self, rejected: &str) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        match self.tokens.access_token()? {
            Some(current) if current != rejected => {
                tracing::debug!("token already refreshed by another request");
                return Ok(current);
            }
            None => {
                tracing::debug!("session already ended by another request");
                return Err(ApiError::SessionExpired);
            }
            Some(_) => {}
        }

        match self.request_refresh().await {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                self.expire_session();
                Err(ApiError::SessionExpired)
            }
        }
    }

    async fn request_refresh(&self) -> Result<String> {
        let refresh_token = self
            .tokens
            .refresh_token()?
            .ok_or(ApiError::SessionExpired)?;
        let response = self
            .dispatch(
                Method::POST,
                REFRESH_PATH,
                Some(&RefreshRequest { refresh_token }),
                None,
            )
            .await?;
        let refreshed: RefreshResponse = decode(response).await?;
        self.tokens
            .update(&refreshed.access_token, refreshed.refresh_token.as_deref())?;
        tracing::info!(rotated = refreshed.refresh_token.is_some(), "access token refreshed");
        Ok(refreshed.access_token)
    }

    /// End the session unless `rejected` was already cleared or replaced
    async fn expire_if_current(&self, rejected: &str) {
        let _guard = self.refresh_lock.lock().await;
        match self.tokens.access_token() {
            Ok(Some(current)) if current != rejected => {
                tracing::debug!("rejected token already replaced; session kept");
            }
            Ok(None) => tracing::debug!("session already ended by another request"),
            Ok(Some(_)) | Err(_) => self.expire_session(),
        }
    }

    fn expire_session(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "could not clear tokens after session expiry");
        }
        self.listener.session_expired();
    }

    async fn dispatch<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        tracing::trace!(%method, %url, "request");
        let mut request = self.http.request(method, &url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(http_error(response).await);
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn expect_success(response: Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(http_error(response).await)
    }
}

async fn http_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status, "request failed");
    ApiError::Http { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ClientConfig::default().with_base_url("https://risk.example.org/");
        let client = ApiClient::new(&config, TokenStore::in_memory()).unwrap();
        assert_eq!(client.url("/api/assessments"), "https://risk.example.org/api/assessments");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ClientConfig::default().with_base_url("not a url");
        assert!(matches!(
            ApiClient::new(&config, TokenStore::in_memory()),
            Err(ApiError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unauthenticated_request_fails_without_network() {
        let client = ApiClient::new(&ClientConfig::default(), TokenStore::in_memory()).unwrap();
        let err = client.get::<serde_json::Value>("/api/assessments").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn login_validates_before_sending() {
        let client = ApiClient::new(&ClientConfig::default(), TokenStore::in_memory()).unwrap();
        let request = LoginRequest {
            email: "nope".to_string(),
            password: String::new(),
        };
        let err = client.login(&request, false).await.unwrap_err();
        assert_eq!(err.validation().unwrap().field_names(), vec!["email", "password"]);
    }
}
