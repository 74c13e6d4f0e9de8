//! Authenticated transport for the HRMS REST API.
//!
//! Every request passes through `ApiClient::execute`, which attaches the
//! stored access token and reacts to 401 responses by clearing the persisted
//! session. The session manager learns about the invalidation through
//! `TransportEvent`s; the transport never calls back into it.

use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::{AvatarFile, ChangePasswordRequest, LoginRequest, LoginResponse};
use super::ApiError;
use crate::auth::SessionRepository;
use crate::models::Profile;

// ============================================================================
// Constants
// ============================================================================

/// Production API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.manahrms.com/api/v1";

/// HTTP request timeout in seconds. A timeout surfaces as a network failure.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Buffered transport events before slow receivers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Emitted by the transport for the session manager to pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A 401 cleared persisted credentials. Carries the token that was rejected.
    SessionInvalidated { rejected_token: Option<String> },
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Avatar(AvatarFile),
}

/// Immutable description of one API call. Can be dispatched any number of times.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: RequestBody,
    anonymous: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            anonymous: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn avatar(mut self, file: AvatarFile) -> Self {
        self.body = RequestBody::Avatar(file);
        self
    }

    /// Dispatch without a bearer token even if one is stored.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Retry guard for one logical request.
///
/// The first 401 seen through an attempt invalidates the session; later 401s
/// on the same attempt (a re-sent copy of the request) only propagate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    unauthorized_handled: bool,
}

impl Attempt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unauthorized_handled(&self) -> bool {
        self.unauthorized_handled
    }
}

/// API client for the HRMS backend.
/// Clone is cheap - reqwest::Client and the repository are reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionRepository,
    events: broadcast::Sender<TransportEvent>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: SessionRepository,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_repository(&self) -> &SessionRepository {
        &self.session
    }

    /// Subscribe to invalidation events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Dispatch `request` once.
    ///
    /// Persisted credentials are already cleared when this returns
    /// `ApiError::Unauthorized` for the first time on `attempt`.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        attempt: &mut Attempt,
    ) -> Result<reqwest::Response, ApiError> {
        let token = if request.anonymous {
            None
        } else {
            self.session.access_token().await
        };

        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .header(header::ACCEPT, "application/json");
        if let Some(ref token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(ref value) => builder.json(value),
            RequestBody::Avatar(ref file) => builder.multipart(file.to_form()?),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = ApiError::from_reqwest(e);
                warn!(method = %request.method, path = %request.path, error = %err, "Request failed");
                return Err(err);
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            if attempt.unauthorized_handled {
                debug!(path = %request.path, "Repeated 401 on the same request, not invalidating again");
            } else {
                attempt.unauthorized_handled = true;
                warn!(path = %request.path, "Unauthorized, invalidating session");
                self.invalidate(token).await;
            }
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        Ok(response)
    }

    /// Clear persisted credentials unless a newer session replaced the rejected token.
    async fn invalidate(&self, rejected_token: Option<String>) {
        if !self.session.clear_if_token(rejected_token.as_deref()).await {
            debug!("Rejected token already superseded, keeping stored session");
        }
        // No subscribers is fine
        let _ = self
            .events
            .send(TransportEvent::SessionInvalidated { rejected_token });
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(&request, &mut Attempt::new()).await?;
        response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", request.path, e))
        })
    }

    async fn send_unit(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(&request, &mut Attempt::new()).await?;
        Ok(())
    }

    // ===== Endpoints =====

    /// `POST /auth/login`, always without a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post("/auth/login")
            .anonymous()
            .json(&LoginRequest { email, password })?;
        self.send_json(request).await
    }

    /// `POST /auth/logout`
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::post("/auth/logout")).await
    }

    /// `GET /user/profile`
    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.send_json(ApiRequest::get("/user/profile")).await
    }

    /// `PUT /user/profile` with the changed fields only
    pub async fn update_profile(&self, partial: &Profile) -> Result<Profile, ApiError> {
        self.send_json(ApiRequest::put("/user/profile").json(partial)?)
            .await
    }

    /// `PUT /user/change-password`
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::put("/user/change-password").json(&ChangePasswordRequest {
            old_password,
            new_password,
        })?;
        self.send_unit(request).await
    }

    /// `POST /user/avatar` as multipart
    pub async fn upload_avatar(&self, file: &AvatarFile) -> Result<Profile, ApiError> {
        self.send_json(ApiRequest::post("/user/avatar").avatar(file.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryCredentialStore, StorageKeys};
    use crate::report::TracingReporter;
    use std::sync::Arc;

    fn client(base_url: &str) -> ApiClient {
        let repo = SessionRepository::new(
            Arc::new(MemoryCredentialStore::new()),
            StorageKeys::default(),
            Arc::new(TracingReporter),
        );
        ApiClient::new(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS), repo).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("https://api.example.com/api/v1/");
        assert_eq!(api.base_url(), "https://api.example.com/api/v1");
        assert_eq!(api.url("/user/profile"), "https://api.example.com/api/v1/user/profile");
        assert_eq!(api.url("auth/login"), "https://api.example.com/api/v1/auth/login");
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::post("/auth/login").anonymous();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/auth/login");
        assert!(request.anonymous);

        let request = ApiRequest::put("/user/profile")
            .json(&serde_json::json!({"phone": "555"}))
            .unwrap();
        assert!(matches!(request.body, RequestBody::Json(_)));
        assert!(!request.anonymous);
    }

    #[test]
    fn test_fresh_attempt_has_not_handled_401() {
        assert!(!Attempt::new().unauthorized_handled());
    }
}
