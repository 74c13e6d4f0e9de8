use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, AvatarFile};
use crate::auth::SessionManager;
use crate::error::{SessionError, SessionResult};
use crate::models::Profile;

#[derive(Debug, Default)]
struct ProfileState {
    profile: Option<Profile>,
    in_flight: usize,
    error: Option<String>,
}

impl ProfileState {
    fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            profile: self.profile.clone(),
            loading: self.in_flight > 0,
            error: self.error.clone(),
        }
    }
}

/// Read-only projection of the profile for the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown> | null"))]
    pub profile: Option<Profile>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Holds the extended profile, fetched and changed through the transport.
///
/// Only asks the session manager whether a session exists; never writes to it.
pub struct ProfileManager {
    api: ApiClient,
    session: Arc<SessionManager>,
    state: RwLock<ProfileState>,
}

impl ProfileManager {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            api: session.api().clone(),
            session,
            state: RwLock::new(ProfileState::default()),
        }
    }

    pub async fn snapshot(&self) -> ProfileSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.state.read().await.profile.clone()
    }

    /// `GET /user/profile`; replaces the local profile.
    pub async fn fetch_profile(&self) -> SessionResult<Profile> {
        let profile = self.run("fetching profile", self.api.fetch_profile()).await?;
        self.state.write().await.profile = Some(profile.clone());
        debug!("Profile fetched");
        Ok(profile)
    }

    /// `PUT /user/profile`; the response is merged into the local profile.
    pub async fn update_profile(&self, partial: Profile) -> SessionResult<Profile> {
        let response = self
            .run("updating profile", self.api.update_profile(&partial))
            .await?;
        Ok(self.merge(response).await)
    }

    /// `POST /user/avatar`; the response is merged into the local profile.
    pub async fn upload_avatar(&self, file: AvatarFile) -> SessionResult<Profile> {
        let response = self
            .run("uploading avatar", self.api.upload_avatar(&file))
            .await?;
        Ok(self.merge(response).await)
    }

    /// `PUT /user/change-password`; profile state is untouched on success.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> SessionResult<()> {
        self.run(
            "changing password",
            self.api.change_password(old_password, new_password),
        )
        .await
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    /// Forget the local profile, e.g. after the session ended.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.profile = None;
        state.error = None;
    }

    async fn merge(&self, response: Profile) -> Profile {
        let mut state = self.state.write().await;
        let merged = match state.profile.take() {
            Some(mut current) => {
                current.merge(response);
                current
            }
            None => response,
        };
        state.profile = Some(merged.clone());
        merged
    }

    /// Shared shape of every operation: require a session, mark loading,
    /// await the call, record the failure message.
    async fn run<T, F>(&self, context: &str, call: F) -> SessionResult<T>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        if !self.session.is_authenticated().await {
            self.reset().await;
            return Err(SessionError::NotAuthenticated);
        }

        {
            let mut state = self.state.write().await;
            state.in_flight += 1;
            state.error = None;
        }

        let result = call.await.map_err(SessionError::from);

        let mut state = self.state.write().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        if let Err(ref e) = result {
            warn!(error = %e, context, "Profile operation failed");
            state.error = Some(e.to_string());
        }
        result
    }
}
