use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::repository::PersistedSession;
use crate::models::UserRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Before persisted state has been checked
    #[default]
    Unknown,
    Unauthenticated,
    Authenticating,
    Authenticated,
    /// Local user update in progress; still authenticated
    Mutating,
    SigningOut,
}

/// In-memory session, owned by `SessionManager`.
#[derive(Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserRecord>,
    pub phase: SessionPhase,
    pub last_error: Option<String>,
    pub authenticated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    pub fn loading(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Unknown | SessionPhase::Authenticating | SessionPhase::SigningOut
        )
    }

    pub(crate) fn restore(&mut self, persisted: PersistedSession) {
        self.access_token = Some(persisted.access_token);
        self.refresh_token = persisted.refresh_token;
        self.user = Some(persisted.user);
        self.phase = SessionPhase::Authenticated;
        self.last_error = None;
        self.authenticated_at = Some(Utc::now());
    }

    /// Drop credentials and user. Phase and error are left to the caller.
    pub(crate) fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user = None;
        self.authenticated_at = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            is_authenticated: self.is_authenticated(),
            user: self.user.clone(),
            loading: self.loading(),
            error: self.last_error.clone(),
            authenticated_at: self.authenticated_at,
        }
    }
}

// Tokens never show up in logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("phase", &self.phase)
            .field("last_error", &self.last_error)
            .field("authenticated_at", &self.authenticated_at)
            .finish()
    }
}

/// Read-only projection of the session for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_authenticated: bool,
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown> | null"))]
    pub user: Option<UserRecord>,
    pub loading: bool,
    pub error: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub authenticated_at: Option<DateTime<Utc>>,
}
