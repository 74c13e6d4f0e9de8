use thiserror::Error;

use crate::api::ApiError;

/// Failure of a session or profile operation.
///
/// `Display` is the message shown to the user.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// Login maps a 401 to bad credentials; everywhere else it means expiry.
    pub(crate) fn from_login(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized => SessionError::InvalidCredentials,
            other => SessionError::Api(other),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, SessionError::Api(e) if e.is_network())
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, SessionError::Api(ApiError::Unauthorized))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
