//! ManaHRMS client core.
//!
//! Session and authentication for the ManaHRMS mobile self-service client:
//! persisted credentials, an authenticated API transport that invalidates the
//! session on 401, the session state machine, and the extended profile.
//!
//! Data flows one way: UI action → `SessionManager`/`ProfileManager` →
//! `ApiClient` (token read from `SessionRepository`) → API → state update →
//! credential store → `SessionSnapshot` published to subscribers.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod profile;
pub mod report;
pub mod result;

pub use api::{ApiClient, ApiError, AvatarFile};
pub use auth::{SessionManager, SessionPhase, SessionSnapshot};
pub use config::Config;
pub use context::AppContext;
pub use error::{SessionError, SessionResult};
pub use models::{Profile, UserRecord};
pub use profile::{ProfileManager, ProfileSnapshot};
pub use report::{ErrorReporter, TracingReporter};
pub use result::OperationResult;
