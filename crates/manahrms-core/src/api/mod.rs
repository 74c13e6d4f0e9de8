//! REST API client module for the HRMS backend.
//!
//! This module provides the `ApiClient`, the authenticated transport every
//! remote call goes through. The API uses bearer token authentication; the
//! token is read from the persisted session for each request.

pub mod client;
pub mod error;
pub mod types;

pub use client::{
    ApiClient, ApiRequest, Attempt, RequestBody, TransportEvent, DEFAULT_BASE_URL,
    REQUEST_TIMEOUT_SECS,
};
pub use error::ApiError;
pub use types::{AvatarFile, LoginResponse};
