//! Extended user profile state.

pub mod manager;

pub use manager::{ProfileManager, ProfileSnapshot};
