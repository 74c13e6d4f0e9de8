//! Data models exchanged with the HRMS API.
//!
//! - `UserRecord`: the signed-in user, as returned by the login endpoint
//! - `Profile`: the extended profile served by `/user/profile`
//!
//! Both are opaque JSON objects; the API owns their shape. They only offer
//! accessors for the fields the client displays and a shallow `merge`.

pub mod profile;
pub mod user;

pub use profile::Profile;
pub use user::UserRecord;

use serde_json::{Map, Value};

/// Overlay `partial` onto `target`: keys in `partial` replace, others are kept.
pub(crate) fn overlay(target: &mut Map<String, Value>, partial: Map<String, Value>) {
    for (key, value) in partial {
        target.insert(key, value);
    }
}

/// Look up a string field, `None` if absent or not a string.
pub(crate) fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}
