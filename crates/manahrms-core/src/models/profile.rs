use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{overlay, str_field};

/// Extended employee profile. Separate from `UserRecord`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile {
    fields: Map<String, Value>,
}

impl Profile {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        str_field(&self.fields, "email")
    }

    pub fn name(&self) -> Option<&str> {
        str_field(&self.fields, "name")
    }

    pub fn avatar_url(&self) -> Option<&str> {
        str_field(&self.fields, "avatar").or_else(|| str_field(&self.fields, "avatarUrl"))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn merge(&mut self, partial: Profile) {
        overlay(&mut self.fields, partial.fields);
    }
}

impl From<Map<String, Value>> for Profile {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_avatar_url_prefers_avatar_field() {
        let profile = Profile::from_value(json!({"avatar": "a.jpg", "avatarUrl": "b.jpg"})).unwrap();
        assert_eq!(profile.avatar_url(), Some("a.jpg"));

        let profile = Profile::from_value(json!({"avatarUrl": "b.jpg"})).unwrap();
        assert_eq!(profile.avatar_url(), Some("b.jpg"));
    }

    #[test]
    fn test_merge_preserves_absent_fields() {
        let mut profile =
            Profile::from_value(json!({"name": "A", "department": "Ops"})).unwrap();
        profile.merge(Profile::from_value(json!({"department": "HR", "phone": "555"})).unwrap());
        assert_eq!(profile.name(), Some("A"));
        assert_eq!(profile.get("department"), Some(&json!("HR")));
        assert_eq!(profile.get("phone"), Some(&json!("555")));
    }
}
