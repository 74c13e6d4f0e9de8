use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{overlay, str_field};

/// The authenticated user as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord {
    fields: Map<String, Value>,
}

impl UserRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON value. Only objects are accepted.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Identifier, rendered as a string whether the API sends a number or a string.
    pub fn id(&self) -> Option<String> {
        match self.fields.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        str_field(&self.fields, "email")
    }

    pub fn name(&self) -> Option<&str> {
        str_field(&self.fields, "name")
    }

    /// Name for display: `name`, then `firstName lastName`, then email.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name() {
            return name.to_string();
        }
        let first = str_field(&self.fields, "firstName").unwrap_or("");
        let last = str_field(&self.fields, "lastName").unwrap_or("");
        let full = format!("{} {}", first, last).trim().to_string();
        if !full.is_empty() {
            return full;
        }
        self.email().unwrap_or("Unknown user").to_string()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Shallow overlay: keys present in `partial` replace, the rest are kept.
    pub fn merge(&mut self, partial: UserRecord) {
        overlay(&mut self.fields, partial.fields);
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}
