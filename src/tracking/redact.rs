//! Masking of sensitive values in captured payloads.
//!
//! Keys are matched case-insensitively against the built-in set plus any
//! route-specific names. Matching is applied at every nesting depth, and to
//! string values that themselves hold a JSON object or array.
//!
//! ```
//! use api_tracking::tracking::{Redactor, REDACTED};
//! use serde_json::json;
//!
//! let redactor = Redactor::new(["mY_fiEld"]);
//! let cleaned = redactor.clean(json!({"my_field": "secret", "other": 1}));
//! assert_eq!(cleaned, json!({"my_field": REDACTED, "other": 1}));
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Replacement for every masked value
pub const REDACTED: &str = "********************";

/// Field names that are always masked
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] =
    &["api", "token", "key", "secret", "password", "signature"];

#[derive(Debug, Clone)]
pub struct Redactor {
    fields: HashSet<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl Redactor {
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut redactor = Self {
            fields: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        };
        redactor.extend(extra);
        redactor
    }

    pub fn extend<I, S>(&mut self, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields
            .extend(extra.into_iter().map(|f| f.as_ref().to_lowercase()));
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.fields.contains(&key.to_lowercase())
    }

    /// Return a copy of `value` with sensitive entries masked
    pub fn clean(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.clean_map(map)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.clean(v)).collect()),
            Value::String(text) => match embedded_json(&text) {
                Some(inner) => self.clean(inner),
                None => Value::String(text),
            },
            other => other,
        }
    }

    fn clean_map(&self, map: Map<String, Value>) -> Map<String, Value> {
        map.into_iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive(&key) {
                    Value::String(REDACTED.to_string())
                } else {
                    self.clean(value)
                };
                (key, value)
            })
            .collect()
    }
}

/// Parse a string value that holds a JSON object or array
fn embedded_json(text: &str) -> Option<Value> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_fields_are_masked() {
        let redactor = Redactor::default();
        let cleaned = redactor.clean(json!({
            "api": "a",
            "Token": "b",
            "KEY": "c",
            "secret": "d",
            "password": "e",
            "signature": "f",
            "username": "bob",
        }));

        for field in ["api", "Token", "KEY", "secret", "password", "signature"] {
            assert_eq!(cleaned[field], REDACTED, "{} not masked", field);
        }
        assert_eq!(cleaned["username"], "bob");
    }

    #[test]
    fn test_custom_fields_match_case_insensitively() {
        let redactor = Redactor::new(["mY_fiEld"]);
        assert!(redactor.is_sensitive("my_field"));
        assert!(redactor.is_sensitive("MY_FIELD"));
        assert!(!redactor.is_sensitive("my_field_2"));
    }

    #[test]
    fn test_nested_structures_are_masked() {
        let redactor = Redactor::new(["card"]);
        let cleaned = redactor.clean(json!({
            "orders": [
                {"card": "4111", "items": [{"password": "x", "sku": 1}]},
                {"meta": {"deep": {"card": "5500"}}}
            ]
        }));

        let text = cleaned.to_string();
        assert!(!text.contains("4111"));
        assert!(!text.contains("5500"));
        assert!(!text.contains("\"x\""));
        assert_eq!(cleaned["orders"][0]["items"][0]["sku"], 1);
    }

    #[test]
    fn test_json_inside_string_values_is_masked() {
        let redactor = Redactor::default();
        let cleaned = redactor.clean(json!({
            "payload": "{\"password\": \"hunter2\", \"user\": \"bob\"}",
            "note": "{not json",
        }));

        assert_eq!(cleaned["payload"]["password"], REDACTED);
        assert_eq!(cleaned["payload"]["user"], "bob");
        assert_eq!(cleaned["note"], "{not json");
    }

    #[test]
    fn test_sensitive_container_is_replaced_whole() {
        let redactor = Redactor::default();
        let cleaned = redactor.clean(json!({"secret": {"a": 1}}));
        assert_eq!(cleaned, json!({"secret": REDACTED}));
    }

    #[test]
    fn test_scalars_pass_through() {
        let redactor = Redactor::default();
        assert_eq!(redactor.clean(json!("with logging")), json!("with logging"));
        assert_eq!(redactor.clean(json!(42)), json!(42));
        assert_eq!(redactor.clean(Value::Null), Value::Null);
    }
}
