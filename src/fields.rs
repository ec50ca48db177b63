//! Typed field keys and lenient readers for loose JSON rows.

use serde_json::{Map, Value};

pub use crate::constants::fields::*;

/// Canonical identifier for a JSON field read from annotation or corpus rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldKey {
    name: &'static str,
}

impl FieldKey {
    /// Create a field key with a canonical static name.
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Return the raw field name.
    pub const fn as_str(&self) -> &'static str {
        self.name
    }

    /// Look this field up in a row object. JSON `null` reads as absent.
    pub fn get<'a>(&self, row: &'a Map<String, Value>) -> Option<&'a Value> {
        row.get(self.name).filter(|value| !value.is_null())
    }

    /// Look this field up and return it as a string slice.
    pub fn get_str<'a>(&self, row: &'a Map<String, Value>) -> Option<&'a str> {
        self.get(row).and_then(Value::as_str)
    }

    /// Look this field up and return it as an array.
    pub fn get_array<'a>(&self, row: &'a Map<String, Value>) -> Option<&'a Vec<Value>> {
        self.get(row).and_then(Value::as_array)
    }

    /// Look this field up on a value that should be an object.
    pub fn get_in<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        value.as_object().and_then(|row| self.get(row))
    }
}

/// Render an id-like JSON value as a conversation id.
///
/// Strings are taken as-is and numbers are rendered in decimal. Empty strings,
/// `null`, and compound values yield `None`.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an integer code. Integral floats such as `4.0` count as that integer.
pub fn value_to_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|code| code.fract() == 0.0 && code.abs() < i64::MAX as f64)
            .map(|code| code as i64)
    })
}

/// Render a scalar JSON value as review text. `null` becomes empty.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn field_key_reads_null_as_absent() {
        let row = row(json!({"web_url": null, "conversation_id": "abc"}));
        assert_eq!(WEB_URL.get(&row), None);
        assert_eq!(CONVERSATION_ID.get_str(&row), Some("abc"));
        assert_eq!(CONVERSATION_ID.as_str(), "conversation_id");
    }

    #[test]
    fn custom_key_and_nested_lookup_work() {
        const CUSTOM: FieldKey = FieldKey::new("custom");
        let value = json!({"custom": [1, 2]});
        assert_eq!(CUSTOM.get_in(&value), Some(&json!([1, 2])));
        assert_eq!(CUSTOM.get_in(&json!("not an object")), None);
        assert_eq!(CUSTOM.get_array(&row(value)).map(Vec::len), Some(2));
    }

    #[test]
    fn ids_render_from_strings_and_numbers_only() {
        assert_eq!(value_to_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(value_to_id(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_id(&json!("")), None);
        assert_eq!(value_to_id(&Value::Null), None);
        assert_eq!(value_to_id(&json!(["abc"])), None);
    }

    #[test]
    fn codes_accept_integral_floats_only() {
        assert_eq!(value_to_code(&json!(4)), Some(4));
        assert_eq!(value_to_code(&json!(4.0)), Some(4));
        assert_eq!(value_to_code(&json!(-1.0)), Some(-1));
        assert_eq!(value_to_code(&json!(4.5)), None);
        assert_eq!(value_to_code(&json!("4")), None);
        assert_eq!(value_to_code(&Value::Null), None);
    }

    #[test]
    fn text_rendering_keeps_strings_verbatim() {
        assert_eq!(value_to_text(&json!("  spaced  ")), "  spaced  ");
        assert_eq!(value_to_text(&Value::Null), "");
        assert_eq!(value_to_text(&json!(true)), "true");
        assert_eq!(value_to_text(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
