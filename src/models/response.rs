use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const ENVELOPE_KEYS: [&str; 5] = ["data", "meta", "links", "message", "status"];

/// Strips the server envelope and returns the innermost payload.
///
/// Handles `{success, data: {data: [...]}}` (paginated),
/// `{success, data: {data: {...}}}`, `{success, data: [...]}` and bare
/// arrays or objects.
pub fn unwrap_envelope(value: Value) -> Value {
    let outer = match value {
        Value::Object(mut map) if is_envelope(&map) => map.remove("data").unwrap_or(Value::Null),
        other => return other,
    };

    match outer {
        Value::Object(mut map) if is_inner_wrapper(&map) => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

/// Paginators wrap arrays next to arbitrary metadata; an object payload is
/// only unwrapped when nothing but envelope keys sit beside it.
fn is_inner_wrapper(map: &serde_json::Map<String, Value>) -> bool {
    match map.get("data") {
        Some(Value::Array(_)) => true,
        Some(Value::Object(_)) => map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())),
        _ => false,
    }
}

fn is_envelope(map: &serde_json::Map<String, Value>) -> bool {
    if !map.contains_key("data") {
        return false;
    }
    map.contains_key("success") || map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str()))
}

/// `success: false` inside a 2xx response.
pub fn envelope_failure(value: &Value) -> Option<String> {
    match value.get("success") {
        Some(Value::Bool(false)) => Some(
            value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request rejected by server")
                .to_string(),
        ),
        _ => None,
    }
}

/// Error body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, FieldMessages>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    Many(Vec<String>),
    One(String),
}

impl ErrorBody {
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        self.errors
            .iter()
            .map(|(field, messages)| {
                let messages = match messages {
                    FieldMessages::Many(list) => list.clone(),
                    FieldMessages::One(message) => vec![message.clone()],
                };
                (field.clone(), messages)
            })
            .collect()
    }
}
