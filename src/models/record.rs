use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a record within its collection.
///
/// Server ids are positive integers (or opaque strings); ids minted while
/// offline are negative integers, so the two ranges never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Number),
            Value::String(s) => Some(Self::parse(s)),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(raw.to_string()),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, RecordId::Number(n) if *n < 0)
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Number(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.clone()),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RecordId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid record id: {}", value)))
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::parse(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// A vendor, quotation or statistics snapshot as a field map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.0.get("id").and_then(RecordId::from_value)
    }

    pub fn has_id(&self, id: &RecordId) -> bool {
        self.id().as_ref() == Some(id)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.get_str("status")
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets `field` only when it is not already present.
    pub fn set_default(&mut self, field: &str, value: impl Into<Value>) {
        self.0.entry(field.to_string()).or_insert_with(|| value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Shallow merge: every field of `patch` overwrites the same field here.
    pub fn merge(&mut self, patch: &Record) {
        for (key, value) in patch.0.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn touch(&mut self, timestamp: &str) {
        self.set("updated_at", timestamp);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Collects every object in `value` (an array, or a single object) into
/// records, skipping anything that is not an object.
pub fn records_from_value(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(Record::from_value).collect(),
        Value::Object(map) => vec![Record(map)],
        _ => Vec::new(),
    }
}

pub fn records_to_value(records: &[Record]) -> Value {
    Value::Array(records.iter().cloned().map(Record::into_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_accepts_numeric_strings() {
        assert_eq!(RecordId::from_value(&json!("42")), Some(RecordId::Number(42)));
        assert_eq!(RecordId::from_value(&json!(42)), Some(RecordId::Number(42)));
        assert_eq!(
            RecordId::from_value(&json!("vnd_9")),
            Some(RecordId::Text("vnd_9".to_string()))
        );
        assert_eq!(RecordId::from_value(&json!(null)), None);
        assert!(RecordId::Number(-3).is_local());
        assert!(!RecordId::Number(3).is_local());
    }

    #[test]
    fn test_merge_overwrites_and_keeps_untouched_fields() {
        let mut record = Record::from_value(json!({"id": 1, "name": "Old", "phone": "555"})).unwrap();
        let patch = Record::from_value(json!({"name": "New", "email": "a@x.com"})).unwrap();
        record.merge(&patch);

        assert_eq!(record.get_str("name"), Some("New"));
        assert_eq!(record.get_str("phone"), Some("555"));
        assert_eq!(record.get_str("email"), Some("a@x.com"));
        assert!(record.has_id(&RecordId::Number(1)));
    }

    #[test]
    fn test_records_from_value_skips_non_objects() {
        let records = records_from_value(json!([{"id": 1}, 5, "x", {"id": 2}]));
        assert_eq!(records.len(), 2);
        assert!(records_from_value(json!(null)).is_empty());
    }
}
