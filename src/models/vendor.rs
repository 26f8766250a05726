use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::form::FormPayload;
use super::record::Record;

pub const SERVICES_PROVIDED: &str = "services_provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Active,
    PendingApproval,
    Suspended,
    Inactive,
}

impl VendorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Active => "active",
            VendorStatus::PendingApproval => "pending_approval",
            VendorStatus::Suspended => "suspended",
            VendorStatus::Inactive => "inactive",
        }
    }
}

/// Outbound body for vendor creation: structured fields, or a multipart
/// form when files (logo, documents) are attached.
#[derive(Debug, Clone)]
pub enum VendorPayload {
    Fields(Record),
    Form(FormPayload),
}

impl VendorPayload {
    /// The record a degraded create stores locally. File parts are kept as
    /// their file names.
    pub fn to_record(&self) -> Record {
        match self {
            VendorPayload::Fields(record) => record.clone(),
            VendorPayload::Form(form) => form.to_record(),
        }
    }
}

impl From<Record> for VendorPayload {
    fn from(record: Record) -> Self {
        VendorPayload::Fields(record)
    }
}

impl From<FormPayload> for VendorPayload {
    fn from(form: FormPayload) -> Self {
        VendorPayload::Form(form)
    }
}

/// Normalizes a `services_provided` value to a JSON array of strings.
///
/// Accepts an array (returned as is), a JSON-encoded array string (possibly
/// encoded more than once), or a plain comma-separated string. Anything else
/// becomes an empty array. Applying it to its own output is a no-op.
pub fn normalize_services_provided(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Value::Array(Vec::new());
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(parsed @ Value::Array(_)) => parsed,
                Ok(Value::String(inner)) if inner != *raw => {
                    normalize_services_provided(&Value::String(inner))
                }
                _ => Value::Array(
                    trimmed
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| Value::String(s.to_string()))
                        .collect(),
                ),
            }
        }
        _ => Value::Array(Vec::new()),
    }
}

pub fn normalize_vendor(record: &mut Record) {
    let normalized = normalize_services_provided(record.get(SERVICES_PROVIDED).unwrap_or(&Value::Null));
    record.set(SERVICES_PROVIDED, normalized);
}

pub fn normalize_vendors(records: &mut [Record]) {
    for record in records.iter_mut() {
        normalize_vendor(record);
    }
}

/// Activity counters a freshly confirmed vendor starts with.
pub fn zero_activity_counters(record: &mut Record) {
    record.set_default("total_events", 0);
    record.set_default("total_quotations", 0);
    record.set_default("completed_events", 0);
    record.set_default("rating", 0);
}
