use chrono::{SecondsFormat, Utc};

/// ISO-8601 UTC timestamp used for `created_at` / `updated_at` stamps.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
