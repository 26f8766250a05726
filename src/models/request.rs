use http::Method;
use serde_json::Value;
use std::collections::BTreeMap;

use super::form::FormPayload;
use super::record::Record;

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Form(FormPayload),
}

impl RequestBody {
    /// Multipart bodies carry their own boundary-bearing content type.
    pub fn is_binary(&self) -> bool {
        matches!(self, RequestBody::Form(_))
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            query: BTreeMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get()
        }
    }

    pub fn json(method: Method, body: Value) -> Self {
        Self {
            method,
            query: BTreeMap::new(),
            body: RequestBody::Json(body),
        }
    }

    pub fn form(method: Method, form: FormPayload) -> Self {
        Self {
            method,
            query: BTreeMap::new(),
            body: RequestBody::Form(form),
        }
    }

    pub fn with_query(mut self, params: &ListParams) -> Self {
        self.query = params.0.clone();
        self
    }
}

/// Cache key for a logical request: method, endpoint, sorted query and body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(endpoint: &str, options: &RequestOptions) -> Self {
        let mut key = format!("{} {}", options.method, endpoint);
        if !options.query.is_empty() {
            let query = options
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            key.push('?');
            key.push_str(&query);
        }
        match &options.body {
            RequestBody::Empty => {}
            RequestBody::Json(body) => {
                key.push(' ');
                key.push_str(&body.to_string());
            }
            RequestBody::Form(form) => {
                key.push(' ');
                key.push_str(&form.signature());
            }
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Query parameters for list endpoints. `status` and `search` are also
/// honoured when a list is served from local data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams(BTreeMap<String, String>);

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn status(self, status: impl Into<String>) -> Self {
        self.param("status", status)
    }

    pub fn search(self, term: impl Into<String>) -> Self {
        self.param("search", term)
    }

    pub fn page(self, page: u32) -> Self {
        self.param("page", page.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            status: self.get("status").map(str::to_string),
            search: self
                .get("search")
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }
}

const SEARCH_FIELDS: [&str; 5] = ["name", "business_name", "email", "title", "contact_person"];

/// Local stand-in for the server's list filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub status: Option<String>,
    pub search: Option<String>,
}

impl RecordFilter {
    pub fn with_status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            search: None,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(status) = &self.status {
            if record.status() != Some(status.as_str()) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            return SEARCH_FIELDS.iter().any(|field| {
                record
                    .get_str(field)
                    .map(|value| value.to_lowercase().contains(term))
                    .unwrap_or(false)
            });
        }
        true
    }

    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}
