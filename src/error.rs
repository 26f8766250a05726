use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::RecordId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] rquest::Error),

    #[error("Network error: {message}")]
    Network {
        status: Option<u16>,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("Malformed response body: {message}")]
    Parse { message: String, body: String },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: RecordId },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn offline() -> Self {
        Error::Network {
            status: None,
            message: "network unreachable".to_string(),
            body: None,
        }
    }

    /// Only failures where the server could not be asked for the truth
    /// send a call down the cache/mirror/seed cascade. A request the client
    /// could not even build is a caller bug, not an outage.
    pub fn is_fallback_eligible(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_builder(),
            Error::Network { .. } | Error::Parse { .. } => true,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Network { status, .. } => *status,
            Error::Api { status, .. } => Some(*status),
            Error::Validation { .. } => Some(422),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn validation_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Error::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}
