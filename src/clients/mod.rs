pub mod connectivity;
pub mod http;

use async_trait::async_trait;
use ::http::header::HeaderMap;
use ::http::{Method, StatusCode};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::RequestBody;

pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use self::http::HttpClient;

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: BTreeMap<String, String>,
    pub body: RequestBody,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Sends one request and returns the raw status and body. Errors are
/// transport failures only; status interpretation belongs to the gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse>;
}
