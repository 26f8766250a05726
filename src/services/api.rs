use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};
use http::StatusCode;
use crate::clients::{ConnectivityMonitor, OutboundRequest, RawResponse, Transport};
use crate::error::{Error, Result};
use crate::models::{envelope_failure, unwrap_envelope, ErrorBody, RequestOptions};
use crate::services::auth::AuthHeaderProvider;

/// Issues calls against the remote API and normalizes their outcome.
///
/// Each call makes exactly one attempt: no retries, no cancellation.
#[derive(Clone)]
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    auth: Arc<AuthHeaderProvider>,
    connectivity: ConnectivityMonitor,
    base_url: String,
}

impl RequestGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<AuthHeaderProvider>,
        connectivity: ConnectivityMonitor,
        base_url: &str,
    ) -> Self {
        Self {
            transport,
            auth,
            connectivity,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub async fn call(&self, endpoint: &str, options: &RequestOptions) -> Result<Value> {
        if !self.connectivity.is_reachable() {
            debug!(endpoint = endpoint, "Skipping request while offline");
            return Err(Error::offline());
        }

        let headers = self.auth.headers(options.body.is_binary()).await?;
        let request = OutboundRequest {
            method: options.method.clone(),
            url: format!("{}{}", self.base_url, endpoint),
            headers,
            query: options.query.clone(),
            body: options.body.clone(),
        };

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(
                error = %e,
                endpoint = endpoint,
                method = %options.method,
                "Request could not be completed"
            );
            e
        })?;

        debug!(
            status = response.status.as_u16(),
            endpoint = endpoint,
            "API response received"
        );

        if response.status.is_success() {
            return parse_success(endpoint, response);
        }
        Err(classify_failure(endpoint, response))
    }
}

fn parse_success(endpoint: &str, response: RawResponse) -> Result<Value> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_slice(&response.body).map_err(|e| {
        let body_str = String::from_utf8_lossy(&response.body);
        error!(
            error = %e,
            endpoint = endpoint,
            body = %body_str,
            "Invalid JSON response"
        );
        Error::Parse {
            message: e.to_string(),
            body: body_str.into_owned(),
        }
    })?;

    if let Some(message) = envelope_failure(&value) {
        return Err(Error::Api {
            status: response.status.as_u16(),
            message,
            body: Some(value),
        });
    }

    Ok(unwrap_envelope(value))
}

fn classify_failure(endpoint: &str, response: RawResponse) -> Error {
    let status = response.status;
    let body: Option<Value> = serde_json::from_slice(&response.body).ok();
    let details: ErrorBody = body
        .clone()
        .and_then(|b| serde_json::from_value(b).ok())
        .unwrap_or_default();
    let message = details.message_or(status.canonical_reason().unwrap_or("request failed"));

    warn!(
        status = status.as_u16(),
        endpoint = endpoint,
        message = %message,
        "API returned an error status"
    );

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        return Error::Validation {
            message,
            errors: details.field_errors(),
        };
    }
    if status.is_server_error() {
        return Error::Network {
            status: Some(status.as_u16()),
            message,
            body,
        };
    }
    Error::Api {
        status: status.as_u16(),
        message,
        body,
    }
}
