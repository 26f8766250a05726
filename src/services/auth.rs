use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

pub const TOKEN_KEY: &str = "auth_token";
pub const ROLE_KEY: &str = "user_role";
pub const USER_ID_KEY: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub role: Option<String>,
    pub user_id: Option<String>,
}

/// Builds request headers from the stored credential.
///
/// When no token is stored, the configured development credential is
/// written to the store and used. This keeps local testing unblocked and
/// is not a production security boundary.
pub struct AuthHeaderProvider {
    store: Arc<dyn KeyValueStore>,
    dev_credential: AuthConfig,
    extra_headers: HeaderMap,
}

impl AuthHeaderProvider {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        dev_credential: AuthConfig,
        extra_headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in extra_headers.iter() {
            match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    error!(
                        header_key = key,
                        header_value = value,
                        "Invalid header value"
                    );
                    return Err(Error::InvalidRequest(format!("invalid header: {}", key)));
                }
            }
        }

        Ok(Self {
            store,
            dev_credential,
            extra_headers: headers,
        })
    }

    pub async fn credentials(&self) -> Result<Credentials> {
        let token = match self.store.read(TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        };

        match token {
            Some(token) => Ok(Credentials {
                token,
                role: self.store.read(ROLE_KEY).await.ok().flatten(),
                user_id: self.store.read(USER_ID_KEY).await.ok().flatten(),
            }),
            None => Ok(self.provision_dev_credential().await),
        }
    }

    async fn provision_dev_credential(&self) -> Credentials {
        warn!(
            role = %self.dev_credential.dev_role,
            "No stored credential, provisioning development token"
        );

        let writes = [
            (TOKEN_KEY, &self.dev_credential.dev_token),
            (ROLE_KEY, &self.dev_credential.dev_role),
            (USER_ID_KEY, &self.dev_credential.dev_user_id),
        ];
        for (key, value) in writes {
            if let Err(e) = self.store.write(key, value).await {
                error!(error = %e, key = key, "Failed to store development credential");
            }
        }

        Credentials {
            token: self.dev_credential.dev_token.clone(),
            role: Some(self.dev_credential.dev_role.clone()),
            user_id: Some(self.dev_credential.dev_user_id.clone()),
        }
    }

    /// `Content-Type` is left out for binary bodies so the transport can set
    /// the multipart boundary itself.
    pub async fn headers(&self, is_binary_body: bool) -> Result<HeaderMap> {
        let credentials = self.credentials().await?;

        let mut headers = self.extra_headers.clone();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.token))
            .map_err(|_| Error::InvalidRequest("stored token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !is_binary_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }
}
