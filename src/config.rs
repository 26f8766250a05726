use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use config::{Config, ConfigError};
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub emulation: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
}

/// Development credential written to the credential store when nothing is
/// stored yet. Not a production security boundary.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub dev_token: String,
    pub dev_role: String,
    pub dev_user_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub assume_online: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config/default")
    }

    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("api.base_url", "http://localhost:8000/api")?
            .set_default("api.timeout_secs", 30)?
            .set_default("api.emulation", "chrome133")?
            .set_default("storage.dir", "data")?
            .set_default("cache.max_entries", 256)?
            .set_default("auth.dev_token", "dev-local-token-0000")?
            .set_default("auth.dev_role", "organizer")?
            .set_default("auth.dev_user_id", "1")?
            .set_default("network.assume_online", true)?
            .add_source(config::File::with_name(name).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;

        let settings: Settings = config.try_deserialize()?;

        debug!(
            base_url = %settings.api.base_url,
            storage_dir = %settings.storage.dir.display(),
            headers = ?settings.api.headers,
            "Loaded settings"
        );

        Ok(settings)
    }

    /// Storage directory scoped to the configured API origin, so two
    /// backends never share a mirror.
    pub fn origin_storage_dir(&self) -> PathBuf {
        let origin: String = self
            .api
            .base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.storage.dir.join(origin.trim_matches('_'))
    }
}

#[cfg(test)]
pub(crate) fn test_settings(storage_dir: PathBuf) -> Settings {
    Settings {
        api: ApiConfig {
            base_url: "http://api.test/api".to_string(),
            timeout_secs: 5,
            emulation: "chrome133".to_string(),
            headers: HashMap::new(),
        },
        storage: StorageConfig { dir: storage_dir },
        cache: CacheConfig { max_entries: 64 },
        auth: AuthConfig {
            dev_token: "dev-token".to_string(),
            dev_role: "organizer".to_string(),
            dev_user_id: "7".to_string(),
        },
        network: NetworkConfig { assume_online: true },
    }
}
