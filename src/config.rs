//! Mapper settings.
//!
//! [`MapperConfig::load()`] reads the `[mapper]` section of `config/config.toml` and
//! overlays `TIDEMAP__MAPPER__*` environment variables, e.g.
//! `TIDEMAP__MAPPER__MODEL_CACHE_TTL_SECONDS=30`.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Cache lifetimes and collection defaults
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MapperConfig {
    /// TTL of schemas stored in an external object cache
    #[serde(default = "default_schema_cache_ttl_seconds")]
    pub schema_cache_ttl_seconds: u64,
    /// TTL of hydrated models stored in an external object cache
    #[serde(default = "default_model_cache_ttl_seconds")]
    pub model_cache_ttl_seconds: u64,
    /// Keep hydrated models in the session identity map
    #[serde(default = "default_true")]
    pub use_internal_cache: bool,
    /// Let list collections jump straight to `key - 1` on keyed access
    #[serde(default)]
    pub fetch_absolute: bool,
    /// Close collection cursors once they are exhausted
    #[serde(default = "default_true")]
    pub auto_close: bool,
    /// Cache fetched instances inside collections
    #[serde(default = "default_true")]
    pub collection_cache: bool,
}

fn default_schema_cache_ttl_seconds() -> u64 {
    300
}

fn default_model_cache_ttl_seconds() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            schema_cache_ttl_seconds: default_schema_cache_ttl_seconds(),
            model_cache_ttl_seconds: default_model_cache_ttl_seconds(),
            use_internal_cache: true,
            fetch_absolute: false,
            auto_close: true,
            collection_cache: true,
        }
    }
}

impl MapperConfig {
    /// Load settings from `config/config.toml`, falling back to env vars and defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/config.toml")
    }

    /// Load settings from the given file (optional) plus `TIDEMAP__` env vars.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("TIDEMAP").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("failed to load {path}, falling back to env: {err}");
                Config::builder()
                    .add_source(Environment::with_prefix("TIDEMAP").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<MapperConfig>("mapper") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(MapperConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Mapper configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    pub fn schema_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_seconds)
    }

    pub fn model_ttl(&self) -> Duration {
        Duration::from_secs(self.model_cache_ttl_seconds)
    }
}
