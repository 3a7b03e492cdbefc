//! Runtime configuration for the VIES client, rate sync and database.
//!
//! Every field has a default, so `VatConfig::default()` talks to the
//! production EU endpoints. `from_env()` overrides fields from `EUROVAT_*`
//! variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::VatError;

/// VIES SOAP endpoint (production).
pub const DEFAULT_VIES_ENDPOINT: &str =
    "https://ec.europa.eu/taxation_customs/vies/services/checkVatService";

/// EC Taxes in Europe Database retrieval service.
pub const DEFAULT_TEDB_ENDPOINT: &str =
    "https://ec.europa.eu/taxation_customs/tedb/ws/VatRetrievalService";

/// Community-maintained JSON rate table used when TEDB is unavailable.
pub const DEFAULT_JSON_RATES_URL: &str = "https://euvatrates.com/rates.json";

/// Longest accepted VIES cache TTL (ten years).
pub const MAX_VIES_CACHE_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

const ENV_PREFIX: &str = "EUROVAT_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VatConfig {
    #[serde(default)]
    pub vies: ViesConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// VIES client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViesConfig {
    #[serde(default = "default_vies_endpoint")]
    pub endpoint: String,

    /// Upper bound for a single `checkVat` round trip.
    #[serde(default = "default_vies_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a validation result stays fresh in the cache.
    #[serde(default = "default_vies_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for ViesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vies_endpoint(),
            timeout_secs: default_vies_timeout_secs(),
            cache_ttl_secs: default_vies_cache_ttl_secs(),
        }
    }
}

impl ViesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Cache TTL, capped at [`MAX_VIES_CACHE_TTL_SECS`].
    pub fn cache_ttl(&self) -> chrono::Duration {
        let secs = self.cache_ttl_secs.min(MAX_VIES_CACHE_TTL_SECS) as i64;
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }
}

/// Rate source settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default = "default_tedb_endpoint")]
    pub tedb_endpoint: String,

    #[serde(default = "default_tedb_timeout_secs")]
    pub tedb_timeout_secs: u64,

    #[serde(default = "default_json_rates_url")]
    pub json_rates_url: String,

    #[serde(default = "default_json_timeout_secs")]
    pub json_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tedb_endpoint: default_tedb_endpoint(),
            tedb_timeout_secs: default_tedb_timeout_secs(),
            json_rates_url: default_json_rates_url(),
            json_timeout_secs: default_json_timeout_secs(),
        }
    }
}

impl SyncConfig {
    pub fn tedb_timeout(&self) -> Duration {
        Duration::from_secs(self.tedb_timeout_secs)
    }

    pub fn json_timeout(&self) -> Duration {
        Duration::from_secs(self.json_timeout_secs)
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres URL. Required by the sync binary.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl VatConfig {
    /// Load configuration from `EUROVAT_*` environment variables.
    ///
    /// Unset variables keep their defaults; set but unparseable numbers are
    /// a [`VatError::Config`].
    pub fn from_env() -> Result<Self, VatError> {
        let mut config = Self::default();

        if let Some(v) = env_var("VIES_ENDPOINT") {
            config.vies.endpoint = v;
        }
        if let Some(v) = env_parse("VIES_TIMEOUT_SECS")? {
            config.vies.timeout_secs = v;
        }
        if let Some(v) = env_parse("VIES_CACHE_TTL_SECS")? {
            config.vies.cache_ttl_secs = v;
        }

        if let Some(v) = env_var("TEDB_ENDPOINT") {
            config.sync.tedb_endpoint = v;
        }
        if let Some(v) = env_parse("TEDB_TIMEOUT_SECS")? {
            config.sync.tedb_timeout_secs = v;
        }
        if let Some(v) = env_var("JSON_RATES_URL") {
            config.sync.json_rates_url = v;
        }
        if let Some(v) = env_parse("JSON_TIMEOUT_SECS")? {
            config.sync.json_timeout_secs = v;
        }

        config.database.url = env_var("DATABASE_URL").or_else(|| std::env::var("DATABASE_URL").ok());
        if let Some(v) = env_parse("DATABASE_MAX_CONNECTIONS")? {
            config.database.max_connections = v;
        }
        if let Some(v) = env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS")? {
            config.database.acquire_timeout_secs = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the clients cannot work with.
    pub fn validate(&self) -> Result<(), VatError> {
        if self.vies.cache_ttl_secs > MAX_VIES_CACHE_TTL_SECS {
            return Err(VatError::Config(format!(
                "{ENV_PREFIX}VIES_CACHE_TTL_SECS={} exceeds the maximum of {MAX_VIES_CACHE_TTL_SECS}",
                self.vies.cache_ttl_secs
            )));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, VatError>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| VatError::Config(format!("{ENV_PREFIX}{name}={raw}: {e}"))),
        None => Ok(None),
    }
}

fn default_vies_endpoint() -> String {
    DEFAULT_VIES_ENDPOINT.into()
}

fn default_vies_timeout_secs() -> u64 {
    10
}

fn default_vies_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_tedb_endpoint() -> String {
    DEFAULT_TEDB_ENDPOINT.into()
}

fn default_tedb_timeout_secs() -> u64 {
    15
}

fn default_json_rates_url() -> String {
    DEFAULT_JSON_RATES_URL.into()
}

fn default_json_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    30
}
