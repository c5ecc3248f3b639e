//! Configuration for the tracker.
//!
//! Loaded from a YAML file with environment-variable overrides
//! (`TMS__` prefix, `__` separator — e.g. `TMS__API_KEYS__ETHERSCAN`).
//! Every section carries serde defaults, so a partial file works.

use crate::constants::{
    BACKOFF_FACTOR, DEFAULT_CACHE_DATABASE, DEFAULT_CACHE_TTL_MINUTES, DEFAULT_REQUEST_DELAY_MS,
    RATE_LIMIT_BACKOFF_MS, RATE_LIMIT_RETRIES, REQUEST_TIMEOUT_SECS, TRANSIENT_RETRIES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Provider API keys
    #[serde(default)]
    pub api_keys: ApiKeys,
    /// Cache behavior
    #[serde(default)]
    pub cache: CacheConfig,
    /// Outbound request behavior
    #[serde(default)]
    pub api: ApiConfig,
    /// Retry policy per provider-error kind
    #[serde(default)]
    pub retry: RetryConfig,
    /// Symbols to process when the caller gives no explicit list
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// API keys for providers that want one
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiKeys {
    /// Etherscan API key (required for the ETH supply endpoint)
    #[serde(default)]
    pub etherscan: String,
    /// Optional CoinGecko demo API key
    #[serde(default)]
    pub coingecko: Option<String>,
}

/// Cache behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Master switch; when false every lookup is a miss and writes are dropped
    pub enabled: bool,
    /// Default time-to-live for cached values, in minutes
    pub duration_minutes: u64,
    /// Path of the SQLite database file
    pub database: PathBuf,
    /// When true, a field whose providers all failed may be served from an
    /// expired cache entry instead of being marked unresolved
    #[serde(default)]
    pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_minutes: DEFAULT_CACHE_TTL_MINUTES,
            database: PathBuf::from(DEFAULT_CACHE_DATABASE),
            serve_stale_on_error: false,
        }
    }
}

impl CacheConfig {
    /// The configured ttl as a duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.duration_minutes * 60)
    }
}

/// Outbound request behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Minimum delay between consecutive outbound provider calls, in
    /// milliseconds
    pub request_delay_ms: u64,
    /// HTTP request timeout, in seconds
    pub timeout_secs: u64,
    /// USD→CNY rate to fall back on when the exchange-rate provider fails.
    /// Unset means the CNY price is left unresolved instead. Never cached.
    #[serde(default)]
    pub fallback_cny_rate: Option<f64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            timeout_secs: REQUEST_TIMEOUT_SECS,
            fallback_cny_rate: None,
        }
    }
}

/// Retry policy. Rate-limited responses get exponential backoff; transport
/// and malformed-response errors get immediate retries; not-found is never
/// retried.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Backoff retries after a rate-limited response
    pub rate_limit_retries: u32,
    /// Initial backoff delay after a rate-limited response, in milliseconds
    pub rate_limit_backoff_ms: u64,
    /// Multiplier applied to the backoff between rate-limit retries
    pub backoff_factor: u32,
    /// Immediate retries after a transport or malformed-response error
    pub transient_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_retries: RATE_LIMIT_RETRIES,
            rate_limit_backoff_ms: RATE_LIMIT_BACKOFF_MS,
            backoff_factor: BACKOFF_FACTOR,
            transient_retries: TRANSIENT_RETRIES,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a YAML file, then applies environment
    /// overrides (`TMS__` prefix, `__` separator).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TMS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Loads configuration from the conventional path
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config.yaml")
    }
}
