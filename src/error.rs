//! Error types for the market data tracker

use thiserror::Error;

/// Classification tag for a [`ProviderError`], used by the coordinator's
/// retry logic and the metrics counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    RateLimited,
    NotFound,
    Transport,
    Malformed,
}

impl ProviderErrorKind {
    /// Stable lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::NotFound => "not_found",
            ProviderErrorKind::Transport => "transport",
            ProviderErrorKind::Malformed => "malformed",
        }
    }
}

/// Errors that can occur when fetching a value from a provider.
///
/// This is a closed set: the coordinator matches exhaustively on it to
/// decide whether and how to retry. `Transport` carries the underlying
/// failure as a message (rather than the transport error itself) so the
/// whole enum stays `Clone`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider signalled a rate limit (HTTP 429 or an in-payload limit message)
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: &'static str },

    /// Provider confirmed the requested data does not exist
    #[error("{provider} has no data for {what}")]
    NotFound {
        provider: &'static str,
        what: String,
    },

    /// Network-level failure (connect, timeout, TLS)
    #[error("transport error from {provider}: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    /// Response arrived but could not be decoded into the expected shape
    #[error("malformed response from {provider}: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Returns the classification tag for this error
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::RateLimited { .. } => ProviderErrorKind::RateLimited,
            ProviderError::NotFound { .. } => ProviderErrorKind::NotFound,
            ProviderError::Transport { .. } => ProviderErrorKind::Transport,
            ProviderError::Malformed { .. } => ProviderErrorKind::Malformed,
        }
    }

    /// Creates a NotFound error
    pub fn not_found(provider: &'static str, what: impl Into<String>) -> Self {
        Self::NotFound {
            provider,
            what: what.into(),
        }
    }

    /// Creates a Malformed error
    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }

    /// Classifies a `reqwest` failure as a transport error
    pub fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        Self::Transport {
            provider,
            message: err.to_string(),
        }
    }
}

/// Errors surfaced to callers of
/// [`MarketDataTracker::get_snapshot`](crate::tracker::MarketDataTracker::get_snapshot).
///
/// Individual provider failures never reach the caller directly; they are
/// absorbed into per-field resolution state. Only invalid input or total
/// failure propagates.
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    /// The requested symbol is not in the asset registry
    #[error("unknown asset: {symbol}")]
    UnknownAsset { symbol: String },

    /// Every requested field failed to resolve from cache and providers
    #[error("no field could be resolved for {symbol}")]
    AllFieldsUnresolved { symbol: String },
}

/// Errors from the persistent cache store.
///
/// Never fatal to a query: the coordinator downgrades these to cache-miss
/// behavior and logs them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cache value encoding error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),
}
