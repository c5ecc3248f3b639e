//! Provider adapter implementations

pub mod blockchain_info;
pub mod coingecko;
pub mod etherscan;
pub mod exchange_rate;
pub mod kaspa;

pub use blockchain_info::BlockchainInfoProvider;
pub use coingecko::CoinGeckoProvider;
pub use etherscan::EtherscanProvider;
pub use exchange_rate::ExchangeRateProvider;
pub use kaspa::KaspaProvider;

use crate::constants::USER_AGENT;
use crate::error::ProviderError;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Builds the HTTP client every adapter uses: bounded timeout, shared
/// user agent.
pub(crate) fn http_client(
    provider: &'static str,
    timeout: Duration,
) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::transport(provider, e))
}

/// Maps an HTTP status to a provider error, or `None` for success.
///
/// 429 must map to `RateLimited` (the coordinator backs off longer for it),
/// 404 is a confirmed absence, and anything else non-success is treated as
/// a transport-level failure worth one immediate retry.
pub(crate) fn error_for_status(
    provider: &'static str,
    status: StatusCode,
    what: &str,
) -> Option<ProviderError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(ProviderError::RateLimited { provider })
    } else if status == StatusCode::NOT_FOUND {
        Some(ProviderError::not_found(provider, what))
    } else {
        Some(ProviderError::Transport {
            provider,
            message: format!("HTTP {}", status),
        })
    }
}
