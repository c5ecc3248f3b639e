//! Default settings and provider endpoints for the market data tracker.
//!
//! Everything here can be overridden through [`crate::config::AppConfig`];
//! these are the values used when the configuration file leaves an option
//! out.

/// Default time-to-live for cached values (in minutes)
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 5;

/// Default path for the cache database
pub const DEFAULT_CACHE_DATABASE: &str = "cache/market_cache.db";

/// Minimum delay between consecutive outbound provider calls (in milliseconds)
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 2000;

/// HTTP request timeout when fetching from providers (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of backoff retries after a rate-limited response
pub const RATE_LIMIT_RETRIES: u32 = 2;

/// Initial backoff delay after a rate-limited response (in milliseconds)
pub const RATE_LIMIT_BACKOFF_MS: u64 = 1000;

/// Multiplier applied to the backoff delay between rate-limit retries
pub const BACKOFF_FACTOR: u32 = 2;

/// Number of immediate retries after a transport or malformed-response error
pub const TRANSIENT_RETRIES: u32 = 1;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Etherscan API base URL
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";

/// blockchain.info stats endpoint (BTC network hash rate)
pub const BLOCKCHAIN_INFO_STATS_URL: &str = "https://api.blockchain.info/stats";

/// Kaspa network hash rate endpoint
pub const KASPA_HASHRATE_URL: &str = "https://api.kaspa.org/info/hashrate";

/// Exchange rate endpoint for USD conversions
pub const EXCHANGE_RATE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "token-market-sdk/0.1.0";
