//! # Token Market SDK
//!
//! Retrieves market data (price, supply, network hash rate) for a fixed set
//! of cryptocurrency assets from third-party HTTP APIs, with a persistent
//! cache in front of the providers to stay under their rate limits.
//!
//! ## Usage
//!
//! ```no_run
//! use token_market_sdk::{AppConfig, Field, MarketDataTracker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("config.yaml")?;
//! let tracker = MarketDataTracker::new(&config)?;
//!
//! // Everything the registry knows about BTC
//! let info = tracker.get_token_info("BTC").await?;
//! if let Some(price) = info.usd_price {
//!     println!("BTC: ${:.2}", price);
//! }
//!
//! // Or just the fields you need
//! let snapshot = tracker
//!     .get_snapshot("BTC", &[Field::UsdPrice, Field::Hashrate])
//!     .await?;
//! if snapshot.partial {
//!     println!("unresolved fields: {:?}", snapshot.unresolved);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! MarketDataTracker::get_snapshot(symbol, fields)
//!     ↓
//! AssetRegistry (which providers serve which fields)
//!     ↓
//! CacheStore (SQLite, ttl per entry)  ──hit──→ merged AssetSnapshot
//!     ↓ miss
//! Provider adapters (CoinGecko, Etherscan, blockchain.info, Kaspa)
//!     ↓ normalize + write back
//! merged AssetSnapshot
//! ```
//!
//! Snapshots are best-effort: a field whose providers are down is reported
//! as unresolved (`partial = true`) rather than failing the query. Only an
//! unknown symbol or a query where *every* field failed returns an error.

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStore};
pub use config::AppConfig;
pub use error::{CacheError, ProviderError, ProviderErrorKind, SnapshotError};
pub use metrics::ProviderMetrics;
pub use registry::{AssetRegistry, AssetSpec, ProviderId};
pub use tracker::MarketDataTracker;
pub use types::{AssetSnapshot, Field, FieldValue};
