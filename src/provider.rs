//! Provider abstraction for fetching market data from external APIs

use crate::error::ProviderError;
use crate::registry::AssetSpec;
use crate::types::{Field, FieldValue};
use async_trait::async_trait;

/// A source of per-asset field values (prices, supply, hash rate).
///
/// Implementations own URL construction, response parsing, unit
/// normalization, and the classification of anomalies into
/// [`ProviderError`] kinds. They never consult the cache; freshness
/// decisions belong to the coordinator.
#[async_trait]
pub trait FieldProvider: Send + Sync {
    /// Fetches one field for one asset.
    ///
    /// Returns [`ProviderError::NotFound`] when the provider confirms it
    /// has no such data (including field/asset combinations the adapter
    /// does not serve) — the coordinator will not retry those.
    async fn fetch(&self, asset: &AssetSpec, field: Field) -> Result<FieldValue, ProviderError>;

    /// Name of this provider, used in logs, errors and metrics
    fn provider_name(&self) -> &'static str;
}

/// A source of the USD→CNY conversion rate backing the derived CNY price.
#[async_trait]
pub trait FxRateProvider: Send + Sync {
    /// Fetches the current USD→CNY rate
    async fn fetch_usd_cny(&self) -> Result<f64, ProviderError>;

    /// Name of this provider, used in logs, errors and metrics
    fn provider_name(&self) -> &'static str;
}
