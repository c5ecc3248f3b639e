//! Freshness coordinator: decides cache-hit vs. provider call per field,
//! owns the retry and pacing policy, and merges results into snapshots.

use crate::cache::{CacheStats, CacheStore};
use crate::config::{AppConfig, RetryConfig};
use crate::error::{ProviderError, ProviderErrorKind, SnapshotError};
use crate::metrics::{MetricsCollector, ProviderMetrics};
use crate::provider::{FieldProvider, FxRateProvider};
use crate::providers::{
    BlockchainInfoProvider, CoinGeckoProvider, EtherscanProvider, ExchangeRateProvider,
    KaspaProvider,
};
use crate::registry::{AssetRegistry, AssetSpec, ProviderId};
use crate::types::{AssetSnapshot, Field, FieldValue};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Reserved cache key for the USD→CNY rate backing the derived CNY price
const FX_SYMBOL: &str = "USD";
const FX_FIELD: &str = "cny_rate";

/// Enforces the minimum delay between consecutive outbound provider calls,
/// across all providers and symbols in a batch.
struct Pacer {
    min_interval: Duration,
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: tokio::sync::Mutex::new(None),
        }
    }

    async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Market data tracker.
///
/// Sits between callers and the external providers: serves fresh cache
/// entries, orchestrates provider calls on miss, writes results back with
/// the configured ttl, and merges partial failures into best-effort
/// snapshots. Constructed from an explicit [`AppConfig`]; there is no
/// process-wide instance.
pub struct MarketDataTracker {
    registry: AssetRegistry,
    cache: CacheStore,
    providers: HashMap<ProviderId, Arc<dyn FieldProvider>>,
    fx: Arc<dyn FxRateProvider>,
    metrics: Arc<MetricsCollector>,
    pacer: Pacer,
    ttl: Duration,
    retry: RetryConfig,
    serve_stale_on_error: bool,
    fallback_cny_rate: Option<f64>,
}

impl MarketDataTracker {
    /// Builds a tracker with real provider adapters from configuration.
    ///
    /// A cache database that cannot be opened degrades to a disabled cache
    /// (every lookup misses) rather than failing construction.
    pub fn new(config: &AppConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.api.timeout_secs);

        let mut providers: HashMap<ProviderId, Arc<dyn FieldProvider>> = HashMap::new();
        providers.insert(
            ProviderId::CoinGecko,
            Arc::new(CoinGeckoProvider::new(
                timeout,
                config.api_keys.coingecko.clone(),
            )?),
        );
        providers.insert(
            ProviderId::Etherscan,
            Arc::new(EtherscanProvider::new(
                timeout,
                config.api_keys.etherscan.clone(),
            )?),
        );
        providers.insert(
            ProviderId::BlockchainInfo,
            Arc::new(BlockchainInfoProvider::new(timeout)?),
        );
        providers.insert(ProviderId::Kaspa, Arc::new(KaspaProvider::new(timeout)?));

        let fx: Arc<dyn FxRateProvider> = Arc::new(ExchangeRateProvider::new(timeout)?);

        let cache = if config.cache.enabled {
            match CacheStore::open(&config.cache.database) {
                Ok(cache) => cache,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        database = %config.cache.database.display(),
                        "failed to open cache database, continuing without cache"
                    );
                    CacheStore::disabled()
                }
            }
        } else {
            CacheStore::disabled()
        };

        Ok(Self::with_providers(config, cache, providers, fx))
    }

    /// Builds a tracker over explicit provider instances.
    ///
    /// This is primarily for testing with scripted providers.
    pub fn with_providers(
        config: &AppConfig,
        cache: CacheStore,
        providers: HashMap<ProviderId, Arc<dyn FieldProvider>>,
        fx: Arc<dyn FxRateProvider>,
    ) -> Self {
        Self {
            registry: AssetRegistry::new(),
            cache,
            providers,
            fx,
            metrics: Arc::new(MetricsCollector::new()),
            pacer: Pacer::new(Duration::from_millis(config.api.request_delay_ms)),
            ttl: config.cache.ttl(),
            retry: config.retry.clone(),
            serve_stale_on_error: config.cache.serve_stale_on_error,
            fallback_cny_rate: config.api.fallback_cny_rate,
        }
    }

    /// The asset registry in use
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Resolves the requested fields for one asset into a snapshot.
    ///
    /// Fields that cannot be resolved are left unset and listed in
    /// `unresolved` with `partial = true`. If every requested field fails,
    /// returns [`SnapshotError::AllFieldsUnresolved`] instead of an empty
    /// snapshot.
    pub async fn get_snapshot(
        &self,
        symbol: &str,
        fields: &[Field],
    ) -> Result<AssetSnapshot, SnapshotError> {
        let spec = self.registry.resolve(symbol)?;
        let mut snapshot = AssetSnapshot::empty(spec.symbol);

        for &field in fields {
            let resolved = match field {
                Field::CnyPrice => self.resolve_cny_price(spec, snapshot.usd_price).await,
                _ => self.resolve_field(spec, field).await,
            };
            match resolved {
                Some(value) => snapshot.set_field(field, value),
                None => snapshot.unresolved.push(field),
            }
        }

        if !fields.is_empty() && snapshot.unresolved.len() == fields.len() {
            return Err(SnapshotError::AllFieldsUnresolved {
                symbol: spec.symbol.to_string(),
            });
        }

        snapshot.partial = !snapshot.unresolved.is_empty();
        snapshot.as_of = Utc::now();
        Ok(snapshot)
    }

    /// Resolves the default field set for one asset: prices and supply,
    /// plus hash rate where the asset supports it.
    pub async fn get_token_info(&self, symbol: &str) -> Result<AssetSnapshot, SnapshotError> {
        let spec = self.registry.resolve(symbol)?;
        self.get_snapshot(symbol, &spec.default_fields()).await
    }

    /// Sequential batch query. One symbol's failure never aborts the rest.
    pub async fn get_snapshots(
        &self,
        symbols: &[String],
    ) -> Vec<(String, Result<AssetSnapshot, SnapshotError>)> {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let result = self.get_token_info(symbol).await;
            if let Err(e) = &result {
                tracing::warn!(symbol = %symbol, error = %e, "snapshot failed");
            }
            results.push((symbol.clone(), result));
        }
        results
    }

    /// Cache counters and size
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Removes expired cache rows; returns how many were deleted
    pub fn sweep_cache(&self) -> usize {
        match self.cache.sweep() {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    /// Call metrics for every provider used so far
    pub async fn provider_metrics(&self) -> Vec<ProviderMetrics> {
        self.metrics.all_metrics().await
    }

    /// Resolves one directly-bound field: cache first, then the bound
    /// providers in failover order, then (optionally) a stale cache entry.
    async fn resolve_field(&self, spec: &'static AssetSpec, field: Field) -> Option<FieldValue> {
        let field_key = field.as_str();

        match self.cache.get(spec.symbol, field_key) {
            Ok(Some(entry)) => return Some(entry.value),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(symbol = spec.symbol, %field, error = %e, "cache read failed, treating as miss");
            }
        }

        let bindings = spec.providers_for(field);
        if bindings.is_empty() {
            tracing::debug!(symbol = spec.symbol, %field, "no provider bound for field");
            return None;
        }

        for id in bindings {
            let Some(provider) = self.providers.get(id) else {
                tracing::warn!(provider = id.as_str(), "bound provider not configured");
                continue;
            };
            let provider = Arc::clone(provider);
            let name = provider.provider_name();
            let outcome = self
                .call_with_retry(name, || provider.fetch(spec, field))
                .await;
            match outcome {
                Ok(value) => {
                    if let Err(e) = self.cache.put(spec.symbol, field_key, &value, self.ttl) {
                        tracing::warn!(symbol = spec.symbol, %field, error = %e, "cache write failed");
                    }
                    return Some(value);
                }
                Err(e) => {
                    tracing::warn!(symbol = spec.symbol, %field, provider = name, error = %e, "provider exhausted");
                }
            }
        }

        if self.serve_stale_on_error {
            if let Ok(Some(entry)) = self.cache.get_ignoring_ttl(spec.symbol, field_key) {
                tracing::warn!(
                    symbol = spec.symbol,
                    %field,
                    age_secs = Utc::now().signed_duration_since(entry.fetched_at).num_seconds(),
                    "all providers failed, serving stale cache value"
                );
                return Some(entry.value);
            }
        }

        None
    }

    /// Resolves the derived CNY price: USD price times the USD→CNY rate.
    /// `usd_hint` carries a USD price already resolved in this query.
    async fn resolve_cny_price(
        &self,
        spec: &'static AssetSpec,
        usd_hint: Option<f64>,
    ) -> Option<FieldValue> {
        let usd = match usd_hint {
            Some(value) => value,
            None => self.resolve_field(spec, Field::UsdPrice).await?.amount,
        };
        let rate = self.resolve_fx_rate().await?;
        Some(FieldValue::plain(usd * rate))
    }

    /// Resolves the USD→CNY rate through the cache and the fx provider.
    /// Falls back to a stale entry (when allowed) or the configured
    /// fallback rate; the fallback is never written to the cache.
    async fn resolve_fx_rate(&self) -> Option<f64> {
        match self.cache.get(FX_SYMBOL, FX_FIELD) {
            Ok(Some(entry)) => return Some(entry.value.amount),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed for fx rate, treating as miss");
            }
        }

        let fx = Arc::clone(&self.fx);
        let name = fx.provider_name();
        match self.call_with_retry(name, || fx.fetch_usd_cny()).await {
            Ok(rate) => {
                let value = FieldValue::plain(rate);
                if let Err(e) = self.cache.put(FX_SYMBOL, FX_FIELD, &value, self.ttl) {
                    tracing::warn!(error = %e, "cache write failed for fx rate");
                }
                Some(rate)
            }
            Err(e) => {
                tracing::warn!(error = %e, "fx rate fetch exhausted");
                if self.serve_stale_on_error {
                    if let Ok(Some(entry)) = self.cache.get_ignoring_ttl(FX_SYMBOL, FX_FIELD) {
                        tracing::warn!("serving stale fx rate");
                        return Some(entry.value.amount);
                    }
                }
                if let Some(fallback) = self.fallback_cny_rate {
                    tracing::warn!(fallback, "using configured fallback CNY rate");
                    return Some(fallback);
                }
                None
            }
        }
    }

    /// Drives one provider through the retry state machine.
    ///
    /// Rate-limited responses get exponentially backed-off retries;
    /// transport and malformed-response errors get immediate retries;
    /// not-found is terminal on the first response. Every attempt is paced
    /// and recorded in the metrics.
    async fn call_with_retry<'a, T>(
        &self,
        provider_name: &'static str,
        mut call: impl FnMut() -> Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>,
    ) -> Result<T, ProviderError> {
        let mut rate_limit_attempts = 0u32;
        let mut transient_attempts = 0u32;
        let mut backoff = Duration::from_millis(self.retry.rate_limit_backoff_ms);

        loop {
            self.pacer.pace().await;
            let start = Instant::now();
            match call().await {
                Ok(value) => {
                    self.metrics
                        .record_success(provider_name, start.elapsed())
                        .await;
                    return Ok(value);
                }
                Err(err) => {
                    self.metrics.record_failure(provider_name, err.kind()).await;
                    match err.kind() {
                        ProviderErrorKind::RateLimited
                            if rate_limit_attempts < self.retry.rate_limit_retries =>
                        {
                            rate_limit_attempts += 1;
                            tracing::warn!(
                                provider = provider_name,
                                attempt = rate_limit_attempts,
                                delay_ms = backoff.as_millis() as u64,
                                "rate limited, backing off"
                            );
                            sleep(backoff).await;
                            backoff *= self.retry.backoff_factor;
                        }
                        ProviderErrorKind::Transport | ProviderErrorKind::Malformed
                            if transient_attempts < self.retry.transient_retries =>
                        {
                            transient_attempts += 1;
                            tracing::debug!(
                                provider = provider_name,
                                error = %err,
                                "transient failure, retrying"
                            );
                        }
                        _ => return Err(err),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockFxProvider, MockProvider};

    struct Fixture {
        coingecko: Arc<MockProvider>,
        etherscan: Arc<MockProvider>,
        blockchain_info: Arc<MockProvider>,
        kaspa: Arc<MockProvider>,
        fx: Arc<MockFxProvider>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                coingecko: Arc::new(MockProvider::new("coingecko")),
                etherscan: Arc::new(MockProvider::new("etherscan")),
                blockchain_info: Arc::new(MockProvider::new("blockchain.info")),
                kaspa: Arc::new(MockProvider::new("kaspa")),
                fx: Arc::new(MockFxProvider::with_rate(7.2)),
            }
        }

        fn tracker(&self, config: &AppConfig) -> MarketDataTracker {
            self.tracker_with_cache(config, CacheStore::open_in_memory().unwrap())
        }

        fn tracker_with_cache(&self, config: &AppConfig, cache: CacheStore) -> MarketDataTracker {
            let mut providers: HashMap<ProviderId, Arc<dyn FieldProvider>> = HashMap::new();
            providers.insert(ProviderId::CoinGecko, self.coingecko.clone());
            providers.insert(ProviderId::Etherscan, self.etherscan.clone());
            providers.insert(ProviderId::BlockchainInfo, self.blockchain_info.clone());
            providers.insert(ProviderId::Kaspa, self.kaspa.clone());
            MarketDataTracker::with_providers(config, cache, providers, self.fx.clone())
        }
    }

    /// Zero pacing and zero backoff so retry tests run instantly
    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.api.request_delay_ms = 0;
        config.retry.rate_limit_backoff_ms = 0;
        config
    }

    #[tokio::test]
    async fn empty_cache_fetches_writes_and_reuses() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(67890.5));
        fixture.blockchain_info.set_value(
            "BTC",
            Field::Hashrate,
            FieldValue::with_unit(6.0e8, "GH/s"),
        );
        let tracker = fixture.tracker(&test_config());

        let first = tracker
            .get_snapshot("BTC", &[Field::UsdPrice, Field::Hashrate])
            .await
            .unwrap();
        assert!(!first.partial);
        assert_eq!(first.usd_price, Some(67890.5));
        assert_eq!(first.hashrate, Some(6.0e8));
        assert_eq!(first.hashrate_unit.as_deref(), Some("GH/s"));
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 1);
        assert_eq!(fixture.blockchain_info.calls("BTC", Field::Hashrate), 1);
        assert_eq!(tracker.cache_stats().total_entries, 2);

        // Within the ttl window: zero provider calls, identical values
        let second = tracker
            .get_snapshot("BTC", &[Field::UsdPrice, Field::Hashrate])
            .await
            .unwrap();
        assert_eq!(second.usd_price, first.usd_price);
        assert_eq!(second.hashrate, first.hashrate);
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 1);
        assert_eq!(fixture.blockchain_info.calls("BTC", Field::Hashrate), 1);
    }

    #[tokio::test]
    async fn rate_limited_retries_exactly_then_unresolved() {
        let fixture = Fixture::new();
        fixture.coingecko.set_error(
            "BTC",
            Field::UsdPrice,
            ProviderError::RateLimited {
                provider: "coingecko",
            },
        );
        let mut config = test_config();
        config.retry.rate_limit_retries = 2;
        let tracker = fixture.tracker(&config);

        let result = tracker.get_snapshot("BTC", &[Field::UsdPrice]).await;
        match result {
            Err(SnapshotError::AllFieldsUnresolved { symbol }) => assert_eq!(symbol, "BTC"),
            other => panic!("expected AllFieldsUnresolved, got {:?}", other),
        }
        // Initial call plus the two configured backoff retries
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 3);
    }

    #[tokio::test]
    async fn not_found_is_never_retried() {
        let fixture = Fixture::new();
        fixture.coingecko.set_error(
            "BTC",
            Field::UsdPrice,
            ProviderError::not_found("coingecko", "BTC"),
        );
        let tracker = fixture.tracker(&test_config());

        let result = tracker.get_snapshot("BTC", &[Field::UsdPrice]).await;
        assert!(matches!(
            result,
            Err(SnapshotError::AllFieldsUnresolved { .. })
        ));
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 1);
    }

    #[tokio::test]
    async fn transient_error_retried_once_immediately() {
        let fixture = Fixture::new();
        fixture.coingecko.push_response(
            "BTC",
            Field::UsdPrice,
            Err(ProviderError::Transport {
                provider: "coingecko",
                message: "connection reset".to_string(),
            }),
        );
        fixture
            .coingecko
            .push_response("BTC", Field::UsdPrice, Ok(FieldValue::plain(67890.5)));
        let tracker = fixture.tracker(&test_config());

        let snapshot = tracker
            .get_snapshot("BTC", &[Field::UsdPrice])
            .await
            .unwrap();
        assert_eq!(snapshot.usd_price, Some(67890.5));
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 2);
    }

    #[tokio::test]
    async fn malformed_exhausts_after_one_retry() {
        let fixture = Fixture::new();
        fixture.coingecko.set_error(
            "BTC",
            Field::UsdPrice,
            ProviderError::malformed("coingecko", "bad json"),
        );
        let tracker = fixture.tracker(&test_config());

        let result = tracker.get_snapshot("BTC", &[Field::UsdPrice]).await;
        assert!(matches!(
            result,
            Err(SnapshotError::AllFieldsUnresolved { .. })
        ));
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 2);
    }

    #[tokio::test]
    async fn hashrate_failure_yields_partial_snapshot() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(67890.5));
        fixture.blockchain_info.set_error(
            "BTC",
            Field::Hashrate,
            ProviderError::Transport {
                provider: "blockchain.info",
                message: "timeout".to_string(),
            },
        );
        let tracker = fixture.tracker(&test_config());

        let snapshot = tracker
            .get_snapshot("BTC", &[Field::UsdPrice, Field::Hashrate])
            .await
            .unwrap();
        assert!(snapshot.partial);
        assert_eq!(snapshot.usd_price, Some(67890.5));
        assert_eq!(snapshot.hashrate, None);
        assert_eq!(snapshot.unresolved, vec![Field::Hashrate]);
    }

    #[tokio::test]
    async fn unbound_hashrate_is_unresolved_without_calls() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BNB", Field::UsdPrice, FieldValue::plain(590.0));
        let tracker = fixture.tracker(&test_config());

        let snapshot = tracker
            .get_snapshot("BNB", &[Field::UsdPrice, Field::Hashrate])
            .await
            .unwrap();
        assert!(snapshot.partial);
        assert_eq!(snapshot.usd_price, Some(590.0));
        assert_eq!(snapshot.unresolved, vec![Field::Hashrate]);
        assert_eq!(fixture.blockchain_info.total_calls(), 0);
        assert_eq!(fixture.kaspa.total_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_asset_is_rejected() {
        let fixture = Fixture::new();
        let tracker = fixture.tracker(&test_config());

        let result = tracker.get_snapshot("NOPE", &[Field::UsdPrice]).await;
        assert!(matches!(result, Err(SnapshotError::UnknownAsset { .. })));
    }

    #[tokio::test]
    async fn eth_supply_fails_over_to_next_binding() {
        let fixture = Fixture::new();
        fixture.etherscan.set_error(
            "ETH",
            Field::Supply,
            ProviderError::malformed("etherscan", "invalid api key"),
        );
        fixture
            .coingecko
            .set_value("ETH", Field::Supply, FieldValue::with_unit(1.2e8, "ETH"));
        let tracker = fixture.tracker(&test_config());

        let snapshot = tracker.get_snapshot("ETH", &[Field::Supply]).await.unwrap();
        assert_eq!(snapshot.circulating_supply, Some(1.2e8));
        // Etherscan exhausted (initial + one immediate retry), then failover
        assert_eq!(fixture.etherscan.calls("ETH", Field::Supply), 2);
        assert_eq!(fixture.coingecko.calls("ETH", Field::Supply), 1);
    }

    #[tokio::test]
    async fn cny_price_is_derived_and_rate_cached() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(100.0));
        let tracker = fixture.tracker(&test_config());

        let snapshot = tracker
            .get_snapshot("BTC", &[Field::UsdPrice, Field::CnyPrice])
            .await
            .unwrap();
        assert!(!snapshot.partial);
        assert_eq!(snapshot.cny_price, Some(720.0));
        assert_eq!(fixture.fx.calls(), 1);
        // USD price fetched once and reused for the derived field
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 1);

        // Rate is cached: a second symbol reuses it
        fixture
            .coingecko
            .set_value("SOL", Field::UsdPrice, FieldValue::plain(10.0));
        let sol = tracker
            .get_snapshot("SOL", &[Field::CnyPrice])
            .await
            .unwrap();
        assert_eq!(sol.cny_price, Some(72.0));
        assert_eq!(fixture.fx.calls(), 1);
    }

    #[tokio::test]
    async fn fx_failure_uses_configured_fallback_rate() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(100.0));
        let fx = Arc::new(MockFxProvider::new());
        fx.push_response(Err(ProviderError::Transport {
            provider: "exchangerate-api",
            message: "timeout".to_string(),
        }));
        let mut config = test_config();
        config.api.fallback_cny_rate = Some(7.0);

        let mut providers: HashMap<ProviderId, Arc<dyn FieldProvider>> = HashMap::new();
        providers.insert(ProviderId::CoinGecko, fixture.coingecko.clone());
        let tracker = MarketDataTracker::with_providers(
            &config,
            CacheStore::open_in_memory().unwrap(),
            providers,
            fx.clone(),
        );

        let snapshot = tracker
            .get_snapshot("BTC", &[Field::CnyPrice])
            .await
            .unwrap();
        assert_eq!(snapshot.cny_price, Some(700.0));
        // Initial call plus one immediate transient retry, fallback not cached
        assert_eq!(fx.calls(), 2);
        assert!(tracker.cache.get_ignoring_ttl(FX_SYMBOL, FX_FIELD).unwrap().is_none());
    }

    #[tokio::test]
    async fn fx_failure_without_fallback_leaves_cny_unresolved() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(100.0));
        let fx = Arc::new(MockFxProvider::new());
        fx.push_response(Err(ProviderError::Transport {
            provider: "exchangerate-api",
            message: "timeout".to_string(),
        }));

        let mut providers: HashMap<ProviderId, Arc<dyn FieldProvider>> = HashMap::new();
        providers.insert(ProviderId::CoinGecko, fixture.coingecko.clone());
        let tracker = MarketDataTracker::with_providers(
            &test_config(),
            CacheStore::open_in_memory().unwrap(),
            providers,
            fx,
        );

        let snapshot = tracker
            .get_snapshot("BTC", &[Field::UsdPrice, Field::CnyPrice])
            .await
            .unwrap();
        assert!(snapshot.partial);
        assert_eq!(snapshot.usd_price, Some(100.0));
        assert_eq!(snapshot.unresolved, vec![Field::CnyPrice]);
    }

    #[tokio::test]
    async fn stale_fallback_serves_expired_entry_when_enabled() {
        use chrono::Duration as ChronoDuration;

        let fixture = Fixture::new();
        fixture.coingecko.set_error(
            "BTC",
            Field::UsdPrice,
            ProviderError::Transport {
                provider: "coingecko",
                message: "unreachable".to_string(),
            },
        );

        let cache = CacheStore::open_in_memory().unwrap();
        cache
            .put_at(
                "BTC",
                "usd_price",
                &FieldValue::plain(50.0),
                Duration::from_secs(60),
                Utc::now() - ChronoDuration::seconds(600),
            )
            .unwrap();

        let mut config = test_config();
        config.cache.serve_stale_on_error = true;
        let tracker = fixture.tracker_with_cache(&config, cache);

        let snapshot = tracker
            .get_snapshot("BTC", &[Field::UsdPrice])
            .await
            .unwrap();
        assert_eq!(snapshot.usd_price, Some(50.0));
        assert!(!snapshot.partial);
    }

    #[tokio::test]
    async fn stale_fallback_disabled_fails_hard() {
        use chrono::Duration as ChronoDuration;

        let fixture = Fixture::new();
        fixture.coingecko.set_error(
            "BTC",
            Field::UsdPrice,
            ProviderError::Transport {
                provider: "coingecko",
                message: "unreachable".to_string(),
            },
        );

        let cache = CacheStore::open_in_memory().unwrap();
        cache
            .put_at(
                "BTC",
                "usd_price",
                &FieldValue::plain(50.0),
                Duration::from_secs(60),
                Utc::now() - ChronoDuration::seconds(600),
            )
            .unwrap();

        let tracker = fixture.tracker_with_cache(&test_config(), cache);
        let result = tracker.get_snapshot("BTC", &[Field::UsdPrice]).await;
        assert!(matches!(
            result,
            Err(SnapshotError::AllFieldsUnresolved { .. })
        ));
    }

    #[tokio::test]
    async fn disabled_cache_fetches_every_time() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(67890.5));
        let tracker = fixture.tracker_with_cache(&test_config(), CacheStore::disabled());

        tracker
            .get_snapshot("BTC", &[Field::UsdPrice])
            .await
            .unwrap();
        tracker
            .get_snapshot("BTC", &[Field::UsdPrice])
            .await
            .unwrap();
        assert_eq!(fixture.coingecko.calls("BTC", Field::UsdPrice), 2);
    }

    #[tokio::test]
    async fn token_info_covers_default_fields() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("KAS", Field::UsdPrice, FieldValue::plain(0.15));
        fixture
            .coingecko
            .set_value("KAS", Field::Supply, FieldValue::with_unit(2.4e10, "KAS"));
        fixture
            .kaspa
            .set_value("KAS", Field::Hashrate, FieldValue::with_unit(1.2e18, "H/s"));
        let tracker = fixture.tracker(&test_config());

        let snapshot = tracker.get_token_info("KAS").await.unwrap();
        assert!(!snapshot.partial);
        assert_eq!(snapshot.usd_price, Some(0.15));
        assert_eq!(snapshot.cny_price, Some(0.15 * 7.2));
        assert_eq!(snapshot.circulating_supply, Some(2.4e10));
        assert_eq!(snapshot.hashrate, Some(1.2e18));
    }

    #[tokio::test]
    async fn batch_reports_per_symbol_outcomes() {
        let fixture = Fixture::new();
        fixture
            .coingecko
            .set_value("BTC", Field::UsdPrice, FieldValue::plain(67890.5));
        fixture
            .coingecko
            .set_value("BTC", Field::Supply, FieldValue::with_unit(1.97e7, "BTC"));
        fixture.blockchain_info.set_value(
            "BTC",
            Field::Hashrate,
            FieldValue::with_unit(6.0e8, "GH/s"),
        );
        // SOL gets nothing scripted: every field unresolved
        let tracker = fixture.tracker(&test_config());

        let results = tracker
            .get_snapshots(&["BTC".to_string(), "SOL".to_string()])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(SnapshotError::AllFieldsUnresolved { .. })
        ));
    }
}
