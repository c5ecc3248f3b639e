//! blockchain.info adapter: Bitcoin network hash rate

use crate::constants::BLOCKCHAIN_INFO_STATS_URL;
use crate::error::ProviderError;
use crate::provider::FieldProvider;
use crate::providers::{error_for_status, http_client};
use crate::registry::AssetSpec;
use crate::types::{Field, FieldValue};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "blockchain.info";

/// The slice of `/stats` this adapter reads; hash_rate is reported in GH/s
#[derive(Debug, Deserialize)]
struct StatsResponse {
    hash_rate: Option<f64>,
}

/// BTC hash-rate provider backed by the blockchain.info stats endpoint
pub struct BlockchainInfoProvider {
    client: Client,
}

impl BlockchainInfoProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
        })
    }

    async fn fetch_hashrate(&self, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
        tracing::debug!(symbol = asset.symbol, "fetching hash rate from blockchain.info");
        let response = self
            .client
            .get(BLOCKCHAIN_INFO_STATS_URL)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if let Some(err) = error_for_status(PROVIDER, response.status(), asset.symbol) {
            return Err(err);
        }
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        parse_stats_body(&body)
    }
}

fn parse_stats_body(body: &str) -> Result<FieldValue, ProviderError> {
    let response: StatsResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("stats decode: {}", e)))?;

    match response.hash_rate {
        Some(rate) => Ok(FieldValue::with_unit(rate, "GH/s")),
        None => Err(ProviderError::not_found(PROVIDER, "BTC hash rate")),
    }
}

#[async_trait]
impl FieldProvider for BlockchainInfoProvider {
    async fn fetch(&self, asset: &AssetSpec, field: Field) -> Result<FieldValue, ProviderError> {
        match (asset.symbol, field) {
            ("BTC", Field::Hashrate) => self.fetch_hashrate(asset).await,
            _ => Err(ProviderError::not_found(
                PROVIDER,
                format!("{} {}", asset.symbol, field),
            )),
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
