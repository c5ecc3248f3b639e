//! Etherscan adapter: ETH total supply

use crate::constants::ETHERSCAN_API_URL;
use crate::error::ProviderError;
use crate::provider::FieldProvider;
use crate::providers::{error_for_status, http_client};
use crate::registry::AssetSpec;
use crate::types::{Field, FieldValue};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "etherscan";

const WEI_PER_ETH: f64 = 1e18;

/// Etherscan's uniform response envelope
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: String,
}

/// Etherscan supply provider.
///
/// Serves `Supply` for ETH only (`module=stats&action=ethsupply`); the
/// registry binds CoinGecko after it as fallback. Etherscan reports rate
/// limiting inside an HTTP 200 payload, so that is detected here rather
/// than from the status code.
pub struct EtherscanProvider {
    client: Client,
    api_key: String,
}

impl EtherscanProvider {
    pub fn new(timeout: Duration, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            api_key,
        })
    }

    async fn fetch_eth_supply(&self, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
        let url = format!(
            "{}?module=stats&action=ethsupply&apikey={}",
            ETHERSCAN_API_URL, self.api_key
        );
        tracing::debug!(symbol = asset.symbol, "fetching supply from Etherscan");

        let response = self
            .client
            .get(&url)
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
        parse_supply_body(&body, asset)
    }
}

/// Decodes the envelope and normalizes the wei amount to ETH
fn parse_supply_body(body: &str, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
    let response: EtherscanResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("supply decode: {}", e)))?;

    if response.status != "1" {
        let detail = if response.result.is_empty() {
            &response.message
        } else {
            &response.result
        };
        if detail.to_lowercase().contains("rate limit") {
            return Err(ProviderError::RateLimited { provider: PROVIDER });
        }
        return Err(ProviderError::malformed(
            PROVIDER,
            format!("API status {}: {}", response.status, detail),
        ));
    }

    let wei: f64 = response
        .result
        .parse()
        .map_err(|_| ProviderError::malformed(PROVIDER, "supply is not a number"))?;

    Ok(FieldValue::with_unit(wei / WEI_PER_ETH, asset.symbol))
}

#[async_trait]
impl FieldProvider for EtherscanProvider {
    async fn fetch(&self, asset: &AssetSpec, field: Field) -> Result<FieldValue, ProviderError> {
        match (asset.symbol, field) {
            ("ETH", Field::Supply) => self.fetch_eth_supply(asset).await,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AssetRegistry;

    #[test]
    fn normalizes_wei_to_eth() {
        let eth = AssetRegistry::new().resolve("ETH").unwrap();
        let body = r#"{"status":"1","message":"OK","result":"120000000000000000000000000"}"#;
        let value = parse_supply_body(body, eth).unwrap();
        assert_eq!(value.amount, 120_000_000.0);
        assert_eq!(value.unit.as_deref(), Some("ETH"));
    }

    #[test]
    fn in_payload_rate_limit_is_classified() {
        let eth = AssetRegistry::new().resolve("ETH").unwrap();
        let body = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        match parse_supply_body(body, eth) {
            Err(ProviderError::RateLimited { .. }) => {}
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn api_error_is_malformed() {
        let eth = AssetRegistry::new().resolve("ETH").unwrap();
        let body = r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#;
        match parse_supply_body(body, eth) {
            Err(ProviderError::Malformed { .. }) => {}
            other => panic!("expected Malformed, got {:?}", other),
        }
    }
}
