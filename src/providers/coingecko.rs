//! CoinGecko adapter: USD spot price and circulating supply

use crate::constants::COINGECKO_API_URL;
use crate::error::ProviderError;
use crate::provider::FieldProvider;
use crate::providers::{error_for_status, http_client};
use crate::registry::AssetSpec;
use crate::types::{Field, FieldValue};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const PROVIDER: &str = "coingecko";

/// Response shape of `/simple/price?ids=<id>&vs_currencies=usd`
#[derive(Debug, Deserialize)]
struct SimplePriceResponse(HashMap<String, SimplePriceEntry>);

#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    usd: f64,
}

/// The slice of `/coins/<id>` this adapter reads
#[derive(Debug, Deserialize)]
struct CoinResponse {
    market_data: Option<CoinMarketData>,
}

#[derive(Debug, Deserialize)]
struct CoinMarketData {
    circulating_supply: Option<f64>,
}

/// CoinGecko market data provider.
///
/// Serves `UsdPrice` for every registered asset and `Supply` for assets
/// without a chain-specific supply source. A demo API key, when
/// configured, is sent via the `x-cg-demo-api-key` header.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    pub fn new(timeout: Duration, api_key: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            base_url: COINGECKO_API_URL.to_string(),
            api_key,
        })
    }

    async fn get_text(&self, url: &str, what: &str) -> Result<String, ProviderError> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if let Some(err) = error_for_status(PROVIDER, response.status(), what) {
            return Err(err);
        }
        response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))
    }

    async fn fetch_usd_price(&self, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, asset.coingecko_id
        );
        tracing::debug!(symbol = asset.symbol, %url, "fetching price from CoinGecko");
        let body = self.get_text(&url, asset.symbol).await?;
        parse_price_body(&body, asset)
    }

    async fn fetch_supply(&self, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
        let url = format!("{}/coins/{}", self.base_url, asset.coingecko_id);
        tracing::debug!(symbol = asset.symbol, %url, "fetching supply from CoinGecko");
        let body = self.get_text(&url, asset.symbol).await?;
        parse_supply_body(&body, asset)
    }
}

/// Extracts the USD price from a `/simple/price` body
fn parse_price_body(body: &str, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
    let response: SimplePriceResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("price decode: {}", e)))?;

    match response.0.get(asset.coingecko_id) {
        Some(entry) => Ok(FieldValue::plain(entry.usd)),
        // An empty object is CoinGecko's way of saying the id is unknown
        None => Err(ProviderError::not_found(PROVIDER, asset.symbol)),
    }
}

/// Extracts the circulating supply from a `/coins/<id>` body
fn parse_supply_body(body: &str, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
    let response: CoinResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("supply decode: {}", e)))?;

    match response.market_data.and_then(|m| m.circulating_supply) {
        Some(supply) => Ok(FieldValue::with_unit(supply, asset.symbol)),
        None => Err(ProviderError::not_found(
            PROVIDER,
            format!("{} supply", asset.symbol),
        )),
    }
}

#[async_trait]
impl FieldProvider for CoinGeckoProvider {
    async fn fetch(&self, asset: &AssetSpec, field: Field) -> Result<FieldValue, ProviderError> {
        match field {
            Field::UsdPrice => self.fetch_usd_price(asset).await,
            Field::Supply => self.fetch_supply(asset).await,
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
    fn parses_simple_price_body() {
        let btc = AssetRegistry::new().resolve("BTC").unwrap();
        let body = r#"{"bitcoin":{"usd":67890.12}}"#;
        let value = parse_price_body(body, btc).unwrap();
        assert_eq!(value, FieldValue::plain(67890.12));
    }

    #[test]
    fn empty_price_body_is_not_found() {
        let btc = AssetRegistry::new().resolve("BTC").unwrap();
        match parse_price_body("{}", btc) {
            Err(ProviderError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn parses_supply_from_coin_body() {
        let eth = AssetRegistry::new().resolve("ETH").unwrap();
        let body = r#"{
            "id": "ethereum",
            "market_data": {"circulating_supply": 120280000.5, "total_volume": {}}
        }"#;
        let value = parse_supply_body(body, eth).unwrap();
        assert_eq!(value, FieldValue::with_unit(120280000.5, "ETH"));
    }

    #[test]
    fn missing_supply_is_not_found() {
        let eth = AssetRegistry::new().resolve("ETH").unwrap();
        let body = r#"{"id": "ethereum", "market_data": {}}"#;
        match parse_supply_body(body, eth) {
            Err(ProviderError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn garbage_body_is_malformed() {
        let btc = AssetRegistry::new().resolve("BTC").unwrap();
        match parse_price_body("<html>rate limited</html>", btc) {
            Err(ProviderError::Malformed { .. }) => {}
            other => panic!("expected Malformed, got {:?}", other),
        }
    }
}
