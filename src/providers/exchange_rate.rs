//! exchangerate-api adapter: USD→CNY conversion rate

use crate::constants::EXCHANGE_RATE_API_URL;
use crate::error::ProviderError;
use crate::provider::FxRateProvider;
use crate::providers::{error_for_status, http_client};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const PROVIDER: &str = "exchangerate-api";

/// The slice of `/v4/latest/USD` this adapter reads
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

/// USD→CNY rate provider backing the derived CNY price
pub struct ExchangeRateProvider {
    client: Client,
}

impl ExchangeRateProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
        })
    }
}

fn parse_rates_body(body: &str) -> Result<f64, ProviderError> {
    let response: LatestRatesResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("rates decode: {}", e)))?;

    response
        .rates
        .get("CNY")
        .copied()
        .ok_or_else(|| ProviderError::malformed(PROVIDER, "rates table has no CNY entry"))
}

#[async_trait]
impl FxRateProvider for ExchangeRateProvider {
    async fn fetch_usd_cny(&self) -> Result<f64, ProviderError> {
        tracing::debug!("fetching USD/CNY rate");
        let response = self
            .client
            .get(EXCHANGE_RATE_API_URL)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if let Some(err) = error_for_status(PROVIDER, response.status(), "USD/CNY rate") {
            return Err(err);
        }
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        parse_rates_body(&body)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
