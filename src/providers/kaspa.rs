//! Kaspa adapter: KAS network hash rate

use crate::constants::KASPA_HASHRATE_URL;
use crate::error::ProviderError;
use crate::provider::FieldProvider;
use crate::providers::{error_for_status, http_client};
use crate::registry::AssetSpec;
use crate::types::{Field, FieldValue};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "kaspa";

/// Response of `/info/hashrate`; the rate is reported in H/s
#[derive(Debug, Deserialize)]
struct HashrateResponse {
    hashrate: Option<f64>,
}

/// KAS hash-rate provider backed by the api.kaspa.org node API
pub struct KaspaProvider {
    client: Client,
}

impl KaspaProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
        })
    }

    async fn fetch_hashrate(&self, asset: &AssetSpec) -> Result<FieldValue, ProviderError> {
        tracing::debug!(symbol = asset.symbol, "fetching hash rate from kaspa.org");
        let response = self
            .client
            .get(KASPA_HASHRATE_URL)
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
        parse_hashrate_body(&body)
    }
}

fn parse_hashrate_body(body: &str) -> Result<FieldValue, ProviderError> {
    let response: HashrateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("hashrate decode: {}", e)))?;

    match response.hashrate {
        Some(rate) => Ok(FieldValue::with_unit(rate, "H/s")),
        None => Err(ProviderError::not_found(PROVIDER, "KAS hash rate")),
    }
}

#[async_trait]
impl FieldProvider for KaspaProvider {
    async fn fetch(&self, asset: &AssetSpec, field: Field) -> Result<FieldValue, ProviderError> {
        match (asset.symbol, field) {
            ("KAS", Field::Hashrate) => self.fetch_hashrate(asset).await,
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
