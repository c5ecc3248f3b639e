//! Core data types for the market data tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Data fields the tracker can resolve for an asset.
///
/// The string form of each variant is part of the cache schema (it is the
/// `field` half of the cache key), so it must stay stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Spot price in US dollars
    UsdPrice,
    /// Spot price in Chinese yuan, derived from the USD price and the
    /// cached USD→CNY rate
    CnyPrice,
    /// Circulating supply in display units
    Supply,
    /// Network hash rate (proof-of-work assets only)
    Hashrate,
}

impl Field {
    /// Stable cache-key string for this field
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::UsdPrice => "usd_price",
            Field::CnyPrice => "cny_price",
            Field::Supply => "supply",
            Field::Hashrate => "hashrate",
        }
    }

    /// All fields, in snapshot order
    pub fn all() -> &'static [Field] {
        &[Field::UsdPrice, Field::CnyPrice, Field::Supply, Field::Hashrate]
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized value for a single (asset, field) pair.
///
/// Every adapter reduces its provider's native response to this shape, and
/// it is what the cache persists (as JSON text), so the stored type of a
/// field never changes across writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// The numeric value, in display units
    pub amount: f64,

    /// Unit label where one is meaningful (supply symbol, "GH/s", "H/s");
    /// `None` for prices and rates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl FieldValue {
    /// A unit-less value (prices, exchange rates)
    pub fn plain(amount: f64) -> Self {
        Self { amount, unit: None }
    }

    /// A value carrying a unit label
    pub fn with_unit(amount: f64, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: Some(unit.into()),
        }
    }
}

/// A row of the persistent cache: a value plus the freshness bookkeeping
/// needed to decide whether it can still be served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: FieldValue,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// True once `now - fetched_at` exceeds the entry's ttl
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        age.num_seconds() > self.ttl.as_secs() as i64
    }
}

/// The merged, possibly-partial result of one asset query.
///
/// Built fresh per query and never persisted as a whole; only its
/// constituent field values land in cache rows.
#[derive(Debug, Clone, Serialize)]
pub struct AssetSnapshot {
    /// Canonical (uppercase) asset symbol
    pub symbol: String,

    /// Spot price in USD
    pub usd_price: Option<f64>,

    /// Spot price in CNY
    pub cny_price: Option<f64>,

    /// Circulating supply in display units
    pub circulating_supply: Option<f64>,

    /// Network hash rate, for assets where it is meaningful
    pub hashrate: Option<f64>,

    /// Unit of the hash rate value ("GH/s", "H/s")
    pub hashrate_unit: Option<String>,

    /// When this snapshot was assembled
    pub as_of: DateTime<Utc>,

    /// True iff at least one requested field could not be resolved
    pub partial: bool,

    /// The requested fields that could not be resolved
    pub unresolved: Vec<Field>,
}

impl AssetSnapshot {
    /// An empty snapshot skeleton for the given symbol
    pub(crate) fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            usd_price: None,
            cny_price: None,
            circulating_supply: None,
            hashrate: None,
            hashrate_unit: None,
            as_of: Utc::now(),
            partial: false,
            unresolved: Vec::new(),
        }
    }

    /// Merges one resolved field value into the snapshot
    pub(crate) fn set_field(&mut self, field: Field, value: FieldValue) {
        match field {
            Field::UsdPrice => self.usd_price = Some(value.amount),
            Field::CnyPrice => self.cny_price = Some(value.amount),
            Field::Supply => self.circulating_supply = Some(value.amount),
            Field::Hashrate => {
                self.hashrate = Some(value.amount);
                self.hashrate_unit = value.unit;
            }
        }
    }
}
