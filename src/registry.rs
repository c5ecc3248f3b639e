//! Static asset registry: which symbols are recognized and which providers
//! serve which fields.

use crate::error::SnapshotError;
use crate::types::Field;

/// Identifies a concrete provider adapter a field can be bound to.
///
/// The tracker maps each id to a live adapter at construction time, so the
/// registry itself stays a plain static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    CoinGecko,
    Etherscan,
    BlockchainInfo,
    Kaspa,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::CoinGecko => "coingecko",
            ProviderId::Etherscan => "etherscan",
            ProviderId::BlockchainInfo => "blockchain.info",
            ProviderId::Kaspa => "kaspa",
        }
    }
}

/// Per-asset metadata: identity, provider ids, and whether hash rate is a
/// meaningful field for it.
#[derive(Debug, Clone, Copy)]
pub struct AssetSpec {
    /// Canonical uppercase symbol
    pub symbol: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Id used by the CoinGecko API for this asset
    pub coingecko_id: &'static str,
    /// True for proof-of-work assets with a hash-rate binding
    pub supports_hashrate: bool,
}

impl AssetSpec {
    /// Providers bound to the given field, in failover order.
    ///
    /// An empty slice means the field has no direct provider for this asset
    /// (derived fields, or hash rate on proof-of-stake assets).
    pub fn providers_for(&self, field: Field) -> &'static [ProviderId] {
        match field {
            Field::UsdPrice => &[ProviderId::CoinGecko],
            // Derived from UsdPrice and the exchange rate; no direct binding
            Field::CnyPrice => &[],
            Field::Supply => match self.symbol {
                "ETH" => &[ProviderId::Etherscan, ProviderId::CoinGecko],
                _ => &[ProviderId::CoinGecko],
            },
            Field::Hashrate => match self.symbol {
                "BTC" => &[ProviderId::BlockchainInfo],
                "KAS" => &[ProviderId::Kaspa],
                _ => &[],
            },
        }
    }

    /// The fields a full query of this asset resolves: prices and supply,
    /// plus hash rate where it is meaningful
    pub fn default_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::UsdPrice, Field::CnyPrice, Field::Supply];
        if self.supports_hashrate {
            fields.push(Field::Hashrate);
        }
        fields
    }
}

/// The recognized asset set. Immutable, read-only after load.
const ASSETS: &[AssetSpec] = &[
    AssetSpec {
        symbol: "BTC",
        name: "Bitcoin",
        coingecko_id: "bitcoin",
        supports_hashrate: true,
    },
    AssetSpec {
        symbol: "ETH",
        name: "Ethereum",
        coingecko_id: "ethereum",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "BNB",
        name: "BNB",
        coingecko_id: "binancecoin",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "KAS",
        name: "Kaspa",
        coingecko_id: "kaspa",
        supports_hashrate: true,
    },
    AssetSpec {
        symbol: "MATIC",
        name: "Polygon",
        coingecko_id: "matic-network",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "AVAX",
        name: "Avalanche",
        coingecko_id: "avalanche-2",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "LTC",
        name: "Litecoin",
        coingecko_id: "litecoin",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "DOGE",
        name: "Dogecoin",
        coingecko_id: "dogecoin",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "ARB",
        name: "Arbitrum",
        coingecko_id: "arbitrum",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "OP",
        name: "Optimism",
        coingecko_id: "optimism",
        supports_hashrate: false,
    },
    AssetSpec {
        symbol: "SOL",
        name: "Solana",
        coingecko_id: "solana",
        supports_hashrate: false,
    },
];

/// Read-only lookup over the static asset table
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetRegistry;

impl AssetRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Resolves a symbol (case-insensitive) to its spec
    pub fn resolve(&self, symbol: &str) -> Result<&'static AssetSpec, SnapshotError> {
        let upper = symbol.trim().to_uppercase();
        ASSETS
            .iter()
            .find(|spec| spec.symbol == upper)
            .ok_or(SnapshotError::UnknownAsset { symbol: upper })
    }

    /// All recognized assets
    pub fn all(&self) -> &'static [AssetSpec] {
        ASSETS
    }
}
