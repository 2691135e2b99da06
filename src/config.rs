// =============================================================================
// Engine Configuration — Environment-driven settings with per-class cache TTLs
// =============================================================================
//
// Every knob has a default so the engine can be constructed with no
// environment at all. `EngineConfig::from_env()` reads overrides once at
// startup; the resulting value is passed into `AnalyticsEngine::new` and
// never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Injective network the indexer source talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Base URL of the indexer REST API for this network.
    pub fn indexer_base_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://sentry.exchange.grpc-web.injective.network",
            Self::Testnet => "https://testnet.sentry.exchange.grpc-web.injective.network",
        }
    }

    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "testnet" => Self::Testnet,
            _ => Self::Mainnet,
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::Mainnet
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_orderbook_ttl() -> u64 {
    10
}

fn default_trades_ttl() -> u64 {
    15
}

fn default_computed_ttl() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_trade_fetch_limit() -> usize {
    500
}

/// Time-to-live per metric class, in seconds.
///
/// Raw order-book snapshots go stale fastest; computed scores are allowed a
/// longer freshness window; windowed history doubles the computed TTL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheTtls {
    #[serde(default = "default_orderbook_ttl")]
    pub orderbook_secs: u64,

    #[serde(default = "default_trades_ttl")]
    pub trades_secs: u64,

    #[serde(default = "default_computed_ttl")]
    pub computed_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            orderbook_secs: default_orderbook_ttl(),
            trades_secs: default_trades_ttl(),
            computed_secs: default_computed_ttl(),
        }
    }
}

impl CacheTtls {
    pub fn orderbook(&self) -> Duration {
        Duration::from_secs(self.orderbook_secs)
    }

    pub fn trades(&self) -> Duration {
        Duration::from_secs(self.trades_secs)
    }

    pub fn computed(&self) -> Duration {
        Duration::from_secs(self.computed_secs)
    }

    /// Windowed volatility history lives twice as long as other computed
    /// metrics.
    pub fn history(&self) -> Duration {
        Duration::from_secs(self.computed_secs * 2)
    }

    pub fn history_secs(&self) -> u64 {
        self.computed_secs * 2
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub network: Network,

    #[serde(default)]
    pub cache: CacheTtls,

    /// Timeout for a single indexer HTTP request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// How many trades the volatility/microstructure analyzers request.
    #[serde(default = "default_trade_fetch_limit")]
    pub trade_fetch_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            cache: CacheTtls::default(),
            http_timeout_secs: default_http_timeout_secs(),
            trade_fetch_limit: default_trade_fetch_limit(),
        }
    }
}

impl EngineConfig {
    /// Build a config from the process environment.
    ///
    /// Loads `.env` opportunistically; every variable falls back to its
    /// default when unset or unparseable.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        let network = Network::from_name(&env_str("NETWORK", "mainnet"));
        let cache = CacheTtls {
            orderbook_secs: env_u64("CACHE_TTL_ORDERBOOK", default_orderbook_ttl()),
            trades_secs: env_u64("CACHE_TTL_TRADES", default_trades_ttl()),
            computed_secs: env_u64("CACHE_TTL_COMPUTED", default_computed_ttl()),
        };

        let config = Self {
            network,
            cache,
            http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", default_http_timeout_secs()),
            trade_fetch_limit: env_u64("TRADE_FETCH_LIMIT", default_trade_fetch_limit() as u64)
                as usize,
        };

        info!(
            network = %config.network,
            orderbook_ttl = config.cache.orderbook_secs,
            trades_ttl = config.cache.trades_secs,
            computed_ttl = config.cache.computed_secs,
            "engine config loaded"
        );

        config
    }

    /// Label stamped into every report's `data_source` field.
    pub fn data_source_label(&self) -> String {
        format!("injective-{}", self.network)
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
