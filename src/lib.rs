// =============================================================================
// Market Pulse — On-demand market intelligence scoring for Injective markets
// =============================================================================
//
// Turns raw order-book snapshots and trade ticks into normalized intelligence
// scores: liquidity, volatility, momentum, and order flow. The engine is
// pull-based. Every report is computed on demand from fresh (or
// freshness-window-cached) upstream data; the only durable state is the
// per-market volatility regime tracker.
//
// The HTTP presentation layer, market discovery, and rate limiting live in
// the consuming service; this crate owns everything from the upstream fetch
// boundary down to the scored reports.

pub mod cache;
pub mod config;
pub mod engine;
pub mod health;
pub mod liquidity;
pub mod math;
pub mod microstructure;
pub mod regime;
pub mod scoring;
pub mod source;
pub mod types;
pub mod volatility;

pub use cache::{CacheStats, ComputationCache};
pub use config::{CacheTtls, EngineConfig, Network};
pub use engine::AnalyticsEngine;
pub use health::HealthAggregator;
pub use liquidity::LiquidityAnalyzer;
pub use microstructure::MicrostructureAnalyzer;
pub use regime::{RegimeState, RegimeTracker, RegimeTransition};
pub use source::{IndexerSource, MarketDataSource, StaticSource};
pub use types::{
    ExecutionRole, MarketMeta, MarketSummary, MarketType, OrderBook, OrderBookLevel, OrderSide,
    Trade, TradeDirection, VolatilityRegime,
};
pub use volatility::VolatilityAnalyzer;
