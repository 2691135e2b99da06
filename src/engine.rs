// =============================================================================
// Analytics Engine — Service assembly
// =============================================================================
//
// Wires one computation cache, one upstream source, one regime tracker, and
// the analyzers together. Constructed once at process start. Every service is
// an explicit, injected instance; no module-level globals exist anywhere in
// the crate.

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheStats, ComputationCache};
use crate::config::EngineConfig;
use crate::health::HealthAggregator;
use crate::liquidity::LiquidityAnalyzer;
use crate::microstructure::MicrostructureAnalyzer;
use crate::regime::RegimeTracker;
use crate::source::{IndexerSource, MarketDataSource};
use crate::volatility::VolatilityAnalyzer;

pub struct AnalyticsEngine {
    config: EngineConfig,
    cache: Arc<ComputationCache>,
    regimes: Arc<RegimeTracker>,
    liquidity: Arc<LiquidityAnalyzer>,
    volatility: Arc<VolatilityAnalyzer>,
    microstructure: Arc<MicrostructureAnalyzer>,
    health: HealthAggregator,
}

impl AnalyticsEngine {
    /// Build an engine backed by the Injective indexer.
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(ComputationCache::new());
        let source: Arc<dyn MarketDataSource> =
            Arc::new(IndexerSource::new(&config, cache.clone()));
        Self::assemble(config, source, cache)
    }

    /// Build an engine over any data source. The indexer-level cache wrapping
    /// is the source's own concern; analyzer-level caching still applies.
    pub fn with_source(config: EngineConfig, source: Arc<dyn MarketDataSource>) -> Self {
        let cache = Arc::new(ComputationCache::new());
        Self::assemble(config, source, cache)
    }

    fn assemble(
        config: EngineConfig,
        source: Arc<dyn MarketDataSource>,
        cache: Arc<ComputationCache>,
    ) -> Self {
        let regimes = RegimeTracker::new();

        let liquidity = Arc::new(LiquidityAnalyzer::new(
            &config,
            source.clone(),
            cache.clone(),
        ));
        let volatility = Arc::new(VolatilityAnalyzer::new(
            &config,
            source.clone(),
            cache.clone(),
            regimes.clone(),
        ));
        let microstructure = Arc::new(MicrostructureAnalyzer::new(
            &config,
            source,
            cache.clone(),
        ));
        let health = HealthAggregator::new(
            liquidity.clone(),
            volatility.clone(),
            microstructure.clone(),
        );

        info!(network = %config.network, "analytics engine assembled");

        Self {
            config,
            cache,
            regimes,
            liquidity,
            volatility,
            microstructure,
            health,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn liquidity(&self) -> &LiquidityAnalyzer {
        &self.liquidity
    }

    pub fn volatility(&self) -> &VolatilityAnalyzer {
        &self.volatility
    }

    pub fn microstructure(&self) -> &MicrostructureAnalyzer {
        &self.microstructure
    }

    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }

    pub fn regimes(&self) -> &RegimeTracker {
        &self.regimes
    }

    /// Aggregate cache counters, for the service's own health endpoint.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached value; the next call of each operation recomputes.
    pub fn flush_cache(&self) {
        self.cache.flush();
    }
}
