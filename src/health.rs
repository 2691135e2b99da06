// =============================================================================
// Health Aggregator — Cross-analyzer overall health, comparison, rankings
// =============================================================================
//
// Combines the three analyzers' scores into a single overall-health figure
// and fans out across markets for comparison and ranking views. Per-market
// work runs concurrently; each analyzer call is independently cached, so a
// ranking sweep right after a comparison is nearly free.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::liquidity::LiquidityAnalyzer;
use crate::math::round2;
use crate::microstructure::MicrostructureAnalyzer;
use crate::scoring::overall_health_score;
use crate::types::{MarketMeta, MarketType};
use crate::volatility::VolatilityAnalyzer;

// =============================================================================
// Report types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthScores {
    pub liquidity: f64,
    pub volatility: f64,
    pub momentum: f64,
    pub overall_health: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickStats {
    pub price_usd: f64,
    pub volume_24h_usd: f64,
    pub spread_bps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketHealthReport {
    pub market_id: String,
    pub market_name: String,
    pub market_type: MarketType,
    pub scores: HealthScores,
    pub quick_stats: QuickStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub count: usize,
    pub timestamp: String,
    pub markets: Vec<MarketHealthReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedMarket {
    pub rank: usize,
    pub market_id: String,
    pub market_name: String,
    pub market_type: MarketType,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingsReport {
    pub metric: String,
    pub market_type_filter: Option<MarketType>,
    pub count: usize,
    pub timestamp: String,
    pub rankings: Vec<RankedMarket>,
}

// =============================================================================
// Aggregator
// =============================================================================

pub struct HealthAggregator {
    liquidity: Arc<LiquidityAnalyzer>,
    volatility: Arc<VolatilityAnalyzer>,
    microstructure: Arc<MicrostructureAnalyzer>,
}

impl HealthAggregator {
    pub fn new(
        liquidity: Arc<LiquidityAnalyzer>,
        volatility: Arc<VolatilityAnalyzer>,
        microstructure: Arc<MicrostructureAnalyzer>,
    ) -> Self {
        Self {
            liquidity,
            volatility,
            microstructure,
        }
    }

    /// Overall health for one market, with the contributing scores.
    pub async fn market_health(&self, market: &MarketMeta) -> MarketHealthReport {
        let (liq, vol, mom) = tokio::join!(
            self.liquidity.score(market),
            self.volatility.current(market),
            self.microstructure.momentum(market),
        );

        let overall = overall_health_score(
            liq.liquidity_score,
            vol.volatility_score,
            mom.momentum_score,
        );

        debug!(
            market = %market.ticker,
            overall = overall,
            "market health aggregated"
        );

        MarketHealthReport {
            market_id: market.market_id.clone(),
            market_name: market.ticker.clone(),
            market_type: market.market_type,
            scores: HealthScores {
                liquidity: liq.liquidity_score,
                volatility: vol.volatility_score,
                momentum: mom.momentum_score,
                overall_health: overall,
            },
            quick_stats: QuickStats {
                // Price is not derivable from the score reports; the stable
                // record shape keeps the field zeroed.
                price_usd: 0.0,
                volume_24h_usd: round2(liq.metrics.bid_depth_usd + liq.metrics.ask_depth_usd),
                spread_bps: liq.metrics.spread_bps,
            },
        }
    }

    /// Side-by-side health for a set of markets, input order preserved.
    pub async fn compare(&self, markets: &[MarketMeta]) -> ComparisonReport {
        let reports = join_all(markets.iter().map(|m| self.market_health(m))).await;

        ComparisonReport {
            count: reports.len(),
            timestamp: Utc::now().to_rfc3339(),
            markets: reports,
        }
    }

    /// Markets ranked by composite liquidity score, best first.
    pub async fn rank_by_liquidity(
        &self,
        markets: &[MarketMeta],
        market_type_filter: Option<MarketType>,
    ) -> RankingsReport {
        let scored = join_all(
            filtered(markets, market_type_filter).map(|m| async move {
                let report = self.liquidity.score(m).await;
                (m, report.liquidity_score)
            }),
        )
        .await;

        build_rankings("liquidity", market_type_filter, scored)
    }

    /// Markets ranked by volatility score, most volatile first.
    pub async fn rank_by_volatility(
        &self,
        markets: &[MarketMeta],
        market_type_filter: Option<MarketType>,
    ) -> RankingsReport {
        let scored = join_all(
            filtered(markets, market_type_filter).map(|m| async move {
                let report = self.volatility.current(m).await;
                (m, report.volatility_score)
            }),
        )
        .await;

        build_rankings("volatility", market_type_filter, scored)
    }
}

fn filtered(
    markets: &[MarketMeta],
    market_type_filter: Option<MarketType>,
) -> impl Iterator<Item = &MarketMeta> {
    markets
        .iter()
        .filter(move |m| market_type_filter.map_or(true, |t| m.market_type == t))
}

fn build_rankings(
    metric: &str,
    market_type_filter: Option<MarketType>,
    mut scored: Vec<(&MarketMeta, f64)>,
) -> RankingsReport {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("scores are finite"));

    let rankings = scored
        .into_iter()
        .enumerate()
        .map(|(i, (m, score))| RankedMarket {
            rank: i + 1,
            market_id: m.market_id.clone(),
            market_name: m.ticker.clone(),
            market_type: m.market_type,
            score,
        })
        .collect::<Vec<_>>();

    RankingsReport {
        metric: metric.to_string(),
        market_type_filter,
        count: rankings.len(),
        timestamp: Utc::now().to_rfc3339(),
        rankings,
    }
}
