// =============================================================================
// Liquidity Analyzer — Depth, spread, slippage simulation, composite score
// =============================================================================
//
// Everything here is a stateless function of one order-book snapshot plus a
// recent trade batch; the computation cache provides the freshness window.
// Division is guarded throughout: an empty or one-sided book degrades to
// zero/neutral metrics instead of faulting.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::ComputationCache;
use crate::config::{CacheTtls, EngineConfig};
use crate::math::{basis_points, mean, percentile_rank, round_to, round2};
use crate::scoring::{composite_liquidity_score, liquidity_label, linear_score, sigmoid_score};
use crate::source::MarketDataSource;
use crate::types::{MarketMeta, OrderBook, OrderBookLevel, OrderSide, ReportHeader, Trade};

/// Distance bands (% from mid) evaluated by the depth profile.
const DEPTH_BANDS_PCT: [f64; 5] = [0.1, 0.5, 1.0, 2.0, 5.0];

/// Notional sizes (quote units) probed by the score report's slippage sims.
const SLIPPAGE_PROBES: [f64; 3] = [1_000.0, 10_000.0, 50_000.0];

/// Reference notional at which the depth score sigmoid crosses 50.
const DEPTH_SCORE_MIDPOINT: f64 = 100_000.0;

/// Default historical spread sample (bps) when no direction flips exist.
const DEFAULT_SPREAD_SAMPLE_BPS: f64 = 5.0;

// =============================================================================
// Report types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LiquidityComponents {
    pub depth_score: f64,
    pub spread_score: f64,
    pub resilience_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidityMetrics {
    pub bid_depth_usd: f64,
    pub ask_depth_usd: f64,
    pub depth_imbalance_pct: f64,
    pub spread_bps: f64,
    pub spread_percentile_24h: f64,
    pub estimated_slippage_1k_bps: f64,
    pub estimated_slippage_10k_bps: f64,
    pub estimated_slippage_50k_bps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidityScoreReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub liquidity_score: f64,
    pub score_label: &'static str,
    pub components: LiquidityComponents,
    pub metrics: LiquidityMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepthBand {
    pub distance_from_mid_pct: f64,
    pub bid_volume_usd: f64,
    pub ask_volume_usd: f64,
    pub cumulative_bid_usd: f64,
    pub cumulative_ask_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepthProfileReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub levels: Vec<DepthBand>,
    pub total_bid_depth_usd: f64,
    pub total_ask_depth_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlippageReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub trade_size_usd: f64,
    pub side: OrderSide,
    pub estimated_slippage_bps: f64,
    pub estimated_avg_price: f64,
    pub mid_price: f64,
    pub effective_price_impact_pct: f64,
    pub fillable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub current_spread_bps: f64,
    pub mid_price: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub average_spread_1h_bps: f64,
    pub average_spread_24h_bps: f64,
    pub spread_stability_score: f64,
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct LiquidityAnalyzer {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<ComputationCache>,
    ttls: CacheTtls,
    data_source: String,
}

impl LiquidityAnalyzer {
    pub fn new(
        config: &EngineConfig,
        source: Arc<dyn MarketDataSource>,
        cache: Arc<ComputationCache>,
    ) -> Self {
        Self {
            source,
            cache,
            ttls: config.cache,
            data_source: config.data_source_label(),
        }
    }

    /// Composite liquidity score with component breakdown.
    pub async fn score(&self, market: &MarketMeta) -> LiquidityScoreReport {
        let key = format!("liq:score:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_score(market))
            .await
    }

    /// Banded depth profile around the mid price.
    pub async fn depth_profile(&self, market: &MarketMeta) -> DepthProfileReport {
        let key = format!("liq:depth:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_depth(market))
            .await
    }

    /// Simulated fill of `size_usd` notional against the book.
    pub async fn slippage(
        &self,
        market: &MarketMeta,
        size_usd: f64,
        side: OrderSide,
    ) -> SlippageReport {
        let key = format!("liq:slip:{}:{}:{}", market.market_id, size_usd, side);
        self.cache
            .get_or_compute(&key, self.ttls.orderbook(), || {
                self.compute_slippage(market, size_usd, side)
            })
            .await
    }

    /// Current and historical spread statistics.
    pub async fn spread(&self, market: &MarketMeta) -> SpreadReport {
        let key = format!("liq:spread:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_spread(market))
            .await
    }

    // -------------------------------------------------------------------------
    // Computation
    // -------------------------------------------------------------------------

    async fn compute_score(&self, market: &MarketMeta) -> LiquidityScoreReport {
        let book = self.source.fetch_orderbook(market).await;
        let trades = self.source.fetch_trades(market, 100).await;

        let mid = mid_price(&book);
        let bid_depth = depth_quote(&book.buys);
        let ask_depth = depth_quote(&book.sells);
        let total_depth = bid_depth + ask_depth;
        let imbalance_pct = if total_depth > 0.0 {
            (bid_depth - ask_depth) / total_depth * 100.0
        } else {
            0.0
        };
        let spread = spread_bps(&book);

        let depth_score = sigmoid_score(total_depth, DEPTH_SCORE_MIDPOINT, 2.0);
        let spread_score = linear_score(spread, 1.0, 50.0, true);
        let resilience = resilience_score(&book, &trades);
        let score = composite_liquidity_score(depth_score, spread_score, resilience);

        let mut history = historical_spreads(&trades);
        history.sort_by(|a, b| a.partial_cmp(b).expect("spread samples are finite"));
        let spread_percentile = round2(percentile_rank(&history, spread));

        debug!(
            market = %market.ticker,
            score = score,
            depth = format!("{total_depth:.0}"),
            spread_bps = format!("{spread:.1}"),
            "liquidity score computed"
        );

        LiquidityScoreReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            liquidity_score: score,
            score_label: liquidity_label(score),
            components: LiquidityComponents {
                depth_score,
                spread_score,
                resilience_score: resilience,
            },
            metrics: LiquidityMetrics {
                bid_depth_usd: round2(bid_depth),
                ask_depth_usd: round2(ask_depth),
                depth_imbalance_pct: round2(imbalance_pct),
                spread_bps: round_to(spread, 1),
                spread_percentile_24h: spread_percentile,
                estimated_slippage_1k_bps: round_to(
                    simulate_fill(&book.sells, mid, SLIPPAGE_PROBES[0]).slippage_bps,
                    1,
                ),
                estimated_slippage_10k_bps: round_to(
                    simulate_fill(&book.sells, mid, SLIPPAGE_PROBES[1]).slippage_bps,
                    1,
                ),
                estimated_slippage_50k_bps: round_to(
                    simulate_fill(&book.sells, mid, SLIPPAGE_PROBES[2]).slippage_bps,
                    1,
                ),
            },
        }
    }

    async fn compute_depth(&self, market: &MarketMeta) -> DepthProfileReport {
        let book = self.source.fetch_orderbook(market).await;
        let mid = mid_price(&book);

        let mut cumulative_bid = 0.0;
        let mut cumulative_ask = 0.0;
        let levels = DEPTH_BANDS_PCT
            .iter()
            .map(|&dist| {
                let bid_volume = volume_within(&book.buys, mid, dist);
                let ask_volume = volume_within(&book.sells, mid, dist);
                cumulative_bid += bid_volume;
                cumulative_ask += ask_volume;
                DepthBand {
                    distance_from_mid_pct: dist,
                    bid_volume_usd: round2(bid_volume),
                    ask_volume_usd: round2(ask_volume),
                    cumulative_bid_usd: round2(cumulative_bid),
                    cumulative_ask_usd: round2(cumulative_ask),
                }
            })
            .collect();

        DepthProfileReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            levels,
            total_bid_depth_usd: round2(depth_quote(&book.buys)),
            total_ask_depth_usd: round2(depth_quote(&book.sells)),
        }
    }

    async fn compute_slippage(
        &self,
        market: &MarketMeta,
        size_usd: f64,
        side: OrderSide,
    ) -> SlippageReport {
        let book = self.source.fetch_orderbook(market).await;
        let mid = mid_price(&book);

        // A buy consumes the asks, a sell consumes the bids.
        let levels = match side {
            OrderSide::Buy => &book.sells,
            OrderSide::Sell => &book.buys,
        };
        let fill = simulate_fill(levels, mid, size_usd);

        SlippageReport {
            header: ReportHeader::new(market, self.ttls.orderbook_secs, &self.data_source),
            trade_size_usd: size_usd,
            side,
            estimated_slippage_bps: round_to(fill.slippage_bps, 1),
            estimated_avg_price: round_to(fill.avg_price, 6),
            mid_price: round_to(mid, 6),
            effective_price_impact_pct: round_to(fill.slippage_bps / 100.0, 3),
            fillable: fill.fillable,
        }
    }

    async fn compute_spread(&self, market: &MarketMeta) -> SpreadReport {
        let book = self.source.fetch_orderbook(market).await;
        let trades = self.source.fetch_trades(market, 100).await;

        let mid = mid_price(&book);
        let best_bid = book.best_bid().unwrap_or(0.0);
        let best_ask = book.best_ask().unwrap_or(0.0);
        let current = basis_points(best_bid, best_ask);

        let history = historical_spreads(&trades);
        let recent = &history[..history.len().min(20)];
        let variation = if history.is_empty() {
            0.0
        } else {
            let max = history.iter().copied().fold(f64::MIN, f64::max);
            let min = history.iter().copied().fold(f64::MAX, f64::min);
            max - min
        };

        SpreadReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            current_spread_bps: round_to(current, 1),
            mid_price: round_to(mid, 6),
            best_bid: round_to(best_bid, 6),
            best_ask: round_to(best_ask, 6),
            average_spread_1h_bps: round_to(mean(recent), 1),
            average_spread_24h_bps: round_to(mean(&history), 1),
            spread_stability_score: linear_score(variation, 0.0, 50.0, true),
        }
    }
}

// =============================================================================
// Pure helpers
// =============================================================================

/// Mid price: average of best bid and ask, the surviving side when the book
/// is one-sided, 0 when both sides are empty.
pub fn mid_price(book: &OrderBook) -> f64 {
    let bid = book.best_bid().unwrap_or(0.0);
    let ask = book.best_ask().unwrap_or(0.0);
    if bid == 0.0 && ask == 0.0 {
        0.0
    } else if bid == 0.0 {
        ask
    } else if ask == 0.0 {
        bid
    } else {
        (bid + ask) / 2.0
    }
}

/// Total notional resting on one side, in quote currency.
pub fn depth_quote(levels: &[OrderBookLevel]) -> f64 {
    levels.iter().map(|l| l.notional()).sum()
}

/// Best bid/ask distance in basis points relative to their midpoint.
pub fn spread_bps(book: &OrderBook) -> f64 {
    basis_points(
        book.best_bid().unwrap_or(0.0),
        book.best_ask().unwrap_or(0.0),
    )
}

/// Outcome of walking the book with a notional-sized order.
#[derive(Debug, Clone, Copy)]
pub struct FillSimulation {
    /// Volume-weighted average fill price; the mid price when nothing filled.
    pub avg_price: f64,
    /// |avg − mid| / mid in basis points; 0 when the mid is 0.
    pub slippage_bps: f64,
    /// False when the book ran out before the requested size was filled.
    pub fillable: bool,
}

/// Walk `levels` best-first, consuming up to `size_usd` of notional, and
/// report the resulting average price and slippage versus `mid`.
pub fn simulate_fill(levels: &[OrderBookLevel], mid: f64, size_usd: f64) -> FillSimulation {
    let mut remaining = size_usd;
    let mut cost = 0.0;
    let mut quantity = 0.0;

    for level in levels {
        if remaining <= 0.0 {
            break;
        }
        let notional = level.notional();
        if level.price <= 0.0 || notional <= 0.0 {
            continue;
        }
        let fill = remaining.min(notional);
        cost += fill;
        quantity += fill / level.price;
        remaining -= fill;
    }

    let avg_price = if quantity > 0.0 { cost / quantity } else { mid };
    let slippage_bps = if mid > 0.0 {
        ((avg_price - mid) / mid).abs() * 10_000.0
    } else {
        0.0
    };

    FillSimulation {
        avg_price,
        slippage_bps,
        fillable: remaining <= 0.0,
    }
}

/// Notional resting within `dist_pct` percent of the mid on one side.
pub fn volume_within(levels: &[OrderBookLevel], mid: f64, dist_pct: f64) -> f64 {
    if mid == 0.0 {
        return 0.0;
    }
    levels
        .iter()
        .filter(|l| (l.price - mid).abs() / mid * 100.0 <= dist_pct)
        .map(|l| l.notional())
        .sum()
}

/// Blend of book-level count and recent trade frequency, both sigmoid-scored.
fn resilience_score(book: &OrderBook, trades: &[Trade]) -> f64 {
    let level_score = sigmoid_score(book.level_count() as f64, 30.0, 2.0);
    let frequency_score = sigmoid_score(trades.len() as f64, 50.0, 1.5);
    round2(level_score * 0.6 + frequency_score * 0.4)
}

/// Historical spread proxy: basis-point distances between consecutive trades
/// whose direction flipped (a bid-ask bounce). Falls back to one default
/// sample so the distribution is never empty.
pub fn historical_spreads(trades: &[Trade]) -> Vec<f64> {
    let mut samples: Vec<f64> = trades
        .windows(2)
        .filter(|w| w[0].direction != w[1].direction && w[0].price > 0.0 && w[1].price > 0.0)
        .map(|w| basis_points(w[1].price, w[0].price))
        .collect();
    if samples.is_empty() {
        samples.push(DEFAULT_SPREAD_SAMPLE_BPS);
    }
    samples
}
