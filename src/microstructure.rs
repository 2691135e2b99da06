// =============================================================================
// Microstructure Analyzer — Order flow, whale detection, momentum
// =============================================================================
//
// Works exclusively on trade batches: flow imbalance over age windows, a
// percentile-based whale-size threshold, and a multi-horizon momentum
// composite. Empty windows degrade to neutral values (imbalance 0.5, bias 0)
// so a quiet market never reads as directional.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::cache::ComputationCache;
use crate::config::{CacheTtls, EngineConfig};
use crate::math::{mean, round_to, round2};
use crate::scoring::{momentum_label, momentum_score};
use crate::source::MarketDataSource;
use crate::types::{MarketMeta, ReportHeader, Trade, TradeDirection};

/// Minimum whale threshold in quote currency, applied regardless of how
/// small the trades in the window are.
const WHALE_THRESHOLD_FLOOR_USD: f64 = 5_000.0;

/// Relative change in half-batch volume beyond which the trend is labeled.
const VOLUME_TREND_BAND: f64 = 0.15;

/// Maximum whale trade records included in a report.
const WHALE_RECORD_LIMIT: usize = 20;

// =============================================================================
// Report types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    BuyDominant,
    SellDominant,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowWindowStats {
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub net_flow_usd: f64,
    pub imbalance_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowWindows {
    #[serde(rename = "5m")]
    pub five_min: FlowWindowStats,
    #[serde(rename = "1h")]
    pub one_hour: FlowWindowStats,
    #[serde(rename = "24h")]
    pub all_fetched: FlowWindowStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderFlowReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub flow_score: f64,
    pub flow_direction: FlowDirection,
    pub windows: FlowWindows,
    pub whale_trades_1h: usize,
    pub whale_threshold_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhaleTradeRecord {
    pub timestamp: String,
    pub side: TradeDirection,
    pub quantity: f64,
    pub price: f64,
    pub volume_usd: f64,
    /// How many times the period's mean trade size this trade was.
    pub size_multiple: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhaleActivityReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub whale_threshold_usd: f64,
    pub period_hours: u32,
    pub total_whale_trades: usize,
    pub whale_buy_volume_usd: f64,
    pub whale_sell_volume_usd: f64,
    pub trades: Vec<WhaleTradeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentumIndicators {
    pub price_change_5m_pct: f64,
    pub price_change_1h_pct: f64,
    pub price_change_24h_pct: f64,
    pub volume_trend: VolumeTrend,
    pub trade_flow_bias: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentumReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub momentum_score: f64,
    pub momentum_label: &'static str,
    pub indicators: MomentumIndicators,
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct MicrostructureAnalyzer {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<ComputationCache>,
    ttls: CacheTtls,
    data_source: String,
    trade_limit: usize,
}

impl MicrostructureAnalyzer {
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
            trade_limit: config.trade_fetch_limit,
        }
    }

    /// Order-flow imbalance across age windows.
    pub async fn flow(&self, market: &MarketMeta) -> OrderFlowReport {
        let key = format!("ms:flow:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_flow(market))
            .await
    }

    /// Whale trade activity over the past `hours`.
    pub async fn whales(&self, market: &MarketMeta, hours: u32) -> WhaleActivityReport {
        let key = format!("ms:whale:{}:{}", market.market_id, hours);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || {
                self.compute_whales(market, hours)
            })
            .await
    }

    /// Multi-horizon momentum composite.
    pub async fn momentum(&self, market: &MarketMeta) -> MomentumReport {
        let key = format!("ms:mom:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_momentum(market))
            .await
    }

    // -------------------------------------------------------------------------
    // Computation
    // -------------------------------------------------------------------------

    async fn compute_flow(&self, market: &MarketMeta) -> OrderFlowReport {
        let trades = self.source.fetch_trades(market, self.trade_limit).await;
        let now = Utc::now().timestamp();

        let window_5m = trades_within(&trades, now, 5 * 60);
        let window_1h = trades_within(&trades, now, 3600);

        let stats_1h = flow_stats(&window_1h);
        let flow_score = round2(stats_1h.imbalance_ratio * 100.0);
        let flow_direction = if flow_score > 55.0 {
            FlowDirection::BuyDominant
        } else if flow_score < 45.0 {
            FlowDirection::SellDominant
        } else {
            FlowDirection::Neutral
        };

        let threshold = whale_threshold(&window_1h);
        let whale_trades_1h = window_1h
            .iter()
            .filter(|t| t.notional() >= threshold)
            .count();

        debug!(
            market = %market.ticker,
            flow_score = flow_score,
            whales_1h = whale_trades_1h,
            "order flow computed"
        );

        OrderFlowReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            flow_score,
            flow_direction,
            windows: FlowWindows {
                five_min: flow_stats(&window_5m),
                one_hour: stats_1h,
                all_fetched: flow_stats(&trades),
            },
            whale_trades_1h,
            whale_threshold_usd: round2(threshold),
        }
    }

    async fn compute_whales(&self, market: &MarketMeta, hours: u32) -> WhaleActivityReport {
        let trades = self.source.fetch_trades(market, self.trade_limit).await;
        let now = Utc::now().timestamp();
        let period = trades_within(&trades, now, hours as i64 * 3600);

        let threshold = whale_threshold(&period);
        let whales: Vec<&Trade> = period.iter().filter(|t| t.notional() >= threshold).collect();

        let mean_size = if period.is_empty() {
            1.0
        } else {
            mean(&period.iter().map(|t| t.notional()).collect::<Vec<_>>())
        };

        let buy_volume: f64 = whales
            .iter()
            .filter(|t| t.direction == TradeDirection::Buy)
            .map(|t| t.notional())
            .sum();
        let sell_volume: f64 = whales
            .iter()
            .filter(|t| t.direction == TradeDirection::Sell)
            .map(|t| t.notional())
            .sum();

        let records = whales
            .iter()
            .take(WHALE_RECORD_LIMIT)
            .map(|t| WhaleTradeRecord {
                timestamp: DateTime::<Utc>::from_timestamp(t.timestamp, 0)
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default(),
                side: t.direction,
                quantity: round_to(t.quantity, 4),
                price: round_to(t.price, 4),
                volume_usd: round2(t.notional()),
                size_multiple: if mean_size > 0.0 {
                    round_to(t.notional() / mean_size, 1)
                } else {
                    0.0
                },
            })
            .collect();

        WhaleActivityReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            whale_threshold_usd: round2(threshold),
            period_hours: hours,
            total_whale_trades: whales.len(),
            whale_buy_volume_usd: round2(buy_volume),
            whale_sell_volume_usd: round2(sell_volume),
            trades: records,
        }
    }

    async fn compute_momentum(&self, market: &MarketMeta) -> MomentumReport {
        let trades = self.source.fetch_trades(market, self.trade_limit).await;
        let summary = self.source.fetch_market_summary(market).await;
        let now = Utc::now().timestamp();

        let window_5m = trades_within(&trades, now, 5 * 60);
        let window_1h = trades_within(&trades, now, 3600);

        let price_now = trades.first().map(|t| t.price).unwrap_or(0.0);
        let change_5m = window_change_pct(&window_5m, price_now);
        let change_1h = window_change_pct(&window_1h, price_now);
        let change_24h = summary.change_pct;

        let volume_trend = volume_trend(&trades);

        let buy_ratio = if window_1h.is_empty() {
            0.5
        } else {
            let buys = window_1h
                .iter()
                .filter(|t| t.direction == TradeDirection::Buy)
                .count();
            buys as f64 / window_1h.len() as f64
        };
        let flow_bias = (buy_ratio - 0.5) * 2.0;

        let score = momentum_score(change_5m, change_1h, change_24h, flow_bias);

        debug!(
            market = %market.ticker,
            score = score,
            change_5m = format!("{change_5m:.3}"),
            change_1h = format!("{change_1h:.3}"),
            "momentum computed"
        );

        MomentumReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            momentum_score: score,
            momentum_label: momentum_label(score),
            indicators: MomentumIndicators {
                price_change_5m_pct: round_to(change_5m, 3),
                price_change_1h_pct: round_to(change_1h, 3),
                price_change_24h_pct: round_to(change_24h, 3),
                volume_trend,
                trade_flow_bias: round_to(flow_bias, 3),
            },
        }
    }
}

// =============================================================================
// Pure helpers
// =============================================================================

/// Trades no older than `window_secs` as of `now` (epoch seconds).
pub fn trades_within(trades: &[Trade], now: i64, window_secs: i64) -> Vec<Trade> {
    trades
        .iter()
        .filter(|t| t.timestamp >= now - window_secs)
        .copied()
        .collect()
}

/// Buy/sell volume aggregation for one window. The imbalance ratio defaults
/// to 0.5 when the window carries no volume.
pub fn flow_stats(trades: &[Trade]) -> FlowWindowStats {
    let mut buy_volume = 0.0;
    let mut sell_volume = 0.0;
    let mut buy_count = 0;
    let mut sell_count = 0;

    for t in trades {
        match t.direction {
            TradeDirection::Buy => {
                buy_volume += t.notional();
                buy_count += 1;
            }
            TradeDirection::Sell => {
                sell_volume += t.notional();
                sell_count += 1;
            }
        }
    }

    let total = buy_volume + sell_volume;
    let imbalance_ratio = if total > 0.0 {
        round_to(buy_volume / total, 3)
    } else {
        0.5
    };

    FlowWindowStats {
        buy_volume_usd: round2(buy_volume),
        sell_volume_usd: round2(sell_volume),
        buy_count,
        sell_count,
        net_flow_usd: round2(buy_volume - sell_volume),
        imbalance_ratio,
    }
}

/// Whale-size threshold: the 95th percentile of trade notionals in the
/// window, falling back to 3x the mean when the percentile sample is
/// unusable, floored at [`WHALE_THRESHOLD_FLOOR_USD`]. An empty window
/// yields the floor.
pub fn whale_threshold(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return WHALE_THRESHOLD_FLOOR_USD;
    }

    let mut sizes: Vec<f64> = trades.iter().map(|t| t.notional()).collect();
    sizes.sort_by(|a, b| a.partial_cmp(b).expect("notionals are finite"));

    let idx = (sizes.len() as f64 * 0.95).floor() as usize;
    let p95 = sizes
        .get(idx)
        .copied()
        .filter(|v| *v > 0.0)
        .unwrap_or_else(|| mean(&sizes) * 3.0);

    p95.max(WHALE_THRESHOLD_FLOOR_USD)
}

/// Percentage change from the oldest in-window price to `price_now`.
fn window_change_pct(window: &[Trade], price_now: f64) -> f64 {
    // Windows inherit newest-first ordering, so the oldest trade is last.
    let base = window.last().map(|t| t.price).unwrap_or(price_now);
    if base > 0.0 {
        (price_now - base) / base * 100.0
    } else {
        0.0
    }
}

/// Compare notional volume of the newer half of the batch against the older
/// half; beyond ±15% relative change the trend is labeled.
fn volume_trend(trades: &[Trade]) -> VolumeTrend {
    let half = trades.len() / 2;
    let newer: f64 = trades[..half].iter().map(|t| t.notional()).sum();
    let older: f64 = trades[half..].iter().map(|t| t.notional()).sum();

    if older > 0.0 {
        let change = (newer - older) / older;
        if change > VOLUME_TREND_BAND {
            return VolumeTrend::Increasing;
        }
        if change < -VOLUME_TREND_BAND {
            return VolumeTrend::Decreasing;
        }
    }
    VolumeTrend::Stable
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;
    use crate::types::{ExecutionRole, MarketMeta, MarketType, OrderBook};

    fn trade(price: f64, quantity: f64, timestamp: i64, direction: TradeDirection) -> Trade {
        Trade {
            price,
            quantity,
            timestamp,
            direction,
            execution_role: ExecutionRole::Taker,
        }
    }

    fn market() -> MarketMeta {
        MarketMeta::new("0x1", "INJ/USDT", MarketType::Spot)
    }

    fn analyzer(trades: Vec<Trade>) -> MicrostructureAnalyzer {
        let config = EngineConfig::default();
        MicrostructureAnalyzer::new(
            &config,
            Arc::new(StaticSource::new(OrderBook::empty(0), trades)),
            Arc::new(ComputationCache::new()),
        )
    }

    // ---- flow_stats ------------------------------------------------------

    #[test]
    fn flow_stats_empty_window_is_neutral() {
        let stats = flow_stats(&[]);
        assert_eq!(stats.imbalance_ratio, 0.5);
        assert_eq!(stats.buy_count, 0);
        assert_eq!(stats.net_flow_usd, 0.0);
    }

    #[test]
    fn flow_stats_aggregates_by_direction() {
        let trades = vec![
            trade(100.0, 3.0, 0, TradeDirection::Buy),
            trade(100.0, 1.0, 0, TradeDirection::Sell),
        ];
        let stats = flow_stats(&trades);
        assert_eq!(stats.buy_volume_usd, 300.0);
        assert_eq!(stats.sell_volume_usd, 100.0);
        assert_eq!(stats.net_flow_usd, 200.0);
        assert_eq!(stats.imbalance_ratio, 0.75);
    }

    // ---- whale_threshold -------------------------------------------------

    #[test]
    fn whale_threshold_floor_on_empty_window() {
        assert_eq!(whale_threshold(&[]), WHALE_THRESHOLD_FLOOR_USD);
    }

    #[test]
    fn whale_threshold_never_below_floor() {
        // All tiny trades: p95 well under the floor.
        let trades: Vec<Trade> = (0..100)
            .map(|i| trade(1.0, 1.0, i, TradeDirection::Buy))
            .collect();
        assert_eq!(whale_threshold(&trades), WHALE_THRESHOLD_FLOOR_USD);
    }

    #[test]
    fn whale_threshold_tracks_p95_on_large_trades() {
        // Notionals 1_000, 2_000, ..., 100_000.
        let trades: Vec<Trade> = (1..=100)
            .map(|i| trade(1_000.0, i as f64, i, TradeDirection::Buy))
            .collect();
        let threshold = whale_threshold(&trades);
        // p95 of the sorted sizes = 96_000.
        assert!((threshold - 96_000.0).abs() < 1e-9);
    }

    // ---- trades_within ---------------------------------------------------

    #[test]
    fn trades_within_filters_by_age() {
        let now = 10_000;
        let trades = vec![
            trade(1.0, 1.0, now - 10, TradeDirection::Buy),
            trade(1.0, 1.0, now - 400, TradeDirection::Buy),
            trade(1.0, 1.0, now - 4000, TradeDirection::Buy),
        ];
        assert_eq!(trades_within(&trades, now, 300).len(), 1);
        assert_eq!(trades_within(&trades, now, 3600).len(), 2);
        assert_eq!(trades_within(&trades, now, 36_000).len(), 3);
    }

    // ---- volume_trend ----------------------------------------------------

    #[test]
    fn volume_trend_detects_increase() {
        // Newer half (first elements) carries twice the volume.
        let mut trades = Vec::new();
        for i in 0..10 {
            trades.push(trade(100.0, 2.0, 100 - i, TradeDirection::Buy));
        }
        for i in 10..20 {
            trades.push(trade(100.0, 1.0, 100 - i, TradeDirection::Buy));
        }
        assert_eq!(volume_trend(&trades), VolumeTrend::Increasing);
    }

    #[test]
    fn volume_trend_stable_within_band() {
        let trades: Vec<Trade> = (0..20)
            .map(|i| trade(100.0, 1.0, 100 - i, TradeDirection::Buy))
            .collect();
        assert_eq!(volume_trend(&trades), VolumeTrend::Stable);
        assert_eq!(volume_trend(&[]), VolumeTrend::Stable);
    }

    // ---- reports ---------------------------------------------------------

    #[tokio::test]
    async fn flow_report_buy_dominant() {
        let now = Utc::now().timestamp();
        let trades: Vec<Trade> = (0..20)
            .map(|i| trade(100.0, 1.0, now - i, TradeDirection::Buy))
            .collect();
        let report = analyzer(trades).flow(&market()).await;
        assert_eq!(report.flow_score, 100.0);
        assert_eq!(report.flow_direction, FlowDirection::BuyDominant);
        assert_eq!(report.windows.one_hour.buy_count, 20);
        assert!(report.whale_threshold_usd >= WHALE_THRESHOLD_FLOOR_USD);
    }

    #[tokio::test]
    async fn flow_report_neutral_on_empty_batch() {
        let report = analyzer(vec![]).flow(&market()).await;
        assert_eq!(report.flow_score, 50.0);
        assert_eq!(report.flow_direction, FlowDirection::Neutral);
        assert_eq!(report.windows.all_fetched.imbalance_ratio, 0.5);
        assert_eq!(report.whale_trades_1h, 0);
    }

    #[tokio::test]
    async fn whale_report_filters_and_records() {
        let now = Utc::now().timestamp();
        let mut trades = vec![
            // One whale at 60k notional.
            trade(60_000.0, 1.0, now - 10, TradeDirection::Buy),
        ];
        for i in 0..50 {
            trades.push(trade(100.0, 1.0, now - 20 - i, TradeDirection::Sell));
        }
        let report = analyzer(trades).whales(&market(), 24).await;

        assert_eq!(report.period_hours, 24);
        assert_eq!(report.total_whale_trades, 1);
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].side, TradeDirection::Buy);
        assert!(report.whale_buy_volume_usd > 0.0);
        assert_eq!(report.whale_sell_volume_usd, 0.0);
        assert!(report.trades[0].size_multiple > 1.0);
    }

    #[tokio::test]
    async fn momentum_neutral_on_empty_batch() {
        let report = analyzer(vec![]).momentum(&market()).await;
        assert_eq!(report.momentum_score, 0.0);
        assert_eq!(report.momentum_label, "neutral");
        assert_eq!(report.indicators.trade_flow_bias, 0.0);
        assert_eq!(report.indicators.volume_trend, VolumeTrend::Stable);
    }

    #[tokio::test]
    async fn momentum_rises_with_price_and_buy_flow() {
        let now = Utc::now().timestamp();
        // Rising price over the last hour, all buys.
        let trades: Vec<Trade> = (0..60)
            .map(|i| trade(110.0 - i as f64 * 0.5, 1.0, now - i * 30, TradeDirection::Buy))
            .collect();
        let report = analyzer(trades).momentum(&market()).await;
        assert!(report.momentum_score > 15.0, "score {}", report.momentum_score);
        assert!(report.indicators.price_change_1h_pct > 0.0);
        assert_eq!(report.indicators.trade_flow_bias, 1.0);
    }
}
