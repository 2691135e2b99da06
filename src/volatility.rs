// =============================================================================
// Volatility Analyzer — Annualized volatility, regime classification, history
// =============================================================================
//
// Derives a chronological price series from the most recent trade batch and
// computes annualized log-return volatility over the full series and a
// one-hour sub-window. Every evaluation feeds the shared regime tracker so
// regime transitions accumulate across calls regardless of which report
// triggered them.
//
// Horizon note: the 7d figure mirrors the 24h figure — both derive from the
// same bounded trade batch upstream, and the field names are part of the
// stable report shape.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::cache::ComputationCache;
use crate::config::{CacheTtls, EngineConfig};
use crate::math::{
    annualized_volatility, log_returns, max_drawdown, round_to, HOURLY_PERIODS_PER_YEAR,
};
use crate::regime::{RegimeTracker, RegimeTransition};
use crate::scoring::{regime_confidence, volatility_regime, volatility_score};
use crate::source::MarketDataSource;
use crate::types::{MarketMeta, ReportHeader, Trade, VolatilityRegime};

/// Samples per window in the volatility history report.
const HISTORY_WINDOW: usize = 20;

// =============================================================================
// Report types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityMetrics {
    pub volatility_1h_annualized: f64,
    pub volatility_24h_annualized: f64,
    pub volatility_7d_annualized: f64,
    pub current_return_1h_pct: f64,
    pub max_drawdown_24h_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub volatility_score: f64,
    pub regime: VolatilityRegime,
    pub regime_confidence: f64,
    pub metrics: VolatilityMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdBand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegimeThresholds {
    pub low: ThresholdBand,
    pub medium: ThresholdBand,
    pub high: ThresholdBand,
    pub extreme: ThresholdBand,
}

impl RegimeThresholds {
    fn standard() -> Self {
        Self {
            low: ThresholdBand {
                min: None,
                max: Some(20.0),
            },
            medium: ThresholdBand {
                min: Some(20.0),
                max: Some(50.0),
            },
            high: ThresholdBand {
                min: Some(50.0),
                max: Some(80.0),
            },
            extreme: ThresholdBand {
                min: Some(80.0),
                max: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegimeMetrics {
    pub volatility_1h_annualized: f64,
    pub volatility_24h_annualized: f64,
    pub volatility_7d_annualized: f64,
    pub regime_thresholds: RegimeThresholds,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegimeReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub regime: VolatilityRegime,
    pub regime_confidence: f64,
    pub regime_since: String,
    pub regime_duration_hours: f64,
    pub metrics: RegimeMetrics,
    pub previous_regime: Option<RegimeTransition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityPoint {
    pub timestamp: String,
    pub volatility_annualized: f64,
    pub regime: VolatilityRegime,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityHistoryReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub period: String,
    pub data_points: Vec<VolatilityPoint>,
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct VolatilityAnalyzer {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<ComputationCache>,
    regimes: Arc<RegimeTracker>,
    ttls: CacheTtls,
    data_source: String,
    trade_limit: usize,
}

impl VolatilityAnalyzer {
    pub fn new(
        config: &EngineConfig,
        source: Arc<dyn MarketDataSource>,
        cache: Arc<ComputationCache>,
        regimes: Arc<RegimeTracker>,
    ) -> Self {
        Self {
            source,
            cache,
            regimes,
            ttls: config.cache,
            data_source: config.data_source_label(),
            trade_limit: config.trade_fetch_limit,
        }
    }

    /// Current volatility snapshot: score, regime, drawdown.
    pub async fn current(&self, market: &MarketMeta) -> VolatilityReport {
        let key = format!("vol:cur:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_current(market))
            .await
    }

    /// Regime report with transition state and band thresholds.
    pub async fn regime(&self, market: &MarketMeta) -> RegimeReport {
        let key = format!("vol:reg:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || self.compute_regime(market))
            .await
    }

    /// Windowed volatility history over the fetched trade batch.
    pub async fn history(&self, market: &MarketMeta, period: &str) -> VolatilityHistoryReport {
        let key = format!("vol:hist:{}:{}", market.market_id, period);
        self.cache
            .get_or_compute(&key, self.ttls.history(), || {
                self.compute_history(market, period)
            })
            .await
    }

    // -------------------------------------------------------------------------
    // Computation
    // -------------------------------------------------------------------------

    async fn compute_current(&self, market: &MarketMeta) -> VolatilityReport {
        let trades = self.source.fetch_trades(market, self.trade_limit).await;
        let now = Utc::now();

        let series = price_series(&trades);
        let prices: Vec<f64> = series.iter().map(|(p, _)| *p).collect();
        let vol_24h = annualized_volatility(&log_returns(&prices), HOURLY_PERIODS_PER_YEAR);

        let hour_prices = hour_window_prices(&series, now);
        let vol_1h = annualized_volatility(&log_returns(&hour_prices), HOURLY_PERIODS_PER_YEAR);
        let return_1h = if hour_prices.len() >= 2 && hour_prices[0] > 0.0 {
            (hour_prices[hour_prices.len() - 1] - hour_prices[0]) / hour_prices[0] * 100.0
        } else {
            0.0
        };

        let drawdown = max_drawdown(&prices);
        let regime = volatility_regime(vol_24h);
        self.regimes.observe(&market.market_id, regime);

        debug!(
            market = %market.ticker,
            vol_24h = format!("{vol_24h:.1}"),
            regime = %regime,
            "volatility snapshot computed"
        );

        VolatilityReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            volatility_score: volatility_score(vol_24h),
            regime,
            regime_confidence: regime_confidence(vol_24h),
            metrics: VolatilityMetrics {
                volatility_1h_annualized: round_to(vol_1h, 1),
                volatility_24h_annualized: round_to(vol_24h, 1),
                volatility_7d_annualized: round_to(vol_24h, 1),
                current_return_1h_pct: round_to(return_1h, 2),
                max_drawdown_24h_pct: round_to(drawdown, 2),
            },
        }
    }

    async fn compute_regime(&self, market: &MarketMeta) -> RegimeReport {
        let trades = self.source.fetch_trades(market, self.trade_limit).await;
        let now = Utc::now();

        let series = price_series(&trades);
        let prices: Vec<f64> = series.iter().map(|(p, _)| *p).collect();
        let vol_24h = annualized_volatility(&log_returns(&prices), HOURLY_PERIODS_PER_YEAR);
        let hour_prices = hour_window_prices(&series, now);
        let vol_1h = annualized_volatility(&log_returns(&hour_prices), HOURLY_PERIODS_PER_YEAR);

        let regime = volatility_regime(vol_24h);
        let state = self.regimes.observe(&market.market_id, regime);

        RegimeReport {
            header: ReportHeader::new(market, self.ttls.computed_secs, &self.data_source),
            regime: state.current,
            regime_confidence: regime_confidence(vol_24h),
            regime_since: state.since.to_rfc3339(),
            regime_duration_hours: round_to(state.duration_hours(now), 2),
            metrics: RegimeMetrics {
                volatility_1h_annualized: round_to(vol_1h, 1),
                volatility_24h_annualized: round_to(vol_24h, 1),
                volatility_7d_annualized: round_to(vol_24h, 1),
                regime_thresholds: RegimeThresholds::standard(),
            },
            previous_regime: state.previous,
        }
    }

    async fn compute_history(&self, market: &MarketMeta, period: &str) -> VolatilityHistoryReport {
        let trades = self.source.fetch_trades(market, self.trade_limit).await;
        let series = price_series(&trades);

        let mut data_points = Vec::new();
        let mut end = HISTORY_WINDOW;
        while end <= series.len() {
            let window = &series[end - HISTORY_WINDOW..end];
            let prices: Vec<f64> = window.iter().map(|(p, _)| *p).collect();
            let vol = annualized_volatility(&log_returns(&prices), HOURLY_PERIODS_PER_YEAR);
            let (close, close_ts) = *window.last().expect("window is non-empty");

            data_points.push(VolatilityPoint {
                timestamp: DateTime::<Utc>::from_timestamp(close_ts, 0)
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default(),
                volatility_annualized: round_to(vol, 1),
                regime: volatility_regime(vol),
                price: round_to(close, 4),
            });
            end += HISTORY_WINDOW;
        }

        VolatilityHistoryReport {
            header: ReportHeader::new(market, self.ttls.history_secs(), &self.data_source),
            period: period.to_string(),
            data_points,
        }
    }
}

// =============================================================================
// Pure helpers
// =============================================================================

/// Chronological (oldest-first) series of positive trade prices with their
/// epoch-second timestamps, from a newest-first batch.
pub fn price_series(trades: &[Trade]) -> Vec<(f64, i64)> {
    trades
        .iter()
        .filter(|t| t.price > 0.0)
        .map(|t| (t.price, t.timestamp))
        .rev()
        .collect()
}

/// Prices from the last hour of the series, as of `now`.
fn hour_window_prices(series: &[(f64, i64)], now: DateTime<Utc>) -> Vec<f64> {
    let cutoff = now.timestamp() - 3600;
    series
        .iter()
        .filter(|(_, ts)| *ts > cutoff)
        .map(|(p, _)| *p)
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;
    use crate::types::{ExecutionRole, MarketType, OrderBook, TradeDirection};

    fn trade(price: f64, timestamp: i64) -> Trade {
        Trade {
            price,
            quantity: 1.0,
            timestamp,
            direction: TradeDirection::Buy,
            execution_role: ExecutionRole::Taker,
        }
    }

    fn market() -> MarketMeta {
        MarketMeta::new("0x1", "INJ/USDT", MarketType::Spot)
    }

    fn analyzer(trades: Vec<Trade>) -> VolatilityAnalyzer {
        let config = EngineConfig::default();
        let cache = Arc::new(ComputationCache::new());
        VolatilityAnalyzer::new(
            &config,
            Arc::new(StaticSource::new(OrderBook::empty(0), trades)),
            cache,
            RegimeTracker::new(),
        )
    }

    // ---- price_series ----------------------------------------------------

    #[test]
    fn price_series_reverses_and_filters() {
        let trades = vec![trade(103.0, 30), trade(0.0, 20), trade(101.0, 10)];
        let series = price_series(&trades);
        assert_eq!(series, vec![(101.0, 10), (103.0, 30)]);
    }

    #[test]
    fn price_series_empty_input() {
        assert!(price_series(&[]).is_empty());
    }

    // ---- reports ---------------------------------------------------------

    #[tokio::test]
    async fn current_degrades_on_empty_trades() {
        let report = analyzer(vec![]).current(&market()).await;
        assert_eq!(report.volatility_score, 0.0);
        assert_eq!(report.regime, VolatilityRegime::Low);
        assert_eq!(report.metrics.volatility_24h_annualized, 0.0);
        assert_eq!(report.metrics.max_drawdown_24h_pct, 0.0);
        assert_eq!(report.metrics.current_return_1h_pct, 0.0);
    }

    #[tokio::test]
    async fn flat_prices_are_low_regime() {
        let now = Utc::now().timestamp();
        let trades: Vec<Trade> = (0..50).map(|i| trade(100.0, now - i)).collect();
        let report = analyzer(trades).current(&market()).await;
        assert_eq!(report.regime, VolatilityRegime::Low);
        assert_eq!(report.metrics.volatility_24h_annualized, 0.0);
        // 24h and 7d figures mirror each other.
        assert_eq!(
            report.metrics.volatility_24h_annualized,
            report.metrics.volatility_7d_annualized
        );
    }

    #[tokio::test]
    async fn current_observes_regime_into_tracker() {
        let config = EngineConfig::default();
        let tracker = RegimeTracker::new();
        let now = Utc::now().timestamp();
        let trades: Vec<Trade> = (0..50).map(|i| trade(100.0, now - i)).collect();
        let analyzer = VolatilityAnalyzer::new(
            &config,
            Arc::new(StaticSource::new(OrderBook::empty(0), trades)),
            Arc::new(ComputationCache::new()),
            tracker.clone(),
        );

        let _ = analyzer.current(&market()).await;
        let state = tracker.state("0x1").expect("tracker was fed");
        assert_eq!(state.current, VolatilityRegime::Low);
    }

    #[tokio::test]
    async fn regime_report_carries_thresholds_and_state() {
        let report = analyzer(vec![]).regime(&market()).await;
        assert_eq!(report.regime, VolatilityRegime::Low);
        assert_eq!(report.metrics.regime_thresholds.low.max, Some(20.0));
        assert_eq!(report.metrics.regime_thresholds.extreme.min, Some(80.0));
        assert!(report.previous_regime.is_none());
        assert!(!report.regime_since.is_empty());
    }

    #[tokio::test]
    async fn history_partitions_into_fixed_windows() {
        let now = Utc::now().timestamp();
        // 45 chronological samples => two complete 20-sample windows.
        let trades: Vec<Trade> = (0..45)
            .map(|i| trade(100.0 + i as f64 * 0.1, now - i))
            .collect();
        let report = analyzer(trades).history(&market(), "7d").await;
        assert_eq!(report.data_points.len(), 2);
        assert_eq!(report.period, "7d");
        // Points are ordered by time.
        assert!(report.data_points[0].timestamp <= report.data_points[1].timestamp);
        for p in &report.data_points {
            assert!(p.price > 0.0);
        }
    }

    #[tokio::test]
    async fn history_on_sparse_series_is_empty() {
        let now = Utc::now().timestamp();
        let trades: Vec<Trade> = (0..10).map(|i| trade(100.0, now - i)).collect();
        let report = analyzer(trades).history(&market(), "24h").await;
        assert!(report.data_points.is_empty());
    }
}
