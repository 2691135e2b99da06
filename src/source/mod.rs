// =============================================================================
// Market Data Source — The upstream fetch boundary
// =============================================================================
//
// Analyzers never talk to the indexer directly; they depend on this trait so
// the real HTTP client and in-memory fixtures are interchangeable.
//
// The contract is infallible by design: implementations degrade to an empty
// book / empty trade list / zeroed summary when the upstream is unreachable,
// and the analyzers then naturally produce zero/neutral outputs. Retry and
// backoff live upstream of this crate, never here.

pub mod indexer;

use async_trait::async_trait;

use crate::types::{MarketMeta, MarketSummary, OrderBook, Trade};

pub use indexer::IndexerSource;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the current order book snapshot. Empty on upstream failure.
    async fn fetch_orderbook(&self, market: &MarketMeta) -> OrderBook;

    /// Fetch up to `limit` recent trades, newest-first. Empty on failure.
    async fn fetch_trades(&self, market: &MarketMeta, limit: usize) -> Vec<Trade>;

    /// Fetch the market summary rollup. Zeroed on failure.
    async fn fetch_market_summary(&self, market: &MarketMeta) -> MarketSummary;
}

/// Derive a summary rollup from a newest-first trade batch.
///
/// Zero-valued summary for an empty batch; `open` is the oldest positive
/// price in the batch, `price` the newest.
pub fn summary_from_trades(trades: &[Trade]) -> MarketSummary {
    if trades.is_empty() {
        return MarketSummary::default();
    }

    let prices: Vec<f64> = trades.iter().map(|t| t.price).filter(|p| *p > 0.0).collect();
    let price = prices.first().copied().unwrap_or(0.0);
    let open = prices.last().copied().unwrap_or(price);
    let high = prices.iter().copied().fold(f64::MIN, f64::max);
    let low = prices.iter().copied().fold(f64::MAX, f64::min);
    let volume: f64 = trades.iter().map(|t| t.notional()).sum();
    let change_pct = if open > 0.0 {
        (price - open) / open * 100.0
    } else {
        0.0
    };

    MarketSummary {
        price,
        open,
        high: if prices.is_empty() { 0.0 } else { high },
        low: if prices.is_empty() { 0.0 } else { low },
        volume,
        change_pct,
    }
}

/// A fixed in-memory source serving preset data.
///
/// Used by the test suites and useful for offline evaluation of the
/// analyzers against captured snapshots.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub book: OrderBook,
    pub trades: Vec<Trade>,
    pub summary: Option<MarketSummary>,
}

impl StaticSource {
    pub fn new(book: OrderBook, trades: Vec<Trade>) -> Self {
        Self {
            book,
            trades,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: MarketSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

#[async_trait]
impl MarketDataSource for StaticSource {
    async fn fetch_orderbook(&self, _market: &MarketMeta) -> OrderBook {
        self.book.clone()
    }

    async fn fetch_trades(&self, _market: &MarketMeta, limit: usize) -> Vec<Trade> {
        self.trades.iter().take(limit).copied().collect()
    }

    async fn fetch_market_summary(&self, _market: &MarketMeta) -> MarketSummary {
        self.summary
            .unwrap_or_else(|| summary_from_trades(&self.trades))
    }
}
