// =============================================================================
// Shared types used across the Market Pulse analytics engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Whether a market is a spot pair or a derivative (perp/futures) contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Derivative,
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Derivative => write!(f, "derivative"),
        }
    }
}

/// Metadata for a single tradable market, resolved by the discovery layer
/// upstream of this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMeta {
    pub market_id: String,
    pub ticker: String,
    pub market_type: MarketType,
    #[serde(default)]
    pub base_symbol: String,
    #[serde(default)]
    pub quote_symbol: String,
}

impl MarketMeta {
    pub fn new(
        market_id: impl Into<String>,
        ticker: impl Into<String>,
        market_type: MarketType,
    ) -> Self {
        let ticker = ticker.into();
        let mut parts = ticker.split('/');
        let base = parts.next().unwrap_or("").trim().to_string();
        let quote = parts
            .next()
            .unwrap_or("")
            .replace("PERP", "")
            .trim()
            .to_string();
        Self {
            market_id: market_id.into(),
            ticker,
            market_type,
            base_symbol: base,
            quote_symbol: quote,
        }
    }
}

/// One resting level of an order book.
///
/// Invariant: `price` is positive and `quantity` non-negative; the source
/// adapter coerces anything malformed to zero before it reaches an analyzer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
    /// Epoch milliseconds at which the level was last updated.
    pub timestamp: i64,
}

impl OrderBookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self {
            price,
            quantity,
            timestamp: 0,
        }
    }

    /// Notional value of this level in quote currency.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// A full order book snapshot.
///
/// `buys` are sorted best-first (descending price), `sells` best-first
/// (ascending price). Either side may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub buys: Vec<OrderBookLevel>,
    pub sells: Vec<OrderBookLevel>,
    /// Epoch milliseconds at which the snapshot was fetched.
    pub fetched_at: i64,
}

impl OrderBook {
    /// An empty book, the degraded output when the upstream fetch fails.
    pub fn empty(fetched_at: i64) -> Self {
        Self {
            buys: Vec::new(),
            sells: Vec::new(),
            fetched_at,
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.buys.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.sells.first().map(|l| l.price)
    }

    /// Total number of resting levels across both sides.
    pub fn level_count(&self) -> usize {
        self.buys.len() + self.sells.len()
    }
}

/// Taker direction of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Which side of the book the counterparty provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionRole {
    Maker,
    Taker,
}

/// A single executed trade.
///
/// Batches are ordered newest-first, bounded by the caller-supplied fetch
/// limit. Timestamps are epoch seconds (normalized at the source boundary).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub quantity: f64,
    pub timestamp: i64,
    pub direction: TradeDirection,
    pub execution_role: ExecutionRole,
}

impl Trade {
    /// Notional value in quote currency.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// 24h-style rollup derived upstream from a trade batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarketSummary {
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub change_pct: f64,
}

/// Side of a simulated order, from the taker's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Discrete volatility classification bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
    Extreme,
}

impl std::fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Extreme => write!(f, "extreme"),
        }
    }
}

/// Common envelope carried by every analyzer report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportHeader {
    pub market_id: String,
    pub market_name: String,
    pub market_type: MarketType,
    /// RFC 3339 generation time.
    pub timestamp: String,
    pub cache_ttl_seconds: u64,
    pub data_source: String,
}

impl ReportHeader {
    pub fn new(market: &MarketMeta, cache_ttl_seconds: u64, data_source: impl Into<String>) -> Self {
        Self {
            market_id: market.market_id.clone(),
            market_name: market.ticker.clone(),
            market_type: market.market_type,
            timestamp: chrono::Utc::now().to_rfc3339(),
            cache_ttl_seconds,
            data_source: data_source.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_meta_splits_ticker() {
        let m = MarketMeta::new("0xabc", "INJ/USDT", MarketType::Spot);
        assert_eq!(m.base_symbol, "INJ");
        assert_eq!(m.quote_symbol, "USDT");
    }

    #[test]
    fn market_meta_strips_perp_suffix() {
        let m = MarketMeta::new("0xdef", "BTC/USDT PERP", MarketType::Derivative);
        assert_eq!(m.base_symbol, "BTC");
        assert_eq!(m.quote_symbol, "USDT");
    }

    #[test]
    fn orderbook_best_prices() {
        let book = OrderBook {
            buys: vec![OrderBookLevel::new(100.0, 2.0), OrderBookLevel::new(99.0, 1.0)],
            sells: vec![OrderBookLevel::new(101.0, 2.0)],
            fetched_at: 0,
        };
        assert_eq!(book.best_bid(), Some(100.0));
        assert_eq!(book.best_ask(), Some(101.0));
        assert_eq!(book.level_count(), 3);
    }

    #[test]
    fn empty_book_has_no_best_prices() {
        let book = OrderBook::empty(0);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn trade_notional() {
        let t = Trade {
            price: 25.0,
            quantity: 4.0,
            timestamp: 0,
            direction: TradeDirection::Buy,
            execution_role: ExecutionRole::Taker,
        };
        assert!((t.notional() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn enum_serde_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&MarketType::Spot).unwrap(), "\"spot\"");
        assert_eq!(
            serde_json::to_string(&TradeDirection::Sell).unwrap(),
            "\"sell\""
        );
        assert_eq!(
            serde_json::to_string(&VolatilityRegime::Extreme).unwrap(),
            "\"extreme\""
        );
    }
}
