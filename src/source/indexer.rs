// =============================================================================
// Injective Indexer Source — REST client with tolerant payload parsing
// =============================================================================
//
// Fetches order books and trade batches from the Injective indexer REST API
// and adapts the wire records into the crate's typed model. All numeric wire
// fields are decimal strings (sometimes bare numbers); anything missing or
// malformed parses to 0 rather than failing the batch. Trade timestamps
// arrive in epoch milliseconds and are normalized to seconds here, once, so
// every analyzer window filter operates on seconds.
//
// Each fetch is wrapped in the shared computation cache under the raw-data
// TTL class, and degrades to empty data with a `warn!` when the upstream is
// unreachable.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::ComputationCache;
use crate::config::{CacheTtls, EngineConfig};
use crate::source::{summary_from_trades, MarketDataSource};
use crate::types::{
    ExecutionRole, MarketMeta, MarketSummary, MarketType, OrderBook, OrderBookLevel, Trade,
    TradeDirection,
};

/// Reqwest-backed source over the Injective indexer REST API.
pub struct IndexerSource {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<ComputationCache>,
    ttls: CacheTtls,
}

impl IndexerSource {
    pub fn new(config: &EngineConfig, cache: Arc<ComputationCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()
            .expect("failed to build reqwest client");

        debug!(base_url = %config.network.indexer_base_url(), "IndexerSource initialised");

        Self {
            client,
            base_url: config.network.indexer_base_url().to_string(),
            cache,
            ttls: config.cache,
        }
    }

    // -------------------------------------------------------------------------
    // Raw HTTP requests
    // -------------------------------------------------------------------------

    async fn request_orderbook(&self, market: &MarketMeta) -> Result<OrderBook> {
        let segment = match market.market_type {
            MarketType::Spot => "spot",
            MarketType::Derivative => "derivative",
        };
        let url = format!(
            "{}/api/exchange/{}/v2/orderbook/{}",
            self.base_url, segment, market.market_id
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET orderbook for {} failed", market.ticker))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse orderbook response body")?;

        if !status.is_success() {
            anyhow::bail!("indexer orderbook request returned {status}: {body}");
        }

        Ok(parse_orderbook_payload(&body))
    }

    async fn request_trades(&self, market: &MarketMeta, limit: usize) -> Result<Vec<Trade>> {
        let segment = match market.market_type {
            MarketType::Spot => "spot",
            MarketType::Derivative => "derivative",
        };
        let url = format!(
            "{}/api/exchange/{}/v1/trades?marketId={}&limit={}",
            self.base_url, segment, market.market_id, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET trades for {} failed", market.ticker))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse trades response body")?;

        if !status.is_success() {
            anyhow::bail!("indexer trades request returned {status}: {body}");
        }

        Ok(parse_trades_payload(&body))
    }
}

#[async_trait]
impl MarketDataSource for IndexerSource {
    async fn fetch_orderbook(&self, market: &MarketMeta) -> OrderBook {
        let key = format!("ob:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.orderbook(), || async {
                match self.request_orderbook(market).await {
                    Ok(book) => book,
                    Err(e) => {
                        warn!(market = %market.ticker, error = %e, "orderbook fetch failed, degrading to empty book");
                        OrderBook::empty(Utc::now().timestamp_millis())
                    }
                }
            })
            .await
    }

    async fn fetch_trades(&self, market: &MarketMeta, limit: usize) -> Vec<Trade> {
        let key = format!("tr:{}:{}", market.market_id, limit);
        self.cache
            .get_or_compute(&key, self.ttls.trades(), || async {
                match self.request_trades(market, limit).await {
                    Ok(trades) => trades,
                    Err(e) => {
                        warn!(market = %market.ticker, error = %e, "trades fetch failed, degrading to empty batch");
                        Vec::new()
                    }
                }
            })
            .await
    }

    async fn fetch_market_summary(&self, market: &MarketMeta) -> MarketSummary {
        let key = format!("sum:{}", market.market_id);
        self.cache
            .get_or_compute(&key, self.ttls.computed(), || async {
                let trades = self.fetch_trades(market, 200).await;
                summary_from_trades(&trades)
            })
            .await
    }
}

// =============================================================================
// Payload adapters
// =============================================================================

/// Parse an orderbook payload.
///
/// Expected shape:
/// ```json
/// {
///   "orderbook": {
///     "buys":  [{"price": "21.53", "quantity": "120.4", "timestamp": 1700000000000}],
///     "sells": [{"price": "21.55", "quantity": "80.0",  "timestamp": 1700000000000}]
///   }
/// }
/// ```
fn parse_orderbook_payload(body: &serde_json::Value) -> OrderBook {
    let root = if body.get("orderbook").is_some() {
        &body["orderbook"]
    } else {
        body
    };

    OrderBook {
        buys: parse_levels(&root["buys"]),
        sells: parse_levels(&root["sells"]),
        fetched_at: Utc::now().timestamp_millis(),
    }
}

fn parse_levels(value: &serde_json::Value) -> Vec<OrderBookLevel> {
    value
        .as_array()
        .map(|levels| {
            levels
                .iter()
                .map(|l| OrderBookLevel {
                    price: value_f64(&l["price"]),
                    quantity: value_f64(&l["quantity"]),
                    timestamp: value_i64(&l["timestamp"]),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a trades payload.
///
/// Spot trades carry a nested `price` object; derivative trades carry flat
/// `executionPrice`/`executionQuantity` fields. Both are handled here.
fn parse_trades_payload(body: &serde_json::Value) -> Vec<Trade> {
    body["trades"]
        .as_array()
        .map(|trades| {
            trades
                .iter()
                .map(|t| {
                    let price = if t["price"].is_object() {
                        value_f64(&t["price"]["price"])
                    } else {
                        value_f64(&t["executionPrice"])
                    };
                    let quantity = if t["price"].is_object() {
                        value_f64(&t["price"]["quantity"])
                    } else {
                        value_f64(&t["executionQuantity"])
                    };

                    Trade {
                        price,
                        quantity,
                        timestamp: epoch_seconds(value_i64(&t["executedAt"])),
                        direction: if t["tradeDirection"].as_str() == Some("sell") {
                            TradeDirection::Sell
                        } else {
                            TradeDirection::Buy
                        },
                        execution_role: if t["executionSide"].as_str() == Some("taker") {
                            ExecutionRole::Taker
                        } else {
                            ExecutionRole::Maker
                        },
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extract an `f64` from a JSON value that may be a decimal string, a bare
/// number, or missing. Malformed, non-finite, or negative input coerces to 0;
/// prices and quantities are never negative past this boundary.
fn value_f64(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed.max(0.0)
    } else {
        0.0
    }
}

fn value_i64(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        _ => 0,
    }
}

/// Normalize an epoch timestamp to seconds. The indexer reports milliseconds;
/// anything already second-scaled passes through untouched.
fn epoch_seconds(raw: i64) -> i64 {
    if raw > 1_000_000_000_000 {
        raw / 1000
    } else {
        raw
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_orderbook_payload() {
        let body = json!({
            "orderbook": {
                "buys": [{"price": "21.53", "quantity": "120.4", "timestamp": 1700000000000_i64}],
                "sells": [{"price": "21.55", "quantity": "80", "timestamp": "1700000000000"}]
            }
        });
        let book = parse_orderbook_payload(&body);
        assert_eq!(book.buys.len(), 1);
        assert_eq!(book.sells.len(), 1);
        assert!((book.buys[0].price - 21.53).abs() < 1e-10);
        assert!((book.sells[0].quantity - 80.0).abs() < 1e-10);
    }

    #[test]
    fn malformed_level_fields_coerce_to_zero() {
        let body = json!({
            "orderbook": {
                "buys": [{"price": "not-a-number", "quantity": null}],
                "sells": []
            }
        });
        let book = parse_orderbook_payload(&body);
        assert_eq!(book.buys[0].price, 0.0);
        assert_eq!(book.buys[0].quantity, 0.0);
    }

    #[test]
    fn missing_sides_yield_empty_book() {
        let book = parse_orderbook_payload(&json!({}));
        assert!(book.buys.is_empty());
        assert!(book.sells.is_empty());
    }

    #[test]
    fn parses_spot_trades_with_nested_price() {
        let body = json!({
            "trades": [{
                "price": {"price": "21.5", "quantity": "3"},
                "executedAt": 1700000000000_i64,
                "tradeDirection": "sell",
                "executionSide": "taker"
            }]
        });
        let trades = parse_trades_payload(&body);
        assert_eq!(trades.len(), 1);
        assert!((trades[0].price - 21.5).abs() < 1e-10);
        assert_eq!(trades[0].direction, TradeDirection::Sell);
        assert_eq!(trades[0].execution_role, ExecutionRole::Taker);
        // Milliseconds normalized to seconds.
        assert_eq!(trades[0].timestamp, 1_700_000_000);
    }

    #[test]
    fn parses_derivative_trades_with_flat_fields() {
        let body = json!({
            "trades": [{
                "executionPrice": "43000.5",
                "executionQuantity": "0.1",
                "executedAt": "1700000000000",
                "tradeDirection": "buy",
                "executionSide": "maker"
            }]
        });
        let trades = parse_trades_payload(&body);
        assert_eq!(trades.len(), 1);
        assert!((trades[0].price - 43000.5).abs() < 1e-10);
        assert_eq!(trades[0].direction, TradeDirection::Buy);
        assert_eq!(trades[0].execution_role, ExecutionRole::Maker);
    }

    #[test]
    fn non_finite_and_negative_numerics_coerce_to_zero() {
        let body = json!({
            "orderbook": {
                "buys": [
                    {"price": "NaN", "quantity": "inf"},
                    {"price": "-5.0", "quantity": "2"}
                ],
                "sells": []
            }
        });
        let book = parse_orderbook_payload(&body);
        assert_eq!(book.buys[0].price, 0.0);
        assert_eq!(book.buys[0].quantity, 0.0);
        assert_eq!(book.buys[1].price, 0.0);
        assert_eq!(book.buys[1].quantity, 2.0);
    }

    #[test]
    fn second_scale_timestamps_pass_through() {
        assert_eq!(epoch_seconds(1_700_000_000), 1_700_000_000);
        assert_eq!(epoch_seconds(1_700_000_000_000), 1_700_000_000);
        assert_eq!(epoch_seconds(0), 0);
    }
}
