use crate::{de::de_str_f64, error::DataError};
use fundflow_analysis::{Level, OrderBookSummary};
use serde::Deserialize;

/// Binance order book depth snapshot.
///
/// ### Raw Payload Examples
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints#order-book>
/// ```json
/// {
///   "lastUpdateId": 1027024,
///   "bids": [["4.00000000", "431.00000000"]],
///   "asks": [["4.00000200", "12.00000000"]]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct BinanceDepth {
    #[serde(default, rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<BinanceLevel>,
    pub asks: Vec<BinanceLevel>,
}

/// Binance `["price", "quantity"]` level pair.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
pub struct BinanceLevel(
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
);

impl From<BinanceLevel> for Level {
    fn from(BinanceLevel(price, quantity): BinanceLevel) -> Self {
        Level::new(price, quantity)
    }
}

impl BinanceDepth {
    pub fn summary(&self) -> OrderBookSummary {
        let bids = self.bids.iter().copied().map(Level::from).collect::<Vec<_>>();
        let asks = self.asks.iter().copied().map(Level::from).collect::<Vec<_>>();
        OrderBookSummary::from_levels(&bids, &asks)
    }
}

/// Decode a depth response body into an [`OrderBookSummary`].
pub fn parse_order_book(body: &str) -> Result<OrderBookSummary, DataError> {
    serde_json::from_str::<BinanceDepth>(body)
        .map(|depth| depth.summary())
        .map_err(|error| DataError::Decode(error.to_string()))
}
