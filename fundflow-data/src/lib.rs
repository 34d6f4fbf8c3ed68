//! # Fundflow Data
//! Market data source for the fundflow analysis engine.
//!
//! Fetches closed candle series and full depth order book snapshots from the Binance
//! spot and USD-M futures REST APIs, enriching them into the
//! [`Candle`](fundflow_analysis::Candle) and
//! [`OrderBookSummary`](fundflow_analysis::OrderBookSummary) models consumed by the
//! classifiers.
//!
//! The [`MarketDataSource`] trait is the seam between the analysis pipeline and the
//! network, so alternative venues or in-memory fixtures can be swapped in.

use async_trait::async_trait;
use fundflow_analysis::{Candle, Interval, OrderBookSummary};

/// Binance REST client and payload models.
pub mod binance;

/// All errors generated in `fundflow-data`.
pub mod error;

/// Custom deserialisers for exchange payloads.
pub mod de;

/// Market kinds a symbol can be analysed on.
pub mod market;

pub use binance::{BinanceConfig, BinanceRestClient};
pub use error::DataError;
pub use market::MarketKind;

/// Source of closed candles and order book snapshots for a symbol.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the most recent `limit` closed candles, oldest first.
    ///
    /// The in-progress bar is never included.
    async fn candles(
        &self,
        symbol: &str,
        market: MarketKind,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError>;

    /// Fetch and summarise an order book snapshot of up to `depth` levels per side.
    async fn order_book(
        &self,
        symbol: &str,
        market: MarketKind,
        depth: usize,
    ) -> Result<OrderBookSummary, DataError>;
}
