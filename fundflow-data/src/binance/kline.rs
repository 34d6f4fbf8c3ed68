use crate::{de::de_str_f64, error::DataError};
use chrono::{DateTime, Utc};
use fundflow_analysis::{Bar, Candle, VolumeSplit};
use serde::{Deserialize, de::IgnoredAny};

/// Binance kline row.
///
/// ### Raw Payload Examples
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints#klinecandlestick-data>
/// ```json
/// [
///   1499040000000,
///   "0.01634790",
///   "0.80000000",
///   "0.01575800",
///   "0.01577100",
///   "148976.11427815",
///   1499644799999,
///   "2434.19055334",
///   308,
///   "1756.87402397",
///   "28.46694368",
///   "0"
/// ]
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct BinanceKline(
    pub i64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    pub i64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

impl BinanceKline {
    pub fn open_time_ms(&self) -> i64 {
        self.0
    }

    pub fn close_time_ms(&self) -> i64 {
        self.6
    }

    /// Convert into a raw [`Bar`], validating the timestamps.
    pub fn into_bar(self, symbol: &str) -> Result<Bar, DataError> {
        let open_time = timestamp(symbol, self.0, "open time")?;
        let close_time = timestamp(symbol, self.6, "close time")?;

        Ok(Bar {
            open_time,
            close_time,
            open: self.1,
            high: self.2,
            low: self.3,
            close: self.4,
            volume: self.5,
            quote_volume: self.7,
        })
    }
}

fn timestamp(symbol: &str, millis: i64, field: &str) -> Result<DateTime<Utc>, DataError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| DataError::InvalidBar {
        symbol: symbol.to_string(),
        reason: format!("{field} {millis} out of range"),
    })
}

/// Decode a kline response body into enriched closed [`Candle`]s, oldest first.
///
/// The final row is the bar still in progress and is dropped, then at most `limit`
/// of the most recent rows are kept.
pub fn parse_closed_candles(
    symbol: &str,
    body: &str,
    limit: usize,
    split: VolumeSplit,
) -> Result<Vec<Candle>, DataError> {
    let mut rows = serde_json::from_str::<Vec<BinanceKline>>(body)
        .map_err(|error| DataError::Decode(error.to_string()))?;

    rows.pop();
    let skip = rows.len().saturating_sub(limit);

    rows.into_iter()
        .skip(skip)
        .map(|row| row.into_bar(symbol).map(|bar| Candle::enrich(bar, split)))
        .collect()
}
