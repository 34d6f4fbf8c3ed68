//! Order book snapshot summary.

use derive_more::Constructor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Single price level.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Default, Deserialize, Serialize, Constructor)]
pub struct Level {
    pub price: f64,
    pub quantity: f64,
}

impl Level {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Top-of-book price range.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PriceRange {
    pub highest_bid: f64,
    pub lowest_ask: f64,
    pub spread: f64,
    pub spread_pct: f64,
}

/// Aggregate statistics of one order book snapshot.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct OrderBookSummary {
    pub total_bid_qty: f64,
    pub total_ask_qty: f64,
    /// `(bid - ask) / (bid + ask)`, `0` if the book is empty
    pub imbalance: f64,
    /// Σ(price × quantity) over bids
    pub bid_pressure: f64,
    /// Σ(price × quantity) over asks
    pub ask_pressure: f64,
    /// `bid_pressure / ask_pressure`, `+inf` if there is no ask pressure
    #[serde(serialize_with = "ser_ratio", deserialize_with = "de_ratio")]
    pub pressure_ratio: f64,
    #[serde(default)]
    pub price_range: PriceRange,
}

impl OrderBookSummary {
    /// Summarise full depth bid and ask levels.
    pub fn from_levels(bids: &[Level], asks: &[Level]) -> Self {
        let total_bid_qty = bids.iter().map(|level| level.quantity).sum::<f64>();
        let total_ask_qty = asks.iter().map(|level| level.quantity).sum::<f64>();

        let total_qty = total_bid_qty + total_ask_qty;
        let imbalance = if total_qty > 0.0 {
            (total_bid_qty - total_ask_qty) / total_qty
        } else {
            0.0
        };

        let bid_pressure = bids.iter().map(Level::notional).sum::<f64>();
        let ask_pressure = asks.iter().map(Level::notional).sum::<f64>();
        let pressure_ratio = if ask_pressure > 0.0 {
            bid_pressure / ask_pressure
        } else {
            f64::INFINITY
        };

        Self {
            total_bid_qty,
            total_ask_qty,
            imbalance,
            bid_pressure,
            ask_pressure,
            pressure_ratio,
            price_range: PriceRange::from_levels(bids, asks),
        }
    }
}

impl PriceRange {
    fn from_levels(bids: &[Level], asks: &[Level]) -> Self {
        let highest_bid = bids.iter().map(|level| level.price).reduce(f64::max);
        let lowest_ask = asks.iter().map(|level| level.price).reduce(f64::min);

        match (highest_bid, lowest_ask) {
            (Some(highest_bid), Some(lowest_ask)) => {
                let spread = lowest_ask - highest_bid;
                Self {
                    highest_bid,
                    lowest_ask,
                    spread,
                    spread_pct: if highest_bid > 0.0 {
                        spread / highest_bid * 100.0
                    } else {
                        0.0
                    },
                }
            }
            (highest_bid, lowest_ask) => Self {
                highest_bid: highest_bid.unwrap_or_default(),
                lowest_ask: lowest_ask.unwrap_or_default(),
                spread: 0.0,
                spread_pct: 0.0,
            },
        }
    }
}

/// Serialise a ratio, writing non-finite values as the string `"Infinity"`.
pub fn ser_ratio<S>(ratio: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if ratio.is_finite() {
        serializer.serialize_f64(*ratio)
    } else {
        serializer.serialize_str("Infinity")
    }
}

/// Deserialise a ratio written by [`ser_ratio`].
pub fn de_ratio<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ratio {
        Number(f64),
        Text(String),
    }

    match Ratio::deserialize(deserializer)? {
        Ratio::Number(value) => Ok(value),
        Ratio::Text(text) => match text.as_str() {
            "Infinity" | "inf" | "+inf" => Ok(f64::INFINITY),
            other => other.parse::<f64>().map_err(serde::de::Error::custom),
        },
    }
}
