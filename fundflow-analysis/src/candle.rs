//! Candle model and proxy order-flow enrichment.
//!
//! Exchanges publish OHLCV bars without a buy/sell breakdown, so the directional
//! split used here is a heuristic: a bullish bar is assumed to be mostly buyers and
//! a bearish bar mostly sellers. The resulting `buy_volume`, `sell_volume` and
//! `net_inflow` are proxies, not measured order flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw OHLCV bar as delivered by a market data source.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset units traded in the interval
    pub volume: f64,
    /// Quote asset notional traded in the interval
    pub quote_volume: f64,
}

/// Share of a bar's volume attributed to the buy side.
///
/// Bullish bars (`close >= open`) use `bullish_buy_share`, bearish bars use the
/// complement. The default 60/40 split is what every downstream threshold was
/// tuned against.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct VolumeSplit {
    pub bullish_buy_share: f64,
}

impl Default for VolumeSplit {
    fn default() -> Self {
        Self {
            bullish_buy_share: 0.6,
        }
    }
}

impl VolumeSplit {
    /// Create a split with a custom bullish buy share, clamped to `[0, 1]`.
    pub fn new(bullish_buy_share: f64) -> Self {
        Self {
            bullish_buy_share: bullish_buy_share.clamp(0.0, 1.0),
        }
    }

    /// Buy share applied to a bar with the given open and close.
    pub fn buy_share(&self, open: f64, close: f64) -> f64 {
        if close >= open {
            self.bullish_buy_share
        } else {
            1.0 - self.bullish_buy_share
        }
    }
}

/// A closed candle enriched with proxy order-flow metrics.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    /// Estimated buy-side volume (heuristic, see [`VolumeSplit`])
    pub buy_volume: f64,
    /// Estimated sell-side volume (heuristic, see [`VolumeSplit`])
    pub sell_volume: f64,
    /// `(buy_volume - sell_volume) * close`, in quote units
    pub net_inflow: f64,
    /// `(close - open) / open * 100`
    pub price_change_pct: f64,
}

impl Candle {
    /// Enrich a raw [`Bar`] using the default 60/40 [`VolumeSplit`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        quote_volume: f64,
    ) -> Self {
        Self::enrich(
            Bar {
                open_time,
                close_time,
                open,
                high,
                low,
                close,
                volume,
                quote_volume,
            },
            VolumeSplit::default(),
        )
    }

    /// Enrich a raw [`Bar`] with the provided [`VolumeSplit`].
    pub fn enrich(bar: Bar, split: VolumeSplit) -> Self {
        let buy_share = split.buy_share(bar.open, bar.close);
        let buy_volume = bar.volume * buy_share;
        let sell_volume = bar.volume * (1.0 - buy_share);

        let price_change_pct = if bar.open != 0.0 {
            (bar.close - bar.open) / bar.open * 100.0
        } else {
            0.0
        };

        Self {
            open_time: bar.open_time,
            close_time: bar.close_time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            quote_volume: bar.quote_volume,
            buy_volume,
            sell_volume,
            net_inflow: (buy_volume - sell_volume) * bar.close,
            price_change_pct,
        }
    }

    /// True if the bar closed at or above its open.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(open: f64, close: f64, volume: f64) -> Bar {
        Bar {
            open_time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            close_time: Utc.timestamp_millis_opt(1_700_000_299_999).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume,
            quote_volume: volume * close,
        }
    }

    #[test]
    fn test_enrich_bullish_bar() {
        let candle = Candle::enrich(bar(100.0, 110.0, 10.0), VolumeSplit::default());

        assert!((candle.buy_volume - 6.0).abs() < 1e-9);
        assert!((candle.sell_volume - 4.0).abs() < 1e-9);
        assert!((candle.net_inflow - 220.0).abs() < 1e-9);
        assert!((candle.price_change_pct - 10.0).abs() < 1e-9);
        assert!(candle.is_bullish());
    }

    #[test]
    fn test_enrich_bearish_bar() {
        let candle = Candle::enrich(bar(100.0, 90.0, 10.0), VolumeSplit::default());

        assert!((candle.buy_volume - 4.0).abs() < 1e-9);
        assert!((candle.sell_volume - 6.0).abs() < 1e-9);
        assert!((candle.net_inflow + 180.0).abs() < 1e-9);
        assert!((candle.price_change_pct + 10.0).abs() < 1e-9);
        assert!(!candle.is_bullish());
    }

    #[test]
    fn test_flat_bar_counts_as_bullish() {
        let candle = Candle::enrich(bar(100.0, 100.0, 5.0), VolumeSplit::default());
        assert!(candle.net_inflow > 0.0);
        assert_eq!(candle.price_change_pct, 0.0);
    }

    #[test]
    fn test_buy_and_sell_volume_sum_to_volume() {
        for volume in [0.0, 1.0, 3.3, 1234.5678] {
            for (open, close) in [(1.0, 2.0), (2.0, 1.0)] {
                let candle = Candle::enrich(bar(open, close, volume), VolumeSplit::default());
                assert!((candle.buy_volume + candle.sell_volume - volume).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_custom_split_is_clamped_and_applied() {
        let split = VolumeSplit::new(0.75);
        let candle = Candle::enrich(bar(100.0, 101.0, 4.0), split);
        assert!((candle.buy_volume - 3.0).abs() < 1e-9);

        assert_eq!(VolumeSplit::new(1.5).bullish_buy_share, 1.0);
        assert_eq!(VolumeSplit::new(-0.2).bullish_buy_share, 0.0);
    }

    #[test]
    fn test_zero_open_has_zero_price_change() {
        let candle = Candle::enrich(bar(0.0, 1.0, 1.0), VolumeSplit::default());
        assert_eq!(candle.price_change_pct, 0.0);
    }
}
