//! Per-symbol report assembly.
//!
//! Bundles the three classifier outputs with a candle summary and a spot vs
//! futures comparison into the document handed to narrative generators.

use crate::{
    anomaly::{AnomalyConfig, AnomalyReport, detect_anomalies},
    candle::Candle,
    interval::Interval,
    order_book::OrderBookSummary,
    pressure::{PressureAnalysis, analyze_pressure},
    trend::{TrendAnalysis, TrendConfig, analyze_trend},
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default number of closed candles requested per market.
pub const DEFAULT_KLINES_COUNT: usize = 50;

/// Classifier parameters applied to every market.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct AnalysisConfig {
    pub trend: TrendConfig,
    pub anomaly: AnomalyConfig,
}

/// Headline numbers of a candle series.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct KlinesSummary {
    pub first_time: Option<DateTime<Utc>>,
    pub last_time: Option<DateTime<Utc>>,
    /// Percent change from the first open to the last close
    pub price_change: f64,
    pub current_price: f64,
    pub total_volume: f64,
    pub total_quote_volume: f64,
}

impl KlinesSummary {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return Self::default();
        };

        Self {
            first_time: Some(first.open_time),
            last_time: Some(last.close_time),
            price_change: if first.open != 0.0 {
                (last.close - first.open) / first.open * 100.0
            } else {
                0.0
            },
            current_price: last.close,
            total_volume: candles.iter().map(|candle| candle.volume).sum(),
            total_quote_volume: candles.iter().map(|candle| candle.quote_volume).sum(),
        }
    }
}

/// Every classification for one symbol on one market.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct MarketAnalysis {
    pub klines_summary: KlinesSummary,
    pub funding_trend: TrendAnalysis,
    pub anomalies: AnomalyReport,
    pub order_book: OrderBookSummary,
    pub funding_pressure: PressureAnalysis,
}

impl MarketAnalysis {
    pub fn analyze(
        candles: &[Candle],
        order_book: OrderBookSummary,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            klines_summary: KlinesSummary::from_candles(candles),
            funding_trend: analyze_trend(candles, &config.trend),
            anomalies: detect_anomalies(candles, &config.anomaly),
            funding_pressure: analyze_pressure(candles, Some(&order_book)),
            order_book,
        }
    }
}

/// Pairwise spot vs futures comparison for one symbol.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct MarketComparison {
    /// `(spot_close - futures_close) / spot_close * 100`
    pub spot_vs_futures_price_diff: f64,
    /// Σ spot volume / Σ futures volume
    pub spot_vs_futures_volume_ratio: f64,
    pub spot_vs_futures_net_inflow_diff: f64,
}

impl MarketComparison {
    pub fn between(
        spot: &[Candle],
        futures: &[Candle],
        spot_trend: &TrendAnalysis,
        futures_trend: &TrendAnalysis,
    ) -> Self {
        let spot_vs_futures_price_diff = match (spot.last(), futures.last()) {
            (Some(spot), Some(futures)) if spot.close != 0.0 => {
                (spot.close - futures.close) / spot.close * 100.0
            }
            _ => 0.0,
        };

        let futures_volume = futures.iter().map(|candle| candle.volume).sum::<f64>();
        let spot_vs_futures_volume_ratio =
            if !spot.is_empty() && !futures.is_empty() && futures_volume > 0.0 {
                spot.iter().map(|candle| candle.volume).sum::<f64>() / futures_volume
            } else {
                0.0
            };

        Self {
            spot_vs_futures_price_diff,
            spot_vs_futures_volume_ratio,
            spot_vs_futures_net_inflow_diff: spot_trend.net_inflow_total
                - futures_trend.net_inflow_total,
        }
    }
}

/// Spot, futures and their comparison for one symbol.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SymbolAnalysis {
    pub spot: MarketAnalysis,
    pub futures: MarketAnalysis,
    pub comparison: MarketComparison,
}

impl SymbolAnalysis {
    pub fn analyze(
        spot_candles: &[Candle],
        spot_book: OrderBookSummary,
        futures_candles: &[Candle],
        futures_book: OrderBookSummary,
        config: &AnalysisConfig,
    ) -> Self {
        let spot = MarketAnalysis::analyze(spot_candles, spot_book, config);
        let futures = MarketAnalysis::analyze(futures_candles, futures_book, config);
        let comparison = MarketComparison::between(
            spot_candles,
            futures_candles,
            &spot.funding_trend,
            &futures.funding_trend,
        );

        Self {
            spot,
            futures,
            comparison,
        }
    }
}

/// Parameters the report was produced with.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct AnalysisMetadata {
    pub analysis_time: DateTime<Utc>,
    pub interval: Interval,
    pub symbols_analyzed: Vec<String>,
    pub klines_count: usize,
}

impl AnalysisMetadata {
    pub fn new(interval: Interval, symbols: Vec<String>, klines_count: usize) -> Self {
        Self {
            analysis_time: Utc::now(),
            interval,
            symbols_analyzed: symbols,
            klines_count,
        }
    }
}

/// Full multi-symbol analysis document, symbols in request order.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub analysis: IndexMap<String, SymbolAnalysis>,
}

impl AnalysisReport {
    pub fn new(metadata: AnalysisMetadata) -> Self {
        Self {
            metadata,
            analysis: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, symbol: impl Into<String>, analysis: SymbolAnalysis) {
        self.analysis.insert(symbol.into(), analysis);
    }
}
