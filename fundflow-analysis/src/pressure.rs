//! Buy/sell pressure from order book imbalance and recent price momentum.

use crate::{
    candle::Candle,
    order_book::{OrderBookSummary, de_ratio, ser_ratio},
    rules::{Rule, first_match},
    stats,
};
use serde::{Deserialize, Serialize};

/// Number of trailing candles averaged for price momentum.
pub const MOMENTUM_LOOKBACK: usize = 5;

/// Directional pressure label.
///
/// The reversal labels are part of the published vocabulary: book imbalance
/// leaning up while price falls is `potential_reversal_down`, and the mirror
/// case is `potential_reversal_up`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureDirection {
    UpwardStrong,
    DownwardStrong,
    Upward,
    Downward,
    PotentialReversalDown,
    PotentialReversalUp,
    Neutral,
    #[default]
    Unknown,
}

impl PressureDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressureDirection::UpwardStrong => "upward_strong",
            PressureDirection::DownwardStrong => "downward_strong",
            PressureDirection::Upward => "upward",
            PressureDirection::Downward => "downward",
            PressureDirection::PotentialReversalDown => "potential_reversal_down",
            PressureDirection::PotentialReversalUp => "potential_reversal_up",
            PressureDirection::Neutral => "neutral",
            PressureDirection::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PressureDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of [`analyze_pressure`].
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PressureAnalysis {
    pub pressure_direction: PressureDirection,
    pub confidence: f64,
    pub imbalance: f64,
    /// Order book pressure ratio passed through verbatim, absent when unknown
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "ser_opt_ratio",
        deserialize_with = "de_opt_ratio"
    )]
    pub bid_ask_ratio: Option<f64>,
}

impl PressureAnalysis {
    /// Result returned when candles or the order book are missing.
    pub fn unknown() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug)]
struct PressureContext {
    imbalance: f64,
    avg_price_change: f64,
}

const PRESSURE_RULES: [Rule<PressureContext, PressureDirection>; 6] = [
    Rule::new(PressureDirection::UpwardStrong, |p| {
        p.imbalance > 0.2 && p.avg_price_change > 0.0
    }),
    Rule::new(PressureDirection::DownwardStrong, |p| {
        p.imbalance < -0.2 && p.avg_price_change < 0.0
    }),
    Rule::new(PressureDirection::Upward, |p| {
        p.imbalance > 0.1 && p.avg_price_change > 0.0
    }),
    Rule::new(PressureDirection::Downward, |p| {
        p.imbalance < -0.1 && p.avg_price_change < 0.0
    }),
    Rule::new(PressureDirection::PotentialReversalDown, |p| {
        p.imbalance > 0.1 && p.avg_price_change < 0.0
    }),
    Rule::new(PressureDirection::PotentialReversalUp, |p| {
        p.imbalance < -0.1 && p.avg_price_change > 0.0
    }),
];

/// Classify the pressure direction for a given imbalance and average price change.
pub fn classify_pressure(imbalance: f64, avg_price_change: f64) -> PressureDirection {
    first_match(
        &PRESSURE_RULES,
        &PressureContext {
            imbalance,
            avg_price_change,
        },
        PressureDirection::Neutral,
    )
}

/// Combine order book imbalance with the mean price change of the last
/// [`MOMENTUM_LOOKBACK`] candles.
pub fn analyze_pressure(
    candles: &[Candle],
    order_book: Option<&OrderBookSummary>,
) -> PressureAnalysis {
    let Some(order_book) = order_book else {
        return PressureAnalysis::unknown();
    };

    let recent = &candles[candles.len().saturating_sub(MOMENTUM_LOOKBACK)..];
    let changes: Vec<f64> = recent.iter().map(|candle| candle.price_change_pct).collect();
    let Some(avg_price_change) = stats::mean(&changes) else {
        return PressureAnalysis::unknown();
    };

    let imbalance = order_book.imbalance;
    let pressure_direction = classify_pressure(imbalance, avg_price_change);

    tracing::debug!(
        imbalance,
        avg_price_change,
        %pressure_direction,
        "classified order book pressure"
    );

    PressureAnalysis {
        pressure_direction,
        confidence: (imbalance.abs() * 2.0).min(1.0),
        imbalance,
        bid_ask_ratio: Some(order_book.pressure_ratio),
    }
}

fn ser_opt_ratio<S>(ratio: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match ratio {
        Some(ratio) => ser_ratio(ratio, serializer),
        None => serializer.serialize_none(),
    }
}

fn de_opt_ratio<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    de_ratio(deserializer).map(Some)
}
