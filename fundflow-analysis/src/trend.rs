//! Net-inflow trend and price stage classification.
//!
//! The trend looks at the last three rolling net-inflow window sums; the price
//! stage compares the latest close against the mean of the trailing closes and
//! the volatility of close-to-close moves.

use crate::{
    candle::Candle,
    rules::{Rule, first_match},
    stats,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Default rolling window size in candles.
pub const DEFAULT_TREND_WINDOW: usize = 10;

/// Number of trailing closes required before a price stage is classified.
pub const PRICE_STAGE_LOOKBACK: usize = 20;

/// Direction of rolling net inflow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTrend {
    Increasing,
    Decreasing,
    SlightlyIncreasing,
    SlightlyDecreasing,
    Neutral,
    #[default]
    Unknown,
}

impl FlowTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowTrend::Increasing => "increasing",
            FlowTrend::Decreasing => "decreasing",
            FlowTrend::SlightlyIncreasing => "slightly_increasing",
            FlowTrend::SlightlyDecreasing => "slightly_decreasing",
            FlowTrend::Neutral => "neutral",
            FlowTrend::Unknown => "unknown",
        }
    }

    /// Classification confidence attached to this trend label.
    pub fn confidence(&self) -> f64 {
        match self {
            FlowTrend::Increasing | FlowTrend::Decreasing => 0.8,
            FlowTrend::SlightlyIncreasing | FlowTrend::SlightlyDecreasing => 0.6,
            FlowTrend::Neutral => 0.4,
            FlowTrend::Unknown => 0.0,
        }
    }

    pub fn is_rising(&self) -> bool {
        matches!(self, FlowTrend::Increasing | FlowTrend::SlightlyIncreasing)
    }

    pub fn is_falling(&self) -> bool {
        matches!(self, FlowTrend::Decreasing | FlowTrend::SlightlyDecreasing)
    }
}

impl std::fmt::Display for FlowTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse price stage of the trailing closes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Deserialize, Serialize)]
pub enum PriceStage {
    #[serde(rename = "possible top")]
    PossibleTop,
    #[serde(rename = "possible bottom")]
    PossibleBottom,
    #[serde(rename = "uptrend")]
    Uptrend,
    #[serde(rename = "downtrend")]
    Downtrend,
    #[serde(rename = "consolidating")]
    Consolidating,
    #[serde(rename = "fluctuating")]
    Fluctuating,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl PriceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceStage::PossibleTop => "possible top",
            PriceStage::PossibleBottom => "possible bottom",
            PriceStage::Uptrend => "uptrend",
            PriceStage::Downtrend => "downtrend",
            PriceStage::Consolidating => "consolidating",
            PriceStage::Fluctuating => "fluctuating",
            PriceStage::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PriceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trend classifier parameters.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct TrendConfig {
    /// Rolling window size; values below 1 are treated as 1
    pub window: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_TREND_WINDOW,
        }
    }
}

impl TrendConfig {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

/// Output of [`analyze_trend`].
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TrendAnalysis {
    pub trend: FlowTrend,
    pub confidence: f64,
    pub net_inflow_total: f64,
    pub net_inflow_recent: f64,
    pub price_stage: PriceStage,
}

impl TrendAnalysis {
    /// Result returned when the series is shorter than the window.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Last three window sums, oldest first.
#[derive(Clone, Copy, Debug)]
struct RecentSums {
    a: f64,
    b: f64,
    c: f64,
}

impl RecentSums {
    fn positives(&self) -> usize {
        [self.a, self.b, self.c].iter().filter(|x| **x > 0.0).count()
    }

    fn negatives(&self) -> usize {
        [self.a, self.b, self.c].iter().filter(|x| **x < 0.0).count()
    }
}

const TREND_RULES: [Rule<RecentSums, FlowTrend>; 4] = [
    Rule::new(FlowTrend::Increasing, |s| {
        s.positives() == 3 && s.c > s.b
    }),
    Rule::new(FlowTrend::Decreasing, |s| {
        s.negatives() == 3 && s.c < s.b
    }),
    Rule::new(FlowTrend::SlightlyIncreasing, |s| s.positives() >= 2),
    Rule::new(FlowTrend::SlightlyDecreasing, |s| s.negatives() >= 2),
];

/// Classify the trend from a sequence of rolling window sums (oldest first).
///
/// Fewer than three sums is [`FlowTrend::Neutral`].
pub fn classify_window_sums(window_sums: &[f64]) -> FlowTrend {
    match window_sums {
        [.., a, b, c] => first_match(
            &TREND_RULES,
            &RecentSums {
                a: *a,
                b: *b,
                c: *c,
            },
            FlowTrend::Neutral,
        ),
        _ => FlowTrend::Neutral,
    }
}

/// Inputs to the price stage cascade.
#[derive(Clone, Copy, Debug)]
struct StageContext {
    latest_price: f64,
    price_ma: f64,
    volatility: f64,
    trend: FlowTrend,
}

impl StageContext {
    fn deviation(&self) -> f64 {
        if self.price_ma > 0.0 {
            (self.latest_price - self.price_ma).abs() / self.price_ma
        } else {
            f64::INFINITY
        }
    }
}

const STAGE_RULES: [Rule<StageContext, PriceStage>; 5] = [
    Rule::new(PriceStage::PossibleTop, |s| {
        s.latest_price > s.price_ma * 1.08 && s.trend.is_falling()
    }),
    Rule::new(PriceStage::PossibleBottom, |s| {
        s.latest_price < s.price_ma * 0.92 && s.trend.is_rising()
    }),
    Rule::new(PriceStage::Uptrend, |s| {
        s.latest_price > s.price_ma * 1.05 && s.trend.is_rising()
    }),
    Rule::new(PriceStage::Downtrend, |s| {
        s.latest_price < s.price_ma * 0.95 && s.trend.is_falling()
    }),
    Rule::new(PriceStage::Consolidating, |s| {
        s.volatility < 0.01 && s.deviation() < 0.02
    }),
];

/// Classify the price stage from the trailing closes and the flow trend.
///
/// Requires at least [`PRICE_STAGE_LOOKBACK`] candles, otherwise
/// [`PriceStage::Unknown`].
pub fn classify_price_stage(candles: &[Candle], trend: FlowTrend) -> PriceStage {
    if candles.len() < PRICE_STAGE_LOOKBACK {
        return PriceStage::Unknown;
    }

    let closes: Vec<f64> = candles[candles.len() - PRICE_STAGE_LOOKBACK..]
        .iter()
        .map(|candle| candle.close)
        .collect();

    let Some(price_ma) = stats::mean(&closes) else {
        return PriceStage::Unknown;
    };
    let latest_price = closes[closes.len() - 1];

    let diffs: Vec<f64> = closes
        .iter()
        .tuple_windows()
        .map(|(prev, next)| next - prev)
        .collect();
    let volatility = match stats::population_std_dev(&diffs) {
        Some(std_dev) if price_ma > 0.0 => std_dev / price_ma,
        _ => 0.0,
    };

    first_match(
        &STAGE_RULES,
        &StageContext {
            latest_price,
            price_ma,
            volatility,
            trend,
        },
        PriceStage::Fluctuating,
    )
}

/// Windowed net-inflow trend plus price stage for a closed candle series.
///
/// Series shorter than the window return [`TrendAnalysis::unknown`].
pub fn analyze_trend(candles: &[Candle], config: &TrendConfig) -> TrendAnalysis {
    let window = config.window.max(1);
    if candles.len() < window {
        return TrendAnalysis::unknown();
    }

    let inflows: Vec<f64> = candles.iter().map(|candle| candle.net_inflow).collect();
    let net_inflow_total = inflows.iter().sum::<f64>();
    let net_inflow_recent = inflows[inflows.len() - window..].iter().sum::<f64>();

    let trend = classify_window_sums(&stats::window_sums(&inflows, window));
    let price_stage = classify_price_stage(candles, trend);

    tracing::debug!(
        candles = candles.len(),
        window,
        %trend,
        %price_stage,
        "classified net inflow trend"
    );

    TrendAnalysis {
        trend,
        confidence: trend.confidence(),
        net_inflow_total,
        net_inflow_recent,
        price_stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{Bar, VolumeSplit};
    use chrono::{Duration, TimeZone, Utc};

    fn candle(index: i64, open: f64, close: f64, volume: f64) -> Candle {
        let open_time = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
            + Duration::minutes(5 * index);
        Candle::enrich(
            Bar {
                open_time,
                close_time: open_time + Duration::minutes(5) - Duration::milliseconds(1),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
                quote_volume: volume * close,
            },
            VolumeSplit::default(),
        )
    }

    /// Series of `closes` where each bar opens at the previous close.
    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(index, close)| {
                let open = if index == 0 { *close } else { closes[index - 1] };
                candle(index as i64, open, *close, 10.0)
            })
            .collect()
    }

    #[test]
    fn test_short_series_is_unknown() {
        let candles = series(&[100.0; 9]);
        let analysis = analyze_trend(&candles, &TrendConfig::default());

        assert_eq!(analysis, TrendAnalysis::unknown());
        assert_eq!(analysis.trend, FlowTrend::Unknown);
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.net_inflow_total, 0.0);
        assert_eq!(analysis.net_inflow_recent, 0.0);
        assert_eq!(analysis.price_stage, PriceStage::Unknown);

        assert_eq!(analyze_trend(&[], &TrendConfig::default()), TrendAnalysis::unknown());
    }

    #[test]
    fn test_inflow_totals_are_exact_sums() {
        let closes: Vec<f64> = (0..25)
            .map(|i| 100.0 + ((i * 7) % 5) as f64 - 2.0)
            .collect();
        let candles = series(&closes);
        let analysis = analyze_trend(&candles, &TrendConfig::default());

        let total: f64 = candles.iter().map(|c| c.net_inflow).sum();
        let recent: f64 = candles[candles.len() - 10..]
            .iter()
            .map(|c| c.net_inflow)
            .sum();

        assert_eq!(analysis.net_inflow_total, total);
        assert_eq!(analysis.net_inflow_recent, recent);
    }

    #[test]
    fn test_classify_window_sums() {
        struct TestCase {
            input: Vec<f64>,
            expected: FlowTrend,
        }

        let tests = vec![
            // TC0: all positive and latest rising is increasing
            TestCase {
                input: vec![1.0, 2.0, 3.0],
                expected: FlowTrend::Increasing,
            },
            // TC1: all positive but latest falling is only slightly increasing
            TestCase {
                input: vec![5.0, 3.0, 2.0],
                expected: FlowTrend::SlightlyIncreasing,
            },
            // TC2: all negative and latest falling is decreasing
            TestCase {
                input: vec![-1.0, -2.0, -3.0],
                expected: FlowTrend::Decreasing,
            },
            // TC3: all negative but latest rising is only slightly decreasing
            TestCase {
                input: vec![-5.0, -3.0, -2.0],
                expected: FlowTrend::SlightlyDecreasing,
            },
            // TC4: two of three positive
            TestCase {
                input: vec![-1.0, 2.0, 3.0],
                expected: FlowTrend::SlightlyIncreasing,
            },
            // TC5: two of three negative
            TestCase {
                input: vec![1.0, -2.0, -3.0],
                expected: FlowTrend::SlightlyDecreasing,
            },
            // TC6: mixed with a zero is neutral
            TestCase {
                input: vec![1.0, 0.0, -3.0],
                expected: FlowTrend::Neutral,
            },
            // TC7: fewer than three sums is neutral
            TestCase {
                input: vec![1.0, 2.0],
                expected: FlowTrend::Neutral,
            },
            // TC8: only the last three sums matter
            TestCase {
                input: vec![-9.0, -9.0, 1.0, 2.0, 3.0],
                expected: FlowTrend::Increasing,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = classify_window_sums(&test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_confidence_per_trend() {
        assert_eq!(FlowTrend::Increasing.confidence(), 0.8);
        assert_eq!(FlowTrend::Decreasing.confidence(), 0.8);
        assert_eq!(FlowTrend::SlightlyIncreasing.confidence(), 0.6);
        assert_eq!(FlowTrend::SlightlyDecreasing.confidence(), 0.6);
        assert_eq!(FlowTrend::Neutral.confidence(), 0.4);
    }

    #[test]
    fn test_exactly_window_candles_is_neutral() {
        // One window sum only, so there are not three sums to compare
        let candles = series(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 107.0, 108.0, 109.0]);
        let analysis = analyze_trend(&candles, &TrendConfig::default());

        assert_eq!(analysis.trend, FlowTrend::Neutral);
        assert_eq!(analysis.confidence, 0.4);
        assert_eq!(analysis.price_stage, PriceStage::Unknown);
    }

    #[test]
    fn test_rising_series_is_increasing_uptrend() {
        // Every bar bullish with growing closes, so window sums keep rising
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let analysis = analyze_trend(&series(&closes), &TrendConfig::default());

        assert_eq!(analysis.trend, FlowTrend::Increasing);
        assert_eq!(analysis.confidence, 0.8);
        assert_eq!(analysis.price_stage, PriceStage::Uptrend);
    }

    #[test]
    fn test_falling_series_is_downtrend() {
        // Outflow shrinks as price falls, so the latest window sum rises back
        // toward zero and the trend is only slightly decreasing
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 0.99f64.powi(i)).collect();
        let analysis = analyze_trend(&series(&closes), &TrendConfig::default());

        assert_eq!(analysis.trend, FlowTrend::SlightlyDecreasing);
        assert_eq!(analysis.confidence, 0.6);
        assert_eq!(analysis.price_stage, PriceStage::Downtrend);
    }

    #[test]
    fn test_accelerating_outflow_is_decreasing() {
        let candles: Vec<Candle> = (0..15)
            .map(|i| candle(i, 100.0, 99.0, 10.0 + i as f64))
            .collect();
        let analysis = analyze_trend(&candles, &TrendConfig::default());

        assert_eq!(analysis.trend, FlowTrend::Decreasing);
        assert_eq!(analysis.price_stage, PriceStage::Unknown);
    }

    #[test]
    fn test_flat_series_is_consolidating() {
        let analysis = analyze_trend(&series(&[100.0; 20]), &TrendConfig::default());
        assert_eq!(analysis.price_stage, PriceStage::Consolidating);
    }

    /// Nineteen closes at `base` followed by a final close chosen so that
    /// `latest = mean * ratio`.
    fn closes_with_latest_ratio(base: f64, ratio: f64) -> Vec<f64> {
        // mean = (19 * base + latest) / 20 and latest = ratio * mean
        let latest = 19.0 * base * ratio / (20.0 - ratio);
        let mut closes = vec![base; 19];
        closes.push(latest);
        closes
    }

    #[test]
    fn test_price_stage_priority() {
        struct TestCase {
            ratio: f64,
            trend: FlowTrend,
            expected: PriceStage,
        }

        let tests = vec![
            // TC0: 9% above mean with decreasing flow is a possible top, not an uptrend
            TestCase {
                ratio: 1.09,
                trend: FlowTrend::Decreasing,
                expected: PriceStage::PossibleTop,
            },
            // TC1: 9% above mean with rising flow is an uptrend
            TestCase {
                ratio: 1.09,
                trend: FlowTrend::Increasing,
                expected: PriceStage::Uptrend,
            },
            // TC2: 9% below mean with rising flow is a possible bottom
            TestCase {
                ratio: 0.91,
                trend: FlowTrend::SlightlyIncreasing,
                expected: PriceStage::PossibleBottom,
            },
            // TC3: 9% below mean with falling flow is a downtrend
            TestCase {
                ratio: 0.91,
                trend: FlowTrend::SlightlyDecreasing,
                expected: PriceStage::Downtrend,
            },
            // TC4: 6% above mean with falling flow matches no band and is volatile
            TestCase {
                ratio: 1.06,
                trend: FlowTrend::Decreasing,
                expected: PriceStage::Fluctuating,
            },
            // TC5: neutral flow never trends
            TestCase {
                ratio: 1.09,
                trend: FlowTrend::Neutral,
                expected: PriceStage::Fluctuating,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let candles = series(&closes_with_latest_ratio(100.0, test.ratio));
            let actual = classify_price_stage(&candles, test.trend);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_price_stage_needs_twenty_candles() {
        let candles = series(&[100.0; 19]);
        assert_eq!(
            classify_price_stage(&candles, FlowTrend::Neutral),
            PriceStage::Unknown
        );
    }

    #[test]
    fn test_labels_serialise_verbatim() {
        let analysis = TrendAnalysis {
            trend: FlowTrend::SlightlyDecreasing,
            confidence: 0.6,
            net_inflow_total: -1.0,
            net_inflow_recent: -2.0,
            price_stage: PriceStage::PossibleTop,
        };
        let json = serde_json::to_value(analysis).unwrap();

        assert_eq!(json["trend"], "slightly_decreasing");
        assert_eq!(json["price_stage"], "possible top");
        assert_eq!(json["confidence"], 0.6);
    }

    #[test]
    fn test_idempotent() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let candles = series(&closes);
        let config = TrendConfig::default();

        let first = analyze_trend(&candles, &config);
        let second = analyze_trend(&candles, &config);
        assert_eq!(first.net_inflow_total.to_bits(), second.net_inflow_total.to_bits());
        assert_eq!(first, second);
    }
}
