//! Z-score anomaly detection over volume, net inflow and price/volume mismatch.
//!
//! Mean and standard deviation are taken over the whole series, so a single
//! extreme candle also shifts the baseline it is measured against.

use crate::{candle::Candle, stats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default window size. Only used as a minimum history gate of `2 * window`.
pub const DEFAULT_ANOMALY_WINDOW: usize = 10;

/// Default absolute z-score above which a value is anomalous.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Maximum number of (most recent) anomalies reported.
pub const MAX_REPORTED_ANOMALIES: usize = 5;

/// Absolute price change (percent) that counts as a large move.
pub const MISMATCH_PRICE_CHANGE_PCT: f64 = 1.0;

/// Anomaly detector parameters.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct AnomalyConfig {
    pub window: usize,
    pub threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_ANOMALY_WINDOW,
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

impl AnomalyConfig {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Minimum series length before any detection runs.
    pub fn min_candles(&self) -> usize {
        self.window.saturating_mul(2)
    }
}

/// Side of the mean an outlier sits on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZScoreDirection {
    High,
    Low,
}

impl ZScoreDirection {
    fn of(z_score: f64) -> Self {
        if z_score > 0.0 {
            ZScoreDirection::High
        } else {
            ZScoreDirection::Low
        }
    }
}

/// A value whose z-score exceeded the threshold.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct ZScoreFlag {
    pub value: f64,
    pub z_score: f64,
    pub direction: ZScoreDirection,
}

impl ZScoreFlag {
    fn new(value: f64, z_score: f64) -> Self {
        Self {
            value,
            z_score,
            direction: ZScoreDirection::of(z_score),
        }
    }
}

/// Large price move on below-average volume.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct PriceVolumeMismatch {
    pub price_change: f64,
    pub volume_z_score: f64,
}

/// One candle carrying at least one anomaly flag.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct Anomaly {
    /// Close time of the flagged candle
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<ZScoreFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_inflow: Option<ZScoreFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_volume_mismatch: Option<PriceVolumeMismatch>,
}

/// Output of [`detect_anomalies`].
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct AnomalyReport {
    pub has_anomalies: bool,
    /// Most recent anomalies, oldest first, at most [`MAX_REPORTED_ANOMALIES`]
    pub anomalies: Vec<Anomaly>,
}

/// Flag candles whose volume or net inflow is a z-score outlier, or whose
/// price moved sharply on below-average volume.
///
/// Series shorter than `2 * window` return an empty report.
pub fn detect_anomalies(candles: &[Candle], config: &AnomalyConfig) -> AnomalyReport {
    if candles.is_empty() || candles.len() < config.min_candles() {
        return AnomalyReport::default();
    }

    let volumes: Vec<f64> = candles.iter().map(|candle| candle.volume).collect();
    let inflows: Vec<f64> = candles.iter().map(|candle| candle.net_inflow).collect();

    let (Some((volume_mean, volume_std)), Some((inflow_mean, inflow_std))) =
        (stats::mean_std(&volumes), stats::mean_std(&inflows))
    else {
        return AnomalyReport::default();
    };

    let anomalies: Vec<Anomaly> = candles
        .iter()
        .filter_map(|candle| {
            let volume_z = stats::z_score(candle.volume, volume_mean, volume_std);
            let inflow_z = stats::z_score(candle.net_inflow, inflow_mean, inflow_std);

            let volume = (volume_z.abs() > config.threshold)
                .then(|| ZScoreFlag::new(candle.volume, volume_z));
            let net_inflow = (inflow_z.abs() > config.threshold)
                .then(|| ZScoreFlag::new(candle.net_inflow, inflow_z));
            let price_volume_mismatch = (candle.price_change_pct.abs()
                > MISMATCH_PRICE_CHANGE_PCT
                && volume_z < 0.0)
                .then_some(PriceVolumeMismatch {
                    price_change: candle.price_change_pct,
                    volume_z_score: volume_z,
                });

            if volume.is_none() && net_inflow.is_none() && price_volume_mismatch.is_none() {
                return None;
            }

            Some(Anomaly {
                time: candle.close_time,
                volume,
                net_inflow,
                price_volume_mismatch,
            })
        })
        .collect();

    let has_anomalies = !anomalies.is_empty();
    if has_anomalies {
        tracing::debug!(
            candles = candles.len(),
            detected = anomalies.len(),
            "detected candle anomalies"
        );
    }

    let skip = anomalies.len().saturating_sub(MAX_REPORTED_ANOMALIES);
    AnomalyReport {
        has_anomalies,
        anomalies: anomalies.into_iter().skip(skip).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{Bar, VolumeSplit};
    use chrono::{Duration, TimeZone};

    fn candle(index: i64, open: f64, close: f64, volume: f64) -> Candle {
        let open_time = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
            + Duration::hours(index);
        Candle::enrich(
            Bar {
                open_time,
                close_time: open_time + Duration::hours(1) - Duration::milliseconds(1),
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

    #[test]
    fn test_short_series_has_no_anomalies() {
        let candles: Vec<Candle> = (0..19).map(|i| candle(i, 100.0, 100.0, 1.0)).collect();
        let report = detect_anomalies(&candles, &AnomalyConfig::default());

        assert!(!report.has_anomalies);
        assert!(report.anomalies.is_empty());
        assert_eq!(detect_anomalies(&[], &AnomalyConfig::default()), AnomalyReport::default());
    }

    #[test]
    fn test_identical_candles_have_no_anomalies() {
        let candles: Vec<Candle> = (0..30).map(|i| candle(i, 100.0, 100.0, 10.0)).collect();
        let report = detect_anomalies(&candles, &AnomalyConfig::default());

        assert!(!report.has_anomalies);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_volume_spike_is_flagged_high() {
        let mut candles: Vec<Candle> = (0..20).map(|i| candle(i, 100.0, 100.0, 10.0)).collect();
        candles.push(candle(20, 100.0, 100.0, 60.0));

        let report = detect_anomalies(&candles, &AnomalyConfig::default());

        assert!(report.has_anomalies);
        assert_eq!(report.anomalies.len(), 1);

        let anomaly = &report.anomalies[0];
        assert_eq!(anomaly.time, candles[20].close_time);

        let volume = anomaly.volume.expect("volume flag");
        assert_eq!(volume.direction, ZScoreDirection::High);
        assert_eq!(volume.value, 60.0);
        assert!(volume.z_score > 2.0);
        assert!(anomaly.price_volume_mismatch.is_none());
    }

    #[test]
    fn test_price_volume_mismatch() {
        // Alternate volume so that the big move lands on below-average volume
        let mut candles: Vec<Candle> = (0..20)
            .map(|i| {
                let volume = if i % 2 == 0 { 10.0 } else { 12.0 };
                candle(i, 100.0, 100.0, volume)
            })
            .collect();
        candles.push(candle(20, 100.0, 102.0, 10.0));

        let report = detect_anomalies(&candles, &AnomalyConfig::default());
        let last = report.anomalies.last().expect("mismatch anomaly");

        assert_eq!(last.time, candles[20].close_time);
        let mismatch = last.price_volume_mismatch.expect("mismatch flag");
        assert!((mismatch.price_change - 2.0).abs() < 1e-9);
        assert!(mismatch.volume_z_score < 0.0);
    }

    #[test]
    fn test_reports_at_most_five_most_recent() {
        // Ten big-move candles on low volume among forty quiet high-volume ones
        let candles: Vec<Candle> = (0..50)
            .map(|i| {
                if i % 5 == 0 {
                    candle(i, 100.0, 103.0, 5.0)
                } else {
                    candle(i, 100.0, 100.0, 10.0)
                }
            })
            .collect();

        let report = detect_anomalies(&candles, &AnomalyConfig::default());

        assert!(report.has_anomalies);
        assert_eq!(report.anomalies.len(), MAX_REPORTED_ANOMALIES);

        let expected_times: Vec<DateTime<Utc>> = [25, 30, 35, 40, 45]
            .iter()
            .map(|i| candles[*i].close_time)
            .collect();
        let actual_times: Vec<DateTime<Utc>> =
            report.anomalies.iter().map(|anomaly| anomaly.time).collect();
        assert_eq!(actual_times, expected_times);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let mut candles: Vec<Candle> = (0..20).map(|i| candle(i, 100.0, 100.0, 10.0)).collect();
        candles.push(candle(20, 100.0, 100.0, 60.0));

        let strict = AnomalyConfig::default().with_threshold(10.0);
        assert!(!detect_anomalies(&candles, &strict).has_anomalies);
    }

    #[test]
    fn test_serialised_shape_omits_absent_flags() {
        let mut candles: Vec<Candle> = (0..20).map(|i| candle(i, 100.0, 100.0, 10.0)).collect();
        candles.push(candle(20, 100.0, 100.0, 60.0));

        let report = detect_anomalies(&candles, &AnomalyConfig::default());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["has_anomalies"], true);
        assert_eq!(json["anomalies"][0]["volume"]["direction"], "high");
        assert!(json["anomalies"][0].get("price_volume_mismatch").is_none());
    }

    #[test]
    fn test_idempotent() {
        let candles: Vec<Candle> = (0..50)
            .map(|i| {
                if i % 5 == 0 {
                    candle(i, 100.0, 103.0, 5.0)
                } else {
                    candle(i, 100.0, 100.0 + (i as f64 * 0.3).sin(), 10.0 + (i % 3) as f64)
                }
            })
            .collect();
        let config = AnomalyConfig::default();

        let first = detect_anomalies(&candles, &config);
        let second = detect_anomalies(&candles, &config);

        assert!(first.has_anomalies);
        assert_eq!(first, second);
        for (a, b) in first.anomalies.iter().zip(&second.anomalies) {
            let bits = |anomaly: &Anomaly| {
                (
                    anomaly.volume.map(|flag| (flag.value.to_bits(), flag.z_score.to_bits())),
                    anomaly.net_inflow.map(|flag| (flag.value.to_bits(), flag.z_score.to_bits())),
                    anomaly.price_volume_mismatch.map(|mismatch| {
                        (mismatch.price_change.to_bits(), mismatch.volume_z_score.to_bits())
                    }),
                )
            };
            assert_eq!(bits(a), bits(b));
        }
    }
}
