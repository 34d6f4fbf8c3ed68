//! Population statistics and window helpers shared by the classifiers.
//!
//! All variances are population variances (divide by `n`), matching how the
//! anomaly thresholds and volatility bands were calibrated.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, `None` for an empty slice.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

/// Mean and population standard deviation in one call.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    Some((mean(values)?, population_std_dev(values)?))
}

/// Z-score of `value`, or `0.0` when the distribution has no spread.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev > 0.0 {
        (value - mean) / std_dev
    } else {
        0.0
    }
}

/// Sum of every length-`window` window, stride 1, oldest first.
///
/// Each window is summed independently so the last window sum is bit-identical
/// to summing the trailing `window` values directly.
pub fn window_sums(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>())
        .collect()
}
