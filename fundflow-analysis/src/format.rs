/// Format a number with precision scaled to its magnitude.
///
/// - `|x| >= 1000`: 2 decimals
/// - `|x| >= 1`: 4 decimals
/// - otherwise: 8 decimals
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 1000.0 {
        format!("{value:.2}")
    } else if magnitude >= 1.0 {
        format!("{value:.4}")
    } else {
        format!("{value:.8}")
    }
}
