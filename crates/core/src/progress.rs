//! Progress arithmetic.

/// `100 * processed / total`, clamped to [0, 100] and rounded to two decimals.
///
/// An empty job (`total == 0`) is fully done.
pub fn percentage(processed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = processed.min(total) as f64 * 100.0 / total as f64;
    ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0)
}
