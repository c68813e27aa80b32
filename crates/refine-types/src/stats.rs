//! Order statistics over small numeric buffers.
//!
//! Callers pass owned slices; `median` and `percentile` sort in place.

/// Median of the values. Empty input returns 0.
pub fn median(values: &mut [f64]) -> f64 {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between adjacent order statistics.
///
/// `p` is clamped into [0, 100]. Empty input returns 0.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(values.len() - 1);
    let frac = rank - lo as f64;
    values[lo] * (1.0 - frac) + values[hi] * frac
}

/// Population variance. Empty input returns 0.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}
