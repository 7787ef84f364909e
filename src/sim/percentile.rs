use crate::types::PercentileSummary;

/// Linear-interpolation percentile over an ascending-sorted slice:
/// rank = p/100 * (n-1), interpolated between the neighboring order
/// statistics. `p` in [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Reduce one year's multiplier sample to its {p10, p50, p90} triple.
pub fn summarize_percentiles(multipliers: &[f64]) -> PercentileSummary {
    let mut sorted = multipliers.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    PercentileSummary {
        p10: percentile_sorted(&sorted, 10.0),
        p50: percentile_sorted(&sorted, 50.0),
        p90: percentile_sorted(&sorted, 90.0),
    }
}
