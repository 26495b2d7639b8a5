//! Descriptive statistics shared by the aggregator and the quality scorer.

// ── Percentile helper ─────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using standard linear
/// interpolation (the same algorithm as NumPy's default `percentile`).
///
/// Returns `0.0` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let len = sorted_data.len();
    if len == 1 {
        return sorted_data[0];
    }
    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted_data[lo];
    }
    let frac = rank - lo as f64;
    sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo])
}

/// Percentile of unsorted values. NaNs are ignored.
pub fn percentile_of(values: impl IntoIterator<Item = f64>, p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, p)
}

/// Median of unsorted values; even-length inputs average the middle pair.
pub fn median(values: impl IntoIterator<Item = f64>) -> f64 {
    percentile_of(values, 50.0)
}

// ── Running mean ──────────────────────────────────────────────────────────────

/// Accumulates a mean over values that may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    /// Add a value; `None` is skipped.
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    /// Number of values that contributed.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the pushed values, `0.0` when none were present.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// `numerator / denominator * 100`, or `0.0` when the denominator is not positive.
pub fn rate_percent(numerator: i128, denominator: i128) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── percentile ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentile_empty_returns_zero() {
        assert_eq!(percentile(&[], 90.0), 0.0);
    }

    #[test]
    fn test_percentile_single_element() {
        assert_eq!(percentile(&[42.0], 90.0), 42.0);
        assert_eq!(percentile(&[42.0], 0.0), 42.0);
    }

    #[test]
    fn test_percentile_p50_even() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        // rank = 0.5 * 3 = 1.5 → halfway between 2 and 3
        assert!((percentile(&data, 50.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_p90_ten_elements() {
        let data: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let p90 = percentile(&data, 90.0);
        assert!((p90 - 9.1).abs() < 1e-9, "p90 = {p90}");
    }

    #[test]
    fn test_percentile_out_of_range_is_clamped() {
        let data = vec![10.0, 20.0, 30.0];
        assert_eq!(percentile(&data, 150.0), 30.0);
        assert_eq!(percentile(&data, -5.0), 10.0);
    }

    // ── median ───────────────────────────────────────────────────────────────

    #[test]
    fn test_median_unsorted_odd() {
        assert_eq!(median(vec![1000.0, 50.0, 200.0]), 200.0);
    }

    #[test]
    fn test_median_unsorted_even() {
        assert_eq!(median(vec![8.0, 1.0, 5.0, 2.0]), 3.5);
    }

    #[test]
    fn test_median_ignores_nan() {
        assert_eq!(median(vec![f64::NAN, 4.0, 2.0]), 3.0);
    }

    // ── MeanAccumulator ──────────────────────────────────────────────────────

    #[test]
    fn test_mean_skips_missing_values() {
        let mut acc = MeanAccumulator::default();
        acc.push(Some(0.2));
        acc.push(None);
        acc.push(Some(0.4));
        assert_eq!(acc.count(), 2);
        assert!((acc.mean() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_mean_of_nothing_is_zero() {
        assert_eq!(MeanAccumulator::default().mean(), 0.0);
    }

    // ── rate_percent ─────────────────────────────────────────────────────────

    #[test]
    fn test_rate_percent_basic() {
        assert!((rate_percent(5, 50) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_rate_percent_zero_denominator_is_zero() {
        assert_eq!(rate_percent(0, 0), 0.0);
        assert_eq!(rate_percent(3, 0), 0.0);
    }
}
