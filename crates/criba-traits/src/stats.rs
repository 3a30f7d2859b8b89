//! Statistical helpers shared by the selector and the performance evaluator.
//!
//! Quantiles use linear interpolation between order statistics (Hyndman-Fan
//! type 7), the same definition for factor cut-points and for Value-at-Risk so
//! the two stay comparable.

/// Arithmetic mean.
///
/// Returns NaN for an empty slice. NaN inputs propagate.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1 denominator).
///
/// Returns NaN with fewer than two values. NaN inputs propagate.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = mean(values);
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Median of the defined values.
///
/// NaN entries are skipped. Returns NaN when nothing is left. Even-sized
/// inputs average the two middle values.
///
/// # Examples
///
/// ```
/// use criba_traits::stats::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
/// assert_eq!(median(&[4.0, 1.0, f64::NAN, 2.0, 3.0]), 2.5);
/// ```
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Type-7 quantile of `values` at probability `p`.
///
/// Returns NaN when the input is empty, contains NaN, or `p` lies outside
/// `[0, 1]`: an undefined input yields an undefined cut-point.
///
/// # Examples
///
/// ```
/// use criba_traits::stats::quantile;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(quantile(&values, 0.0), 1.0);
/// assert_eq!(quantile(&values, 0.5), 2.5);
/// assert_eq!(quantile(&values, 1.0), 4.0);
/// ```
pub fn quantile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() || values.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

/// Type-7 quantile of an ascending, NaN-free slice.
///
/// Callers computing several quantiles of the same data sort once and use
/// this directly.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    // Clamp keeps the result monotone in `p` despite rounding.
    (sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])).clamp(sorted[lo], sorted[hi])
}
