// =============================================================================
// Statistical Primitives
// =============================================================================
//
// Pure, side-effect-free numeric building blocks for the analyzers. Every
// function is total: degenerate inputs (empty slices, zero denominators)
// produce a defined neutral value instead of a fault.

/// Periods per year for hourly-granularity annualization.
pub const HOURLY_PERIODS_PER_YEAR: f64 = 365.0 * 24.0;

/// Arithmetic mean. Returns 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator). Returns 0 when fewer than
/// two samples are available.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Log returns of a chronologically ordered (oldest-first) price series.
///
/// Only consecutive pairs where both prices are positive contribute; anything
/// else is skipped rather than producing a NaN.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Annualized volatility (%) from a log-return series.
///
/// Sample standard deviation scaled by the square root of the number of
/// sampling periods per year. Returns 0 when fewer than two returns exist.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    std_dev(returns) * periods_per_year.sqrt() * 100.0
}

/// Maximum drawdown (%) over a chronologically ordered price series:
/// the largest percentage decline from a running peak.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let mut peak = prices[0];
    let mut worst = 0.0_f64;
    for &p in prices {
        if p > peak {
            peak = p;
        }
        if peak > 0.0 {
            let dd = (peak - p) / peak * 100.0;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

/// Percentile rank of `value` within `sorted` (ascending): the fraction of
/// samples less than or equal to `value`, times 100. Returns 50 for an empty
/// distribution.
pub fn percentile_rank(sorted: &[f64], value: f64) -> f64 {
    if sorted.is_empty() {
        return 50.0;
    }
    let count = sorted.iter().filter(|&&v| v <= value).count();
    count as f64 / sorted.len() as f64 * 100.0
}

/// Basis-point distance between two prices, relative to their midpoint.
/// Returns 0 when the midpoint is 0.
pub fn basis_points(a: f64, b: f64) -> f64 {
    let mid = (a + b) / 2.0;
    if mid == 0.0 {
        return 0.0;
    }
    (a - b).abs() / mid * 10_000.0
}

/// Weighted average of `values` by `weights`.
///
/// Returns 0 when the slices are empty, mismatched in length, or the weights
/// sum to zero.
pub fn weighted_avg(values: &[f64], weights: &[f64]) -> f64 {
    if values.is_empty() || values.len() != weights.len() {
        return 0.0;
    }
    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    weighted_sum / total_weight
}

/// Round to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Round to 2 decimals — the default precision for scores and USD amounts.
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    // ---- mean / std_dev --------------------------------------------------

    #[test]
    fn mean_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mean_basic() {
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-10);
    }

    #[test]
    fn std_dev_needs_two_samples() {
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn std_dev_sample_formula() {
        // Variance of [2,4,4,4,5,5,7,9] with n-1 denominator = 32/7.
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&vals) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-10);
    }

    // ---- log_returns -----------------------------------------------------

    #[test]
    fn log_returns_skips_non_positive_pairs() {
        let r = log_returns(&[100.0, 0.0, 110.0, 121.0]);
        // Only the (110, 121) pair qualifies.
        assert_eq!(r.len(), 1);
        assert!((r[0] - (121.0_f64 / 110.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn log_returns_length() {
        assert_eq!(log_returns(&[1.0, 2.0, 3.0]).len(), 2);
        assert!(log_returns(&[1.0]).is_empty());
        assert!(log_returns(&[]).is_empty());
    }

    // ---- annualized_volatility -------------------------------------------

    #[test]
    fn volatility_zero_for_short_series() {
        assert_eq!(annualized_volatility(&[0.01], HOURLY_PERIODS_PER_YEAR), 0.0);
    }

    #[test]
    fn volatility_zero_for_constant_returns() {
        let r = [0.01, 0.01, 0.01, 0.01];
        assert_eq!(annualized_volatility(&r, HOURLY_PERIODS_PER_YEAR), 0.0);
    }

    #[test]
    fn volatility_scales_with_periods() {
        let r = [0.01, -0.02, 0.015, -0.005];
        let hourly = annualized_volatility(&r, HOURLY_PERIODS_PER_YEAR);
        let daily = annualized_volatility(&r, 365.0);
        assert!((hourly / daily - (24.0_f64).sqrt()).abs() < 1e-9);
    }

    // ---- max_drawdown ----------------------------------------------------

    #[test]
    fn drawdown_zero_for_monotonic_rise() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0, 4.0]), 0.0);
    }

    #[test]
    fn drawdown_from_peak() {
        // Peak 100 then trough 60 => 40% drawdown.
        let dd = max_drawdown(&[80.0, 100.0, 60.0, 90.0]);
        assert!((dd - 40.0).abs() < 1e-10);
    }

    #[test]
    fn drawdown_short_series_is_zero() {
        assert_eq!(max_drawdown(&[100.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    // ---- percentile_rank -------------------------------------------------

    #[test]
    fn percentile_rank_empty_is_neutral() {
        assert_eq!(percentile_rank(&[], 10.0), 50.0);
    }

    #[test]
    fn percentile_rank_bounds() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_rank(&sorted, 0.5), 0.0);
        assert_eq!(percentile_rank(&sorted, 4.0), 100.0);
        assert_eq!(percentile_rank(&sorted, 2.0), 50.0);
    }

    // ---- basis_points ----------------------------------------------------

    #[test]
    fn basis_points_zero_mid_is_zero() {
        assert_eq!(basis_points(0.0, 0.0), 0.0);
    }

    #[test]
    fn basis_points_symmetric() {
        let a = basis_points(100.0, 101.0);
        let b = basis_points(101.0, 100.0);
        assert!((a - b).abs() < 1e-10);
        // |100-101| / 100.5 * 10000 ≈ 99.50
        assert!((a - 99.50248756218906).abs() < 1e-9);
    }

    // ---- weighted_avg ----------------------------------------------------

    #[test]
    fn weighted_avg_mismatched_lengths_is_zero() {
        assert_eq!(weighted_avg(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(weighted_avg(&[], &[]), 0.0);
    }

    #[test]
    fn weighted_avg_zero_weights_is_zero() {
        assert_eq!(weighted_avg(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn weighted_avg_normalizes_weights() {
        // Weights need not sum to 1.
        let a = weighted_avg(&[10.0, 20.0], &[1.0, 3.0]);
        let b = weighted_avg(&[10.0, 20.0], &[0.25, 0.75]);
        assert!((a - b).abs() < 1e-10);
        assert!((a - 17.5).abs() < 1e-10);
    }

    // ---- rounding --------------------------------------------------------

    #[test]
    fn round_to_decimals() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.235, 1), 1.2);
        assert_eq!(round_to(99.502487, 1), 99.5);
        assert_eq!(round2(49.751243), 49.75);
    }
}
