//! Weighted Moving Average (WMA).
//!
//! Linear weights 1..=period, the oldest value in the trailing window gets
//! weight 1 and the newest gets `period`.
//! Lookback: period - 1 (first valid value at index period-1).

/// WMA of the trailing `period` values of `series`.
///
/// Returns `None` when `period == 0`, when the series is shorter than
/// `period`, or when the trailing window contains a NaN.
pub fn wma(series: &[f64], period: usize) -> Option<f64> {
    if period == 0 || series.len() < period {
        return None;
    }
    let window = &series[series.len() - period..];
    weighted_mean(window)
}

/// WMA evaluated at every index. Leading `period - 1` entries and any
/// window touching a NaN are `f64::NAN`.
pub fn wma_series(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        if let Some(v) = weighted_mean(&series[i + 1 - period..=i]) {
            result[i] = v;
        }
    }
    result
}

fn weighted_mean(window: &[f64]) -> Option<f64> {
    let mut num = 0.0;
    for (i, v) in window.iter().enumerate() {
        if v.is_nan() {
            return None;
        }
        num += v * (i + 1) as f64;
    }
    let len = window.len() as f64;
    let denom = len * (len + 1.0) / 2.0;
    Some(num / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn wma_hand_computed() {
        // (3*1 + 4*2 + 5*3) / 6 = 26/6
        let v = wma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_approx(v, 26.0 / 6.0, DEFAULT_EPSILON);
        assert!((v - 4.333333).abs() < 1e-6);
    }

    #[test]
    fn wma_undefined_when_short() {
        assert_eq!(wma(&[1.0, 2.0], 3), None);
        assert_eq!(wma(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn wma_period_one_is_identity() {
        assert_eq!(wma(&[7.0, 9.0], 1), Some(9.0));
    }

    #[test]
    fn wma_series_warmup() {
        let s = wma_series(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(s[0].is_nan());
        assert!(s[1].is_nan());
        assert_approx(s[2], (1.0 + 4.0 + 9.0) / 6.0, DEFAULT_EPSILON);
        assert_approx(s[4], 26.0 / 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wma_series_nan_propagation() {
        let s = wma_series(&[1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0], 2);
        assert!(s[1].is_nan());
        assert!(s[2].is_nan());
        assert_approx(s[3], (3.0 + 8.0) / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wma_series_matches_scalar() {
        let series: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let s = wma_series(&series, 9);
        for i in 8..series.len() {
            let scalar = wma(&series[..=i], 9).unwrap();
            assert_approx(s[i], scalar, DEFAULT_EPSILON);
        }
    }
}
