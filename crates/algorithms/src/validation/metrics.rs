//! Error statistics of predicted against observed elevations

use serde::Serialize;

/// Accuracy of a set of predictions.
///
/// Residuals are `predicted - actual`, so a positive `mbe` means the
/// surface sits above the observations on average.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct InterpolationMetrics {
    pub rmse: f64,
    pub mae: f64,
    /// Largest absolute residual
    pub max_error: f64,
    /// Coefficient of determination, ≤ 1 and possibly negative
    pub r2: f64,
    /// Mean bias error
    pub mbe: f64,
    pub validation_points: usize,
}

impl InterpolationMetrics {
    /// Metrics of `(actual, predicted)` pairs. Empty input gives all zeros.
    ///
    /// When every actual value is equal, R² is 1 for a perfect fit and 0
    /// otherwise.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let n = pairs.len();
        if n == 0 {
            return Self::default();
        }
        let nf = n as f64;

        let mut sum_sq = 0.0;
        let mut sum_abs = 0.0;
        let mut sum = 0.0;
        let mut max_error = 0.0_f64;
        for &(actual, predicted) in pairs {
            let e = predicted - actual;
            sum_sq += e * e;
            sum_abs += e.abs();
            sum += e;
            max_error = max_error.max(e.abs());
        }

        let mean_actual = pairs.iter().map(|(a, _)| a).sum::<f64>() / nf;
        let ss_tot: f64 = pairs.iter().map(|(a, _)| (a - mean_actual).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - sum_sq / ss_tot
        } else if sum_sq == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            rmse: (sum_sq / nf).sqrt(),
            mae: sum_abs / nf,
            max_error,
            r2,
            mbe: sum / nf,
            validation_points: n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_predictions() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, i as f64)).collect();
        let m = InterpolationMetrics::from_pairs(&pairs);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.max_error, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.validation_points, 10);
    }

    #[test]
    fn test_known_residuals() {
        // residuals: +1, -1, +2, 0
        let pairs = [(1.0, 2.0), (2.0, 1.0), (3.0, 5.0), (4.0, 4.0)];
        let m = InterpolationMetrics::from_pairs(&pairs);

        assert_relative_eq!(m.rmse, (6.0_f64 / 4.0).sqrt());
        assert_relative_eq!(m.mae, 1.0);
        assert_relative_eq!(m.max_error, 2.0);
        assert_relative_eq!(m.mbe, 0.5);
        // ss_tot = 5, ss_res = 6
        assert_relative_eq!(m.r2, 1.0 - 6.0 / 5.0);
        assert!(m.r2 < 0.0, "worse than the mean gives a negative R²");
    }

    #[test]
    fn test_constant_actuals() {
        let exact = InterpolationMetrics::from_pairs(&[(3.0, 3.0), (3.0, 3.0)]);
        assert_eq!(exact.r2, 1.0);
        let off = InterpolationMetrics::from_pairs(&[(3.0, 3.5), (3.0, 3.0)]);
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_empty() {
        assert_eq!(InterpolationMetrics::from_pairs(&[]), InterpolationMetrics::default());
    }
}
