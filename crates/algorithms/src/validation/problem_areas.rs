//! Locations where cross-validation errors exceed a tolerance

use serde::Serialize;

use super::cross_validation::CrossValidationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemSeverity {
    Low,
    Medium,
    High,
}

impl ProblemSeverity {
    /// Severity of an absolute error against `threshold`: High above 3x,
    /// Medium above 2x, Low otherwise.
    pub fn classify(error: f64, threshold: f64) -> Self {
        if error > 3.0 * threshold {
            ProblemSeverity::High
        } else if error > 2.0 * threshold {
            ProblemSeverity::Medium
        } else {
            ProblemSeverity::Low
        }
    }
}

/// A validated point whose error exceeds the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProblemArea {
    /// Index into the validated points
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub actual: f64,
    pub predicted: f64,
    /// |predicted - actual|
    pub error: f64,
    pub severity: ProblemSeverity,
}

/// Predictions with `|residual| > threshold`, largest error first.
pub fn identify_problem_areas(cv: &CrossValidationResult, threshold: f64) -> Vec<ProblemArea> {
    let mut areas: Vec<ProblemArea> = cv
        .predictions
        .iter()
        .filter(|p| p.residual.abs() > threshold)
        .map(|p| {
            let error = p.residual.abs();
            ProblemArea {
                index: p.index,
                x: p.x,
                y: p.y,
                actual: p.actual,
                predicted: p.predicted,
                error,
                severity: ProblemSeverity::classify(error, threshold),
            }
        })
        .collect();
    areas.sort_by(|a, b| b.error.total_cmp(&a.error));
    areas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::IdwConfig;
    use crate::validation::{InterpolationMethod, InterpolationMetrics, ValidationPrediction, ValidationStrategy};
    use std::time::Duration;

    fn cv_with_residuals(residuals: &[f64]) -> CrossValidationResult {
        let predictions: Vec<ValidationPrediction> = residuals
            .iter()
            .enumerate()
            .map(|(i, &r)| ValidationPrediction {
                index: i,
                x: i as f64,
                y: 0.0,
                actual: 100.0,
                predicted: 100.0 + r,
                residual: r,
                fold: i,
                exceeds_threshold: false,
            })
            .collect();
        CrossValidationResult {
            method: InterpolationMethod::Idw(IdwConfig::default()),
            strategy: ValidationStrategy::default(),
            predictions,
            metrics: InterpolationMetrics::default(),
            fold_metrics: Vec::new(),
            skipped_folds: Vec::new(),
            unpredicted: 0,
            compute_time: Duration::ZERO,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(ProblemSeverity::classify(3.5, 1.0), ProblemSeverity::High);
        assert_eq!(ProblemSeverity::classify(3.0, 1.0), ProblemSeverity::Medium);
        assert_eq!(ProblemSeverity::classify(2.0, 1.0), ProblemSeverity::Low);
    }

    #[test]
    fn test_filters_and_sorts_by_error() {
        let cv = cv_with_residuals(&[0.5, -4.0, 1.5, 2.5, -1.0]);
        let areas = identify_problem_areas(&cv, 1.0);

        let indices: Vec<usize> = areas.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![1, 3, 2]);
        assert_eq!(areas[0].severity, ProblemSeverity::High);
        assert_eq!(areas[0].error, 4.0);
        assert_eq!(areas[1].severity, ProblemSeverity::Medium);
        assert_eq!(areas[2].severity, ProblemSeverity::Low);
    }

    #[test]
    fn test_nothing_above_threshold() {
        let cv = cv_with_residuals(&[0.1, -0.2]);
        assert!(identify_problem_areas(&cv, 0.5).is_empty());
    }
}
