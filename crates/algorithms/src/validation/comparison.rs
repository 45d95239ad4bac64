//! Side-by-side cross-validation of IDW and Ordinary Kriging

use serde::Serialize;
use terrasurf_core::{Monitor, Result, SurveyPoint};

use super::cross_validation::{
    cross_validate_monitored, CrossValidationConfig, CrossValidationResult, InterpolationMethod,
};
use super::metrics::InterpolationMetrics;
use crate::interpolation::{IdwConfig, KrigingConfig, SurfaceMethod};

const RMSE_WEIGHT: f64 = 0.6;
const R2_WEIGHT: f64 = 0.4;

/// One method's validation and its comparison score (0-100)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodScore {
    pub method: SurfaceMethod,
    pub score: f64,
    pub validation: CrossValidationResult,
}

/// Outcome of [`compare_methods`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodComparison {
    pub idw: MethodScore,
    pub kriging: MethodScore,
    pub recommended: SurfaceMethod,
    pub justification: String,
}

impl MethodComparison {
    pub fn recommended_score(&self) -> &MethodScore {
        match self.recommended {
            SurfaceMethod::Kriging => &self.kriging,
            _ => &self.idw,
        }
    }
}

/// Comparison score of one set of metrics.
///
/// ```text
/// score = 0.6·100·clamp(1 − rmse / z_range, 0, 1) + 0.4·clamp(100·R², 0, 100)
/// ```
/// A method that validated no point scores 0. With a flat field
/// (`z_range` = 0) the RMSE term is full only for a zero RMSE.
pub fn comparison_score(metrics: &InterpolationMetrics, z_range: f64) -> f64 {
    if metrics.validation_points == 0 {
        return 0.0;
    }
    let relative = if z_range > 0.0 {
        (1.0 - metrics.rmse / z_range).clamp(0.0, 1.0)
    } else if metrics.rmse == 0.0 {
        1.0
    } else {
        0.0
    };
    RMSE_WEIGHT * 100.0 * relative + R2_WEIGHT * (100.0 * metrics.r2).clamp(0.0, 100.0)
}

/// Cross-validate IDW and kriging on the same folds and recommend one.
///
/// The higher score wins; ties go to IDW, the cheaper method.
pub fn compare_methods(
    points: &[SurveyPoint],
    idw: &IdwConfig,
    kriging: &KrigingConfig,
    validation: &CrossValidationConfig,
) -> Result<MethodComparison> {
    compare_methods_monitored(points, idw, kriging, validation, &Monitor::none())
}

/// [`compare_methods`] with progress and cancellation.
pub fn compare_methods_monitored(
    points: &[SurveyPoint],
    idw: &IdwConfig,
    kriging: &KrigingConfig,
    validation: &CrossValidationConfig,
    monitor: &Monitor<'_>,
) -> Result<MethodComparison> {
    // Same seed for both runs so they see identical folds
    let validation = CrossValidationConfig {
        seed: Some(validation.seed.unwrap_or_else(rand::random)),
        ..validation.clone()
    };

    let idw_cv = cross_validate_monitored(points, &InterpolationMethod::Idw(idw.clone()), &validation, monitor)?;
    let kriging_cv =
        cross_validate_monitored(points, &InterpolationMethod::Kriging(kriging.clone()), &validation, monitor)?;

    let (min_z, max_z) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)));
    let z_range = max_z - min_z;

    let idw = MethodScore {
        method: SurfaceMethod::Idw,
        score: comparison_score(&idw_cv.metrics, z_range),
        validation: idw_cv,
    };
    let kriging = MethodScore {
        method: SurfaceMethod::Kriging,
        score: comparison_score(&kriging_cv.metrics, z_range),
        validation: kriging_cv,
    };

    let (winner, loser) = if kriging.score > idw.score {
        (&kriging, &idw)
    } else {
        (&idw, &kriging)
    };
    let justification = justify(winner, loser);
    let recommended = winner.method;

    tracing::debug!(
        idw_score = idw.score,
        kriging_score = kriging.score,
        recommended = recommended.label(),
        "method comparison finished"
    );

    Ok(MethodComparison {
        idw,
        kriging,
        recommended,
        justification,
    })
}

fn justify(winner: &MethodScore, loser: &MethodScore) -> String {
    let w = &winner.validation.metrics;
    let l = &loser.validation.metrics;
    if winner.score == loser.score {
        return format!(
            "{} and {} scored equally ({:.1}); {} is recommended as the cheaper method \
             (RMSE {:.3}, R² {:.3}).",
            winner.method.label(),
            loser.method.label(),
            winner.score,
            winner.method.label(),
            w.rmse,
            w.r2,
        );
    }
    format!(
        "{} is recommended with a score of {:.1} against {:.1} for {}: \
         RMSE {:.3} vs {:.3}, R² {:.3} vs {:.3} over {} validated points.",
        winner.method.label(),
        winner.score,
        loser.score,
        loser.method.label(),
        w.rmse,
        l.rmse,
        w.r2,
        l.r2,
        w.validation_points,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationStrategy;
    use approx::assert_relative_eq;

    fn metrics(rmse: f64, r2: f64, n: usize) -> InterpolationMetrics {
        InterpolationMetrics {
            rmse,
            r2,
            validation_points: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_score_formula() {
        // 0.6·100·(1 − 1/10) + 0.4·100·0.9
        assert_relative_eq!(comparison_score(&metrics(1.0, 0.9, 10), 10.0), 54.0 + 36.0);
        assert_relative_eq!(comparison_score(&metrics(0.0, 1.0, 10), 10.0), 100.0);
        // clamped terms
        assert_relative_eq!(comparison_score(&metrics(20.0, -0.5, 10), 10.0), 0.0);
    }

    #[test]
    fn test_score_edge_cases() {
        assert_eq!(comparison_score(&metrics(0.0, 1.0, 0), 10.0), 0.0);
        assert_relative_eq!(comparison_score(&metrics(0.0, 1.0, 5), 0.0), 100.0);
        assert_relative_eq!(comparison_score(&metrics(0.1, 0.0, 5), 0.0), 0.0);
    }

    #[test]
    fn test_compare_on_plane() {
        let points: Vec<SurveyPoint> = (0..49)
            .map(|i| {
                let (x, y) = ((i % 7) as f64, (i / 7) as f64);
                SurveyPoint::new(x, y, 2.0 * x + 3.0 * y + 1.0)
            })
            .collect();
        let validation = CrossValidationConfig {
            strategy: ValidationStrategy::KFold { k: 5 },
            seed: Some(11),
            ..Default::default()
        };
        let cmp = compare_methods(&points, &IdwConfig::default(), &KrigingConfig::default(), &validation).unwrap();

        assert_eq!(cmp.idw.validation.predictions.len(), cmp.kriging.validation.predictions.len());
        assert!(cmp.kriging.score > cmp.idw.score, "{} vs {}", cmp.kriging.score, cmp.idw.score);
        assert_eq!(cmp.recommended, SurfaceMethod::Kriging);
        assert_eq!(cmp.recommended_score().method, SurfaceMethod::Kriging);
        assert!(cmp.justification.starts_with("Kriging is recommended"), "{}", cmp.justification);
    }

    #[test]
    fn test_tie_goes_to_idw() {
        // Neither method finds a neighbor within the radius, so both score 0
        let points: Vec<SurveyPoint> = (0..16)
            .map(|i| SurveyPoint::new((i % 4) as f64, (i / 4) as f64, i as f64))
            .collect();
        let idw = IdwConfig {
            search_radius: Some(0.5),
            ..Default::default()
        };
        let kriging = KrigingConfig {
            search_radius: Some(0.5),
            ..Default::default()
        };
        let validation = CrossValidationConfig {
            seed: Some(3),
            ..Default::default()
        };
        let cmp = compare_methods(&points, &idw, &kriging, &validation).unwrap();

        assert_eq!(cmp.idw.validation.unpredicted, 16);
        assert_eq!(cmp.idw.score, 0.0);
        assert_eq!(cmp.kriging.score, 0.0);
        assert_eq!(cmp.recommended, SurfaceMethod::Idw);
        assert!(cmp.justification.contains("scored equally"));
    }
}
