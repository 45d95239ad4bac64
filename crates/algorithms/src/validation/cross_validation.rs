//! Cross-validation of the grid interpolators
//!
//! Points are split into folds; each fold is predicted by an interpolator
//! built from the remaining points and the held-out residuals are scored.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use terrasurf_core::{Error, Monitor, Result, Stage, SurveyPoint};

use super::metrics::InterpolationMetrics;
use crate::interpolation::{
    IdwConfig, IdwInterpolator, KrigingConfig, KrigingInterpolator, Predictor, SurfaceMethod,
};
use crate::seeded_rng;

/// How points are split into training and test sets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStrategy {
    /// Hold out one point at a time, for at most `max_points` sampled points
    LeaveOneOut { max_points: usize },
    /// Shuffle and deal points into `k` folds
    KFold { k: usize },
    /// Repeatedly hold out a random `test_fraction` of the points
    RandomSplit { iterations: usize, test_fraction: f64 },
}

impl Default for ValidationStrategy {
    fn default() -> Self {
        ValidationStrategy::LeaveOneOut { max_points: 200 }
    }
}

impl ValidationStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ValidationStrategy::LeaveOneOut { .. } => "leave-one-out",
            ValidationStrategy::KFold { .. } => "k-fold",
            ValidationStrategy::RandomSplit { .. } => "random split",
        }
    }
}

/// Parameters for [`cross_validate`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationConfig {
    pub strategy: ValidationStrategy,
    /// Seed for fold assignment and variogram sampling; `None` draws from the OS
    pub seed: Option<u64>,
    /// Absolute residual above which a prediction is flagged
    pub error_threshold: Option<f64>,
}

impl CrossValidationConfig {
    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            ValidationStrategy::LeaveOneOut { max_points } if max_points == 0 => {
                return Err(Error::invalid_parameter("max_points", 0, "must be >= 1"));
            }
            ValidationStrategy::KFold { k } if k < 2 => {
                return Err(Error::invalid_parameter("k", k, "must be >= 2"));
            }
            ValidationStrategy::RandomSplit { iterations, test_fraction } => {
                if iterations == 0 {
                    return Err(Error::invalid_parameter("iterations", 0, "must be >= 1"));
                }
                if !(test_fraction > 0.0 && test_fraction < 1.0) {
                    return Err(Error::invalid_parameter("test_fraction", test_fraction, "must be in (0, 1)"));
                }
            }
            _ => {}
        }
        if let Some(t) = self.error_threshold
            && !(t >= 0.0)
        {
            return Err(Error::invalid_parameter("error_threshold", t, "must be >= 0"));
        }
        Ok(())
    }
}

/// Interpolator under validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    Idw(IdwConfig),
    Kriging(KrigingConfig),
}

impl InterpolationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            InterpolationMethod::Idw(_) => "IDW",
            InterpolationMethod::Kriging(_) => "Kriging",
        }
    }

    /// Smallest training set the method can be built from
    pub fn min_training_points(&self) -> usize {
        match self {
            InterpolationMethod::Idw(c) => c.min_neighbors.max(1),
            InterpolationMethod::Kriging(c) => c.required_points(),
        }
    }

    pub fn surface_method(&self) -> SurfaceMethod {
        match self {
            InterpolationMethod::Idw(_) => SurfaceMethod::Idw,
            InterpolationMethod::Kriging(_) => SurfaceMethod::Kriging,
        }
    }
}

/// One held-out point and its prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationPrediction {
    /// Index into the validated points
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub actual: f64,
    pub predicted: f64,
    /// predicted - actual
    pub residual: f64,
    pub fold: usize,
    pub exceeds_threshold: bool,
}

/// Metrics of one evaluated fold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub training_points: usize,
    pub test_points: usize,
    pub metrics: InterpolationMetrics,
}

/// A fold that could not be evaluated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFold {
    pub fold: usize,
    pub training_points: usize,
    pub reason: String,
}

/// Outcome of [`cross_validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationResult {
    pub method: InterpolationMethod,
    pub strategy: ValidationStrategy,
    pub predictions: Vec<ValidationPrediction>,
    /// Over every prediction of every evaluated fold
    pub metrics: InterpolationMetrics,
    pub fold_metrics: Vec<FoldMetrics>,
    pub skipped_folds: Vec<SkippedFold>,
    /// Held-out points the interpolator returned no data for
    pub unpredicted: usize,
    pub compute_time: Duration,
}

impl CrossValidationResult {
    pub fn flagged(&self) -> impl Iterator<Item = &ValidationPrediction> {
        self.predictions.iter().filter(|p| p.exceeds_threshold)
    }
}

struct Fold {
    test: Vec<usize>,
}

fn make_folds(n: usize, strategy: ValidationStrategy, rng: &mut StdRng) -> Vec<Fold> {
    match strategy {
        ValidationStrategy::LeaveOneOut { max_points } => {
            let mut held: Vec<usize> = if n <= max_points {
                (0..n).collect()
            } else {
                rand::seq::index::sample(rng, n, max_points).into_vec()
            };
            held.sort_unstable();
            held.into_iter().map(|i| Fold { test: vec![i] }).collect()
        }
        ValidationStrategy::KFold { k } => {
            let k = k.clamp(2, n);
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            let mut folds: Vec<Fold> = (0..k).map(|_| Fold { test: Vec::new() }).collect();
            for (pos, i) in order.into_iter().enumerate() {
                folds[pos % k].test.push(i);
            }
            folds
        }
        ValidationStrategy::RandomSplit { iterations, test_fraction } => {
            let test_size = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
            (0..iterations)
                .map(|_| {
                    let mut order: Vec<usize> = (0..n).collect();
                    order.shuffle(rng);
                    order.truncate(test_size);
                    Fold { test: order }
                })
                .collect()
        }
    }
}

/// Build the interpolator for one training set.
///
/// `Ok(None)` means the training set cannot support the method.
fn build_predictor<'a>(
    method: &InterpolationMethod,
    training: &'a [SurveyPoint],
    rng: &mut StdRng,
) -> Result<Option<Box<dyn Predictor + 'a>>> {
    let built: Result<Box<dyn Predictor + 'a>> = match method {
        InterpolationMethod::Idw(config) => {
            IdwInterpolator::new(training, config.clone()).map(|i| Box::new(i) as Box<dyn Predictor + 'a>)
        }
        InterpolationMethod::Kriging(config) => {
            KrigingInterpolator::new(training, config.clone(), rng).map(|k| Box::new(k) as Box<dyn Predictor + 'a>)
        }
    };
    match built {
        Ok(p) => Ok(Some(p)),
        Err(Error::InsufficientPoints { .. } | Error::DegenerateGeometry(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Cross-validate `method` on `points`.
pub fn cross_validate(
    points: &[SurveyPoint],
    method: &InterpolationMethod,
    config: &CrossValidationConfig,
) -> Result<CrossValidationResult> {
    cross_validate_monitored(points, method, config, &Monitor::none())
}

/// [`cross_validate`] with progress under the `validating_quality` stage.
///
/// Cancellation is checked before every fold. Kriging refits its variogram
/// on every training set, drawing from the validation RNG.
pub fn cross_validate_monitored(
    points: &[SurveyPoint],
    method: &InterpolationMethod,
    config: &CrossValidationConfig,
    monitor: &Monitor<'_>,
) -> Result<CrossValidationResult> {
    let start = Instant::now();
    config.validate()?;
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientPoints { required: 2, found: n });
    }

    let mut rng = seeded_rng(config.seed);
    let folds = make_folds(n, config.strategy, &mut rng);
    let required = method.min_training_points();

    monitor.report(
        Stage::ValidatingQuality,
        0.0,
        format!("{} {} over {} folds", method.label(), config.strategy.label(), folds.len()),
    );

    let mut predictions = Vec::new();
    let mut fold_metrics = Vec::with_capacity(folds.len());
    let mut skipped_folds = Vec::new();
    let mut unpredicted = 0;
    let mut in_test = vec![false; n];

    for (f, fold) in folds.iter().enumerate() {
        monitor.check_cancelled()?;

        fold.test.iter().for_each(|&i| in_test[i] = true);
        let training: Vec<SurveyPoint> = points
            .iter()
            .zip(&in_test)
            .filter(|(_, held)| !**held)
            .map(|(p, _)| p.clone())
            .collect();
        fold.test.iter().for_each(|&i| in_test[i] = false);

        let predictor = if training.len() < required {
            None
        } else {
            build_predictor(method, &training, &mut rng)?
        };
        let Some(predictor) = predictor else {
            tracing::warn!(
                fold = f,
                training = training.len(),
                required,
                "skipping fold: training set too small for {}",
                method.label()
            );
            skipped_folds.push(SkippedFold {
                fold: f,
                training_points: training.len(),
                reason: format!(
                    "{} training points, {} needs at least {}",
                    training.len(),
                    method.label(),
                    required
                ),
            });
            continue;
        };

        let mut pairs = Vec::with_capacity(fold.test.len());
        for &i in &fold.test {
            let p = &points[i];
            let Some(predicted) = predictor.predict(p.x, p.y) else {
                unpredicted += 1;
                continue;
            };
            let residual = predicted - p.z;
            pairs.push((p.z, predicted));
            predictions.push(ValidationPrediction {
                index: i,
                x: p.x,
                y: p.y,
                actual: p.z,
                predicted,
                residual,
                fold: f,
                exceeds_threshold: config.error_threshold.is_some_and(|t| residual.abs() > t),
            });
        }
        fold_metrics.push(FoldMetrics {
            fold: f,
            training_points: training.len(),
            test_points: fold.test.len(),
            metrics: InterpolationMetrics::from_pairs(&pairs),
        });

        monitor.report(
            Stage::ValidatingQuality,
            100.0 * (f + 1) as f64 / folds.len() as f64,
            format!("fold {}/{}", f + 1, folds.len()),
        );
    }

    let pairs: Vec<(f64, f64)> = predictions.iter().map(|p| (p.actual, p.predicted)).collect();
    let metrics = InterpolationMetrics::from_pairs(&pairs);

    tracing::debug!(
        method = method.label(),
        strategy = config.strategy.label(),
        folds = folds.len(),
        skipped = skipped_folds.len(),
        validated = metrics.validation_points,
        unpredicted,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        "cross-validation finished"
    );

    Ok(CrossValidationResult {
        method: method.clone(),
        strategy: config.strategy,
        predictions,
        metrics,
        fold_metrics,
        skipped_folds,
        unpredicted,
        compute_time: start.elapsed(),
    })
}
