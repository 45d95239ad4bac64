//! Rule-based quality assessment of a cross-validated surface
//!
//! Each metric is scored in bands (100 / 80 / 60 / 30) and the weighted
//! mean gives the overall score. Residual patterns (bias, outliers, spatial
//! clustering, edge effects) are reported as issues with suggestions that
//! depend on the interpolation method.
//!
//! An optional [`QualityReviewer`] may add its own score and narrative; the
//! rule-based score always decides the rating.

use serde::{Deserialize, Serialize};
use terrasurf_core::{BoundingBox, Error, Result};

use super::cross_validation::{CrossValidationResult, ValidationPrediction};
use super::metrics::InterpolationMetrics;
use crate::interpolation::SurfaceMethod;

/// Band limits for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
}

impl Bands {
    /// Score of a metric where lower is better
    fn score_lower(&self, value: f64) -> f64 {
        if value <= self.excellent {
            100.0
        } else if value <= self.good {
            80.0
        } else if value <= self.acceptable {
            60.0
        } else {
            30.0
        }
    }

    /// Score of a metric where higher is better
    fn score_higher(&self, value: f64) -> f64 {
        if value >= self.excellent {
            100.0
        } else if value >= self.good {
            80.0
        } else if value >= self.acceptable {
            60.0
        } else {
            30.0
        }
    }
}

/// Relative weight of each metric in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
    pub max_error: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            rmse: 0.35,
            r2: 0.30,
            mae: 0.20,
            max_error: 0.15,
        }
    }
}

/// Thresholds of the quality assessment, in elevation units where applicable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub rmse: Bands,
    pub r2: Bands,
    pub mae: Bands,
    pub max_error: Bands,
    pub weights: QualityWeights,
    /// |MBE| above this is a systematic bias
    pub bias_threshold: f64,
    /// Fewer validated points than this is sparse
    pub min_validation_points: usize,
    /// Share of largest errors examined for clustering
    pub cluster_fraction: f64,
    /// Clustered when the worst errors spread less than this share of all points
    pub cluster_spread_ratio: f64,
    /// Points within this share of the extent from the border count as edge points
    pub edge_fraction: f64,
    /// Edge MAE above this multiple of interior MAE is an edge effect
    pub edge_ratio: f64,
    pub pass_score: f64,
    pub pass_r2: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            rmse: Bands {
                excellent: 0.05,
                good: 0.15,
                acceptable: 0.30,
            },
            r2: Bands {
                excellent: 0.95,
                good: 0.90,
                acceptable: 0.80,
            },
            mae: Bands {
                excellent: 0.03,
                good: 0.10,
                acceptable: 0.20,
            },
            max_error: Bands {
                excellent: 0.15,
                good: 0.50,
                acceptable: 1.00,
            },
            weights: QualityWeights::default(),
            bias_threshold: 0.1,
            min_validation_points: 10,
            cluster_fraction: 0.2,
            cluster_spread_ratio: 0.5,
            edge_fraction: 0.1,
            edge_ratio: 1.5,
            pass_score: 50.0,
            pass_r2: 0.8,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, b) in [("rmse", &self.rmse), ("mae", &self.mae), ("max_error", &self.max_error)] {
            if !(b.excellent <= b.good && b.good <= b.acceptable) {
                return Err(Error::invalid_parameter(name, format!("{b:?}"), "bands must be increasing"));
            }
        }
        if !(self.r2.excellent >= self.r2.good && self.r2.good >= self.r2.acceptable) {
            return Err(Error::invalid_parameter("r2", format!("{:?}", self.r2), "bands must be decreasing"));
        }
        let w = &self.weights;
        if [w.rmse, w.r2, w.mae, w.max_error].iter().any(|v| !(*v >= 0.0))
            || w.rmse + w.r2 + w.mae + w.max_error <= 0.0
        {
            return Err(Error::invalid_parameter(
                "weights",
                format!("{w:?}"),
                "must be >= 0 with a positive sum",
            ));
        }
        if !(self.cluster_fraction > 0.0 && self.cluster_fraction <= 1.0) {
            return Err(Error::invalid_parameter("cluster_fraction", self.cluster_fraction, "must be in (0, 1]"));
        }
        if !(self.edge_fraction > 0.0 && self.edge_fraction < 0.5) {
            return Err(Error::invalid_parameter("edge_fraction", self.edge_fraction, "must be in (0, 0.5)"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRating {
    Poor,
    Acceptable,
    Good,
    Excellent,
}

impl QualityRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            QualityRating::Excellent
        } else if score >= 75.0 {
            QualityRating::Good
        } else if score >= 50.0 {
            QualityRating::Acceptable
        } else {
            QualityRating::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityRating::Excellent => "excellent",
            QualityRating::Good => "good",
            QualityRating::Acceptable => "acceptable",
            QualityRating::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    HighRmse,
    LowR2,
    SystematicBias,
    MaxErrorOutlier,
    SpatialClustering,
    EdgeEffects,
    SparseValidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub message: String,
    /// Planar location the issue concentrates at, if any
    pub location: Option<[f64; 2]>,
}

/// Band score of each metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScores {
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
    pub max_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub method: SurfaceMethod,
    pub metrics: InterpolationMetrics,
    pub components: ComponentScores,
    /// Weighted rule-based score, 0-100
    pub score: f64,
    pub rating: QualityRating,
    pub passed: bool,
    pub issues: Vec<QualityIssue>,
    pub suggestions: Vec<String>,
    pub reviewer_score: Option<f64>,
    pub narrative: Option<String>,
}

impl QualityReport {
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    pub fn worst_severity(&self) -> Option<IssueSeverity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// Second opinion on a rule-based report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerVerdict {
    /// 0-100
    pub score: f64,
    pub narrative: String,
}

/// External reviewer of quality reports, e.g. a remote model or a human
/// sign-off queue.
pub trait QualityReviewer {
    fn review(&self, report: &QualityReport) -> Result<ReviewerVerdict>;
}

/// Score a cross-validation run and diagnose its residuals.
///
/// `config` is used as given; check hand-built thresholds with
/// [`QualityConfig::validate`] first.
pub fn assess_quality(cv: &CrossValidationResult, config: &QualityConfig) -> QualityReport {
    let m = cv.metrics;
    let method = cv.method.surface_method();

    if m.validation_points == 0 {
        let issues = vec![QualityIssue {
            kind: IssueKind::SparseValidation,
            severity: IssueSeverity::Critical,
            message: format!(
                "no point could be validated ({} folds skipped, {} without prediction)",
                cv.skipped_folds.len(),
                cv.unpredicted
            ),
            location: None,
        }];
        let suggestions = suggestions_for(&issues, method);
        return QualityReport {
            method,
            metrics: m,
            components: ComponentScores {
                rmse: 0.0,
                r2: 0.0,
                mae: 0.0,
                max_error: 0.0,
            },
            score: 0.0,
            rating: QualityRating::Poor,
            passed: false,
            issues,
            suggestions,
            reviewer_score: None,
            narrative: None,
        };
    }

    let components = ComponentScores {
        rmse: config.rmse.score_lower(m.rmse),
        r2: config.r2.score_higher(m.r2),
        mae: config.mae.score_lower(m.mae),
        max_error: config.max_error.score_lower(m.max_error),
    };
    let w = &config.weights;
    let weight_sum = w.rmse + w.r2 + w.mae + w.max_error;
    let score = if weight_sum > 0.0 {
        (w.rmse * components.rmse + w.r2 * components.r2 + w.mae * components.mae + w.max_error * components.max_error)
            / weight_sum
    } else {
        (components.rmse + components.r2 + components.mae + components.max_error) / 4.0
    };
    let rating = QualityRating::from_score(score);
    let passed = score >= config.pass_score && m.r2 >= config.pass_r2;

    let issues = find_issues(cv, config);
    let suggestions = suggestions_for(&issues, method);

    tracing::debug!(
        method = method.label(),
        score,
        rating = rating.label(),
        passed,
        issues = issues.len(),
        "quality assessed"
    );

    QualityReport {
        method,
        metrics: m,
        components,
        score,
        rating,
        passed,
        issues,
        suggestions,
        reviewer_score: None,
        narrative: None,
    }
}

/// [`assess_quality`], then ask `reviewer` for a verdict.
///
/// The verdict is stored next to the rule-based result and never changes
/// score, rating or pass. A failing reviewer is logged and ignored.
pub fn assess_quality_with_reviewer(
    cv: &CrossValidationResult,
    config: &QualityConfig,
    reviewer: &dyn QualityReviewer,
) -> QualityReport {
    let mut report = assess_quality(cv, config);
    match reviewer.review(&report) {
        Ok(verdict) => {
            report.reviewer_score = Some(verdict.score.clamp(0.0, 100.0));
            report.narrative = Some(verdict.narrative);
        }
        Err(e) => {
            tracing::warn!(error = %e, "quality reviewer failed, keeping rule-based assessment");
        }
    }
    report
}

fn find_issues(cv: &CrossValidationResult, config: &QualityConfig) -> Vec<QualityIssue> {
    let m = &cv.metrics;
    let mut issues = Vec::new();

    if m.rmse > config.rmse.good {
        issues.push(QualityIssue {
            kind: IssueKind::HighRmse,
            severity: if m.rmse > config.rmse.acceptable {
                IssueSeverity::Critical
            } else {
                IssueSeverity::Warning
            },
            message: format!("RMSE {:.3} exceeds the good limit of {:.3}", m.rmse, config.rmse.good),
            location: None,
        });
    }

    if m.r2 < config.r2.good {
        issues.push(QualityIssue {
            kind: IssueKind::LowR2,
            severity: if m.r2 < config.r2.acceptable {
                IssueSeverity::Critical
            } else {
                IssueSeverity::Warning
            },
            message: format!("R² {:.3} is below {:.2}", m.r2, config.r2.good),
            location: None,
        });
    }

    if m.mbe.abs() > config.bias_threshold {
        let direction = if m.mbe > 0.0 { "overestimates" } else { "underestimates" };
        issues.push(QualityIssue {
            kind: IssueKind::SystematicBias,
            severity: IssueSeverity::Warning,
            message: format!("surface {direction} elevations by {:.3} on average", m.mbe.abs()),
            location: None,
        });
    }

    if m.max_error > 3.0 * m.rmse && m.max_error > config.max_error.acceptable {
        let worst = cv
            .predictions
            .iter()
            .max_by(|a, b| a.residual.abs().total_cmp(&b.residual.abs()));
        issues.push(QualityIssue {
            kind: IssueKind::MaxErrorOutlier,
            severity: IssueSeverity::Warning,
            message: format!(
                "largest error {:.3} is more than 3x the RMSE ({:.3})",
                m.max_error, m.rmse
            ),
            location: worst.map(|p| [p.x, p.y]),
        });
    }

    if let Some(issue) = spatial_clustering(&cv.predictions, config) {
        issues.push(issue);
    }
    if let Some(issue) = edge_effects(&cv.predictions, config) {
        issues.push(issue);
    }

    if m.validation_points < config.min_validation_points {
        issues.push(QualityIssue {
            kind: IssueKind::SparseValidation,
            severity: IssueSeverity::Info,
            message: format!(
                "only {} points validated, metrics may be unreliable",
                m.validation_points
            ),
            location: None,
        });
    }

    issues
}

fn centroid(points: &[&ValidationPrediction]) -> [f64; 2] {
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    [sx / n, sy / n]
}

/// Mean distance to the centroid
fn spread(points: &[&ValidationPrediction], c: [f64; 2]) -> f64 {
    points.iter().map(|p| (p.x - c[0]).hypot(p.y - c[1])).sum::<f64>() / points.len() as f64
}

fn spatial_clustering(predictions: &[ValidationPrediction], config: &QualityConfig) -> Option<QualityIssue> {
    let mut by_error: Vec<&ValidationPrediction> = predictions.iter().collect();
    by_error.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));
    let top = ((by_error.len() as f64 * config.cluster_fraction).ceil() as usize).min(by_error.len());
    if top < 2 || top == by_error.len() {
        return None;
    }

    let overall = spread(&by_error, centroid(&by_error));
    let worst = &by_error[..top];
    let c = centroid(worst);
    let worst_spread = spread(worst, c);
    if !(overall > 0.0 && worst_spread < config.cluster_spread_ratio * overall) {
        return None;
    }

    Some(QualityIssue {
        kind: IssueKind::SpatialClustering,
        severity: IssueSeverity::Warning,
        message: format!(
            "the {top} largest errors cluster around ({:.2}, {:.2}), spread {:.2} against {:.2} overall",
            c[0], c[1], worst_spread, overall
        ),
        location: Some(c),
    })
}

fn edge_effects(predictions: &[ValidationPrediction], config: &QualityConfig) -> Option<QualityIssue> {
    let (first, rest) = predictions.split_first()?;
    let bounds = rest.iter().fold(
        BoundingBox::new(first.x, first.y, first.x, first.y),
        |mut b, p| {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
            b
        },
    );
    let mx = config.edge_fraction * bounds.width();
    let my = config.edge_fraction * bounds.height();
    let on_edge = |p: &ValidationPrediction| {
        p.x - bounds.min_x <= mx || bounds.max_x - p.x <= mx || p.y - bounds.min_y <= my || bounds.max_y - p.y <= my
    };

    let (mut edge_sum, mut edge_n, mut inner_sum, mut inner_n) = (0.0, 0usize, 0.0, 0usize);
    for p in predictions {
        if on_edge(p) {
            edge_sum += p.residual.abs();
            edge_n += 1;
        } else {
            inner_sum += p.residual.abs();
            inner_n += 1;
        }
    }
    if edge_n == 0 || inner_n == 0 {
        return None;
    }
    let edge_mae = edge_sum / edge_n as f64;
    let inner_mae = inner_sum / inner_n as f64;
    if !(edge_mae > config.edge_ratio * inner_mae) {
        return None;
    }

    Some(QualityIssue {
        kind: IssueKind::EdgeEffects,
        severity: IssueSeverity::Warning,
        message: format!(
            "MAE near the survey border is {edge_mae:.3} against {inner_mae:.3} inside ({edge_n} edge points)"
        ),
        location: None,
    })
}

fn suggestions_for(issues: &[QualityIssue], method: SurfaceMethod) -> Vec<String> {
    let kriging = method == SurfaceMethod::Kriging;
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !out.contains(&s) {
            out.push(s);
        }
    };

    for issue in issues {
        match issue.kind {
            IssueKind::HighRmse | IssueKind::LowR2 => {
                if kriging {
                    push("Check the fitted variogram; a fixed model or more lags may describe the site better".into());
                    push("Compare against IDW; with few points a simpler method can validate better".into());
                } else {
                    push("Try Ordinary Kriging, which models the spatial correlation of the survey".into());
                    push("Optimise the IDW power by cross-validation".into());
                }
                push("Densify the survey where residuals are large".into());
            }
            IssueKind::SystematicBias => {
                push("Check the survey for a datum or instrument offset".into());
            }
            IssueKind::MaxErrorOutlier => {
                let at = issue
                    .location
                    .map(|[x, y]| format!(" near ({x:.2}, {y:.2})"))
                    .unwrap_or_default();
                push(format!("Inspect the point{at} for a blunder or re-run cleaning with a lower outlier threshold"));
            }
            IssueKind::SpatialClustering => {
                let at = issue
                    .location
                    .map(|[x, y]| format!(" around ({x:.2}, {y:.2})"))
                    .unwrap_or_default();
                push(format!("Add survey points{at}; the terrain there varies faster than the sampling"));
                if kriging {
                    push("Reduce the kriging search radius so local structure is not averaged out".into());
                } else {
                    push("Raise the IDW power to weight the nearest points more".into());
                }
            }
            IssueKind::EdgeEffects => {
                if kriging {
                    push("Extend the survey past the area of interest; kriging reverts to the mean away from data".into());
                } else {
                    push("Extend the survey past the area of interest; IDW cannot extrapolate trends".into());
                }
            }
            IssueKind::SparseValidation => {
                push("Validate more points: use leave-one-out or raise max_points".into());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{IdwConfig, KrigingConfig};
    use crate::validation::{InterpolationMethod, ValidationStrategy};
    use std::time::Duration;

    fn prediction(index: usize, x: f64, y: f64, residual: f64) -> ValidationPrediction {
        ValidationPrediction {
            index,
            x,
            y,
            actual: 10.0,
            predicted: 10.0 + residual,
            residual,
            fold: index,
            exceeds_threshold: false,
        }
    }

    fn result(method: InterpolationMethod, predictions: Vec<ValidationPrediction>) -> CrossValidationResult {
        let pairs: Vec<(f64, f64)> = predictions.iter().map(|p| (p.actual, p.predicted)).collect();
        CrossValidationResult {
            method,
            strategy: ValidationStrategy::default(),
            metrics: InterpolationMetrics::from_pairs(&pairs),
            predictions,
            fold_metrics: Vec::new(),
            skipped_folds: Vec::new(),
            unpredicted: 0,
            compute_time: Duration::ZERO,
        }
    }

    /// 10x10 lattice with residual `f(x, y)` at every node
    fn lattice(f: impl Fn(f64, f64) -> f64) -> Vec<ValidationPrediction> {
        (0..100)
            .map(|i| {
                let (x, y) = ((i % 10) as f64, (i / 10) as f64);
                prediction(i, x, y, f(x, y))
            })
            .collect()
    }

    fn with_metrics(metrics: InterpolationMetrics) -> CrossValidationResult {
        CrossValidationResult {
            metrics,
            ..result(InterpolationMethod::Idw(IdwConfig::default()), Vec::new())
        }
    }

    #[test]
    fn test_band_scores() {
        let bands = QualityConfig::default().rmse;
        assert_eq!(bands.score_lower(0.05), 100.0);
        assert_eq!(bands.score_lower(0.1), 80.0);
        assert_eq!(bands.score_lower(0.3), 60.0);
        assert_eq!(bands.score_lower(0.31), 30.0);

        let r2 = QualityConfig::default().r2;
        assert_eq!(r2.score_higher(0.99), 100.0);
        assert_eq!(r2.score_higher(0.92), 80.0);
        assert_eq!(r2.score_higher(0.85), 60.0);
        assert_eq!(r2.score_higher(-1.0), 30.0);
    }

    #[test]
    fn test_weighted_score_and_rating() {
        let cv = with_metrics(InterpolationMetrics {
            rmse: 0.1,
            r2: 0.97,
            mae: 0.02,
            max_error: 0.8,
            mbe: 0.0,
            validation_points: 50,
        });
        let report = assess_quality(&cv, &QualityConfig::default());
        let expected = 0.35 * 80.0 + 0.30 * 100.0 + 0.20 * 100.0 + 0.15 * 60.0;
        assert!((report.score - expected).abs() < 1e-9, "{}", report.score);
        assert_eq!(report.rating, QualityRating::Good);
        assert!(report.passed);
        assert_eq!(report.components.max_error, 60.0);
    }

    #[test]
    fn test_rating_boundaries() {
        assert_eq!(QualityRating::from_score(90.0), QualityRating::Excellent);
        assert_eq!(QualityRating::from_score(89.9), QualityRating::Good);
        assert_eq!(QualityRating::from_score(75.0), QualityRating::Good);
        assert_eq!(QualityRating::from_score(50.0), QualityRating::Acceptable);
        assert_eq!(QualityRating::from_score(49.9), QualityRating::Poor);
    }

    #[test]
    fn test_pass_requires_r2() {
        // Good errors but R² below 0.8
        let cv = with_metrics(InterpolationMetrics {
            rmse: 0.01,
            r2: 0.7,
            mae: 0.01,
            max_error: 0.05,
            mbe: 0.0,
            validation_points: 50,
        });
        let report = assess_quality(&cv, &QualityConfig::default());
        assert!(report.score >= 50.0);
        assert!(!report.passed);
        assert!(report.has_issue(IssueKind::LowR2));
        assert_eq!(report.worst_severity(), Some(IssueSeverity::Critical));
    }

    #[test]
    fn test_high_rmse_and_bias() {
        let cv = with_metrics(InterpolationMetrics {
            rmse: 0.5,
            r2: 0.9,
            mae: 0.4,
            max_error: 0.9,
            mbe: -0.3,
            validation_points: 50,
        });
        let report = assess_quality(&cv, &QualityConfig::default());
        let high = report.issues.iter().find(|i| i.kind == IssueKind::HighRmse).unwrap();
        assert_eq!(high.severity, IssueSeverity::Critical);
        let bias = report.issues.iter().find(|i| i.kind == IssueKind::SystematicBias).unwrap();
        assert!(bias.message.contains("underestimates"), "{}", bias.message);
        assert!(report.suggestions.iter().any(|s| s.contains("Ordinary Kriging")));
    }

    #[test]
    fn test_suggestions_are_method_aware() {
        let metrics = InterpolationMetrics {
            rmse: 0.5,
            r2: 0.5,
            mae: 0.4,
            max_error: 0.9,
            mbe: 0.0,
            validation_points: 50,
        };
        let kriging = CrossValidationResult {
            metrics,
            ..result(InterpolationMethod::Kriging(KrigingConfig::default()), Vec::new())
        };
        let report = assess_quality(&kriging, &QualityConfig::default());
        assert_eq!(report.method, SurfaceMethod::Kriging);
        assert!(report.suggestions.iter().any(|s| s.contains("variogram")));
        assert!(!report.suggestions.iter().any(|s| s.contains("Try Ordinary Kriging")));
    }

    #[test]
    fn test_max_error_outlier_location() {
        let mut predictions = lattice(|_, _| 0.05);
        predictions[37].residual = 4.0;
        predictions[37].predicted = 14.0;
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), predictions);
        let report = assess_quality(&cv, &QualityConfig::default());

        let outlier = report.issues.iter().find(|i| i.kind == IssueKind::MaxErrorOutlier).unwrap();
        assert_eq!(outlier.location, Some([7.0, 3.0]));
        assert!(report.suggestions.iter().any(|s| s.contains("(7.00, 3.00)")));
    }

    #[test]
    fn test_spatial_clustering() {
        // Large errors only in the 5x4 corner block with x >= 5, y >= 6
        let predictions = lattice(|x, y| if x >= 5.0 && y >= 6.0 { 1.0 } else { 0.01 });
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), predictions);
        let report = assess_quality(&cv, &QualityConfig::default());

        let cluster = report.issues.iter().find(|i| i.kind == IssueKind::SpatialClustering).unwrap();
        let [cx, cy] = cluster.location.unwrap();
        assert!((cx - 7.0).abs() < 1e-9 && (cy - 7.5).abs() < 1e-9, "({cx}, {cy})");
    }

    #[test]
    fn test_uniform_errors_are_not_clustered() {
        let predictions = lattice(|x, y| if (x + y) as usize % 5 == 0 { 0.2 } else { 0.01 });
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), predictions);
        let report = assess_quality(&cv, &QualityConfig::default());
        assert!(!report.has_issue(IssueKind::SpatialClustering));
    }

    #[test]
    fn test_edge_effects() {
        let predictions = lattice(|x, y| if x == 0.0 || x == 9.0 || y == 0.0 || y == 9.0 { 0.5 } else { 0.05 });
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), predictions);
        let report = assess_quality(&cv, &QualityConfig::default());
        assert!(report.has_issue(IssueKind::EdgeEffects));
        assert!(report.suggestions.iter().any(|s| s.contains("extrapolate")));
    }

    #[test]
    fn test_sparse_validation() {
        let predictions = (0..5).map(|i| prediction(i, i as f64, 0.0, 0.01)).collect();
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), predictions);
        let report = assess_quality(&cv, &QualityConfig::default());
        let sparse = report.issues.iter().find(|i| i.kind == IssueKind::SparseValidation).unwrap();
        assert_eq!(sparse.severity, IssueSeverity::Info);
    }

    #[test]
    fn test_nothing_validated_fails() {
        let report = assess_quality(
            &result(InterpolationMethod::Idw(IdwConfig::default()), Vec::new()),
            &QualityConfig::default(),
        );
        assert_eq!(report.score, 0.0);
        assert_eq!(report.rating, QualityRating::Poor);
        assert!(!report.passed);
        assert_eq!(report.worst_severity(), Some(IssueSeverity::Critical));
    }

    struct FixedReviewer(f64);

    impl QualityReviewer for FixedReviewer {
        fn review(&self, report: &QualityReport) -> Result<ReviewerVerdict> {
            Ok(ReviewerVerdict {
                score: self.0,
                narrative: format!("rule score was {:.0}", report.score),
            })
        }
    }

    struct FailingReviewer;

    impl QualityReviewer for FailingReviewer {
        fn review(&self, _: &QualityReport) -> Result<ReviewerVerdict> {
            Err(Error::Algorithm("service unavailable".into()))
        }
    }

    #[test]
    fn test_reviewer_does_not_override_rules() {
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), lattice(|_, _| 0.01));
        let plain = assess_quality(&cv, &QualityConfig::default());
        let reviewed = assess_quality_with_reviewer(&cv, &QualityConfig::default(), &FixedReviewer(10.0));

        assert_eq!(reviewed.score, plain.score);
        assert_eq!(reviewed.rating, plain.rating);
        assert_eq!(reviewed.reviewer_score, Some(10.0));
        assert!(reviewed.narrative.as_deref().unwrap().starts_with("rule score"));
    }

    #[test]
    fn test_failing_reviewer_keeps_rule_result() {
        let cv = result(InterpolationMethod::Idw(IdwConfig::default()), lattice(|_, _| 0.01));
        let plain = assess_quality(&cv, &QualityConfig::default());
        let reviewed = assess_quality_with_reviewer(&cv, &QualityConfig::default(), &FailingReviewer);
        assert_eq!(reviewed, plain);
    }

    #[test]
    fn test_config_validation() {
        assert!(QualityConfig::default().validate().is_ok());
        let mut bad = QualityConfig::default();
        bad.rmse.good = 0.01;
        assert!(bad.validate().is_err());
        let zero_weights = QualityConfig {
            weights: QualityWeights {
                rmse: 0.0,
                r2: 0.0,
                mae: 0.0,
                max_error: 0.0,
            },
            ..Default::default()
        };
        assert!(zero_weights.validate().is_err());
    }
}
