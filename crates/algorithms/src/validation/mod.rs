//! Cross-validation and quality assessment of interpolated surfaces
//!
//! - `cross_validate`: leave-one-out, k-fold and random-split validation
//! - `compare_methods`: IDW against Ordinary Kriging on the same folds
//! - `assess_quality`: band scores, rating and residual diagnostics
//! - `identify_problem_areas`: points whose error exceeds a tolerance

mod comparison;
mod cross_validation;
mod metrics;
mod problem_areas;
mod quality;

pub use comparison::{
    comparison_score, compare_methods, compare_methods_monitored, MethodComparison, MethodScore,
};
pub use cross_validation::{
    cross_validate, cross_validate_monitored, CrossValidationConfig, CrossValidationResult,
    FoldMetrics, InterpolationMethod, SkippedFold, ValidationPrediction, ValidationStrategy,
};
pub use metrics::InterpolationMetrics;
pub use problem_areas::{identify_problem_areas, ProblemArea, ProblemSeverity};
pub use quality::{
    assess_quality, assess_quality_with_reviewer, Bands, ComponentScores, IssueKind, IssueSeverity,
    QualityConfig, QualityIssue, QualityRating, QualityReport, QualityReviewer, QualityWeights,
    ReviewerVerdict,
};
