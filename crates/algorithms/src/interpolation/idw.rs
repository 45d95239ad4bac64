//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates values at unknown locations as a weighted average of nearby
//! survey points, where weights are inversely proportional to distance
//! raised to a power parameter.
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use serde::{Deserialize, Serialize};
use terrasurf_core::{Algorithm, Error, GridConfig, Monitor, Result, SurveyPoint};

use super::kdtree::KdTree;
use super::{rasterize, CellEstimate, GridInput, InterpolationResult, Predictor, SurfaceMethod, COINCIDENCE_EPS};
use crate::validation::{cross_validate, CrossValidationConfig, InterpolationMetrics, InterpolationMethod};

/// Parameters for IDW interpolation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdwConfig {
    /// Power parameter (default: 2.0).
    /// Higher values give more weight to nearby points.
    pub power: f64,
    /// Maximum search radius. `None` searches without a distance limit.
    pub search_radius: Option<f64>,
    /// Fewer neighbors than this yields no data (default 1)
    pub min_neighbors: usize,
    /// Nearest neighbors used per estimate (default 12)
    pub max_neighbors: usize,
    /// Smoothing length `s`: distances become `sqrt(d² + s²)`
    pub smoothing: Option<f64>,
}

impl Default for IdwConfig {
    fn default() -> Self {
        Self {
            power: 2.0,
            search_radius: None,
            min_neighbors: 1,
            max_neighbors: 12,
            smoothing: None,
        }
    }
}

impl IdwConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(Error::invalid_parameter("power", self.power, "must be finite and > 0"));
        }
        if self.min_neighbors == 0 {
            return Err(Error::invalid_parameter("min_neighbors", 0, "must be >= 1"));
        }
        if self.max_neighbors < self.min_neighbors {
            return Err(Error::invalid_parameter(
                "max_neighbors",
                self.max_neighbors,
                format!("must be >= min_neighbors ({})", self.min_neighbors),
            ));
        }
        if let Some(r) = self.search_radius
            && !(r.is_finite() && r > 0.0)
        {
            return Err(Error::invalid_parameter("search_radius", r, "must be finite and > 0"));
        }
        if let Some(s) = self.smoothing
            && !(s.is_finite() && s >= 0.0)
        {
            return Err(Error::invalid_parameter("smoothing", s, "must be finite and >= 0"));
        }
        Ok(())
    }
}

/// IDW estimator over a borrowed point set
#[derive(Debug, Clone)]
pub struct IdwInterpolator<'a> {
    points: &'a [SurveyPoint],
    tree: KdTree,
    config: IdwConfig,
}

impl<'a> IdwInterpolator<'a> {
    /// Validate `config` and index `points`.
    pub fn new(points: &'a [SurveyPoint], config: IdwConfig) -> Result<Self> {
        config.validate()?;
        if points.len() < config.min_neighbors {
            return Err(Error::InsufficientPoints {
                required: config.min_neighbors,
                found: points.len(),
            });
        }
        Ok(Self {
            points,
            tree: KdTree::build(points),
            config,
        })
    }

    pub fn config(&self) -> &IdwConfig {
        &self.config
    }

    /// Estimate z at (x, y).
    ///
    /// ```text
    /// z(x,y) = Σ(wᵢ·zᵢ) / Σ(wᵢ)    wᵢ = (d_min / dᵢ)^p
    /// ```
    /// Scaling by the nearest distance leaves the estimate unchanged and
    /// keeps large powers from underflowing.
    pub fn predict(&self, x: f64, y: f64) -> Option<f64> {
        let neighbors = self.tree.neighbors(
            x,
            y,
            self.config.search_radius,
            self.config.max_neighbors,
        );
        if neighbors.len() < self.config.min_neighbors || neighbors.is_empty() {
            return None;
        }

        let nearest = neighbors[0];
        if nearest.distance() < COINCIDENCE_EPS {
            return Some(self.points[nearest.index].z);
        }

        let smoothing_sq = self.config.smoothing.map_or(0.0, |s| s * s);
        let effective = |d_sq: f64| (d_sq + smoothing_sq).sqrt();
        let d_min = effective(nearest.distance_sq);

        let mut sum_w = 0.0;
        let mut sum_wz = 0.0;
        for n in &neighbors {
            let w = (d_min / effective(n.distance_sq)).powf(self.config.power);
            sum_w += w;
            sum_wz += w * self.points[n.index].z;
        }

        (sum_w > 0.0).then(|| sum_wz / sum_w)
    }

    pub fn interpolate_grid(&self, grid: &GridConfig) -> Result<InterpolationResult> {
        self.interpolate_grid_monitored(grid, &Monitor::none())
    }

    /// Rasterise onto `grid`, reporting the `interpolating` stage.
    pub fn interpolate_grid_monitored(
        &self,
        grid: &GridConfig,
        monitor: &Monitor<'_>,
    ) -> Result<InterpolationResult> {
        let result = rasterize(grid, SurfaceMethod::Idw, false, monitor, |x, y| {
            CellEstimate::value(self.predict(x, y))
        })?;
        tracing::debug!(
            power = self.config.power,
            points = self.points.len(),
            valid = result.statistics.valid_cells,
            no_data = result.statistics.invalid_cells,
            "IDW grid finished"
        );
        Ok(result)
    }
}

impl Predictor for IdwInterpolator<'_> {
    fn predict(&self, x: f64, y: f64) -> Option<f64> {
        IdwInterpolator::predict(self, x, y)
    }
}

/// Perform IDW interpolation from survey points onto `grid`.
///
/// Cells with fewer than `min_neighbors` points in range hold the grid's
/// no-data value.
pub fn idw(points: &[SurveyPoint], config: &IdwConfig, grid: &GridConfig) -> Result<InterpolationResult> {
    idw_monitored(points, config, grid, &Monitor::none())
}

/// [`idw`] with progress reporting and cancellation.
pub fn idw_monitored(
    points: &[SurveyPoint],
    config: &IdwConfig,
    grid: &GridConfig,
    monitor: &Monitor<'_>,
) -> Result<InterpolationResult> {
    IdwInterpolator::new(points, config.clone())?.interpolate_grid_monitored(grid, monitor)
}

/// IDW gridding as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Idw;

impl Algorithm for Idw {
    type Input = GridInput;
    type Output = InterpolationResult;
    type Params = IdwConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "IDW"
    }

    fn description(&self) -> &'static str {
        "Inverse Distance Weighting interpolation onto a regular grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        idw(&input.points, &params, &input.grid)
    }
}

/// Candidate powers and the validation used to score them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerSearch {
    pub candidates: Vec<f64>,
    pub validation: CrossValidationConfig,
}

impl Default for PowerSearch {
    fn default() -> Self {
        Self {
            candidates: vec![1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0],
            validation: CrossValidationConfig::default(),
        }
    }
}

/// Cross-validation score of one candidate power
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerScore {
    pub power: f64,
    pub metrics: InterpolationMetrics,
}

/// Outcome of [`optimize_power`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerOptimization {
    /// Candidate with the lowest RMSE (first one on ties)
    pub best_power: f64,
    pub best_rmse: f64,
    /// Every candidate in search order
    pub results: Vec<PowerScore>,
}

/// Pick the IDW power with the lowest cross-validated RMSE.
///
/// All candidates are validated on the same folds. Candidates for which no
/// held-out point could be predicted are scored but never selected.
pub fn optimize_power(points: &[SurveyPoint], config: &IdwConfig, search: &PowerSearch) -> Result<PowerOptimization> {
    if search.candidates.is_empty() {
        return Err(Error::invalid_parameter("candidates", "[]", "at least one power is required"));
    }

    let validation = CrossValidationConfig {
        seed: Some(search.validation.seed.unwrap_or_else(rand::random)),
        ..search.validation.clone()
    };

    let mut results = Vec::with_capacity(search.candidates.len());
    let mut best: Option<(f64, f64)> = None;

    for &power in &search.candidates {
        let method = InterpolationMethod::Idw(IdwConfig {
            power,
            ..config.clone()
        });
        let cv = cross_validate(points, &method, &validation)?;
        let rmse = cv.metrics.rmse;
        tracing::debug!(power, rmse, validated = cv.metrics.validation_points, "IDW power candidate");

        if cv.metrics.validation_points > 0 && best.is_none_or(|(_, r)| rmse < r) {
            best = Some((power, rmse));
        }
        results.push(PowerScore {
            power,
            metrics: cv.metrics,
        });
    }

    let (best_power, best_rmse) =
        best.ok_or_else(|| Error::Algorithm("no candidate power produced any prediction".into()))?;

    Ok(PowerOptimization {
        best_power,
        best_rmse,
        results,
    })
}
