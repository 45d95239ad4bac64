//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. Uses a fitted
//! variogram model to compute interpolation weights that minimize
//! estimation variance while satisfying an unbiasedness constraint.
//!
//! The kriging system for n neighbors:
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₙ) 1] [w₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...    .]  [. ] = [   ...    ]
//! [γ(xₙ,x₁) ... γ(xₙ,xₙ) 1] [wₙ]   [γ(xₙ,x₀)]
//! [  1       ...    1       0] [μ ]   [    1     ]
//! ```
//! where x₀ is the target location and μ is the Lagrange multiplier
//! ensuring Σwᵢ = 1.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use rand::Rng;
use serde::{Deserialize, Serialize};
use terrasurf_core::{Algorithm, Error, GridConfig, Monitor, Result, SurveyPoint};

use super::kdtree::{KdTree, Neighbor};
use super::variogram::{experimental_variogram, fit_best_variogram, ExperimentalVariogram, VariogramParams};
use super::{rasterize, CellEstimate, GridInput, InterpolationResult, Predictor, SurfaceMethod, COINCIDENCE_EPS};
use crate::seeded_rng;

/// Relative pivot magnitude below which the kriging system is singular
const SINGULAR_PIVOT: f64 = 1e-13;

/// Where the variogram comes from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariogramSpec {
    /// Fit spherical, exponential and gaussian models to the data
    #[default]
    Auto,
    Fixed(VariogramParams),
}

/// Parameters for Ordinary Kriging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrigingConfig {
    pub variogram: VariogramSpec,
    /// Maximum search radius. `None` searches without a distance limit.
    pub search_radius: Option<f64>,
    /// Fewer neighbors than this yields no data (default 3)
    pub min_neighbors: usize,
    /// Nearest neighbors per kriging system (default 16)
    pub max_neighbors: usize,
    /// Experimental variogram bins (default 12)
    pub lag_count: usize,
    /// Seed for the variogram distance sample; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            variogram: VariogramSpec::Auto,
            search_radius: None,
            min_neighbors: 3,
            max_neighbors: 16,
            lag_count: 12,
            seed: None,
        }
    }
}

impl KrigingConfig {
    pub fn validate(&self) -> Result<()> {
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
        if self.lag_count == 0 {
            return Err(Error::invalid_parameter("lag_count", 0, "must be >= 1"));
        }
        if let Some(r) = self.search_radius
            && !(r.is_finite() && r > 0.0)
        {
            return Err(Error::invalid_parameter("search_radius", r, "must be finite and > 0"));
        }
        if let VariogramSpec::Fixed(params) = &self.variogram {
            params.validate()?;
        }
        Ok(())
    }

    /// Smallest training set kriging accepts
    pub fn required_points(&self) -> usize {
        self.min_neighbors.max(3)
    }
}

/// Kriging estimate at one location
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KrigingPrediction {
    pub value: f64,
    /// Kriging variance, ≥ 0
    pub variance: f64,
    /// The system was singular and the nearest neighbor was used
    pub fallback: bool,
}

/// Ordinary kriging estimator over a borrowed point set
#[derive(Debug, Clone)]
pub struct KrigingInterpolator<'a> {
    points: &'a [SurveyPoint],
    tree: KdTree,
    config: KrigingConfig,
    variogram: VariogramParams,
    experimental: Option<ExperimentalVariogram>,
}

impl<'a> KrigingInterpolator<'a> {
    /// Validate `config`, index `points` and resolve the variogram.
    ///
    /// With [`VariogramSpec::Auto`] the experimental variogram is computed
    /// with `rng` and the best of the fitted models is kept.
    pub fn new<R: Rng + ?Sized>(points: &'a [SurveyPoint], config: KrigingConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let required = config.required_points();
        if points.len() < required {
            return Err(Error::InsufficientPoints {
                required,
                found: points.len(),
            });
        }

        let (variogram, experimental) = match config.variogram {
            VariogramSpec::Fixed(params) => (params, None),
            VariogramSpec::Auto => {
                let ev = experimental_variogram(points, config.lag_count, rng)?;
                let fit = fit_best_variogram(&ev);
                tracing::debug!(
                    model = fit.params.model.name(),
                    nugget = fit.params.nugget,
                    sill = fit.params.sill,
                    range = fit.params.range,
                    loss = fit.loss,
                    bins = ev.len(),
                    "variogram fitted"
                );
                (fit.params, Some(ev))
            }
        };

        Ok(Self {
            points,
            tree: KdTree::build(points),
            config,
            variogram,
            experimental,
        })
    }

    pub fn variogram(&self) -> &VariogramParams {
        &self.variogram
    }

    /// Experimental variogram the model was fitted to (auto mode only)
    pub fn experimental_variogram(&self) -> Option<&ExperimentalVariogram> {
        self.experimental.as_ref()
    }

    pub fn config(&self) -> &KrigingConfig {
        &self.config
    }

    /// Kriging estimate and variance at (x, y).
    ///
    /// `None` when fewer than `min_neighbors` points are in range. A singular
    /// system falls back to the nearest neighbor with variance = sill.
    pub fn predict(&self, x: f64, y: f64) -> Option<KrigingPrediction> {
        let neighbors = self.tree.neighbors(
            x,
            y,
            self.config.search_radius,
            self.config.max_neighbors,
        );
        if neighbors.is_empty() || neighbors.len() < self.config.min_neighbors {
            return None;
        }

        let nearest = neighbors[0];
        if nearest.distance() < COINCIDENCE_EPS {
            return Some(KrigingPrediction {
                value: self.points[nearest.index].z,
                variance: 0.0,
                fallback: false,
            });
        }

        match self.solve_weights(&neighbors) {
            Some(solution) => {
                let k = neighbors.len();
                let sill = self.variogram.sill;
                let mut value = 0.0;
                let mut weighted_cov = 0.0;
                for (w, n) in solution[..k].iter().zip(&neighbors) {
                    value += w * self.points[n.index].z;
                    weighted_cov += w * self.variogram.covariance(n.distance());
                }
                // Lagrange multiplier of the covariance system
                let mu_c = -solution[k];
                let variance = (sill - weighted_cov - mu_c).max(0.0);
                Some(KrigingPrediction {
                    value,
                    variance,
                    fallback: false,
                })
            }
            None => {
                tracing::debug!(x, y, neighbors = neighbors.len(), "singular kriging system, using nearest neighbor");
                Some(KrigingPrediction {
                    value: self.points[nearest.index].z,
                    variance: self.variogram.sill,
                    fallback: true,
                })
            }
        }
    }

    /// Build and solve the (k+1)² ordinary kriging system.
    fn solve_weights(&self, neighbors: &[Neighbor]) -> Option<Vec<f64>> {
        let k = neighbors.len();
        let m = k + 1;
        let mut mat = vec![0.0_f64; m * m];
        let mut rhs = vec![0.0_f64; m];

        for (i, ni) in neighbors.iter().enumerate() {
            let pi = &self.points[ni.index];
            for (j, nj) in neighbors.iter().enumerate().skip(i + 1) {
                let g = self.variogram.evaluate(pi.planar_distance(&self.points[nj.index]));
                mat[i * m + j] = g;
                mat[j * m + i] = g;
            }
            mat[i * m + k] = 1.0;
            mat[k * m + i] = 1.0;
            rhs[i] = self.variogram.evaluate(ni.distance());
        }
        rhs[k] = 1.0;

        kriging_solve(m, &mut mat, &mut rhs)
    }

    pub fn interpolate_grid(&self, grid: &GridConfig) -> Result<InterpolationResult> {
        self.interpolate_grid_monitored(grid, &Monitor::none())
    }

    /// Rasterise estimate and variance onto `grid`.
    pub fn interpolate_grid_monitored(
        &self,
        grid: &GridConfig,
        monitor: &Monitor<'_>,
    ) -> Result<InterpolationResult> {
        let mut result = rasterize(grid, SurfaceMethod::Kriging, true, monitor, |x, y| {
            match self.predict(x, y) {
                Some(p) => CellEstimate {
                    value: Some(p.value),
                    variance: Some(p.variance),
                    fallback: p.fallback,
                },
                None => CellEstimate::default(),
            }
        })?;
        result.variogram = Some(self.variogram);

        tracing::debug!(
            model = self.variogram.model.name(),
            points = self.points.len(),
            valid = result.statistics.valid_cells,
            no_data = result.statistics.invalid_cells,
            fallback_cells = result.fallback_cells,
            "kriging grid finished"
        );
        Ok(result)
    }
}

impl Predictor for KrigingInterpolator<'_> {
    fn predict(&self, x: f64, y: f64) -> Option<f64> {
        KrigingInterpolator::predict(self, x, y).map(|p| p.value)
    }
}

/// Solve Ax = b using Gaussian elimination with partial pivoting.
///
/// `mat` is row-major n×n. Returns `None` when a pivot falls below
/// `1e-13 · max(1, max|aᵢⱼ|)`.
fn kriging_solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Option<Vec<f64>> {
    let scale = mat.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = SINGULAR_PIVOT * scale;

    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if !(max_val >= tolerance) {
            return None;
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Some(x)
}

/// Ordinary kriging of `points` onto `grid`.
///
/// The result carries a variance grid and the variogram used. Cells solved
/// by the singular-system fallback are counted in `fallback_cells`.
pub fn ordinary_kriging(
    points: &[SurveyPoint],
    config: &KrigingConfig,
    grid: &GridConfig,
) -> Result<InterpolationResult> {
    ordinary_kriging_monitored(points, config, grid, &Monitor::none())
}

/// [`ordinary_kriging`] with progress reporting and cancellation.
pub fn ordinary_kriging_monitored(
    points: &[SurveyPoint],
    config: &KrigingConfig,
    grid: &GridConfig,
    monitor: &Monitor<'_>,
) -> Result<InterpolationResult> {
    let mut rng = seeded_rng(config.seed);
    KrigingInterpolator::new(points, config.clone(), &mut rng)?.interpolate_grid_monitored(grid, monitor)
}

/// Ordinary kriging as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct OrdinaryKriging;

impl Algorithm for OrdinaryKriging {
    type Input = GridInput;
    type Output = InterpolationResult;
    type Params = KrigingConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "OrdinaryKriging"
    }

    fn description(&self) -> &'static str {
        "Ordinary Kriging with automatic variogram fitting onto a regular grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        ordinary_kriging(&input.points, &params, &input.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::VariogramModel;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use terrasurf_core::BoundingBox;

    fn plane(x: f64, y: f64) -> f64 {
        2.0 * x + 3.0 * y + 1.0
    }

    fn plane_lattice() -> Vec<SurveyPoint> {
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let (x, y) = (i as f64 / 5.0, j as f64 / 5.0);
                points.push(SurveyPoint::new(x, y, plane(x, y)));
            }
        }
        points
    }

    fn fixed(model: VariogramModel, nugget: f64, sill: f64, range: f64) -> KrigingConfig {
        KrigingConfig {
            variogram: VariogramSpec::Fixed(VariogramParams::new(model, nugget, sill, range)),
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_at_sample_points() {
        let points = plane_lattice();
        let mut rng = StdRng::seed_from_u64(42);
        let ok = KrigingInterpolator::new(&points, KrigingConfig::default(), &mut rng).unwrap();

        for p in &points {
            let pred = ok.predict(p.x, p.y).unwrap();
            assert_eq!(pred.value, p.z);
            assert_eq!(pred.variance, 0.0);
            assert!(!pred.fallback);
        }
    }

    #[test]
    fn test_plane_between_samples() {
        let points = plane_lattice();
        let mut rng = StdRng::seed_from_u64(42);
        let ok = KrigingInterpolator::new(&points, KrigingConfig::default(), &mut rng).unwrap();

        for (x, y) in [(0.3, 0.45), (0.5, 0.5), (0.05, 0.9)] {
            let pred = ok.predict(x, y).unwrap();
            assert!(
                (pred.value - plane(x, y)).abs() < 0.02,
                "({x}, {y}): {} vs {}",
                pred.value,
                plane(x, y)
            );
            assert!(pred.variance > 0.0 && pred.variance.is_finite());
        }
    }

    #[test]
    fn test_weights_sum_to_one_on_constant_field() {
        let points: Vec<SurveyPoint> = (0..25)
            .map(|i| SurveyPoint::new((i % 5) as f64, (i / 5) as f64, 12.5))
            .collect();
        let mut rng = StdRng::seed_from_u64(1);
        let ok = KrigingInterpolator::new(&points, fixed(VariogramModel::Exponential, 0.1, 1.0, 3.0), &mut rng)
            .unwrap();
        assert_relative_eq!(ok.predict(1.3, 2.7).unwrap().value, 12.5, epsilon = 1e-9);
    }

    #[test]
    fn test_variance_grows_away_from_data() {
        let points = plane_lattice();
        let mut rng = StdRng::seed_from_u64(7);
        let ok = KrigingInterpolator::new(&points, fixed(VariogramModel::Spherical, 0.0, 1.0, 1.0), &mut rng)
            .unwrap();

        let near = ok.predict(0.41, 0.41).unwrap().variance;
        let mid = ok.predict(0.5, 0.5).unwrap().variance;
        let far = ok.predict(1.6, 1.6).unwrap().variance;
        assert!(near < mid, "near = {near}, mid = {mid}");
        assert!(mid < far, "mid = {mid}, far = {far}");
    }

    #[test]
    fn test_singular_system_falls_back_to_nearest() {
        let points = vec![
            SurveyPoint::new(0.0, 0.0, 1.0),
            SurveyPoint::new(0.0, 0.0, 1.0),
            SurveyPoint::new(1.0, 0.0, 2.0),
            SurveyPoint::new(0.0, 1.0, 3.0),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let ok = KrigingInterpolator::new(&points, fixed(VariogramModel::Spherical, 0.0, 1.0, 10.0), &mut rng)
            .unwrap();

        let pred = ok.predict(0.9, 0.1).unwrap();
        assert!(pred.fallback);
        assert_eq!(pred.value, 2.0);
        assert_eq!(pred.variance, 1.0);
    }

    #[test]
    fn test_too_few_neighbors_is_no_data() {
        let points = plane_lattice();
        let config = KrigingConfig {
            search_radius: Some(0.15),
            ..fixed(VariogramModel::Spherical, 0.0, 1.0, 1.0)
        };
        let mut rng = StdRng::seed_from_u64(0);
        let ok = KrigingInterpolator::new(&points, config, &mut rng).unwrap();

        // only the corner sample lies within 0.15 of (-0.05, -0.05)
        assert!(ok.predict(-0.05, -0.05).is_none());
    }

    #[test]
    fn test_grid_carries_variance_and_variogram() {
        let points = plane_lattice();
        let grid = GridConfig::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.1);
        let config = KrigingConfig {
            seed: Some(5),
            ..Default::default()
        };

        let result = ordinary_kriging(&points, &config, &grid).unwrap();
        assert_eq!(result.method, SurfaceMethod::Kriging);
        assert_eq!((result.width, result.height), (11, 11));
        assert_eq!(result.statistics.invalid_cells, 0);
        assert_eq!(result.fallback_cells, 0);

        let variogram = result.variogram.expect("kriging records its variogram");
        assert!(variogram.validate().is_ok());
        let variance = result.variance_grid.expect("kriging writes a variance grid");
        // cell (0, 0) is the sample at the origin
        assert_eq!(variance.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(result.grid.get(5, 5).unwrap(), plane(0.5, 0.5), epsilon = 0.02);
    }

    #[test]
    fn test_seed_makes_auto_fit_reproducible() {
        let points: Vec<SurveyPoint> = (0..150)
            .map(|i| {
                let (x, y) = ((i % 15) as f64, (i / 15) as f64 * 1.3);
                SurveyPoint::new(x, y, (x * 0.4).sin() * 3.0 + y * 0.2)
            })
            .collect();
        let a = KrigingInterpolator::new(&points, KrigingConfig::default(), &mut StdRng::seed_from_u64(3)).unwrap();
        let b = KrigingInterpolator::new(&points, KrigingConfig::default(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a.variogram(), b.variogram());
        assert!(a.experimental_variogram().is_some());
    }

    #[test]
    fn test_config_validation() {
        let points = plane_lattice();
        let mut rng = StdRng::seed_from_u64(0);
        let bad_variogram = fixed(VariogramModel::Gaussian, 2.0, 1.0, 1.0);
        assert!(matches!(
            KrigingInterpolator::new(&points, bad_variogram, &mut rng),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            KrigingInterpolator::new(&points[..2], KrigingConfig::default(), &mut rng),
            Err(Error::InsufficientPoints { required: 3, found: 2 })
        ));
    }

    #[test]
    fn test_solver_detects_singular_matrix() {
        let mut mat = vec![1.0, 2.0, 2.0, 4.0];
        let mut rhs = vec![1.0, 2.0];
        assert!(kriging_solve(2, &mut mat, &mut rhs).is_none());

        let mut mat = vec![2.0, 1.0, 1.0, 3.0];
        let mut rhs = vec![3.0, 5.0];
        let x = kriging_solve(2, &mut mat, &mut rhs).unwrap();
        assert_relative_eq!(x[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.4, epsilon = 1e-12);
    }
}
