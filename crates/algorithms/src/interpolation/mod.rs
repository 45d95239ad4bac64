//! Spatial interpolation of survey points onto regular grids
//!
//! - IDW: Inverse Distance Weighting, with power optimisation
//! - Variogram: experimental variogram and automatic model fitting
//! - Ordinary Kriging: BLUE estimate plus kriging variance
//!
//! Every interpolator writes an [`InterpolationResult`] over a
//! [`GridConfig`]. Cells that cannot be estimated hold the grid's
//! `no_data_value`.

mod idw;
pub mod kdtree;
mod kriging;
pub mod variogram;

use std::time::Duration;

use serde::Serialize;
use terrasurf_core::{
    BoundingBox, ElevationGrid, GridConfig, GridStatistics, Monitor, Result, Stage, SurveyPoint,
};

use crate::maybe_rayon::*;

pub use idw::{
    idw, idw_monitored, optimize_power, Idw, IdwConfig, IdwInterpolator, PowerOptimization,
    PowerScore, PowerSearch,
};
pub use kdtree::{KdTree, Neighbor};
pub use kriging::{
    ordinary_kriging, ordinary_kriging_monitored, KrigingConfig, KrigingInterpolator,
    KrigingPrediction, OrdinaryKriging, VariogramSpec,
};
pub use variogram::{
    experimental_variogram, fit_best_variogram, fit_variogram, ExperimentalVariogram,
    VariogramFit, VariogramModel, VariogramParams,
};

/// Distance under which a query coincides with an input point
pub(crate) const COINCIDENCE_EPS: f64 = 1e-10;

/// Which surface method produced a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceMethod {
    Idw,
    Kriging,
    Tin,
}

impl SurfaceMethod {
    pub fn label(&self) -> &'static str {
        match self {
            SurfaceMethod::Idw => "IDW",
            SurfaceMethod::Kriging => "Kriging",
            SurfaceMethod::Tin => "TIN",
        }
    }
}

/// A point estimator built from a training set.
///
/// `None` means "no data" at (x, y): too few neighbors, outside the hull, etc.
pub trait Predictor {
    fn predict(&self, x: f64, y: f64) -> Option<f64>;
}

/// Survey points and the grid to fill: input of the gridding algorithms
#[derive(Debug, Clone)]
pub struct GridInput {
    pub points: Vec<SurveyPoint>,
    pub grid: GridConfig,
}

/// Interpolated elevation grid and its diagnostics
#[derive(Debug, Clone)]
pub struct InterpolationResult {
    pub method: SurfaceMethod,
    /// Row-major elevations; row 0 is the southern row
    pub grid: ElevationGrid,
    /// Kriging variance per cell, same layout as `grid`
    pub variance_grid: Option<ElevationGrid>,
    pub width: usize,
    pub height: usize,
    pub bounds: BoundingBox,
    pub resolution: f64,
    pub statistics: GridStatistics,
    /// Cells estimated by the singular-system fallback (kriging only)
    pub fallback_cells: usize,
    /// Variogram used (kriging only)
    pub variogram: Option<VariogramParams>,
    pub compute_time: Duration,
}

impl InterpolationResult {
    pub fn no_data_value(&self) -> f64 {
        self.grid.no_data_value()
    }

    /// Elevation at (row, col), `None` for no data
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.grid.value(row, col)
    }

    /// Row-major `f32` elevations with the no-data sentinel
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.grid.to_f32_vec()
    }
}

/// One cell estimate produced by a grid driver closure
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CellEstimate {
    pub value: Option<f64>,
    pub variance: Option<f64>,
    pub fallback: bool,
}

impl CellEstimate {
    pub fn value(value: Option<f64>) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }
}

/// Evaluate `estimate` at every cell of `grid`, row by row.
///
/// Cancellation is checked before each row. Rows run on rayon when the
/// `parallel` feature is enabled; progress is only reported from the
/// calling thread.
pub(crate) fn rasterize<F>(
    grid: &GridConfig,
    method: SurfaceMethod,
    with_variance: bool,
    monitor: &Monitor<'_>,
    estimate: F,
) -> Result<InterpolationResult>
where
    F: Fn(f64, f64) -> CellEstimate + Sync,
{
    grid.validate()?;
    let start = std::time::Instant::now();
    let (width, height) = (grid.width(), grid.height());
    let no_data = grid.no_data_value;

    monitor.report(
        Stage::Interpolating,
        0.0,
        format!("{} over {}x{} grid", method.label(), width, height),
    );

    let rows: Vec<Vec<CellEstimate>> = (0..height)
        .into_par_iter()
        .map(|row| -> Result<Vec<CellEstimate>> {
            monitor.check_cancelled()?;
            Ok((0..width)
                .map(|col| {
                    let (x, y) = grid.cell_position(row, col);
                    estimate(x, y)
                })
                .collect())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut values = Vec::with_capacity(width * height);
    let mut variances = Vec::with_capacity(if with_variance { width * height } else { 0 });
    let mut fallback_cells = 0;
    for cell in rows.iter().flatten() {
        values.push(cell.value.unwrap_or(no_data));
        if with_variance {
            variances.push(cell.variance.unwrap_or(no_data));
        }
        if cell.fallback {
            fallback_cells += 1;
        }
    }

    let elevation = ElevationGrid::from_vec(values, height, width, no_data)?;
    let variance_grid = if with_variance {
        Some(ElevationGrid::from_vec(variances, height, width, no_data)?)
    } else {
        None
    };
    let statistics = elevation.statistics();

    monitor.report(
        Stage::Interpolating,
        100.0,
        format!("{} valid cells, {} without data", statistics.valid_cells, statistics.invalid_cells),
    );

    Ok(InterpolationResult {
        method,
        grid: elevation,
        variance_grid,
        width,
        height,
        bounds: grid.bounds,
        resolution: grid.resolution,
        statistics,
        fallback_cells,
        variogram: None,
        compute_time: start.elapsed(),
    })
}
