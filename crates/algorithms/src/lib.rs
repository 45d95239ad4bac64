//! # terrasurf algorithms
//!
//! Terrain surface reconstruction from scattered survey points.
//!
//! ## Available Algorithm Categories
//!
//! - **points**: validation, duplicate and outlier removal, statistics
//! - **triangulation**: Delaunay TIN, point location, slope/aspect, contours, LandXML
//! - **interpolation**: IDW, variogram fitting, Ordinary Kriging
//! - **validation**: cross-validation, method comparison, quality scoring

pub(crate) mod maybe_rayon;

pub mod interpolation;
pub mod points;
pub mod triangulation;
pub mod validation;

use rand::SeedableRng;
use rand::rngs::StdRng;

/// RNG for one invocation: seeded when `seed` is given, from OS entropy otherwise.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{
        idw, ordinary_kriging, optimize_power, Idw, IdwConfig, InterpolationResult, KrigingConfig,
        OrdinaryKriging, SurfaceMethod, VariogramModel, VariogramParams, VariogramSpec,
    };
    pub use crate::points::{clean_points, CleanPoints, CleaningOptions, CleaningResult};
    pub use crate::triangulation::{
        triangulate, ContourOptions, LandXmlOptions, Triangulate, TriangulationConfig,
        TriangulationResult,
    };
    pub use crate::validation::{
        assess_quality, compare_methods, cross_validate, identify_problem_areas,
        CrossValidationConfig, CrossValidationResult, InterpolationMethod, QualityConfig,
        QualityReport, ValidationStrategy,
    };
    pub use terrasurf_core::prelude::*;
}
