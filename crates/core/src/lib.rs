//! # terrasurf core
//!
//! Core types shared by the terrasurf surface reconstruction engine.
//!
//! This crate provides:
//! - `SurveyPoint` / `BoundingBox`: the input point model
//! - `GridConfig` / `ElevationGrid`: regular grid layout and storage
//! - `Monitor`: progress reporting and cooperative cancellation
//! - `Error` / `Result`
//! - the `Algorithm` trait for a consistent API

pub mod error;
pub mod grid;
pub mod point;
pub mod progress;

pub use error::{Error, Result};
pub use grid::{ElevationGrid, GridConfig, GridStatistics, DEFAULT_NO_DATA};
pub use point::{BoundingBox, PointSource, SurveyPoint};
pub use progress::{CancellationToken, Monitor, Progress, Stage};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::grid::{ElevationGrid, GridConfig, GridStatistics};
    pub use crate::point::{BoundingBox, PointSource, SurveyPoint};
    pub use crate::progress::{CancellationToken, Monitor, Progress, Stage};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in terrasurf.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
