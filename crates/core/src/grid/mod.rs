//! Regular grid layout and storage

mod config;
mod elevation;

pub use config::{GridConfig, DEFAULT_NO_DATA};
pub use elevation::{ElevationGrid, GridStatistics};
