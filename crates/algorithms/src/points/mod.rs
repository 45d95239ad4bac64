//! Point ingestion and cleaning
//!
//! Validates raw survey points, removes planar duplicates and elevation
//! outliers, and summarises what is left:
//! - `clean_points`: the full cleaning pass
//! - `point_statistics`: elevation statistics of an already clean set

mod cleaning;

pub use cleaning::{
    clean_points, clean_points_monitored, point_statistics, CleanPoints, CleaningOptions,
    CleaningResult, PointStatistics, PointWarning, WarningKind,
};
