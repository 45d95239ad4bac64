//! Delaunay triangulation of survey points (TIN)
//!
//! - `triangulate`: 2D Delaunay over (x, y) with z carried along,
//!   per-triangle area, normal, slope and aspect, edge extraction
//! - queries: point location, barycentric elevation, slope/aspect
//!   sampling, grid rasterisation and surface statistics
//! - contours: iso-lines of the piecewise-linear surface
//! - LandXML 1.2 export

mod contour;
mod delaunay;
mod landxml;
mod query;

use std::borrow::Cow;
use std::time::Duration;

use serde::Serialize;
use terrasurf_core::{Algorithm, Error, Monitor, Result, SurveyPoint};

pub use contour::{ContourOptions, ContourPolyline, ContourSet};
pub use delaunay::{triangulate, triangulate_monitored};
pub use landxml::LandXmlOptions;
pub use query::{AspectSector, ClassCount, PointLocation, SlopeBand, SurfaceSample, SurfaceStatistics};

/// Triangle of the TIN, with its surface properties
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Triangle {
    /// Indices into the triangulated points
    pub vertices: [usize; 3],
    /// Planar area
    pub area: f64,
    /// Mean of the three vertices (x, y, z)
    pub centroid: [f64; 3],
    /// Unit normal, oriented upward (z ≥ 0)
    pub normal: [f64; 3],
    /// Angle from horizontal in degrees, 0-90
    pub slope: f64,
    /// Downslope direction in degrees clockwise from north, -1 when flat
    pub aspect: f64,
}

impl Triangle {
    pub fn is_flat(&self) -> bool {
        self.aspect < 0.0
    }
}

/// Undirected TIN edge with `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    /// Planar length
    pub length: f64,
    /// Bounds exactly one retained triangle
    pub is_hull: bool,
}

/// Filters applied to triangles after their properties are computed
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TriangulationConfig {
    /// Drop triangles with any planar edge longer than this
    pub max_edge_length: Option<f64>,
    /// Drop triangles with a smaller planar area
    pub min_triangle_area: Option<f64>,
}

impl TriangulationConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(l) = self.max_edge_length
            && !(l > 0.0)
        {
            return Err(Error::invalid_parameter("max_edge_length", l, "must be > 0"));
        }
        if let Some(a) = self.min_triangle_area
            && !(a >= 0.0)
        {
            return Err(Error::invalid_parameter("min_triangle_area", a, "must be >= 0"));
        }
        Ok(())
    }
}

/// Summary of a triangulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriangulationStatistics {
    pub point_count: usize,
    pub triangle_count: usize,
    pub edge_count: usize,
    pub hull_edge_count: usize,
    /// Triangles dropped as degenerate or by the configured filters
    pub filtered_triangles: usize,
    pub total_area: f64,
    pub min_area: f64,
    pub max_area: f64,
    pub mean_area: f64,
    pub compute_time: Duration,
}

/// A triangulated surface over a point set.
///
/// Vertex indices refer to `points`, which is borrowed from the caller
/// unless the triangulation was made to own it with [`into_owned`](Self::into_owned).
#[derive(Debug, Clone)]
pub struct TriangulationResult<'a> {
    pub points: Cow<'a, [SurveyPoint]>,
    pub triangles: Vec<Triangle>,
    pub edges: Vec<Edge>,
    /// Convex hull vertex indices, counter-clockwise
    pub hull: Vec<usize>,
    pub statistics: TriangulationStatistics,
}

impl TriangulationResult<'_> {
    /// Copy the points so the result no longer borrows them.
    pub fn into_owned(self) -> TriangulationResult<'static> {
        TriangulationResult {
            points: Cow::Owned(self.points.into_owned()),
            triangles: self.triangles,
            edges: self.edges,
            hull: self.hull,
            statistics: self.statistics,
        }
    }
}

/// Delaunay triangulation as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Triangulate;

impl Algorithm for Triangulate {
    type Input = Vec<SurveyPoint>;
    type Output = TriangulationResult<'static>;
    type Params = TriangulationConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Triangulate"
    }

    fn description(&self) -> &'static str {
        "Delaunay triangulation of survey points with slope and aspect per triangle"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let TriangulationResult {
            triangles,
            edges,
            hull,
            statistics,
            ..
        } = delaunay::triangulate_monitored(&input, &params, &Monitor::none())?;
        Ok(TriangulationResult {
            points: Cow::Owned(input),
            triangles,
            edges,
            hull,
            statistics,
        })
    }
}
