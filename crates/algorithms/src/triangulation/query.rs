//! Point queries and derived products of a triangulated surface

use serde::Serialize;
use terrasurf_core::{GridConfig, Monitor, Result, SurveyPoint};

use super::delaunay::signed_area;
use super::{Triangle, TriangulationResult};
use crate::interpolation::{rasterize, CellEstimate, InterpolationResult, Predictor, SurfaceMethod};

/// Barycentric weights may undershoot zero by this much on shared edges
const INSIDE_TOLERANCE: f64 = -1e-10;

/// A weight this close to 1 snaps to the vertex elevation
const VERTEX_SNAP: f64 = 1e-12;

/// Triangle containing a query point and its barycentric weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointLocation {
    pub triangle: usize,
    /// Weights of the triangle's three vertices, summing to 1
    pub weights: (f64, f64, f64),
}

/// Elevation, slope and aspect of the surface at a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceSample {
    pub elevation: f64,
    pub slope: f64,
    pub aspect: f64,
    pub triangle: usize,
}

/// Slope classes of [`SurfaceStatistics`], in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeBand {
    /// 0-5
    Flat,
    /// 5-15
    Gentle,
    /// 15-30
    Moderate,
    /// 30-45
    Steep,
    /// above 45
    VerySteep,
}

impl SlopeBand {
    pub const ALL: [SlopeBand; 5] = [
        SlopeBand::Flat,
        SlopeBand::Gentle,
        SlopeBand::Moderate,
        SlopeBand::Steep,
        SlopeBand::VerySteep,
    ];

    pub fn from_degrees(slope: f64) -> Self {
        if slope < 5.0 {
            SlopeBand::Flat
        } else if slope < 15.0 {
            SlopeBand::Gentle
        } else if slope < 30.0 {
            SlopeBand::Moderate
        } else if slope < 45.0 {
            SlopeBand::Steep
        } else {
            SlopeBand::VerySteep
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlopeBand::Flat => "0-5°",
            SlopeBand::Gentle => "5-15°",
            SlopeBand::Moderate => "15-30°",
            SlopeBand::Steep => "30-45°",
            SlopeBand::VerySteep => ">45°",
        }
    }
}

/// Eight compass sectors of 45° centred on the cardinal and intercardinal directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AspectSector {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl AspectSector {
    pub const ALL: [AspectSector; 8] = [
        AspectSector::N,
        AspectSector::NE,
        AspectSector::E,
        AspectSector::SE,
        AspectSector::S,
        AspectSector::SW,
        AspectSector::W,
        AspectSector::NW,
    ];

    /// Sector of an aspect in degrees; `None` for flat (negative) aspects.
    pub fn from_degrees(aspect: f64) -> Option<Self> {
        if aspect < 0.0 {
            return None;
        }
        let index = ((aspect.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
        Some(Self::ALL[index])
    }
}

/// Histogram entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassCount<K> {
    pub class: K,
    pub count: usize,
    /// Share of all triangles, 0-100
    pub percent: f64,
}

/// Unweighted slope and aspect distribution over the triangles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceStatistics {
    pub triangle_count: usize,
    pub min_slope: f64,
    pub max_slope: f64,
    pub mean_slope: f64,
    pub slope_bands: Vec<ClassCount<SlopeBand>>,
    pub aspect_sectors: Vec<ClassCount<AspectSector>>,
    /// Triangles without an aspect
    pub flat_count: usize,
}

fn barycentric(t: &Triangle, tin: &TriangulationResult<'_>, x: f64, y: f64) -> Option<(f64, f64, f64)> {
    let [a, b, c] = tin.corners_of(t);
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::EPSILON * t.area.max(1.0) {
        return None;
    }
    let u = ((b.y - c.y) * (x - c.x) + (c.x - b.x) * (y - c.y)) / det;
    let v = ((c.y - a.y) * (x - c.x) + (a.x - c.x) * (y - c.y)) / det;
    Some((u, v, 1.0 - u - v))
}

fn inside(w: (f64, f64, f64)) -> bool {
    w.0 >= INSIDE_TOLERANCE && w.1 >= INSIDE_TOLERANCE && w.2 >= INSIDE_TOLERANCE
}

impl TriangulationResult<'_> {
    /// Corner points of `t`
    pub fn corners_of(&self, t: &Triangle) -> [&SurveyPoint; 3] {
        t.vertices.map(|i| &self.points[i])
    }

    fn locate_in<I>(&self, candidates: I, x: f64, y: f64) -> Option<PointLocation>
    where
        I: IntoIterator<Item = usize>,
    {
        candidates.into_iter().find_map(|ti| {
            barycentric(&self.triangles[ti], self, x, y)
                .filter(|&w| inside(w))
                .map(|weights| PointLocation { triangle: ti, weights })
        })
    }

    /// Triangle containing (x, y).
    ///
    /// Linear scan in triangle order; on a shared edge the first triangle
    /// found wins. Degenerate triangles are skipped.
    pub fn locate(&self, x: f64, y: f64) -> Option<PointLocation> {
        self.locate_in(0..self.triangles.len(), x, y)
    }

    fn elevation_from(&self, loc: &PointLocation) -> f64 {
        let [a, b, c] = self.corners_of(&self.triangles[loc.triangle]);
        let (u, v, w) = loc.weights;
        if u >= 1.0 - VERTEX_SNAP {
            a.z
        } else if v >= 1.0 - VERTEX_SNAP {
            b.z
        } else if w >= 1.0 - VERTEX_SNAP {
            c.z
        } else {
            u * a.z + v * b.z + w * c.z
        }
    }

    /// Linear (barycentric) elevation at (x, y); `None` outside the surface.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        self.locate(x, y).map(|loc| self.elevation_from(&loc))
    }

    /// Slope in degrees of the triangle under (x, y)
    pub fn slope_at(&self, x: f64, y: f64) -> Option<f64> {
        self.locate(x, y).map(|loc| self.triangles[loc.triangle].slope)
    }

    /// Aspect in degrees of the triangle under (x, y); -1 on flat triangles
    pub fn aspect_at(&self, x: f64, y: f64) -> Option<f64> {
        self.locate(x, y).map(|loc| self.triangles[loc.triangle].aspect)
    }

    pub fn sample(&self, x: f64, y: f64) -> Option<SurfaceSample> {
        self.locate(x, y).map(|loc| {
            let t = &self.triangles[loc.triangle];
            SurfaceSample {
                elevation: self.elevation_from(&loc),
                slope: t.slope,
                aspect: t.aspect,
                triangle: loc.triangle,
            }
        })
    }

    /// Sum of retained triangle areas
    pub fn total_area(&self) -> f64 {
        self.triangles.iter().map(|t| t.area).sum()
    }

    /// Area of the convex hull polygon
    pub fn hull_area(&self) -> f64 {
        signed_area(&self.points, &self.hull).abs()
    }

    /// Rasterise the surface onto `grid`; cells outside the surface are no data.
    pub fn sample_grid(&self, grid: &GridConfig) -> Result<InterpolationResult> {
        self.sample_grid_monitored(grid, &Monitor::none())
    }

    pub fn sample_grid_monitored(&self, grid: &GridConfig, monitor: &Monitor<'_>) -> Result<InterpolationResult> {
        let index = TriangleIndex::build(self);
        rasterize(grid, SurfaceMethod::Tin, false, monitor, |x, y| {
            let loc = self.locate_in(index.candidates(x, y).iter().copied(), x, y);
            CellEstimate::value(loc.map(|l| self.elevation_from(&l)))
        })
    }

    /// Slope bands, aspect sectors and slope range over all triangles.
    pub fn surface_statistics(&self) -> SurfaceStatistics {
        let n = self.triangles.len();
        let percent = |count: usize| if n == 0 { 0.0 } else { 100.0 * count as f64 / n as f64 };

        let mut band_counts = [0usize; 5];
        let mut sector_counts = [0usize; 8];
        let mut flat_count = 0;
        let (mut min_slope, mut max_slope, mut sum_slope) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);

        for t in &self.triangles {
            let band = SlopeBand::from_degrees(t.slope);
            band_counts[band as usize] += 1;
            match AspectSector::from_degrees(t.aspect) {
                Some(sector) => sector_counts[sector as usize] += 1,
                None => flat_count += 1,
            }
            min_slope = min_slope.min(t.slope);
            max_slope = max_slope.max(t.slope);
            sum_slope += t.slope;
        }

        if n == 0 {
            (min_slope, max_slope) = (0.0, 0.0);
        }

        SurfaceStatistics {
            triangle_count: n,
            min_slope,
            max_slope,
            mean_slope: if n == 0 { 0.0 } else { sum_slope / n as f64 },
            slope_bands: SlopeBand::ALL
                .iter()
                .zip(band_counts)
                .map(|(&class, count)| ClassCount {
                    class,
                    count,
                    percent: percent(count),
                })
                .collect(),
            aspect_sectors: AspectSector::ALL
                .iter()
                .zip(sector_counts)
                .map(|(&class, count)| ClassCount {
                    class,
                    count,
                    percent: percent(count),
                })
                .collect(),
            flat_count,
        }
    }
}

impl Predictor for TriangulationResult<'_> {
    fn predict(&self, x: f64, y: f64) -> Option<f64> {
        self.elevation_at(x, y)
    }
}

/// Uniform bucket grid over triangle bounding boxes.
///
/// Buckets keep triangle indices in ascending order so that a bucket lookup
/// finds the same triangle as the linear scan in [`TriangulationResult::locate`].
struct TriangleIndex {
    min_x: f64,
    min_y: f64,
    cell: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<usize>>,
}

impl TriangleIndex {
    fn build(tin: &TriangulationResult<'_>) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in tin.points.iter() {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let n = tin.triangles.len().max(1);
        let extent = (max_x - min_x).max(max_y - min_y).max(f64::MIN_POSITIVE);
        let side = (n as f64).sqrt().ceil().max(1.0);
        let cell = extent / side;
        let cols = (((max_x - min_x) / cell).floor() as usize + 1).max(1);
        let rows = (((max_y - min_y) / cell).floor() as usize + 1).max(1);

        let mut index = Self {
            min_x,
            min_y,
            cell,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        };

        // slack covers the barycentric tolerance at bucket borders
        let slack = cell * 1e-9;
        for (ti, t) in tin.triangles.iter().enumerate() {
            let [a, b, c] = tin.corners_of(t);
            let c0 = index.col_of(a.x.min(b.x).min(c.x) - slack);
            let c1 = index.col_of(a.x.max(b.x).max(c.x) + slack);
            let r0 = index.row_of(a.y.min(b.y).min(c.y) - slack);
            let r1 = index.row_of(a.y.max(b.y).max(c.y) + slack);
            for r in r0..=r1 {
                for col in c0..=c1 {
                    index.buckets[r * cols + col].push(ti);
                }
            }
        }
        index
    }

    fn col_of(&self, x: f64) -> usize {
        (((x - self.min_x) / self.cell).floor().max(0.0) as usize).min(self.cols - 1)
    }

    fn row_of(&self, y: f64) -> usize {
        (((y - self.min_y) / self.cell).floor().max(0.0) as usize).min(self.rows - 1)
    }

    fn candidates(&self, x: f64, y: f64) -> &[usize] {
        if !(x.is_finite() && y.is_finite()) {
            return &[];
        }
        &self.buckets[self.row_of(y) * self.cols + self.col_of(x)]
    }
}
