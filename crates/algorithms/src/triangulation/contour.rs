//! Contour lines of the piecewise-linear TIN surface
//!
//! Each triangle crossed by a level contributes one segment between the
//! interpolated crossings of its edges. Segments are then chained greedily
//! into polylines. Chaining is order-dependent: where several segments meet
//! at one point (saddle vertices lying exactly on the level) the first
//! match wins.

use serde::{Deserialize, Serialize};
use terrasurf_core::{Error, Result};

use super::TriangulationResult;

/// Endpoint matching tolerance when chaining segments
const CHAIN_TOLERANCE: f64 = 1e-9;

/// Upper bound on levels produced by one [`TriangulationResult::contours`] call
const MAX_LEVELS: usize = 100_000;

/// Parameters for contour generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourOptions {
    /// Elevation difference between successive contour lines
    pub interval: f64,
    /// Contours are generated at base + n*interval
    pub base: f64,
}

impl Default for ContourOptions {
    fn default() -> Self {
        Self {
            interval: 1.0,
            base: 0.0,
        }
    }
}

/// One chained contour line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourPolyline {
    pub level: f64,
    /// Vertices (x, y, level). A closed ring does not repeat its first vertex.
    pub points: Vec<[f64; 3]>,
    pub closed: bool,
}

impl ContourPolyline {
    /// Planar length, including the closing edge of a ring
    pub fn length(&self) -> f64 {
        let dist = |p: &[f64; 3], q: &[f64; 3]| (p[0] - q[0]).hypot(p[1] - q[1]);
        let open: f64 = self.points.windows(2).map(|w| dist(&w[0], &w[1])).sum();
        match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(first), Some(last)) => open + dist(last, first),
            _ => open,
        }
    }
}

/// All polylines of one level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourSet {
    pub level: f64,
    pub polylines: Vec<ContourPolyline>,
}

type Segment = ([f64; 2], [f64; 2]);

fn close(p: [f64; 2], q: [f64; 2]) -> bool {
    (p[0] - q[0]).abs() <= CHAIN_TOLERANCE && (p[1] - q[1]).abs() <= CHAIN_TOLERANCE
}

impl TriangulationResult<'_> {
    /// Segments where the surface crosses `level`, one per crossed triangle.
    ///
    /// Vertices are classified as above when `z >= level`; zero-length
    /// segments (the level touching a single vertex) are dropped.
    fn contour_segments(&self, level: f64) -> Vec<Segment> {
        let mut segments = Vec::new();
        for t in &self.triangles {
            let corners = self.corners_of(t);
            let mut crossings: Vec<[f64; 2]> = Vec::with_capacity(2);
            for k in 0..3 {
                let a = corners[k];
                let b = corners[(k + 1) % 3];
                if (a.z >= level) == (b.z >= level) {
                    continue;
                }
                let s = (level - a.z) / (b.z - a.z);
                crossings.push([a.x + s * (b.x - a.x), a.y + s * (b.y - a.y)]);
            }
            if let &[p, q] = crossings.as_slice()
                && !close(p, q)
            {
                segments.push((p, q));
            }
        }
        segments
    }

    /// Contour polylines at `level`.
    pub fn contour(&self, level: f64) -> Vec<ContourPolyline> {
        chain_segments(self.contour_segments(level))
            .into_iter()
            .map(|(ring, closed)| ContourPolyline {
                level,
                points: ring.into_iter().map(|[x, y]| [x, y, level]).collect(),
                closed,
            })
            .collect()
    }

    /// Contours at every `base + k·interval` between the lowest and highest vertex.
    ///
    /// Levels that produce no polyline are omitted.
    pub fn contours(&self, options: &ContourOptions) -> Result<Vec<ContourSet>> {
        if !(options.interval.is_finite() && options.interval > 0.0) {
            return Err(Error::invalid_parameter("interval", options.interval, "must be finite and > 0"));
        }
        if !options.base.is_finite() {
            return Err(Error::invalid_parameter("base", options.base, "must be finite"));
        }

        let (min_z, max_z) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)));
        if !(min_z <= max_z) {
            return Ok(Vec::new());
        }

        let first = ((min_z - options.base) / options.interval).ceil();
        let last = ((max_z - options.base) / options.interval).floor();
        if last < first {
            return Ok(Vec::new());
        }
        let count = (last - first) as usize + 1;
        if count > MAX_LEVELS {
            return Err(Error::invalid_parameter(
                "interval",
                options.interval,
                format!("would produce {count} contour levels"),
            ));
        }

        Ok((0..count)
            .map(|k| options.base + (first + k as f64) * options.interval)
            .filter_map(|level| {
                let polylines = self.contour(level);
                (!polylines.is_empty()).then_some(ContourSet { level, polylines })
            })
            .collect())
    }
}

/// Greedy chaining: grow each polyline at its tail, then at its head, by
/// the first unused segment sharing an endpoint.
fn chain_segments(segments: Vec<Segment>) -> Vec<(Vec<[f64; 2]>, bool)> {
    let mut used = vec![false; segments.len()];
    let mut lines = Vec::new();

    let take_next = |end: [f64; 2], used: &mut [bool]| -> Option<[f64; 2]> {
        for (i, &(p, q)) in segments.iter().enumerate() {
            if used[i] {
                continue;
            }
            if close(p, end) {
                used[i] = true;
                return Some(q);
            }
            if close(q, end) {
                used[i] = true;
                return Some(p);
            }
        }
        None
    };

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (p, q) = segments[start];
        let mut line = std::collections::VecDeque::from([p, q]);

        while let Some(&tail) = line.back()
            && let Some(next) = take_next(tail, &mut used)
        {
            line.push_back(next);
        }
        while let Some(&head) = line.front()
            && let Some(prev) = take_next(head, &mut used)
        {
            line.push_front(prev);
        }

        let mut points: Vec<[f64; 2]> = line.into();
        let closed = points.len() > 3 && close(points[0], points[points.len() - 1]);
        if closed {
            points.pop();
        }
        lines.push((points, closed));
    }
    lines
}
