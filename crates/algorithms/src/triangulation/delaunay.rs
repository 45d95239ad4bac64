//! Delaunay triangulation and per-triangle surface properties
//!
//! The planar triangulation comes from `delaunator` (sweep-hull, robust
//! predicates). Elevations ride along as attributes: every triangle gets a
//! 3D normal from which slope and aspect follow.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Instant;

use terrasurf_core::{Error, Monitor, Result, Stage, SurveyPoint};

use super::{Edge, Triangle, TriangulationConfig, TriangulationResult, TriangulationStatistics};

/// Horizontal normal component below which a triangle is flat
const FLAT_THRESHOLD: f64 = 1e-12;

/// Triangulate `points` in the plane.
///
/// # Errors
/// - `InsufficientPoints` for fewer than 3 points
/// - `DegenerateGeometry` when no triangle can be formed (collinear or
///   coincident input)
pub fn triangulate<'a>(points: &'a [SurveyPoint], config: &TriangulationConfig) -> Result<TriangulationResult<'a>> {
    triangulate_monitored(points, config, &Monitor::none())
}

/// [`triangulate`] with progress under the `triangulating` stage.
pub fn triangulate_monitored<'a>(
    points: &'a [SurveyPoint],
    config: &TriangulationConfig,
    monitor: &Monitor<'_>,
) -> Result<TriangulationResult<'a>> {
    let start = Instant::now();
    config.validate()?;

    if points.len() < 3 {
        return Err(Error::InsufficientPoints {
            required: 3,
            found: points.len(),
        });
    }
    if let Some(i) = points.iter().position(|p| !p.is_finite()) {
        return Err(Error::invalid_parameter("points", i, "non-finite coordinate"));
    }

    monitor.report(
        Stage::Triangulating,
        0.0,
        format!("Triangulating {} points", points.len()),
    );

    let coords: Vec<delaunator::Point> = points
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();
    let delaunay = delaunator::triangulate(&coords);
    if delaunay.triangles.is_empty() {
        return Err(Error::DegenerateGeometry(format!(
            "no triangle can be formed from {} points (collinear or coincident)",
            points.len()
        )));
    }
    monitor.check_cancelled()?;
    monitor.report(
        Stage::Triangulating,
        50.0,
        format!("{} raw triangles", delaunay.triangles.len() / 3),
    );

    let raw_count = delaunay.triangles.len() / 3;
    let triangles: Vec<Triangle> = delaunay
        .triangles
        .chunks_exact(3)
        .filter_map(|c| triangle_properties(points, [c[0], c[1], c[2]]))
        .filter(|t| keep_triangle(points, t, config))
        .collect();
    monitor.check_cancelled()?;

    let edges = extract_edges(points, &triangles);
    let hull = counter_clockwise(points, delaunay.hull);
    let statistics = summarize(points.len(), raw_count, &triangles, &edges, start);

    tracing::debug!(
        points = statistics.point_count,
        triangles = statistics.triangle_count,
        filtered = statistics.filtered_triangles,
        edges = statistics.edge_count,
        "triangulation finished"
    );
    monitor.report(
        Stage::Triangulating,
        100.0,
        format!("{} triangles", statistics.triangle_count),
    );

    Ok(TriangulationResult {
        points: Cow::Borrowed(points),
        triangles,
        edges,
        hull,
        statistics,
    })
}

/// Area, centroid, normal, slope and aspect. `None` for zero-area triangles.
pub(crate) fn triangle_properties(points: &[SurveyPoint], vertices: [usize; 3]) -> Option<Triangle> {
    let [a, b, c] = vertices.map(|i| &points[i]);

    let (ux, uy, uz) = (b.x - a.x, b.y - a.y, b.z - a.z);
    let (vx, vy, vz) = (c.x - a.x, c.y - a.y, c.z - a.z);

    let area = 0.5 * (ux * vy - uy * vx).abs();
    if !(area > 0.0) {
        return None;
    }

    let mut n = [uy * vz - uz * vy, uz * vx - ux * vz, ux * vy - uy * vx];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if !(len > 0.0) || !len.is_finite() {
        return None;
    }
    n.iter_mut().for_each(|v| *v /= len);
    if n[2] < 0.0 {
        n.iter_mut().for_each(|v| *v = -*v);
    }

    let slope = n[2].clamp(-1.0, 1.0).acos().to_degrees();
    let aspect = if n[0].hypot(n[1]) < FLAT_THRESHOLD {
        -1.0
    } else {
        let deg = n[0].atan2(n[1]).to_degrees();
        if deg < 0.0 { deg + 360.0 } else { deg % 360.0 }
    };

    Some(Triangle {
        vertices,
        area,
        centroid: [
            (a.x + b.x + c.x) / 3.0,
            (a.y + b.y + c.y) / 3.0,
            (a.z + b.z + c.z) / 3.0,
        ],
        normal: n,
        slope,
        aspect,
    })
}

fn keep_triangle(points: &[SurveyPoint], t: &Triangle, config: &TriangulationConfig) -> bool {
    if let Some(min_area) = config.min_triangle_area
        && t.area < min_area
    {
        return false;
    }
    if let Some(max_len) = config.max_edge_length {
        let [a, b, c] = t.vertices.map(|i| &points[i]);
        if a.planar_distance(b) > max_len || b.planar_distance(c) > max_len || c.planar_distance(a) > max_len {
            return false;
        }
    }
    true
}

/// Unique edges keyed by `(min, max)`, sorted by key.
fn extract_edges(points: &[SurveyPoint], triangles: &[Triangle]) -> Vec<Edge> {
    let mut uses: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 2);
    for t in triangles {
        let [a, b, c] = t.vertices;
        for (p, q) in [(a, b), (b, c), (c, a)] {
            *uses.entry((p.min(q), p.max(q))).or_insert(0) += 1;
        }
    }

    let mut edges: Vec<Edge> = uses
        .into_iter()
        .map(|((a, b), count)| Edge {
            a,
            b,
            length: points[a].planar_distance(&points[b]),
            is_hull: count == 1,
        })
        .collect();
    edges.sort_by_key(|e| (e.a, e.b));
    edges
}

fn counter_clockwise(points: &[SurveyPoint], mut hull: Vec<usize>) -> Vec<usize> {
    if signed_area(points, &hull) < 0.0 {
        hull.reverse();
    }
    hull
}

/// Shoelace area of the polygon through `ring`; positive when counter-clockwise
pub(crate) fn signed_area(points: &[SurveyPoint], ring: &[usize]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (k, &i) in ring.iter().enumerate() {
        let j = ring[(k + 1) % ring.len()];
        twice += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    twice / 2.0
}

fn summarize(
    point_count: usize,
    raw_count: usize,
    triangles: &[Triangle],
    edges: &[Edge],
    start: Instant,
) -> TriangulationStatistics {
    let total_area: f64 = triangles.iter().map(|t| t.area).sum();
    let (min_area, max_area) = if triangles.is_empty() {
        (0.0, 0.0)
    } else {
        triangles
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t.area), hi.max(t.area)))
    };

    TriangulationStatistics {
        point_count,
        triangle_count: triangles.len(),
        edge_count: edges.len(),
        hull_edge_count: edges.iter().filter(|e| e.is_hull).count(),
        filtered_triangles: raw_count - triangles.len(),
        total_area,
        min_area,
        max_area,
        mean_area: if triangles.is_empty() {
            0.0
        } else {
            total_area / triangles.len() as f64
        },
        compute_time: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terrasurf_core::CancellationToken;

    fn unit_square() -> Vec<SurveyPoint> {
        vec![
            SurveyPoint::new(0.0, 0.0, 0.0),
            SurveyPoint::new(1.0, 0.0, 0.0),
            SurveyPoint::new(1.0, 1.0, 1.0),
            SurveyPoint::new(0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_square_gives_two_triangles() {
        let points = unit_square();
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();

        assert_eq!(tin.triangles.len(), 2);
        assert_eq!(tin.statistics.edge_count, 5);
        assert_eq!(tin.statistics.hull_edge_count, 4);
        assert_eq!(tin.hull.len(), 4);
        assert_relative_eq!(tin.statistics.total_area, 1.0, epsilon = 1e-12);
        assert!(signed_area(&points, &tin.hull) > 0.0, "hull must be counter-clockwise");
    }

    #[test]
    fn test_inclined_plane_properties() {
        // z = y: rises to the north, so it faces (descends) south
        let points = unit_square();
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();

        for t in &tin.triangles {
            assert_relative_eq!(t.slope, 45.0, epsilon = 1e-9);
            assert_relative_eq!(t.aspect, 180.0, epsilon = 1e-9);
            assert!(t.normal[2] > 0.0);
            let len: f64 = t.normal.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert_relative_eq!(len, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_east_facing_slope() {
        // z decreases with x: descends towards the east
        let points = vec![
            SurveyPoint::new(0.0, 0.0, 10.0),
            SurveyPoint::new(10.0, 0.0, 0.0),
            SurveyPoint::new(0.0, 10.0, 10.0),
        ];
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();
        assert_relative_eq!(tin.triangles[0].aspect, 90.0, epsilon = 1e-9);
        assert_relative_eq!(tin.triangles[0].centroid[2], 20.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_triangle_has_no_aspect() {
        let points = vec![
            SurveyPoint::new(0.0, 0.0, 5.0),
            SurveyPoint::new(2.0, 0.0, 5.0),
            SurveyPoint::new(0.0, 2.0, 5.0),
        ];
        let tin = triangulate(&points, &TriangulationConfig::default()).unwrap();
        let t = &tin.triangles[0];
        assert_eq!(t.aspect, -1.0);
        assert!(t.is_flat());
        assert_relative_eq!(t.slope, 0.0);
        assert_relative_eq!(t.area, 2.0);
    }

    #[test]
    fn test_too_few_points() {
        let points = &unit_square()[..2];
        let result = triangulate(points, &TriangulationConfig::default());
        assert!(matches!(result, Err(Error::InsufficientPoints { required: 3, found: 2 })));
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let points: Vec<SurveyPoint> = (0..5).map(|i| SurveyPoint::new(i as f64, 2.0 * i as f64, 1.0)).collect();
        let result = triangulate(&points, &TriangulationConfig::default());
        assert!(matches!(result, Err(Error::DegenerateGeometry(_))));
    }

    #[test]
    fn test_edge_filter_drops_long_triangles() {
        let mut points = unit_square();
        points.push(SurveyPoint::new(10.0, 0.5, 0.0));
        let all = triangulate(&points, &TriangulationConfig::default()).unwrap();
        let config = TriangulationConfig {
            max_edge_length: Some(2.0),
            ..Default::default()
        };
        let filtered = triangulate(&points, &config).unwrap();

        assert_eq!(filtered.triangles.len(), 2);
        assert_eq!(
            filtered.statistics.filtered_triangles,
            all.triangles.len() - 2
        );
        assert!(filtered.edges.iter().all(|e| e.length <= 2.0));
        // the convex hull still spans every point
        assert!(filtered.hull.contains(&4));
    }

    #[test]
    fn test_area_filter() {
        // a point just above the bottom hull edge forces a sliver against it
        let mut points = unit_square();
        points.push(SurveyPoint::new(0.5, 0.001, 0.0));
        let all = triangulate(&points, &TriangulationConfig::default()).unwrap();
        assert!(all.triangles.iter().any(|t| t.area < 0.01));

        let config = TriangulationConfig {
            min_triangle_area: Some(0.01),
            ..Default::default()
        };
        let tin = triangulate(&points, &config).unwrap();
        assert!(tin.triangles.iter().all(|t| t.area >= 0.01));
        assert_eq!(tin.statistics.filtered_triangles, 1);
        assert_eq!(tin.triangles.len(), all.triangles.len() - 1);
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let monitor = Monitor::none().with_cancellation(&token);
        let points = unit_square();
        let result = triangulate_monitored(&points, &TriangulationConfig::default(), &monitor);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
