//! Validation, de-duplication and outlier removal for raw survey points

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use terrasurf_core::{Algorithm, BoundingBox, Error, Monitor, Result, Stage, SurveyPoint};

/// Options controlling [`clean_points`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    /// Drop points whose planar distance to an earlier point is below `duplicate_tolerance`
    pub remove_duplicates: bool,
    /// Planar distance under which two points are the same location (default 0.001)
    pub duplicate_tolerance: f64,
    /// Drop points whose elevation is far from the mean elevation
    pub remove_outliers: bool,
    /// Number of standard deviations beyond which an elevation is an outlier (default 3.0)
    pub outlier_threshold: f64,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            duplicate_tolerance: 0.001,
            remove_outliers: true,
            outlier_threshold: 3.0,
        }
    }
}

/// Why a row was skipped or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NonFiniteCoordinate,
    DuplicateRemoved,
    OutlierRemoved,
}

/// A row-level problem. Rows never abort cleaning; they are reported here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointWarning {
    /// Index of the row in the raw input
    pub index: usize,
    pub kind: WarningKind,
    pub message: String,
}

/// Counts and elevation statistics of a cleaning pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointStatistics {
    pub input_count: usize,
    /// Points remaining after cleaning
    pub valid_count: usize,
    pub invalid_count: usize,
    pub duplicates_removed: usize,
    pub outliers_removed: usize,
    pub min_z: f64,
    pub max_z: f64,
    pub mean_z: f64,
    /// Population standard deviation of the cleaned elevations
    pub std_dev_z: f64,
}

/// Output of [`clean_points`]
#[derive(Debug, Clone, Serialize)]
pub struct CleaningResult {
    pub points: Vec<SurveyPoint>,
    pub statistics: PointStatistics,
    /// `None` when no point survived
    pub bounds: Option<BoundingBox>,
    pub warnings: Vec<PointWarning>,
}

/// Elevation statistics of a point set: (min, max, mean, population std).
///
/// All NaN for an empty slice.
pub fn point_statistics(points: &[SurveyPoint]) -> (f64, f64, f64, f64) {
    if points.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN, f64::NAN);
    }
    let n = points.len() as f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for p in points {
        min = min.min(p.z);
        max = max.max(p.z);
        sum += p.z;
    }
    let mean = sum / n;
    let var = points.iter().map(|p| (p.z - mean).powi(2)).sum::<f64>() / n;
    (min, max, mean, var.sqrt())
}

/// Clean a raw point set.
///
/// 1. Rows with a non-finite coordinate are skipped with a warning.
/// 2. Planar duplicates closer than `duplicate_tolerance` are removed;
///    the **first** occurrence in input order is kept.
/// 3. Points whose elevation deviates from the mean by more than
///    `outlier_threshold` standard deviations are removed. Only `z` is
///    considered, not 3D distance.
///
/// Never fails: every problem becomes a [`PointWarning`].
pub fn clean_points(raw: &[SurveyPoint], options: &CleaningOptions) -> CleaningResult {
    clean_points_monitored(raw, options, &Monitor::none())
}

/// [`clean_points`] with progress reporting under the `parsing` stage.
pub fn clean_points_monitored(
    raw: &[SurveyPoint],
    options: &CleaningOptions,
    monitor: &Monitor<'_>,
) -> CleaningResult {
    monitor.report(Stage::Parsing, 0.0, format!("Validating {} points", raw.len()));

    let mut warnings = Vec::new();
    let mut kept: Vec<(usize, &SurveyPoint)> = Vec::with_capacity(raw.len());
    let mut invalid = 0;

    for (i, p) in raw.iter().enumerate() {
        if !p.is_finite() {
            invalid += 1;
            warnings.push(PointWarning {
                index: i,
                kind: WarningKind::NonFiniteCoordinate,
                message: format!("row {i}: non-finite coordinate ({}, {}, {})", p.x, p.y, p.z),
            });
            continue;
        }
        kept.push((i, p));
    }

    let mut duplicates = 0;
    if options.remove_duplicates {
        monitor.report(Stage::Parsing, 35.0, "Removing duplicate points");
        let before = kept.len();
        kept = remove_duplicates(kept, options.duplicate_tolerance, &mut warnings);
        duplicates = before - kept.len();
    }

    let mut outliers = 0;
    if options.remove_outliers && kept.len() > 2 {
        monitor.report(Stage::Parsing, 70.0, "Removing elevation outliers");
        let before = kept.len();
        kept = remove_outliers(kept, options.outlier_threshold, &mut warnings);
        outliers = before - kept.len();
    }

    let points: Vec<SurveyPoint> = kept.into_iter().map(|(_, p)| p.clone()).collect();
    let (min_z, max_z, mean_z, std_dev_z) = point_statistics(&points);
    let bounds = BoundingBox::from_points(&points);

    tracing::debug!(
        input = raw.len(),
        kept = points.len(),
        invalid,
        duplicates,
        outliers,
        "point cleaning finished"
    );
    monitor.report(Stage::Parsing, 100.0, format!("{} points ready", points.len()));

    CleaningResult {
        statistics: PointStatistics {
            input_count: raw.len(),
            valid_count: points.len(),
            invalid_count: invalid,
            duplicates_removed: duplicates,
            outliers_removed: outliers,
            min_z,
            max_z,
            mean_z,
            std_dev_z,
        },
        points,
        bounds,
        warnings,
    }
}

/// First-wins duplicate removal over a hash grid with cell size = tolerance.
fn remove_duplicates<'a>(
    points: Vec<(usize, &'a SurveyPoint)>,
    tolerance: f64,
    warnings: &mut Vec<PointWarning>,
) -> Vec<(usize, &'a SurveyPoint)> {
    let mut kept: Vec<(usize, &'a SurveyPoint)> = Vec::with_capacity(points.len());

    if !(tolerance > 0.0) {
        // exact planar coincidence only
        let mut seen = HashSet::new();
        for (i, p) in points {
            if seen.insert((p.x.to_bits(), p.y.to_bits())) {
                kept.push((i, p));
            } else {
                warnings.push(duplicate_warning(i, p));
            }
        }
        return kept;
    }

    let cell = |v: f64| (v / tolerance).floor() as i64;
    let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();

    for (i, p) in points {
        let (cx, cy) = (cell(p.x), cell(p.y));
        let duplicate = (-1..=1).any(|dx| {
            (-1..=1).any(|dy| {
                buckets
                    .get(&(cx + dx, cy + dy))
                    .is_some_and(|b| b.iter().any(|&k| kept[k].1.dist(p.x, p.y) < tolerance))
            })
        });
        if duplicate {
            warnings.push(duplicate_warning(i, p));
            continue;
        }
        buckets.entry((cx, cy)).or_default().push(kept.len());
        kept.push((i, p));
    }
    kept
}

fn duplicate_warning(index: usize, p: &SurveyPoint) -> PointWarning {
    PointWarning {
        index,
        kind: WarningKind::DuplicateRemoved,
        message: format!("row {index}: duplicate of an earlier point at ({}, {})", p.x, p.y),
    }
}

fn remove_outliers<'a>(
    points: Vec<(usize, &'a SurveyPoint)>,
    threshold: f64,
    warnings: &mut Vec<PointWarning>,
) -> Vec<(usize, &'a SurveyPoint)> {
    let n = points.len() as f64;
    let mean = points.iter().map(|(_, p)| p.z).sum::<f64>() / n;
    let std = (points.iter().map(|(_, p)| (p.z - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std <= 0.0 || !(threshold > 0.0) {
        return points;
    }
    let limit = threshold * std;

    points
        .into_iter()
        .filter(|(i, p)| {
            let deviation = (p.z - mean).abs();
            if deviation > limit {
                warnings.push(PointWarning {
                    index: *i,
                    kind: WarningKind::OutlierRemoved,
                    message: format!(
                        "row {i}: elevation {} deviates {:.2} std from mean {:.3}",
                        p.z,
                        deviation / std,
                        mean
                    ),
                });
                false
            } else {
                true
            }
        })
        .collect()
}

/// Point cleaning as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct CleanPoints;

impl Algorithm for CleanPoints {
    type Input = Vec<SurveyPoint>;
    type Output = CleaningResult;
    type Params = CleaningOptions;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CleanPoints"
    }

    fn description(&self) -> &'static str {
        "Drop invalid rows, planar duplicates and elevation outliers from survey points"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Ok(clean_points(&input, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points(n: usize) -> Vec<SurveyPoint> {
        let mut pts = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f64, j as f64);
                pts.push(SurveyPoint::new(x, y, 100.0 + 0.1 * x + 0.05 * y));
            }
        }
        pts
    }

    #[test]
    fn test_non_finite_rows_become_warnings() {
        let mut pts = grid_points(3);
        pts.push(SurveyPoint::new(f64::NAN, 1.0, 2.0));
        pts.push(SurveyPoint::new(1.0, 1.0, f64::INFINITY));

        let result = clean_points(&pts, &CleaningOptions::default());
        assert_eq!(result.points.len(), 9);
        assert_eq!(result.statistics.invalid_count, 2);
        let invalid: Vec<usize> = result
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::NonFiniteCoordinate)
            .map(|w| w.index)
            .collect();
        assert_eq!(invalid, vec![9, 10]);
    }

    #[test]
    fn test_duplicates_first_wins() {
        let pts = vec![
            SurveyPoint::new(0.0, 0.0, 1.0).with_id("first"),
            SurveyPoint::new(10.0, 0.0, 2.0),
            SurveyPoint::new(0.0004, 0.0, 5.0).with_id("second"),
            SurveyPoint::new(10.0, 10.0, 3.0),
        ];
        let result = clean_points(&pts, &CleaningOptions::default());

        assert_eq!(result.points.len(), 3);
        assert_eq!(result.statistics.duplicates_removed, 1);
        assert_eq!(result.points[0].id.as_deref(), Some("first"));
        assert!(result.points.iter().all(|p| p.id.as_deref() != Some("second")));
        let dup = result
            .warnings
            .iter()
            .find(|w| w.kind == WarningKind::DuplicateRemoved)
            .unwrap();
        assert_eq!(dup.index, 2);
    }

    #[test]
    fn test_duplicates_across_cell_boundary() {
        // 0.0009 and 0.0011 fall in different hash cells but are 0.0002 apart
        let pts = vec![
            SurveyPoint::new(0.0009, 0.0, 1.0),
            SurveyPoint::new(0.0011, 0.0, 1.0),
            SurveyPoint::new(5.0, 5.0, 1.0),
        ];
        let result = clean_points(&pts, &CleaningOptions::default());
        assert_eq!(result.statistics.duplicates_removed, 1);
    }

    #[test]
    fn test_duplicates_disabled() {
        let pts = vec![SurveyPoint::new(0.0, 0.0, 1.0), SurveyPoint::new(0.0, 0.0, 1.0)];
        let opts = CleaningOptions {
            remove_duplicates: false,
            ..Default::default()
        };
        assert_eq!(clean_points(&pts, &opts).points.len(), 2);
    }

    #[test]
    fn test_outlier_removed_by_elevation_only() {
        let mut pts = grid_points(6);
        pts.push(SurveyPoint::new(2.5, 2.5, 500.0));

        let result = clean_points(&pts, &CleaningOptions::default());
        assert_eq!(result.statistics.outliers_removed, 1);
        assert!(result.points.iter().all(|p| p.z < 200.0));
        assert_eq!(result.statistics.valid_count, 36);
        let bounds = result.bounds.unwrap();
        assert_eq!(bounds.max_z, Some(100.0 + 0.5 + 0.25));
    }

    #[test]
    fn test_outliers_disabled_keeps_everything() {
        let mut pts = grid_points(4);
        pts.push(SurveyPoint::new(1.5, 1.5, 900.0));
        let opts = CleaningOptions {
            remove_outliers: false,
            ..Default::default()
        };
        let result = clean_points(&pts, &opts);
        assert_eq!(result.points.len(), 17);
        assert_eq!(result.statistics.max_z, 900.0);
    }

    #[test]
    fn test_constant_elevation_removes_nothing() {
        let pts: Vec<SurveyPoint> = (0..10).map(|i| SurveyPoint::new(i as f64, 0.0, 5.0)).collect();
        let result = clean_points(&pts, &CleaningOptions::default());
        assert_eq!(result.points.len(), 10);
        assert_eq!(result.statistics.std_dev_z, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let result = clean_points(&[], &CleaningOptions::default());
        assert!(result.points.is_empty());
        assert!(result.bounds.is_none());
        assert!(result.statistics.mean_z.is_nan());
    }

    #[test]
    fn test_algorithm_trait() {
        let out = CleanPoints.execute_default(grid_points(2)).unwrap();
        assert_eq!(out.points.len(), 4);
        assert_eq!(CleanPoints.name(), "CleanPoints");
    }
}
