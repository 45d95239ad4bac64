//! Survey points and their planar extent

use serde::{Deserialize, Serialize};

/// Where a survey point came from.
///
/// The core treats every source the same way; the tag is carried through
/// cleaning so callers can trace points back to their origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    #[default]
    Survey,
    Csv,
    Dwg,
    Las,
    Dem,
    Synthetic,
}

/// A single 3D survey observation.
///
/// Every algorithm in terrasurf works on a borrowed `&[SurveyPoint]`;
/// triangle and neighbor indices refer to positions in that slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: PointSource,
}

impl SurveyPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            id: None,
            source: PointSource::Survey,
        }
    }

    /// Attach an identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a source tag
    pub fn with_source(mut self, source: PointSource) -> Self {
        self.source = source;
        self
    }

    /// Whether all three coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Squared planar distance to (x, y)
    #[inline]
    pub fn dist_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }

    /// Planar distance to (x, y)
    #[inline]
    pub fn dist(&self, x: f64, y: f64) -> f64 {
        self.dist_sq(x, y).sqrt()
    }

    /// Planar distance to another point
    #[inline]
    pub fn planar_distance(&self, other: &SurveyPoint) -> f64 {
        self.dist(other.x, other.y)
    }
}

/// Axis-aligned planar extent of a point set, with optional elevation range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_z: Option<f64>,
}

impl BoundingBox {
    /// Planar box without an elevation range
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            min_z: None,
            max_z: None,
        }
    }

    /// Bounding box of a point slice. `None` for an empty slice.
    pub fn from_points(points: &[SurveyPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bb = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
            min_z: Some(first.z),
            max_z: Some(first.z),
        };
        for p in &points[1..] {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
            bb.min_z = bb.min_z.map(|z| z.min(p.z));
            bb.max_z = bb.max_z.map(|z| z.max(p.z));
        }
        Some(bb)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Planar center (x, y)
    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    /// Whether (x, y) lies inside or on the box
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Distance from (x, y) to the nearest side of the box, for points inside it
    pub fn distance_to_border(&self, x: f64, y: f64) -> f64 {
        (x - self.min_x)
            .min(self.max_x - x)
            .min(y - self.min_y)
            .min(self.max_y - y)
    }

    /// Grow the box by `margin` on every side
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
            ..*self
        }
    }

    /// Whether the box has a finite, non-inverted planar extent
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.max_x >= self.min_x
            && self.max_y >= self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_points() {
        let pts = vec![
            SurveyPoint::new(1.0, 5.0, 10.0),
            SurveyPoint::new(-2.0, 3.0, 12.0),
            SurveyPoint::new(4.0, -1.0, 8.0),
        ];
        let bb = BoundingBox::from_points(&pts).unwrap();
        assert_eq!((bb.min_x, bb.min_y, bb.max_x, bb.max_y), (-2.0, -1.0, 4.0, 5.0));
        assert_eq!(bb.min_z, Some(8.0));
        assert_eq!(bb.max_z, Some(12.0));
        assert_eq!(bb.width(), 6.0);
        assert_eq!(bb.height(), 6.0);
        assert!(bb.contains(0.0, 0.0));
        assert!(!bb.contains(5.0, 0.0));
    }

    #[test]
    fn test_bbox_empty() {
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_distance_to_border() {
        let bb = BoundingBox::new(0.0, 0.0, 10.0, 4.0);
        assert_eq!(bb.distance_to_border(5.0, 2.0), 2.0);
        assert_eq!(bb.distance_to_border(1.0, 2.0), 1.0);
    }

    #[test]
    fn test_point_deserialize_defaults() {
        let p: SurveyPoint = serde_json::from_str(r#"{"x": 1.0, "y": 2.0, "z": 3.5}"#).unwrap();
        assert_eq!(p, SurveyPoint::new(1.0, 2.0, 3.5));

        let p: SurveyPoint =
            serde_json::from_str(r#"{"x": 1, "y": 2, "z": 3, "id": "BM1", "source": "dwg"}"#)
                .unwrap();
        assert_eq!(p.id.as_deref(), Some("BM1"));
        assert_eq!(p.source, PointSource::Dwg);
    }
}
