//! Output grid layout shared by every interpolator

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::point::{BoundingBox, SurveyPoint};

/// Default sentinel written into cells that could not be estimated
pub const DEFAULT_NO_DATA: f64 = -9999.0;

/// Regular grid layout.
///
/// Cell `(row, col)` is located at `(min_x + col * resolution, min_y + row * resolution)`.
/// Row 0 is the southern (minimum y) row and storage is row-major. The grid
/// dimensions are derived from the bounds and resolution; nothing else stores them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub bounds: BoundingBox,
    pub resolution: f64,
    pub no_data_value: f64,
}

impl GridConfig {
    pub fn new(bounds: BoundingBox, resolution: f64) -> Self {
        Self {
            bounds,
            resolution,
            no_data_value: DEFAULT_NO_DATA,
        }
    }

    /// Grid covering the extent of `points`, grown by `margin` on each side.
    pub fn covering(points: &[SurveyPoint], resolution: f64, margin: f64) -> Result<Self> {
        let bounds = BoundingBox::from_points(points).ok_or(Error::InsufficientPoints {
            required: 1,
            found: 0,
        })?;
        let config = Self::new(bounds.expanded(margin), resolution);
        config.validate()?;
        Ok(config)
    }

    /// Replace the no-data sentinel
    pub fn with_no_data(mut self, no_data_value: f64) -> Self {
        self.no_data_value = no_data_value;
        self
    }

    /// Check that the layout describes at least one cell
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution > 0.0) || !self.resolution.is_finite() {
            return Err(Error::invalid_parameter(
                "resolution",
                self.resolution,
                "must be a finite value > 0",
            ));
        }
        if !self.bounds.is_valid() {
            return Err(Error::invalid_parameter(
                "bounds",
                format!("{:?}", self.bounds),
                "must be finite with max >= min",
            ));
        }
        Ok(())
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        cells_along(self.bounds.width(), self.resolution)
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        cells_along(self.bounds.height(), self.resolution)
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Planar coordinates of cell (row, col)
    #[inline]
    pub fn cell_position(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.bounds.min_x + col as f64 * self.resolution,
            self.bounds.min_y + row as f64 * self.resolution,
        )
    }
}

fn cells_along(extent: f64, resolution: f64) -> usize {
    (extent / resolution + 1e-9).floor() as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let cfg = GridConfig::new(BoundingBox::new(0.0, 0.0, 10.0, 5.0), 1.0);
        assert_eq!(cfg.width(), 11);
        assert_eq!(cfg.height(), 6);
        assert_eq!(cfg.cell_count(), 66);
        assert_eq!(cfg.cell_position(0, 0), (0.0, 0.0));
        assert_eq!(cfg.cell_position(5, 10), (10.0, 5.0));
    }

    #[test]
    fn test_partial_cell_is_not_rounded_up() {
        let cfg = GridConfig::new(BoundingBox::new(0.0, 0.0, 10.5, 0.0), 1.0);
        assert_eq!(cfg.width(), 11);
        assert_eq!(cfg.height(), 1);
    }

    #[test]
    fn test_float_extent_tolerance() {
        // 0.3 / 0.1 is 2.9999999999999996 in f64
        let cfg = GridConfig::new(BoundingBox::new(0.0, 0.0, 0.3, 0.3), 0.1);
        assert_eq!(cfg.width(), 4);
    }

    #[test]
    fn test_validate() {
        let bad = GridConfig::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.0);
        assert!(bad.validate().is_err());
        let inverted = GridConfig::new(BoundingBox::new(1.0, 0.0, 0.0, 1.0), 0.5);
        assert!(inverted.validate().is_err());
        let ok = GridConfig::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.5);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.no_data_value, DEFAULT_NO_DATA);
    }

    #[test]
    fn test_covering() {
        let pts = vec![SurveyPoint::new(0.0, 0.0, 1.0), SurveyPoint::new(4.0, 2.0, 1.0)];
        let cfg = GridConfig::covering(&pts, 1.0, 1.0).unwrap();
        assert_eq!(cfg.bounds.min_x, -1.0);
        assert_eq!(cfg.width(), 7);
        assert_eq!(cfg.height(), 5);
        assert!(GridConfig::covering(&[], 1.0, 0.0).is_err());
    }
}
