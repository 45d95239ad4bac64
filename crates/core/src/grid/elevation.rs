//! Row-major elevation grid

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A regular 2D grid of elevations (or variances) with a no-data sentinel.
///
/// Values are stored row-major as `(row, col)`; row 0 is the southern row
/// of the [`GridConfig`](super::GridConfig) that produced the grid.
///
/// # Example
///
/// ```
/// use terrasurf_core::ElevationGrid;
///
/// let mut grid = ElevationGrid::new(4, 3, -9999.0);
/// grid.set(1, 2, 42.0).unwrap();
/// assert_eq!(grid.get(1, 2).unwrap(), 42.0);
/// assert!(grid.is_no_data(grid.get(0, 0).unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    data: Array2<f64>,
    no_data: f64,
}

impl ElevationGrid {
    /// Create a grid filled with the no-data sentinel
    pub fn new(rows: usize, cols: usize, no_data: f64) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), no_data),
            no_data,
        }
    }

    /// Create a grid from row-major data
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize, no_data: f64) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Algorithm(e.to_string()))?;

        Ok(Self {
            data: array,
            no_data,
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The no-data sentinel
    pub fn no_data_value(&self) -> f64 {
        self.no_data
    }

    /// Whether `value` is the sentinel (or any non-finite value)
    pub fn is_no_data(&self, value: f64) -> bool {
        !value.is_finite() || value == self.no_data
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Value at (row, col), or `None` when out of range or no data
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.data
            .get((row, col))
            .copied()
            .filter(|v| !self.is_no_data(*v))
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// View of the underlying array
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Reference to the underlying array
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Row-major `f32` copy for rendering and volume consumers.
    ///
    /// No-data cells carry the sentinel cast to `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|&v| if self.is_no_data(v) { self.no_data as f32 } else { v as f32 })
            .collect()
    }

    /// Summary statistics over the valid cells
    pub fn statistics(&self) -> GridStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut count = 0_usize;

        for &v in self.data.iter() {
            if self.is_no_data(v) {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v;
            sum_sq += v * v;
            count += 1;
        }

        if count == 0 {
            return GridStatistics {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                std_dev: f64::NAN,
                valid_cells: 0,
                invalid_cells: self.len(),
            };
        }

        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);

        GridStatistics {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            valid_cells: count,
            invalid_cells: self.len() - count,
        }
    }
}

/// Summary statistics of a grid's valid cells.
///
/// `min`, `max`, `mean` and `std_dev` are NaN when no cell is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub valid_cells: usize,
    pub invalid_cells: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_creation() {
        let grid = ElevationGrid::new(10, 20, -9999.0);
        assert_eq!(grid.rows(), 10);
        assert_eq!(grid.cols(), 20);
        assert_eq!(grid.shape(), (10, 20));
        assert_eq!(grid.get(3, 3).unwrap(), -9999.0);
    }

    #[test]
    fn test_grid_access_out_of_bounds() {
        let mut grid = ElevationGrid::new(2, 2, -9999.0);
        assert!(grid.get(2, 0).is_err());
        assert!(grid.set(0, 5, 1.0).is_err());
        assert!(grid.value(9, 9).is_none());
    }

    #[test]
    fn test_from_vec_dimension_mismatch() {
        assert!(ElevationGrid::from_vec(vec![1.0; 5], 2, 3, -9999.0).is_err());
        let grid = ElevationGrid::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3, -9999.0).unwrap();
        // row-major: second row starts at index 3
        assert_eq!(grid.get(1, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_statistics_skip_no_data() {
        let grid = ElevationGrid::from_vec(vec![1.0, 2.0, -9999.0, 3.0], 2, 2, -9999.0).unwrap();
        let stats = grid.statistics();
        assert_eq!(stats.valid_cells, 3);
        assert_eq!(stats.invalid_cells, 1);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.std_dev, (2.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_statistics_all_invalid() {
        let grid = ElevationGrid::new(2, 2, -9999.0);
        let stats = grid.statistics();
        assert_eq!(stats.valid_cells, 0);
        assert_eq!(stats.invalid_cells, 4);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn test_f32_export_keeps_sentinel() {
        let grid = ElevationGrid::from_vec(vec![1.5, f64::NAN, -9999.0, 2.0], 2, 2, -9999.0).unwrap();
        assert_eq!(grid.to_f32_vec(), vec![1.5, -9999.0, -9999.0, 2.0]);
    }
}
