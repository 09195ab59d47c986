//! Regular grids of prediction targets

use serde::{Deserialize, Serialize};

use super::GeoTransform;
use crate::{Error, Result};

/// A `rows` × `cols` grid whose cell centres are kriging targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGrid {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
}

impl TargetGrid {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
        }
    }

    /// Grid of `rows` × `cols` cells spanning `(min_x, min_y, max_x, max_y)`.
    pub fn covering(bounds: (f64, f64, f64, f64), rows: usize, cols: usize) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        if rows == 0 || cols == 0 {
            return Err(Error::invalid(
                "grid",
                format!("{}x{}", rows, cols),
                "grid must have at least one row and one column",
            ));
        }
        if !(max_x > min_x && max_y > min_y) {
            return Err(Error::invalid(
                "bounds",
                format!("({}, {}, {}, {})", min_x, min_y, max_x, max_y),
                "max must exceed min on both axes",
            ));
        }
        let cell_width = (max_x - min_x) / cols as f64;
        let cell_height = -(max_y - min_y) / rows as f64;
        Ok(Self::new(
            rows,
            cols,
            GeoTransform::new(min_x, max_y, cell_width, cell_height),
        ))
    }

    /// Number of targets in the grid
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell centres in row-major order
    pub fn targets(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(self.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                out.push(self.transform.cell_center(col, row));
            }
        }
        out
    }
}
