//! Affine transform between grid cells and world coordinates

use serde::{Deserialize, Serialize};

/// North-up affine transform for a regular target grid.
///
/// Maps cell indices (col, row) to world coordinates (x, y):
/// ```text
/// x = origin_x + col * cell_width
/// y = origin_y + row * cell_height
/// ```
///
/// `origin` is the upper-left corner of the grid, so `cell_height` is
/// usually negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub cell_width: f64,
    /// Cell size in Y direction (negative for north-up grids)
    pub cell_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_width,
            cell_height,
        }
    }

    /// World coordinates of the centre of cell (col, row)
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.cell_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.cell_height;
        (x, y)
    }

    /// World coordinates of the upper-left corner of cell (col, row)
    pub fn cell_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.cell_width;
        let y = self.origin_y + row as f64 * self.cell_height;
        (x, y)
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a `cols` × `rows` grid
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.cell_corner(0, 0);
        let (x1, y1) = self.cell_corner(cols, rows);
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}
