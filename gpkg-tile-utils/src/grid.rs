//! Conversions between ground coordinates and the tile grid of one zoom level.
//!
//! A grid is anchored at the top-left corner (minimum X, maximum Y) of the declared
//! tile matrix set, columns grow to the east and rows grow to the south.
//! Nothing here clamps or wraps, values outside the matrix are returned as they are.

use crate::{Envelope, TileRect};

/// The tile grid of a single zoom level.
///
/// # Examples
///
/// ```
/// # use gpkg_tile_utils::TileGrid;
/// // 2x1 tiles of 256 pixels covering the whole world in degrees
/// let grid = TileGrid::new(-180.0, 90.0, 256, 256, 180.0 / 256.0, 180.0 / 256.0);
/// assert_eq!(grid.to_tile(0.0, 0.0), (1.0, 0.5));
/// assert_eq!(grid.to_ground(1.0, 0.5), (0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub tile_width: u32,
    pub tile_height: u32,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
}

impl TileGrid {
    #[must_use]
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        tile_width: u32,
        tile_height: u32,
        pixel_x_size: f64,
        pixel_y_size: f64,
    ) -> Self {
        Self {
            origin_x,
            origin_y,
            tile_width,
            tile_height,
            pixel_x_size,
            pixel_y_size,
        }
    }

    /// Ground width of one tile.
    #[must_use]
    pub fn tile_span_x(&self) -> f64 {
        f64::from(self.tile_width) * self.pixel_x_size
    }

    /// Ground height of one tile.
    #[must_use]
    pub fn tile_span_y(&self) -> f64 {
        f64::from(self.tile_height) * self.pixel_y_size
    }

    /// Ground coordinates to fractional `(column, row)`.
    #[must_use]
    pub fn to_tile(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.tile_span_x(),
            (self.origin_y - y) / self.tile_span_y(),
        )
    }

    /// Fractional `(column, row)` to ground coordinates.
    #[must_use]
    pub fn to_ground(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.tile_span_x(),
            self.origin_y - row * self.tile_span_y(),
        )
    }

    /// Ground envelope covered by all tiles of the rectangle, outer edges included.
    #[must_use]
    pub fn rect_envelope(&self, rect: &TileRect) -> Envelope {
        let (min_x, max_y) = self.to_ground(f64::from(rect.min_col), f64::from(rect.min_row));
        let (max_x, min_y) = self.to_ground(
            f64::from(rect.max_col) + 1.0,
            f64::from(rect.max_row) + 1.0,
        );
        Envelope::new(min_x, min_y, max_x, max_y)
    }
}
