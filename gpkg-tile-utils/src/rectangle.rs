//! Rectangles of tiles within one zoom level of a tile matrix.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// A rectangular range of tiles at a single zoom level.
///
/// Both the min and the max column/row are inclusive. Row 0 is the top row of the matrix.
///
/// # Examples
///
/// ```
/// # use gpkg_tile_utils::TileRect;
/// let rect = TileRect::new(10, 3, 5, 4, 5);
/// assert_eq!(rect.columns(), 2);
/// assert_eq!(rect.rows(), 1);
/// assert_eq!(rect.size(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    /// The zoom level of the tiles
    pub zoom: u8,
    /// The first column (inclusive)
    pub min_col: u32,
    /// The first row (inclusive)
    pub min_row: u32,
    /// The last column (inclusive)
    pub max_col: u32,
    /// The last row (inclusive)
    pub max_row: u32,
}

impl Display for TileRect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: ({},{}) - ({},{})",
            self.zoom, self.min_col, self.min_row, self.max_col, self.max_row
        )
    }
}

impl Serialize for TileRect {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl TileRect {
    /// Creates a new `TileRect`.
    ///
    /// # Panics
    ///
    /// Panics if `min_col > max_col` or `min_row > max_row`.
    #[must_use]
    pub fn new(zoom: u8, min_col: u32, min_row: u32, max_col: u32, max_row: u32) -> Self {
        assert!(min_col <= max_col);
        assert!(min_row <= max_row);
        Self {
            zoom,
            min_col,
            min_row,
            max_col,
            max_row,
        }
    }

    #[must_use]
    pub fn columns(&self) -> u32 {
        self.max_col - self.min_col + 1
    }

    #[must_use]
    pub fn rows(&self) -> u32 {
        self.max_row - self.min_row + 1
    }

    /// Total number of tiles contained in this rectangle.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.columns()) * u64::from(self.rows())
    }

    #[must_use]
    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.min_col..=self.max_col).contains(&col) && (self.min_row..=self.max_row).contains(&row)
    }
}
