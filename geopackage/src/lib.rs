#![doc = include_str!("../README.md")]

mod errors;
pub use errors::{GpkgError, GpkgResult};

mod geopackage;
pub use geopackage::GeoPackage;

mod pool;
pub use pool::GeoPackagePool;

mod pyramid;
pub use pyramid::{SpatialRef, TileMatrix, TilePyramid};

mod queries;
pub use queries::{REQUIRED_TABLES, check_tile_schema, missing_required_tables, quote_identifier};

mod summary;
pub use summary::{PyramidSummary, Summary, ZoomInfo};

mod tiles;
pub use tiles::{TileAxis, TileQuery, TileRecord};

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

// Re-export of the geometry types used in the public API
pub use gpkg_tile_utils::{Envelope, TileGrid, TileRect};
