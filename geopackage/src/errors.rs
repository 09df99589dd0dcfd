use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum GpkgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error("GeoPackage filepath contains unsupported characters: {}", .0.display())]
    UnsupportedCharsInFilepath(PathBuf),

    #[error("GeoPackage file {0} is missing the required table {1}")]
    MissingTable(String, String),

    #[error("Tile table {1} is not registered as a tile pyramid in GeoPackage file {0}")]
    UnknownTileTable(String, String),

    #[error("Spatial reference system {1} used by tile table {2} is not defined in GeoPackage file {0}")]
    MissingSpatialRef(String, i64, String),

    #[error("Tile matrix at zoom level {2} of tile table {1} in GeoPackage file {0} is invalid: {3}")]
    InvalidTileMatrix(String, String, i64, String),

    #[error("Tile table {1} in GeoPackage file {0} has an invalid zoom level {2}")]
    InvalidZoomLevel(String, String, i64),

    #[error("Tile table {1} in GeoPackage file {0} has an invalid value: zoom_level={2}, tile_column={3}, tile_row={4}")]
    InvalidTileIndex(String, String, i64, i64, i64),
}

pub type GpkgResult<T> = Result<T, GpkgError>;
