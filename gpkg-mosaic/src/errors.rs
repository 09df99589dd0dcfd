//! Error types of the mosaic reader.

use std::path::PathBuf;

use geopackage::GpkgError;

/// Errors that can occur while reading coverages.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum MosaicError {
    /// A request parameter is missing or malformed. Raised before any store access.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No coverage with this name exists in the file.
    #[error("Coverage {0} does not exist. Available coverages: {1}")]
    CoverageNotFound(String, String),

    /// Requested zoom level is outside the levels that hold tiles.
    #[error(
        "Requested zoom level {0} of coverage {1} is out of range. Possible zoom levels are {2} to {3}"
    )]
    OutOfRange(u8, String, u8, u8),

    /// The selected zoom level has no tile matrix.
    #[error("Coverage {1} has no tile matrix for zoom level {0}")]
    MissingTileMatrix(u8, String),

    /// The requested window could not be brought into the coverage's coordinate system.
    #[error("Cannot transform an envelope from {0} to {1}: {2}")]
    CoordinateTransformFailure(String, String, String),

    /// The tile store could not be opened or queried.
    #[error("Tile store is unavailable: {0}")]
    StoreUnavailable(#[from] GpkgError),

    /// A tile could not be decoded and undecodable tiles are configured to abort the read.
    #[error("Unable to decode tile {1}/{2}/{3} of coverage {0}: {4}")]
    TileDecode(String, u8, u32, u32, #[source] image::ImageError),

    /// The output or the tile-aligned buffer of a request would exceed the configured pixel budget.
    #[error("Reading {0}x{1} pixels exceeds the limit of {2} pixels per read")]
    MosaicTooLarge(u64, u64, u64),

    /// The read was cancelled by the caller.
    #[error("Read of coverage {0} was cancelled")]
    Cancelled(String),

    /// Configuration file could not be parsed.
    #[error("Unable to parse configuration {}: {}", .0.display(), .1)]
    ConfigParse(PathBuf, #[source] serde_yaml::Error),

    /// Reading a configuration file or writing an output image failed.
    #[error("IO error {1}: {0}")]
    Io(#[source] std::io::Error, String),
}

pub type MosaicResult<T> = Result<T, MosaicError>;
