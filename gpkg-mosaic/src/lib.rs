#![doc = include_str!("../README.md")]

pub mod catalog;
pub use catalog::{Catalog, CoverageEntry};

pub mod compositor;
pub use compositor::{
    AlignedMosaic, BACKGROUND, CompositeOptions, composite_tiles, crop_to_window, render_tile,
};

pub mod config;
pub use config::{DecodeFailurePolicy, MosaicConfig, OverviewPolicy};

mod errors;
pub use errors::{MosaicError, MosaicResult};

#[cfg(feature = "cli")]
pub mod logging;

mod reader;
pub use reader::{CoverageReader, GpkgCoverageReader, ReadRequest, ResultRaster};

pub mod reproject;
pub use reproject::{BuiltinReprojector, EnvelopeReprojector};

pub mod resolver;
pub use resolver::resolve_tile_range;

pub mod subsample;
pub use subsample::{SubsampleFactors, decimate, plan_subsampling};

pub mod zoom;
pub use zoom::select_zoom_level;

// Re-export of the types used in the public API
pub use geopackage::{Envelope, TileMatrix, TilePyramid, TileRect};
pub use image::{Rgb, RgbaImage};
pub use tokio_util::sync::CancellationToken;
