use geopackage::{Envelope, TilePyramid};
use serde::Serialize;

use crate::errors::{MosaicError, MosaicResult};

/// Read-only registry of the tile pyramids of one GeoPackage, in file order.
#[derive(Debug, Clone, Default)]
pub struct Catalog(Vec<TilePyramid>);

/// Summary of one coverage, as shown by the `info` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub srs: String,
    pub bounds: Envelope,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub native_resolution: (f64, f64),
}

impl Catalog {
    #[must_use]
    pub fn new(pyramids: Vec<TilePyramid>) -> Self {
        Self(pyramids)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(TilePyramid::table_name).collect()
    }

    #[must_use]
    pub fn pyramids(&self) -> &[TilePyramid] {
        &self.0
    }

    /// The first coverage of the file, if there is any.
    #[must_use]
    pub fn default_coverage(&self) -> Option<&TilePyramid> {
        self.0.first()
    }

    pub fn get(&self, name: &str) -> MosaicResult<&TilePyramid> {
        self.0
            .iter()
            .find(|p| p.table_name() == name)
            .ok_or_else(|| MosaicError::CoverageNotFound(name.to_string(), self.names().join(", ")))
    }

    pub fn bounds(&self, name: &str) -> MosaicResult<Envelope> {
        Ok(self.get(name)?.bounds())
    }

    /// Pixel size of the finest zoom level that holds tiles.
    pub fn native_resolution(&self, name: &str) -> MosaicResult<(f64, f64)> {
        let matrix = self.get(name)?.native_matrix();
        Ok((matrix.pixel_x_size, matrix.pixel_y_size))
    }

    #[must_use]
    pub fn entries(&self) -> Vec<CoverageEntry> {
        self.0
            .iter()
            .map(|p| {
                let native = p.native_matrix();
                let srs = match p.epsg() {
                    Some(code) => format!("EPSG:{code}"),
                    None => p.spatial_ref().srs_name.clone(),
                };
                CoverageEntry {
                    name: p.table_name().to_string(),
                    title: p.identifier().map(str::to_string),
                    description: p
                        .description()
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                    srs,
                    bounds: p.bounds(),
                    min_zoom: p.min_zoom(),
                    max_zoom: p.max_zoom(),
                    native_resolution: (native.pixel_x_size, native.pixel_y_size),
                }
            })
            .collect()
    }
}
