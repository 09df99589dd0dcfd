use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use geopackage::{Envelope, GeoPackagePool, Summary, TileMatrix, TilePyramid, TileRecord};
use image::{Rgb, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::catalog::Catalog;
use crate::compositor::{BACKGROUND, CompositeOptions, composite_tiles, crop_to_window, render_tile};
use crate::config::{MosaicConfig, OverviewPolicy};
use crate::errors::{MosaicError, MosaicResult};
use crate::reproject::{BuiltinReprojector, EnvelopeReprojector};
use crate::resolver::resolve_tile_range;
use crate::subsample::{decimate, plan_subsampling};
use crate::zoom::select_zoom_level;

/// A window to render from one coverage.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub coverage: String,
    pub envelope: Envelope,
    /// EPSG code of `envelope`, `None` if it already is in the coordinate system of the coverage
    pub crs: Option<u32>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Falls back to [`MosaicConfig::default_policy`]
    pub policy: Option<OverviewPolicy>,
    pub transparent_color: Option<Rgb<u8>>,
    pub cancel: Option<CancellationToken>,
}

impl ReadRequest {
    #[must_use]
    pub fn new(coverage: impl Into<String>, envelope: Envelope, width: u32, height: u32) -> Self {
        Self {
            coverage: coverage.into(),
            envelope,
            crs: None,
            width,
            height,
            policy: None,
            transparent_color: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_crs(mut self, epsg: u32) -> Self {
        self.crs = Some(epsg);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: OverviewPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn with_transparent_color(mut self, color: Rgb<u8>) -> Self {
        self.transparent_color = Some(color);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn validate(&self, max_pixels: u64) -> MosaicResult<()> {
        if self.coverage.is_empty() {
            return Err(MosaicError::InvalidArgument(
                "coverage name must not be empty".to_string(),
            ));
        }
        if !self.envelope.is_valid() {
            return Err(MosaicError::InvalidArgument(format!(
                "envelope {} must be finite and have a positive width and height",
                self.envelope
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(MosaicError::InvalidArgument(format!(
                "output size {}x{} must be positive",
                self.width, self.height
            )));
        }
        let (width, height) = (u64::from(self.width), u64::from(self.height));
        if width * height > max_pixels {
            return Err(MosaicError::MosaicTooLarge(width, height, max_pixels));
        }
        Ok(())
    }
}

/// A rendered window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRaster {
    /// Exactly the requested width and height
    pub image: RgbaImage,
    /// The requested envelope, in the requested coordinate system
    pub envelope: Envelope,
    /// Zoom level the pixels were read from
    pub zoom: u8,
}

/// Read access to the raster coverages of one tile store.
#[async_trait]
pub trait CoverageReader: Send + Sync {
    fn list_coverages(&self) -> Vec<&str>;

    fn get_bounds(&self, coverage: &str) -> MosaicResult<Envelope>;

    /// Ground pixel size `(x, y)` of the finest zoom level with tiles.
    fn get_native_resolution(&self, coverage: &str) -> MosaicResult<(f64, f64)>;

    /// Render a window at exactly the requested pixel size.
    async fn read(&self, request: &ReadRequest) -> MosaicResult<ResultRaster>;

    /// Decode one stored tile. A missing tile is returned as a transparent image.
    async fn read_single_tile(
        &self,
        coverage: &str,
        zoom: u8,
        column: u32,
        row: u32,
    ) -> MosaicResult<RgbaImage>;
}

/// [`CoverageReader`] over a GeoPackage file.
///
/// Pyramid metadata is loaded once when the file is opened. Every read then takes its own
/// pooled connection and gives it back when it returns, so one reader can serve concurrent reads.
#[derive(Clone)]
pub struct GpkgCoverageReader {
    pool: GeoPackagePool,
    catalog: Arc<Catalog>,
    config: MosaicConfig,
    reprojector: Arc<dyn EnvelopeReprojector>,
}

impl Debug for GpkgCoverageReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpkgCoverageReader")
            .field("pool", &self.pool)
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GpkgCoverageReader {
    pub async fn open<P: AsRef<Path>>(path: P, config: MosaicConfig) -> MosaicResult<Self> {
        let pool = GeoPackagePool::open_readonly(path).await?;
        let catalog = Catalog::new(pool.get_tile_pyramids().await?);
        debug!(
            "Opened {} with coverages {}",
            pool.geopackage(),
            catalog.names().join(", ")
        );
        Ok(Self {
            pool,
            catalog: Arc::new(catalog),
            config,
            reprojector: Arc::new(BuiltinReprojector),
        })
    }

    #[must_use]
    pub fn with_reprojector(mut self, reprojector: Arc<dyn EnvelopeReprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// Name of the first coverage of the file.
    #[must_use]
    pub fn default_coverage(&self) -> Option<&str> {
        self.catalog.default_coverage().map(TilePyramid::table_name)
    }

    /// File and per zoom level statistics of all coverages.
    pub async fn summary(&self) -> MosaicResult<Summary> {
        Ok(self.pool.summary(self.catalog.pyramids()).await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn to_pyramid_crs(
        &self,
        request: &ReadRequest,
        pyramid: &TilePyramid,
    ) -> MosaicResult<Envelope> {
        let Some(source) = request.crs else {
            return Ok(request.envelope);
        };
        let Some(target) = pyramid.epsg() else {
            return Err(MosaicError::CoordinateTransformFailure(
                format!("EPSG:{source}"),
                pyramid.spatial_ref().srs_name.clone(),
                format!("coverage {} has no EPSG code", pyramid.table_name()),
            ));
        };
        let envelope = self.reprojector.reproject(&request.envelope, source, target)?;
        if envelope.is_valid() {
            Ok(envelope)
        } else {
            Err(MosaicError::CoordinateTransformFailure(
                format!("EPSG:{source}"),
                format!("EPSG:{target}"),
                format!("{} became the empty envelope {envelope}", request.envelope),
            ))
        }
    }

    fn composite_options(&self) -> CompositeOptions {
        CompositeOptions {
            transparent_color: None,
            decode_failure: self.config.decode_failure,
            max_pixels: Some(self.config.max_mosaic_pixels),
            cancel: None,
        }
    }

    /// Matrix of `zoom`, which must be within the zoom levels that hold tiles.
    fn checked_matrix<'a>(pyramid: &'a TilePyramid, zoom: u8) -> MosaicResult<&'a TileMatrix> {
        if zoom < pyramid.min_zoom() || zoom > pyramid.max_zoom() {
            return Err(MosaicError::OutOfRange(
                zoom,
                pyramid.table_name().to_string(),
                pyramid.min_zoom(),
                pyramid.max_zoom(),
            ));
        }
        pyramid
            .matrix(zoom)
            .ok_or_else(|| MosaicError::MissingTileMatrix(zoom, pyramid.table_name().to_string()))
    }
}

#[async_trait]
impl CoverageReader for GpkgCoverageReader {
    fn list_coverages(&self) -> Vec<&str> {
        self.catalog.names()
    }

    fn get_bounds(&self, coverage: &str) -> MosaicResult<Envelope> {
        self.catalog.bounds(coverage)
    }

    fn get_native_resolution(&self, coverage: &str) -> MosaicResult<(f64, f64)> {
        self.catalog.native_resolution(coverage)
    }

    async fn read(&self, request: &ReadRequest) -> MosaicResult<ResultRaster> {
        request.validate(self.config.max_mosaic_pixels)?;
        let pyramid = self.catalog.get(&request.coverage)?;
        let envelope = self.to_pyramid_crs(request, pyramid)?;

        let requested_res = (
            envelope.width() / f64::from(request.width),
            envelope.height() / f64::from(request.height),
        );
        let policy = request.policy.unwrap_or(self.config.default_policy);
        let zoom = select_zoom_level(
            pyramid.matrices(),
            Some(requested_res.0),
            policy,
            pyramid.max_zoom(),
        )
        .clamp(pyramid.min_zoom(), pyramid.max_zoom());
        let matrix = Self::checked_matrix(pyramid, zoom)?;
        let grid = pyramid.tile_grid(matrix);
        if !envelope.intersects(&pyramid.grid_bounds()) {
            debug!("{envelope} is outside of the grid of {}", pyramid.table_name());
            return Ok(ResultRaster {
                image: RgbaImage::from_pixel(request.width, request.height, BACKGROUND),
                envelope: request.envelope,
                zoom,
            });
        }

        let mut conn = self.pool.acquire().await?;
        let gpkg = self.pool.geopackage();
        let observed = gpkg.get_tile_extent(&mut *conn, pyramid, zoom).await?;
        let tiles = resolve_tile_range(&grid, matrix, &envelope, observed.as_ref())?;
        debug!(
            "Reading {envelope} of {} with {policy} policy at zoom {zoom}, tiles {tiles}",
            pyramid.table_name()
        );

        let options = CompositeOptions {
            transparent_color: request.transparent_color,
            cancel: request.cancel.clone(),
            ..self.composite_options()
        };
        let mosaic = composite_tiles(gpkg, &mut conn, pyramid, matrix, tiles, &options).await?;
        drop(conn);

        let mut pixel_size = (grid.pixel_x_size, grid.pixel_y_size);
        let mut image = mosaic.image;
        if self.config.decimate_overviews && zoom != pyramid.native_matrix().zoom_level {
            let factors = plan_subsampling(requested_res, pixel_size, image.dimensions());
            if !factors.is_none() {
                debug!("Decimating zoom {zoom} of {} by {factors:?}", pyramid.table_name());
                image = decimate(&image, factors);
                pixel_size.0 *= f64::from(factors.x);
                pixel_size.1 *= f64::from(factors.y);
            }
        }

        let image = crop_to_window(
            &image,
            &mosaic.envelope,
            pixel_size,
            &envelope,
            request.width,
            request.height,
        );
        Ok(ResultRaster {
            image,
            envelope: request.envelope,
            zoom,
        })
    }

    async fn read_single_tile(
        &self,
        coverage: &str,
        zoom: u8,
        column: u32,
        row: u32,
    ) -> MosaicResult<RgbaImage> {
        if coverage.is_empty() {
            return Err(MosaicError::InvalidArgument(
                "coverage name must not be empty".to_string(),
            ));
        }
        let pyramid = self.catalog.get(coverage)?;
        let matrix = Self::checked_matrix(pyramid, zoom)?;
        if column >= matrix.matrix_width || row >= matrix.matrix_height {
            return Err(MosaicError::InvalidArgument(format!(
                "tile {zoom}/{column}/{row} is outside of the {}x{} matrix of {coverage}",
                matrix.matrix_width, matrix.matrix_height
            )));
        }

        let tile = self
            .pool
            .get_tile(pyramid, zoom, column, row)
            .await?
            .map(|data| TileRecord {
                zoom,
                column,
                row,
                data,
            });
        render_tile(pyramid, matrix, tile.as_ref(), self.config.decode_failure)
    }
}
