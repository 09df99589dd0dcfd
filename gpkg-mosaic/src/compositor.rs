//! Painting of stored tiles into one image.
//!
//! [`composite_tiles`] is the tile-aligned primitive: it returns whole tiles and the envelope they
//! cover. [`crop_to_window`] turns such a mosaic into the exact pixel window a caller asked for.

use futures::TryStreamExt as _;
use geopackage::{
    Envelope, GeoPackage, TileMatrix, TilePyramid, TileQuery, TileRecord, TileRect,
};
use gpkg_tile_utils::Format;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, Rgb, Rgba, RgbaImage};
use sqlx::SqliteConnection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::DecodeFailurePolicy;
use crate::errors::{MosaicError, MosaicResult};

/// Fully transparent white, the color of every area without a tile.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Per call settings of the compositor.
#[derive(Debug, Clone, Default)]
pub struct CompositeOptions {
    /// Pixels of this color become fully transparent after painting
    pub transparent_color: Option<Rgb<u8>>,
    pub decode_failure: DecodeFailurePolicy,
    /// Upper limit for width times height of the mosaic, no limit if `None`
    pub max_pixels: Option<u64>,
    pub cancel: Option<CancellationToken>,
}

/// Whole tiles painted side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMosaic {
    pub image: RgbaImage,
    /// Ground envelope covered by `image`, from the outer edges of its tiles
    pub envelope: Envelope,
    pub tiles: TileRect,
    /// Number of tiles that were decoded and painted
    pub painted: usize,
}

/// Paint all stored tiles of `tiles` into one image.
///
/// Missing tiles leave their area transparent. Undecodable tiles are skipped with a warning
/// or abort the call, depending on [`CompositeOptions::decode_failure`].
/// The cancellation token is checked before every tile is painted.
pub async fn composite_tiles(
    gpkg: &GeoPackage,
    conn: &mut SqliteConnection,
    pyramid: &TilePyramid,
    matrix: &TileMatrix,
    tiles: TileRect,
    options: &CompositeOptions,
) -> MosaicResult<AlignedMosaic> {
    let grid = pyramid.tile_grid(matrix);
    let mut image = allocate(matrix, &tiles, options.max_pixels)?;
    debug!(
        "Compositing {} tiles {tiles} of {} into {}x{} pixels",
        tiles.size(),
        pyramid.table_name(),
        image.width(),
        image.height()
    );

    let mut painted = 0;
    let query = TileQuery::from(tiles);
    let mut stream = gpkg.stream_tiles(conn, pyramid, &query);
    while let Some(tile) = stream.try_next().await? {
        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(MosaicError::Cancelled(pyramid.table_name().to_string()));
        }
        if !tiles.contains(tile.column, tile.row) {
            continue;
        }
        let Some(decoded) = decode_record(pyramid, &tile, options.decode_failure)? else {
            continue;
        };
        let x = i64::from(tile.column - tiles.min_col) * i64::from(matrix.tile_width);
        let y = i64::from(tile.row - tiles.min_row) * i64::from(matrix.tile_height);
        trace!(
            "Painting tile {}/{}/{} at {x},{y}",
            tile.zoom, tile.column, tile.row
        );
        paint(&mut image, &decoded, matrix, x, y);
        painted += 1;
    }

    if let Some(color) = options.transparent_color {
        apply_color_key(&mut image, color);
    }

    Ok(AlignedMosaic {
        image,
        envelope: grid.rect_envelope(&tiles),
        tiles,
        painted,
    })
}

fn allocate(
    matrix: &TileMatrix,
    tiles: &TileRect,
    max_pixels: Option<u64>,
) -> MosaicResult<RgbaImage> {
    let width = u64::from(tiles.columns()) * u64::from(matrix.tile_width);
    let height = u64::from(tiles.rows()) * u64::from(matrix.tile_height);
    let limit = max_pixels.unwrap_or(u64::MAX);
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if width.saturating_mul(height) <= limit => {
            Ok(RgbaImage::from_pixel(w, h, BACKGROUND))
        }
        _ => Err(MosaicError::MosaicTooLarge(width, height, limit)),
    }
}

/// One stored tile at the size of its matrix, transparent if it is missing or skipped.
pub fn render_tile(
    pyramid: &TilePyramid,
    matrix: &TileMatrix,
    tile: Option<&TileRecord>,
    policy: DecodeFailurePolicy,
) -> MosaicResult<RgbaImage> {
    let mut image = RgbaImage::from_pixel(matrix.tile_width, matrix.tile_height, BACKGROUND);
    let decoded = tile
        .map(|tile| decode_record(pyramid, tile, policy))
        .transpose()?
        .flatten();
    if let Some(decoded) = decoded {
        paint(&mut image, &decoded, matrix, 0, 0);
    }
    Ok(image)
}

/// Decode a stored tile, `None` if it cannot be decoded and the policy skips such tiles.
fn decode_record(
    pyramid: &TilePyramid,
    tile: &TileRecord,
    policy: DecodeFailurePolicy,
) -> MosaicResult<Option<DynamicImage>> {
    match (decode_tile(&tile.data), policy) {
        (Ok(v), _) => Ok(Some(v)),
        (Err(e), DecodeFailurePolicy::Lenient) => {
            warn!(
                "Skipping undecodable tile {}/{}/{} of {}: {e}",
                tile.zoom,
                tile.column,
                tile.row,
                pyramid.table_name()
            );
            Ok(None)
        }
        (Err(e), DecodeFailurePolicy::Strict) => Err(MosaicError::TileDecode(
            pyramid.table_name().to_string(),
            tile.zoom,
            tile.column,
            tile.row,
            e,
        )),
    }
}

/// Decode a tile using its sniffed format, or let the codec guess when the format is unknown.
pub fn decode_tile(data: &[u8]) -> Result<DynamicImage, ImageError> {
    match Format::detect(data).map(image_format) {
        Some(format) => image::load_from_memory_with_format(data, format),
        None => image::load_from_memory(data),
    }
}

/// Encoder and decoder of `image` for a tile format.
#[must_use]
pub fn image_format(format: Format) -> ImageFormat {
    match format {
        Format::Png => ImageFormat::Png,
        Format::Jpeg => ImageFormat::Jpeg,
        Format::Webp => ImageFormat::WebP,
        Format::Gif => ImageFormat::Gif,
        Format::Tiff => ImageFormat::Tiff,
    }
}

/// Composite one decoded tile pixel by pixel, whatever its color type is.
fn paint(canvas: &mut RgbaImage, tile: &DynamicImage, matrix: &TileMatrix, x: i64, y: i64) {
    let rgba = tile.to_rgba8();
    if rgba.dimensions() == (matrix.tile_width, matrix.tile_height) {
        imageops::replace(canvas, &rgba, x, y);
    } else {
        let scaled = imageops::resize(
            &rgba,
            matrix.tile_width,
            matrix.tile_height,
            FilterType::Nearest,
        );
        imageops::replace(canvas, &scaled, x, y);
    }
}

pub fn apply_color_key(image: &mut RgbaImage, color: Rgb<u8>) {
    for pixel in image.pixels_mut() {
        if pixel.0[..3] == color.0 {
            pixel.0[3] = 0;
        }
    }
}

/// Copy the part of a tile-aligned mosaic that covers `requested` into a `width` x `height` image.
///
/// The source window starts at the requested corner rounded to whole mosaic pixels and is
/// stretched to the output with nearest neighbor sampling. Output pixels that fall outside the
/// mosaic stay transparent. Callers bound `width` times `height`, see
/// [`MosaicConfig::max_mosaic_pixels`](crate::MosaicConfig::max_mosaic_pixels).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn crop_to_window(
    mosaic: &RgbaImage,
    aligned: &Envelope,
    pixel_size: (f64, f64),
    requested: &Envelope,
    width: u32,
    height: u32,
) -> RgbaImage {
    let (px, py) = pixel_size;
    let sx = ((requested.min_x - aligned.min_x) / px).round() as i64;
    let sy = ((aligned.max_y - requested.max_y) / py).round() as i64;
    let sw = ((requested.width() / px).round() as i64).max(1);
    let sh = ((requested.height() / py).round() as i64).max(1);
    let (mw, mh) = (i64::from(mosaic.width()), i64::from(mosaic.height()));

    RgbaImage::from_fn(width, height, |dx, dy| {
        let column = source_index(sx, i64::from(dx), sw, i64::from(width), mw);
        let row = source_index(sy, i64::from(dy), sh, i64::from(height), mh);
        match (column, row) {
            (Some(x), Some(y)) => *mosaic.get_pixel(x, y),
            _ => BACKGROUND,
        }
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn source_index(start: i64, offset: i64, span: i64, size: i64, limit: i64) -> Option<u32> {
    let idx = start + offset * span / size;
    (0..limit).contains(&idx).then_some(idx as u32)
}
