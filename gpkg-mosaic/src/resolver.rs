//! Tile index resolution for a requested window.

use geopackage::{Envelope, TileGrid, TileMatrix, TileRect};

use crate::errors::{MosaicError, MosaicResult};

/// Inclusive range of tiles covering `envelope` at the zoom level of `matrix`.
///
/// Boundaries that fall within half a ground pixel of a tile edge snap to that edge, so windows
/// meant to align with tiles do not pick up a neighbor because of floating point drift.
/// A wider sliver keeps its tile, because the crop rounds it to at least one whole pixel.
/// The range is then clamped to `observed`, the tiles that actually hold data at this level,
/// or to the whole matrix when the level is empty. The end never falls below the start.
pub fn resolve_tile_range(
    grid: &TileGrid,
    matrix: &TileMatrix,
    envelope: &Envelope,
    observed: Option<&TileRect>,
) -> MosaicResult<TileRect> {
    // half a pixel, in tiles
    let tol_col = 0.5 / f64::from(grid.tile_width);
    let tol_row = 0.5 / f64::from(grid.tile_height);

    let (first_col, first_row) = grid.to_tile(envelope.min_x, envelope.max_y);
    let (last_col, last_row) = grid.to_tile(envelope.max_x, envelope.min_y);
    let start_col = start_index(first_col, tol_col);
    let end_col = end_index(last_col, tol_col);
    let start_row = start_index(first_row, tol_row);
    let end_row = end_index(last_row, tol_row);

    let (min_col, min_row, max_col, max_row) = match observed {
        Some(r) => (r.min_col, r.min_row, r.max_col, r.max_row),
        None => (
            0,
            0,
            matrix.matrix_width.saturating_sub(1),
            matrix.matrix_height.saturating_sub(1),
        ),
    };
    let (start_col, end_col) = clamp_range(start_col, end_col, min_col, max_col)?;
    let (start_row, end_row) = clamp_range(start_row, end_row, min_row, max_row)?;

    Ok(TileRect::new(
        matrix.zoom_level,
        start_col,
        start_row,
        end_col,
        end_row,
    ))
}

/// Index of the tile holding the first pixel after the fractional tile position `at`.
#[allow(clippy::cast_possible_truncation)]
fn start_index(at: f64, tolerance: f64) -> i64 {
    if is_near_edge(at, tolerance) {
        at.round() as i64
    } else {
        at.floor() as i64
    }
}

/// Index of the tile holding the last pixel before the fractional tile position `at`.
#[allow(clippy::cast_possible_truncation)]
fn end_index(at: f64, tolerance: f64) -> i64 {
    if is_near_edge(at, tolerance) {
        at.round() as i64 - 1
    } else {
        at.floor() as i64
    }
}

fn is_near_edge(at: f64, tolerance: f64) -> bool {
    let fract = at - at.floor();
    fract < tolerance || 1.0 - fract < tolerance
}

fn clamp_range(start: i64, end: i64, min: u32, max: u32) -> MosaicResult<(u32, u32)> {
    let (min, max) = (i64::from(min), i64::from(max));
    let start = start.clamp(min, max.max(min));
    let end = end.min(max).max(start);
    match (u32::try_from(start), u32::try_from(end)) {
        (Ok(start), Ok(end)) => Ok((start, end)),
        _ => Err(MosaicError::InvalidArgument(format!(
            "tile range {start}..={end} does not fit the tile grid"
        ))),
    }
}
