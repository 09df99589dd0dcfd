use std::ops::RangeInclusive;

use futures::stream::BoxStream;
use futures::{StreamExt as _, TryStreamExt as _};
use gpkg_tile_utils::TileRect;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, SqliteConnection, SqliteExecutor, query};
use tracing::trace;

use crate::errors::{GpkgError, GpkgResult};
use crate::queries::quote_identifier;
use crate::{GeoPackage, TilePyramid};

/// One stored tile. Row 0 is the top row of the matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileRecord {
    pub zoom: u8,
    pub column: u32,
    pub row: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileAxis {
    Column,
    Row,
}

impl TileAxis {
    fn column_name(self) -> &'static str {
        match self {
            Self::Column => "tile_column",
            Self::Row => "tile_row",
        }
    }
}

/// Inclusive ranges of zoom levels, columns and rows to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileQuery {
    pub zooms: RangeInclusive<u8>,
    pub columns: RangeInclusive<u32>,
    pub rows: RangeInclusive<u32>,
}

impl From<TileRect> for TileQuery {
    fn from(rect: TileRect) -> Self {
        Self {
            zooms: rect.zoom..=rect.zoom,
            columns: rect.min_col..=rect.max_col,
            rows: rect.min_row..=rect.max_row,
        }
    }
}

impl GeoPackage {
    /// Smallest or largest column or row that holds a tile at the given zoom level.
    ///
    /// Returns `None` if there are no tiles at that zoom level.
    pub async fn get_tile_bound<T>(
        &self,
        conn: &mut T,
        pyramid: &TilePyramid,
        zoom: u8,
        axis: TileAxis,
        want_max: bool,
    ) -> GpkgResult<Option<u32>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = format!(
            "SELECT {}({}) FROM {} WHERE zoom_level = ?",
            if want_max { "max" } else { "min" },
            axis.column_name(),
            quote_identifier(pyramid.table_name())
        );
        let value: Option<i64> = query(&sql)
            .bind(zoom)
            .fetch_one(&mut *conn)
            .await?
            .try_get(0)?;
        value
            .map(|v| {
                u32::try_from(v).map_err(|_| {
                    let (col, row) = match axis {
                        TileAxis::Column => (v, 0),
                        TileAxis::Row => (0, v),
                    };
                    self.invalid_index(pyramid, i64::from(zoom), col, row)
                })
            })
            .transpose()
    }

    /// Smallest and largest column and row that hold tiles at a zoom level, as a rectangle.
    ///
    /// Returns `None` if there are no tiles at that zoom level.
    pub async fn get_tile_extent<T>(
        &self,
        conn: &mut T,
        pyramid: &TilePyramid,
        zoom: u8,
    ) -> GpkgResult<Option<TileRect>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = format!(
            "
SELECT min(tile_column) AS min_col,
       min(tile_row)    AS min_row,
       max(tile_column) AS max_col,
       max(tile_row)    AS max_row
FROM {}
WHERE zoom_level = ?",
            quote_identifier(pyramid.table_name())
        );
        let row = query(&sql).bind(zoom).fetch_one(&mut *conn).await?;
        let values: [Option<i64>; 4] = [
            row.try_get("min_col")?,
            row.try_get("min_row")?,
            row.try_get("max_col")?,
            row.try_get("max_row")?,
        ];
        let [Some(min_col), Some(min_row), Some(max_col), Some(max_row)] = values else {
            trace!("No tiles at zoom {zoom} of {} in {self}", pyramid.table_name());
            return Ok(None);
        };
        let index = |col: i64, row: i64| match (u32::try_from(col), u32::try_from(row)) {
            (Ok(col), Ok(row)) => Ok((col, row)),
            _ => Err(self.invalid_index(pyramid, i64::from(zoom), col, row)),
        };
        let (min_col, min_row) = index(min_col, min_row)?;
        let (max_col, max_row) = index(max_col, max_row)?;
        Ok(Some(TileRect::new(zoom, min_col, min_row, max_col, max_row)))
    }

    /// Raw bytes of a single tile, or `None` if it is not stored.
    pub async fn get_tile<T>(
        &self,
        conn: &mut T,
        pyramid: &TilePyramid,
        zoom: u8,
        column: u32,
        row: u32,
    ) -> GpkgResult<Option<Vec<u8>>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = format!(
            "SELECT tile_data FROM {} WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
            quote_identifier(pyramid.table_name())
        );
        let row = query(&sql)
            .bind(zoom)
            .bind(column)
            .bind(row)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(match row {
            Some(row) => row.try_get::<Option<Vec<u8>>, _>(0)?,
            None => None,
        })
    }

    /// Stream the stored tiles within the query ranges.
    ///
    /// Only tiles that exist are returned, ordered by zoom level, row and column.
    /// The stream is finite and can be consumed only once.
    pub fn stream_tiles<'e>(
        &self,
        conn: &'e mut SqliteConnection,
        pyramid: &'e TilePyramid,
        tiles: &TileQuery,
    ) -> BoxStream<'e, GpkgResult<TileRecord>> {
        let filename = self.filename().to_string();
        let table = pyramid.table_name();
        query(pyramid.select_tiles_sql())
            .bind(*tiles.zooms.start())
            .bind(*tiles.zooms.end())
            .bind(*tiles.columns.start())
            .bind(*tiles.columns.end())
            .bind(*tiles.rows.start())
            .bind(*tiles.rows.end())
            .fetch(conn)
            .map_err(GpkgError::from)
            .and_then(move |row| {
                let result = parse_tile_row(&row, &filename, table);
                async move { result }
            })
            .boxed()
    }

    fn invalid_index(&self, pyramid: &TilePyramid, zoom: i64, col: i64, row: i64) -> GpkgError {
        GpkgError::InvalidTileIndex(
            self.filename().to_string(),
            pyramid.table_name().to_string(),
            zoom,
            col,
            row,
        )
    }
}

fn parse_tile_row(row: &SqliteRow, filename: &str, table: &str) -> GpkgResult<TileRecord> {
    let zoom: i64 = row.try_get("zoom_level")?;
    let column: i64 = row.try_get("tile_column")?;
    let tile_row: i64 = row.try_get("tile_row")?;
    match (
        u8::try_from(zoom),
        u32::try_from(column),
        u32::try_from(tile_row),
    ) {
        (Ok(zoom), Ok(column), Ok(row_idx)) => Ok(TileRecord {
            zoom,
            column,
            row: row_idx,
            data: row
                .try_get::<Option<Vec<u8>>, _>("tile_data")?
                .unwrap_or_default(),
        }),
        _ => Err(GpkgError::InvalidTileIndex(
            filename.to_string(),
            table.to_string(),
            zoom,
            column,
            tile_row,
        )),
    }
}
