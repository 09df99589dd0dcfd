//! Helpers to build small GeoPackage files with tile pyramids, for tests and demos.
//!
//! These write only what the reader needs, and do not produce a fully conformant GeoPackage.

use gpkg_tile_utils::Envelope;
use sqlx::{Executor as _, SqliteExecutor, query};
use tracing::debug;

use crate::TileMatrix;
use crate::errors::GpkgResult;
use crate::queries::quote_identifier;

/// Create the tile pyramid metadata tables and register the EPSG:4326 and EPSG:3857 systems.
pub async fn create_tile_tables<T>(conn: &mut T) -> GpkgResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    debug!("Creating GeoPackage tile metadata tables");
    conn.execute(
        "
CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
    srs_name                 TEXT    NOT NULL,
    srs_id                   INTEGER NOT NULL PRIMARY KEY,
    organization             TEXT    NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition               TEXT    NOT NULL,
    description              TEXT);
CREATE TABLE IF NOT EXISTS gpkg_contents (
    table_name  TEXT     NOT NULL PRIMARY KEY,
    data_type   TEXT     NOT NULL,
    identifier  TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    min_x       DOUBLE,
    min_y       DOUBLE,
    max_x       DOUBLE,
    max_y       DOUBLE,
    srs_id      INTEGER);
CREATE TABLE IF NOT EXISTS gpkg_tile_matrix_set (
    table_name TEXT    NOT NULL PRIMARY KEY,
    srs_id     INTEGER NOT NULL,
    min_x      DOUBLE  NOT NULL,
    min_y      DOUBLE  NOT NULL,
    max_x      DOUBLE  NOT NULL,
    max_y      DOUBLE  NOT NULL);
CREATE TABLE IF NOT EXISTS gpkg_tile_matrix (
    table_name    TEXT    NOT NULL,
    zoom_level    INTEGER NOT NULL,
    matrix_width  INTEGER NOT NULL,
    matrix_height INTEGER NOT NULL,
    tile_width    INTEGER NOT NULL,
    tile_height   INTEGER NOT NULL,
    pixel_x_size  DOUBLE  NOT NULL,
    pixel_y_size  DOUBLE  NOT NULL,
    PRIMARY KEY (table_name, zoom_level));
INSERT OR IGNORE INTO gpkg_spatial_ref_sys (srs_name, srs_id, organization, organization_coordsys_id, definition)
VALUES ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined'),
       ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined'),
       ('WGS 84 geodetic', 4326, 'EPSG', 4326, 'GEOGCS[\"WGS 84\"]'),
       ('WGS 84 / Pseudo-Mercator', 3857, 'EPSG', 3857, 'PROJCS[\"WGS 84 / Pseudo-Mercator\"]');",
    )
    .await?;
    Ok(())
}

/// Create a tile table and register it with its grid and matrices.
#[allow(clippy::too_many_arguments)]
pub async fn create_tile_pyramid<T>(
    conn: &mut T,
    table_name: &str,
    identifier: &str,
    srs_id: i64,
    bounds: Option<Envelope>,
    grid_bounds: Envelope,
    matrices: &[TileMatrix],
) -> GpkgResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    debug!("Creating tile pyramid {table_name}");
    let sql = format!(
        "
CREATE TABLE {} (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    zoom_level  INTEGER NOT NULL,
    tile_column INTEGER NOT NULL,
    tile_row    INTEGER NOT NULL,
    tile_data   BLOB    NOT NULL,
    UNIQUE (zoom_level, tile_column, tile_row));",
        quote_identifier(table_name)
    );
    (&mut *conn).execute(sql.as_str()).await?;

    query(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?, 'tiles', ?, ?, ?, ?, ?, ?)",
    )
    .bind(table_name)
    .bind(identifier)
    .bind(bounds.map(|b| b.min_x))
    .bind(bounds.map(|b| b.min_y))
    .bind(bounds.map(|b| b.max_x))
    .bind(bounds.map(|b| b.max_y))
    .bind(srs_id)
    .execute(&mut *conn)
    .await?;

    query(
        "INSERT INTO gpkg_tile_matrix_set (table_name, srs_id, min_x, min_y, max_x, max_y)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(table_name)
    .bind(srs_id)
    .bind(grid_bounds.min_x)
    .bind(grid_bounds.min_y)
    .bind(grid_bounds.max_x)
    .bind(grid_bounds.max_y)
    .execute(&mut *conn)
    .await?;

    for m in matrices {
        query(
            "INSERT INTO gpkg_tile_matrix (table_name, zoom_level, matrix_width, matrix_height,
                                           tile_width, tile_height, pixel_x_size, pixel_y_size)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(table_name)
        .bind(m.zoom_level)
        .bind(m.matrix_width)
        .bind(m.matrix_height)
        .bind(m.tile_width)
        .bind(m.tile_height)
        .bind(m.pixel_x_size)
        .bind(m.pixel_y_size)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Store one encoded tile, replacing any tile already at that position.
pub async fn insert_tile<T>(
    conn: &mut T,
    table_name: &str,
    zoom: u8,
    column: u32,
    row: u32,
    data: &[u8],
) -> GpkgResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let sql = format!(
        "INSERT OR REPLACE INTO {} (zoom_level, tile_column, tile_row, tile_data) VALUES (?, ?, ?, ?)",
        quote_identifier(table_name)
    );
    query(&sql)
        .bind(zoom)
        .bind(column)
        .bind(row)
        .bind(data)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
