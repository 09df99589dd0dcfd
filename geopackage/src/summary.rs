#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::fmt::{Display, Formatter};
use std::path::Path;

use gpkg_tile_utils::TileRect;
use serde::Serialize;
use size_format::SizeFormatterBinary;
use sqlx::{Row as _, SqliteExecutor, query};

use crate::errors::{GpkgError, GpkgResult};
use crate::queries::quote_identifier;
use crate::{GeoPackage, TilePyramid};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZoomInfo {
    pub zoom: u8,
    pub tile_count: u64,
    pub min_tile_size: u64,
    pub max_tile_size: u64,
    pub avg_tile_size: f64,
    pub tiles: TileRect,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PyramidSummary {
    pub table_name: String,
    pub srs_name: String,
    pub tile_count: u64,
    pub zoom_info: Vec<ZoomInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub file_size: Option<u64>,
    pub page_size: u64,
    pub page_count: u64,
    pub pyramids: Vec<PyramidSummary>,
}

impl Display for PyramidSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tile table: {} ({})", self.table_name, self.srs_name)?;
        writeln!(
            f,
            "|{:^9}|{:^9}|{:^9}|{:^9}|{:^9}| {:^24} |",
            "Zoom", "Count", "Smallest", "Largest", "Average", "Columns x Rows"
        )?;
        for l in &self.zoom_info {
            let min = SizeFormatterBinary::new(l.min_tile_size);
            let max = SizeFormatterBinary::new(l.max_tile_size);
            let avg = SizeFormatterBinary::new(l.avg_tile_size as u64);
            writeln!(
                f,
                "|{:>9}|{:>9}|{:>9}|{:>9}|{:>9}| {:<24} |",
                l.zoom,
                l.tile_count,
                format!("{min:.2}B"),
                format!("{max:.2}B"),
                format!("{avg:.2}B"),
                format!(
                    "{}..={} x {}..={}",
                    l.tiles.min_col, l.tiles.max_col, l.tiles.min_row, l.tiles.max_row
                ),
            )?;
        }
        if self.zoom_info.len() > 1 {
            writeln!(f, "|{:>9}|{:>9}|", "all", self.tile_count)?;
        }
        Ok(())
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(file_size) = self.file_size {
            let file_size = SizeFormatterBinary::new(file_size);
            writeln!(f, "File size: {file_size:.2}B")?;
        } else {
            writeln!(f, "File size: unknown")?;
        }
        let page_size = SizeFormatterBinary::new(self.page_size);
        writeln!(f, "Page size: {page_size:.2}B")?;
        writeln!(f, "Page count: {:.2}", self.page_count)?;
        for pyramid in &self.pyramids {
            writeln!(f)?;
            write!(f, "{pyramid}")?;
        }
        Ok(())
    }
}

impl GeoPackage {
    /// Compute file and per zoom level statistics for the given pyramids
    pub async fn summary<T>(&self, conn: &mut T, pyramids: &[TilePyramid]) -> GpkgResult<Summary>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let file_size = Path::new(self.filepath()).metadata().ok().map(|m| m.len());

        let page_size: i64 = query("PRAGMA page_size;")
            .fetch_one(&mut *conn)
            .await?
            .try_get(0)?;
        let page_count: i64 = query("PRAGMA page_count;")
            .fetch_one(&mut *conn)
            .await?
            .try_get(0)?;

        let mut summaries = Vec::with_capacity(pyramids.len());
        for pyramid in pyramids {
            summaries.push(self.pyramid_summary(&mut *conn, pyramid).await?);
        }

        Ok(Summary {
            file_size,
            page_size: page_size as u64,
            page_count: page_count as u64,
            pyramids: summaries,
        })
    }

    async fn pyramid_summary<T>(
        &self,
        conn: &mut T,
        pyramid: &TilePyramid,
    ) -> GpkgResult<PyramidSummary>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = format!(
            "
SELECT zoom_level             AS zoom,
       count()                AS count,
       min(length(tile_data)) AS smallest,
       max(length(tile_data)) AS largest,
       avg(length(tile_data)) AS average,
       min(tile_column)       AS min_col,
       min(tile_row)          AS min_row,
       max(tile_column)       AS max_col,
       max(tile_row)          AS max_row
FROM {}
GROUP BY zoom_level
ORDER BY zoom_level",
            quote_identifier(pyramid.table_name())
        );
        let rows = query(&sql).fetch_all(&mut *conn).await?;

        let mut zoom_info = Vec::with_capacity(rows.len());
        for r in rows {
            let zoom: i64 = r.try_get("zoom")?;
            let min_col: i64 = r.try_get("min_col")?;
            let min_row: i64 = r.try_get("min_row")?;
            let max_col: i64 = r.try_get("max_col")?;
            let max_row: i64 = r.try_get("max_row")?;
            let invalid = || {
                GpkgError::InvalidTileIndex(
                    self.filename().to_string(),
                    pyramid.table_name().to_string(),
                    zoom,
                    min_col.min(max_col),
                    min_row.min(max_row),
                )
            };
            let to_u32 = |v: i64| u32::try_from(v).map_err(|_| invalid());
            zoom_info.push(ZoomInfo {
                zoom: u8::try_from(zoom).map_err(|_| invalid())?,
                tile_count: r.try_get::<i64, _>("count")? as u64,
                min_tile_size: r.try_get::<Option<i64>, _>("smallest")?.unwrap_or(0) as u64,
                max_tile_size: r.try_get::<Option<i64>, _>("largest")?.unwrap_or(0) as u64,
                avg_tile_size: r.try_get::<Option<f64>, _>("average")?.unwrap_or(0.0),
                tiles: TileRect::new(
                    u8::try_from(zoom).map_err(|_| invalid())?,
                    to_u32(min_col)?,
                    to_u32(min_row)?,
                    to_u32(max_col)?,
                    to_u32(max_row)?,
                ),
            });
        }

        Ok(PyramidSummary {
            table_name: pyramid.table_name().to_string(),
            srs_name: pyramid.spatial_ref().srs_name.clone(),
            tile_count: zoom_info.iter().map(|l| l.tile_count).sum(),
            zoom_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures::tests::world_geopackage;

    #[tokio::test(flavor = "current_thread")]
    async fn world_summary() {
        let (gpkg, mut conn) = world_geopackage().await;
        let world = gpkg.get_tile_pyramid(&mut conn, "world").await.unwrap();
        let summary = gpkg.summary(&mut conn, &[world]).await.unwrap();

        assert_eq!(summary.file_size, None);
        assert_eq!(summary.pyramids.len(), 1);
        let pyramid = &summary.pyramids[0];
        assert_eq!(pyramid.table_name, "world");
        assert_eq!(pyramid.srs_name, "WGS 84 geodetic");
        assert_eq!(pyramid.tile_count, 4);
        assert_eq!(
            pyramid.zoom_info,
            vec![
                ZoomInfo {
                    zoom: 0,
                    tile_count: 2,
                    min_tile_size: 7,
                    max_tile_size: 8,
                    avg_tile_size: 7.5,
                    tiles: TileRect::new(0, 0, 0, 1, 0),
                },
                ZoomInfo {
                    zoom: 1,
                    tile_count: 2,
                    min_tile_size: 3,
                    max_tile_size: 7,
                    avg_tile_size: 5.0,
                    tiles: TileRect::new(1, 1, 0, 2, 1),
                },
            ]
        );
        assert!(pyramid.to_string().starts_with("Tile table: world (WGS 84 geodetic)\n"));
    }
}
