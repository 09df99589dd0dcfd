//! Raster tile pyramid metadata of a GeoPackage.
//!
//! A tile pyramid is described by four metadata tables:
//! * `gpkg_contents` registers the tile table with `data_type = 'tiles'`, its title and bounds,
//! * `gpkg_spatial_ref_sys` defines the spatial reference system,
//! * `gpkg_tile_matrix_set` declares the extent of the tile grid, whose top-left corner is the
//!   grid origin,
//! * `gpkg_tile_matrix` has one row per zoom level with the grid and pixel sizes.

use gpkg_tile_utils::{Envelope, TileGrid};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, SqliteExecutor, query};
use tracing::{debug, warn};

use crate::errors::{GpkgError, GpkgResult};
use crate::queries::{check_tile_schema, quote_identifier};
use crate::GeoPackage;

/// A spatial reference system row of `gpkg_spatial_ref_sys`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpatialRef {
    pub srs_id: i64,
    pub srs_name: String,
    pub organization: String,
    pub organization_coordsys_id: i64,
    #[serde(skip)]
    pub definition: String,
}

impl SpatialRef {
    /// EPSG code of this spatial reference system, if it is defined by EPSG.
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        if self.organization.eq_ignore_ascii_case("EPSG") {
            u32::try_from(self.organization_coordsys_id).ok()
        } else {
            None
        }
    }
}

/// One zoom level of a tile pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TileMatrix {
    pub zoom_level: u8,
    /// Number of tile columns
    pub matrix_width: u32,
    /// Number of tile rows
    pub matrix_height: u32,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Ground units per pixel along X
    pub pixel_x_size: f64,
    /// Ground units per pixel along Y
    pub pixel_y_size: f64,
}

impl TileMatrix {
    fn validate(&self) -> Result<(), String> {
        if self.matrix_width == 0 || self.matrix_height == 0 {
            return Err(format!(
                "matrix size {}x{} must be positive",
                self.matrix_width, self.matrix_height
            ));
        }
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(format!(
                "tile size {}x{} must be positive",
                self.tile_width, self.tile_height
            ));
        }
        if !(self.pixel_x_size.is_finite() && self.pixel_x_size > 0.0)
            || !(self.pixel_y_size.is_finite() && self.pixel_y_size > 0.0)
        {
            return Err(format!(
                "pixel size {}x{} must be positive",
                self.pixel_x_size, self.pixel_y_size
            ));
        }
        Ok(())
    }
}

/// A named raster tile pyramid, also known as a coverage.
///
/// Immutable once loaded. The matrices are sorted by ascending zoom level and never empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TilePyramid {
    table_name: String,
    identifier: Option<String>,
    description: Option<String>,
    bounds: Envelope,
    grid_bounds: Envelope,
    spatial_ref: SpatialRef,
    min_zoom: u8,
    max_zoom: u8,
    matrices: Vec<TileMatrix>,
    #[serde(skip)]
    select_tiles_sql: String,
}

impl TilePyramid {
    /// Assemble a pyramid from its parts.
    ///
    /// Returns `None` if there are no matrices. Matrices are sorted by zoom level,
    /// and duplicate zoom levels keep the first occurrence.
    /// `zoom_range` is the observed range of zoom levels with tiles and falls back to the matrix
    /// range.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table_name: String,
        identifier: Option<String>,
        description: Option<String>,
        bounds: Option<Envelope>,
        grid_bounds: Envelope,
        spatial_ref: SpatialRef,
        zoom_range: Option<(u8, u8)>,
        mut matrices: Vec<TileMatrix>,
    ) -> Option<Self> {
        matrices.sort_by_key(|m| m.zoom_level);
        matrices.dedup_by_key(|m| m.zoom_level);
        let (min_zoom, max_zoom) = match zoom_range {
            Some(range) => range,
            None => (matrices.first()?.zoom_level, matrices.last()?.zoom_level),
        };
        if matrices.is_empty() {
            return None;
        }
        let select_tiles_sql = format!(
            "SELECT zoom_level, tile_column, tile_row, tile_data
FROM {}
WHERE zoom_level BETWEEN ? AND ?
  AND tile_column BETWEEN ? AND ?
  AND tile_row BETWEEN ? AND ?
ORDER BY zoom_level, tile_row, tile_column",
            quote_identifier(&table_name)
        );
        Some(Self {
            bounds: bounds.unwrap_or(grid_bounds),
            table_name,
            identifier,
            description,
            grid_bounds,
            spatial_ref,
            min_zoom,
            max_zoom,
            matrices,
            select_tiles_sql,
        })
    }

    /// Name of the tile table, which is also the coverage name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Extent of the data as declared in `gpkg_contents`.
    #[must_use]
    pub fn bounds(&self) -> Envelope {
        self.bounds
    }

    /// Extent of the whole tile grid as declared in `gpkg_tile_matrix_set`.
    #[must_use]
    pub fn grid_bounds(&self) -> Envelope {
        self.grid_bounds
    }

    #[must_use]
    pub fn spatial_ref(&self) -> &SpatialRef {
        &self.spatial_ref
    }

    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        self.spatial_ref.epsg()
    }

    /// Lowest zoom level that has tiles.
    #[must_use]
    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    /// Highest zoom level that has tiles.
    #[must_use]
    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// All matrices, ascending by zoom level.
    #[must_use]
    pub fn matrices(&self) -> &[TileMatrix] {
        &self.matrices
    }

    #[must_use]
    pub fn matrix(&self, zoom: u8) -> Option<&TileMatrix> {
        self.matrices
            .binary_search_by_key(&zoom, |m| m.zoom_level)
            .ok()
            .map(|idx| &self.matrices[idx])
    }

    /// The finest matrix that can hold tiles, i.e. the one at [`Self::max_zoom`] if defined.
    #[must_use]
    pub fn native_matrix(&self) -> &TileMatrix {
        self.matrices
            .iter()
            .rev()
            .find(|m| m.zoom_level <= self.max_zoom)
            .unwrap_or(&self.matrices[0])
    }

    /// Tile grid of a matrix, anchored at the top-left corner of the grid bounds.
    #[must_use]
    pub fn tile_grid(&self, matrix: &TileMatrix) -> TileGrid {
        TileGrid::new(
            self.grid_bounds.min_x,
            self.grid_bounds.max_y,
            matrix.tile_width,
            matrix.tile_height,
            matrix.pixel_x_size,
            matrix.pixel_y_size,
        )
    }

    pub(crate) fn select_tiles_sql(&self) -> &str {
        &self.select_tiles_sql
    }
}

fn envelope_from_row(row: &SqliteRow, prefix: &str) -> GpkgResult<Option<Envelope>> {
    let get = |name: &str| row.try_get::<Option<f64>, _>(format!("{prefix}{name}").as_str());
    Ok(match (get("min_x")?, get("min_y")?, get("max_x")?, get("max_y")?) {
        (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
            Some(Envelope::new(min_x, min_y, max_x, max_y))
        }
        _ => None,
    })
}

fn to_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

impl GeoPackage {
    /// Load every raster tile pyramid registered in `gpkg_contents`, in registration order.
    ///
    /// Pyramids without any tile matrix are skipped with a warning.
    pub async fn get_tile_pyramids<T>(&self, conn: &mut T) -> GpkgResult<Vec<TilePyramid>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        check_tile_schema(&mut *conn, self.filename()).await?;

        let sql = "
SELECT c.table_name,
       c.identifier,
       c.description,
       c.min_x,
       c.min_y,
       c.max_x,
       c.max_y,
       s.srs_id,
       s.min_x AS grid_min_x,
       s.min_y AS grid_min_y,
       s.max_x AS grid_max_x,
       s.max_y AS grid_max_y
FROM gpkg_contents AS c
         JOIN gpkg_tile_matrix_set AS s ON s.table_name = c.table_name
WHERE c.data_type = 'tiles'
ORDER BY c.rowid";
        let rows = query(sql).fetch_all(&mut *conn).await?;

        let mut pyramids = Vec::with_capacity(rows.len());
        for row in rows {
            let table_name: String = row.try_get("table_name")?;
            let srs_id: i64 = row.try_get("srs_id")?;
            let Some(grid_bounds) = envelope_from_row(&row, "grid_")? else {
                warn!(
                    "Skipping tile table {table_name} in {self}: gpkg_tile_matrix_set has no bounds"
                );
                continue;
            };
            let spatial_ref = self
                .get_spatial_ref(&mut *conn, srs_id)
                .await?
                .ok_or_else(|| {
                    GpkgError::MissingSpatialRef(
                        self.filename().to_string(),
                        srs_id,
                        table_name.clone(),
                    )
                })?;
            let matrices = self.get_tile_matrices(&mut *conn, &table_name).await?;
            let zoom_range = self.get_zoom_range(&mut *conn, &table_name).await?;

            match TilePyramid::new(
                table_name.clone(),
                row.try_get("identifier")?,
                row.try_get("description")?,
                envelope_from_row(&row, "")?,
                grid_bounds,
                spatial_ref,
                zoom_range,
                matrices,
            ) {
                Some(pyramid) => {
                    debug!(
                        "Loaded tile pyramid {table_name} from {self} with zoom levels {}..={}",
                        pyramid.min_zoom(),
                        pyramid.max_zoom()
                    );
                    pyramids.push(pyramid);
                }
                None => warn!("Skipping tile table {table_name} in {self}: it has no tile matrix"),
            }
        }
        Ok(pyramids)
    }

    /// Load a single pyramid by its tile table name.
    pub async fn get_tile_pyramid<T>(
        &self,
        conn: &mut T,
        table_name: &str,
    ) -> GpkgResult<TilePyramid>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        self.get_tile_pyramids(conn)
            .await?
            .into_iter()
            .find(|p| p.table_name() == table_name)
            .ok_or_else(|| {
                GpkgError::UnknownTileTable(self.filename().to_string(), table_name.to_string())
            })
    }

    pub async fn get_spatial_ref<T>(
        &self,
        conn: &mut T,
        srs_id: i64,
    ) -> GpkgResult<Option<SpatialRef>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = "
SELECT srs_id, srs_name, organization, organization_coordsys_id, definition
FROM gpkg_spatial_ref_sys
WHERE srs_id = ?";
        let Some(row) = query(sql).bind(srs_id).fetch_optional(&mut *conn).await? else {
            return Ok(None);
        };
        Ok(Some(SpatialRef {
            srs_id: row.try_get("srs_id")?,
            srs_name: row.try_get::<Option<String>, _>("srs_name")?.unwrap_or_default(),
            organization: row.try_get::<Option<String>, _>("organization")?.unwrap_or_default(),
            organization_coordsys_id: row
                .try_get::<Option<i64>, _>("organization_coordsys_id")?
                .unwrap_or(srs_id),
            definition: row.try_get::<Option<String>, _>("definition")?.unwrap_or_default(),
        }))
    }

    /// All matrices of a tile table, ascending by zoom level.
    pub async fn get_tile_matrices<T>(
        &self,
        conn: &mut T,
        table_name: &str,
    ) -> GpkgResult<Vec<TileMatrix>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = "
SELECT zoom_level,
       matrix_width,
       matrix_height,
       tile_width,
       tile_height,
       pixel_x_size,
       pixel_y_size
FROM gpkg_tile_matrix
WHERE table_name = ?
ORDER BY zoom_level";
        let rows = query(sql).bind(table_name).fetch_all(&mut *conn).await?;

        let mut matrices = Vec::with_capacity(rows.len());
        for row in rows {
            let zoom: i64 = row.try_get("zoom_level")?;
            let invalid = |reason: String| {
                GpkgError::InvalidTileMatrix(
                    self.filename().to_string(),
                    table_name.to_string(),
                    zoom,
                    reason,
                )
            };
            let dim = |name: &str| -> GpkgResult<u32> {
                let value: i64 = row.try_get(name)?;
                to_u32(value).ok_or_else(|| invalid(format!("{name}={value} is out of range")))
            };
            let matrix = TileMatrix {
                zoom_level: u8::try_from(zoom)
                    .map_err(|_| invalid("zoom level is out of range".to_string()))?,
                matrix_width: dim("matrix_width")?,
                matrix_height: dim("matrix_height")?,
                tile_width: dim("tile_width")?,
                tile_height: dim("tile_height")?,
                pixel_x_size: row.try_get("pixel_x_size")?,
                pixel_y_size: row.try_get("pixel_y_size")?,
            };
            matrix.validate().map_err(invalid)?;
            matrices.push(matrix);
        }
        Ok(matrices)
    }

    /// Lowest and highest zoom level that actually has tiles, `None` for an empty tile table.
    pub async fn get_zoom_range<T>(
        &self,
        conn: &mut T,
        table_name: &str,
    ) -> GpkgResult<Option<(u8, u8)>>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        let sql = format!(
            "SELECT min(zoom_level) AS min_zoom, max(zoom_level) AS max_zoom FROM {}",
            quote_identifier(table_name)
        );
        let row = query(&sql).fetch_one(&mut *conn).await?;
        let min: Option<i64> = row.try_get("min_zoom")?;
        let max: Option<i64> = row.try_get("max_zoom")?;
        let (Some(min), Some(max)) = (min, max) else {
            return Ok(None);
        };
        let zoom = |value: i64| {
            u8::try_from(value).map_err(|_| {
                GpkgError::InvalidZoomLevel(
                    self.filename().to_string(),
                    table_name.to_string(),
                    value,
                )
            })
        };
        Ok(Some((zoom(min)?, zoom(max)?)))
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;
    use pretty_assertions::assert_eq;
    use sqlx::{Connection as _, SqliteConnection};

    use super::*;
    use crate::fixtures::tests::world_geopackage;

    fn wgs84() -> SpatialRef {
        SpatialRef {
            srs_id: 4326,
            srs_name: "WGS 84 geodetic".to_string(),
            organization: "epsg".to_string(),
            organization_coordsys_id: 4326,
            definition: String::new(),
        }
    }

    fn matrix(zoom_level: u8, size: u32) -> TileMatrix {
        let px = 360.0 / f64::from(size * 256);
        TileMatrix {
            zoom_level,
            matrix_width: size,
            matrix_height: size / 2,
            tile_width: 256,
            tile_height: 256,
            pixel_x_size: px,
            pixel_y_size: px,
        }
    }

    fn world() -> Envelope {
        Envelope::new(-180.0, -90.0, 180.0, 90.0)
    }

    #[test]
    fn sorted_and_deduplicated() {
        let pyramid = TilePyramid::new(
            "world".to_string(),
            None,
            None,
            None,
            world(),
            wgs84(),
            None,
            vec![matrix(2, 8), matrix(0, 2), matrix(2, 16), matrix(1, 4)],
        )
        .unwrap();
        let zooms: Vec<u8> = pyramid.matrices().iter().map(|m| m.zoom_level).collect();
        assert_eq!(zooms, [0, 1, 2]);
        assert_eq!(pyramid.matrix(2).unwrap().matrix_width, 8);
        assert_eq!(pyramid.matrix(3), None);
        assert_eq!((pyramid.min_zoom(), pyramid.max_zoom()), (0, 2));
        assert_eq!(pyramid.bounds(), world());
        assert_eq!(pyramid.epsg(), Some(4326));
    }

    #[test]
    fn native_matrix_follows_observed_zooms() {
        let pyramid = TilePyramid::new(
            "world".to_string(),
            Some("World".to_string()),
            None,
            Some(Envelope::new(-10.0, -10.0, 10.0, 10.0)),
            world(),
            wgs84(),
            Some((0, 1)),
            vec![matrix(0, 2), matrix(1, 4), matrix(2, 8)],
        )
        .unwrap();
        assert_eq!(pyramid.native_matrix().zoom_level, 1);
        assert_eq!(pyramid.bounds(), Envelope::new(-10.0, -10.0, 10.0, 10.0));
        assert_eq!(pyramid.grid_bounds(), world());
    }

    #[test]
    fn no_matrices() {
        assert!(
            TilePyramid::new(
                "empty".to_string(),
                None,
                None,
                None,
                world(),
                wgs84(),
                None,
                vec![],
            )
            .is_none()
        );
    }

    #[test]
    fn invalid_matrix() {
        let mut m = matrix(0, 2);
        m.tile_width = 0;
        assert_eq!(m.validate().unwrap_err(), "tile size 0x256 must be positive");
        let mut m = matrix(0, 2);
        m.pixel_y_size = -1.0;
        assert!(m.validate().is_err());
    }

    #[test]
    fn non_epsg_srs() {
        let srs = SpatialRef {
            srs_id: -1,
            srs_name: "Undefined cartesian SRS".to_string(),
            organization: "NONE".to_string(),
            organization_coordsys_id: -1,
            definition: "undefined".to_string(),
        };
        assert_eq!(srs.epsg(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn load_pyramids() {
        let (gpkg, mut conn) = world_geopackage().await;
        let pyramids = gpkg.get_tile_pyramids(&mut conn).await.unwrap();
        let names: Vec<&str> = pyramids.iter().map(TilePyramid::table_name).collect();
        assert_eq!(names, ["world", "mercator"]);

        let world = &pyramids[0];
        assert_eq!(world.identifier(), Some("World"));
        assert_eq!(world.description(), Some(""));
        assert_eq!(world.bounds(), Envelope::new(-10.0, -10.0, 10.0, 10.0));
        assert_eq!(world.grid_bounds(), Envelope::new(-180.0, -90.0, 180.0, 90.0));
        assert_eq!((world.min_zoom(), world.max_zoom()), (0, 1));
        assert_eq!(world.spatial_ref().srs_name, "WGS 84 geodetic");
        assert_eq!(world.epsg(), Some(4326));
        assert_debug_snapshot!(world.matrices(), @r"
        [
            TileMatrix {
                zoom_level: 0,
                matrix_width: 2,
                matrix_height: 1,
                tile_width: 256,
                tile_height: 256,
                pixel_x_size: 0.703125,
                pixel_y_size: 0.703125,
            },
            TileMatrix {
                zoom_level: 1,
                matrix_width: 4,
                matrix_height: 2,
                tile_width: 256,
                tile_height: 256,
                pixel_x_size: 0.3515625,
                pixel_y_size: 0.3515625,
            },
        ]
        ");

        let mercator = &pyramids[1];
        assert_eq!(mercator.epsg(), Some(3857));
        assert_eq!((mercator.min_zoom(), mercator.max_zoom()), (3, 3));
        assert_eq!(mercator.bounds(), mercator.grid_bounds());
        assert_eq!(mercator.native_matrix().zoom_level, 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn load_single_pyramid() {
        let (gpkg, mut conn) = world_geopackage().await;
        let world = gpkg.get_tile_pyramid(&mut conn, "world").await.unwrap();
        assert_eq!(world.table_name(), "world");

        let err = gpkg.get_tile_pyramid(&mut conn, "broken").await.unwrap_err();
        assert!(matches!(err, GpkgError::UnknownTileTable(_, name) if name == "broken"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn not_a_geopackage() {
        let gpkg = GeoPackage::new(":memory:").unwrap();
        let mut conn = SqliteConnection::connect(":memory:").await.unwrap();
        let err = gpkg.get_tile_pyramids(&mut conn).await.unwrap_err();
        assert!(matches!(
            err,
            GpkgError::MissingTable(_, table) if table == "gpkg_spatial_ref_sys"
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invalid_matrix_in_file() {
        let (gpkg, mut conn) = world_geopackage().await;
        let sql = "UPDATE gpkg_tile_matrix SET tile_width = 0 \
                   WHERE table_name = 'world' AND zoom_level = 1";
        query(sql).execute(&mut conn).await.unwrap();
        let err = gpkg.get_tile_pyramids(&mut conn).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tile matrix at zoom level 1 of tile table world in GeoPackage file :memory: is invalid: tile size 0x256 must be positive"
        );
    }
}
