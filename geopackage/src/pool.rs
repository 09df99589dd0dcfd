use std::path::Path;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite, SqlitePool};

use crate::errors::GpkgResult;
use crate::{GeoPackage, Summary, TilePyramid};

/// Connection pool for concurrent read access to a GeoPackage file.
///
/// Every method acquires its own connection and hands it back to the pool when it
/// returns, on success and on error alike. Callers that need several queries on the
/// same connection can hold one with [`GeoPackagePool::acquire`].
///
/// # Examples
///
/// ```
/// use geopackage::GeoPackagePool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = GeoPackagePool::open_readonly("imagery.gpkg").await?;
///
/// for pyramid in pool.get_tile_pyramids().await? {
///     println!("{} zoom {}..={}", pyramid.table_name(), pyramid.min_zoom(), pyramid.max_zoom());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct GeoPackagePool {
    gpkg: GeoPackage,
    pool: Pool<Sqlite>,
}

impl GeoPackagePool {
    /// Opens a GeoPackage file in read-only mode with connection pooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not valid UTF-8, the file does not exist,
    /// or it is not an `SQLite` database.
    pub async fn open_readonly<P: AsRef<Path>>(filepath: P) -> GpkgResult<Self> {
        let gpkg = GeoPackage::new(filepath)?;
        let opt = SqliteConnectOptions::new()
            .filename(gpkg.filepath())
            .read_only(true);
        let pool = SqlitePool::connect_with(opt).await?;
        Ok(Self { gpkg, pool })
    }

    #[must_use]
    pub fn geopackage(&self) -> &GeoPackage {
        &self.gpkg
    }

    /// Take a connection out of the pool. It goes back to the pool when dropped.
    pub async fn acquire(&self) -> GpkgResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Load all raster tile pyramids, see [`GeoPackage::get_tile_pyramids`].
    pub async fn get_tile_pyramids(&self) -> GpkgResult<Vec<TilePyramid>> {
        let mut conn = self.pool.acquire().await?;
        self.gpkg.get_tile_pyramids(&mut *conn).await
    }

    /// Raw bytes of one tile, see [`GeoPackage::get_tile`].
    pub async fn get_tile(
        &self,
        pyramid: &TilePyramid,
        zoom: u8,
        column: u32,
        row: u32,
    ) -> GpkgResult<Option<Vec<u8>>> {
        let mut conn = self.pool.acquire().await?;
        self.gpkg
            .get_tile(&mut *conn, pyramid, zoom, column, row)
            .await
    }

    /// File and per zoom level statistics of the given pyramids.
    pub async fn summary(&self, pyramids: &[TilePyramid]) -> GpkgResult<Summary> {
        let mut conn = self.pool.acquire().await?;
        self.gpkg.summary(&mut *conn, pyramids).await
    }

    /// Wait for all connections to be returned and close them.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
