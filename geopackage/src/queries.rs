use sqlx::{Row as _, SqliteExecutor, query};
use tracing::debug;

use crate::errors::{GpkgError, GpkgResult};

/// Metadata tables a GeoPackage must have to hold tile pyramids.
pub const REQUIRED_TABLES: [&str; 4] = [
    "gpkg_spatial_ref_sys",
    "gpkg_contents",
    "gpkg_tile_matrix_set",
    "gpkg_tile_matrix",
];

/// Quote an identifier such as a tile table name so it can be spliced into SQL.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Names of the required metadata tables that are not present in the file.
pub async fn missing_required_tables<T>(conn: &mut T) -> GpkgResult<Vec<&'static str>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let sql = "
SELECT name
FROM sqlite_master
WHERE type IN ('table', 'view')
  AND name IN ('gpkg_spatial_ref_sys', 'gpkg_contents', 'gpkg_tile_matrix_set', 'gpkg_tile_matrix')";
    let present: Vec<String> = query(sql)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|row| row.try_get::<String, _>(0))
        .collect::<Result<_, _>>()?;

    Ok(REQUIRED_TABLES
        .into_iter()
        .filter(|t| !present.iter().any(|p| p == t))
        .collect())
}

/// Fail with [`GpkgError::MissingTable`] unless all tile pyramid metadata tables exist.
pub async fn check_tile_schema<T>(conn: &mut T, filename: &str) -> GpkgResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let missing = missing_required_tables(&mut *conn).await?;
    if let Some(table) = missing.first() {
        debug!("GeoPackage {filename} is missing tables {missing:?}");
        return Err(GpkgError::MissingTable(
            filename.to_string(),
            (*table).to_string(),
        ));
    }
    Ok(())
}
