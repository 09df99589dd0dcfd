use geopackage::{GeoPackage, GeoPackagePool, GpkgError, missing_required_tables};
use sqlx::{Connection as _, Executor as _};

#[tokio::test]
async fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = GeoPackagePool::open_readonly(dir.path().join("missing.gpkg"))
        .await
        .unwrap_err();
    assert!(matches!(err, GpkgError::SqlxError(_)), "{err}");
}

#[tokio::test]
async fn plain_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.sqlite");
    let gpkg = GeoPackage::new(&path).unwrap();
    let mut conn = gpkg.open_or_new().await.unwrap();
    conn.execute("CREATE TABLE gpkg_contents (table_name TEXT, data_type TEXT)")
        .await
        .unwrap();
    assert_eq!(
        missing_required_tables(&mut conn).await.unwrap(),
        ["gpkg_spatial_ref_sys", "gpkg_tile_matrix_set", "gpkg_tile_matrix"]
    );
    conn.close().await.unwrap();

    let pool = GeoPackagePool::open_readonly(&path).await.unwrap();
    assert_eq!(pool.geopackage().filename(), "plain");
    let err = pool.get_tile_pyramids().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "GeoPackage file plain is missing the required table gpkg_spatial_ref_sys"
    );
    pool.close().await;
}

#[tokio::test]
async fn geopackage_without_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.gpkg");
    let mut conn = GeoPackage::new(&path).unwrap().open_or_new().await.unwrap();
    conn.execute(
        "
CREATE TABLE gpkg_spatial_ref_sys (srs_name TEXT, srs_id INTEGER PRIMARY KEY, organization TEXT,
                                   organization_coordsys_id INTEGER, definition TEXT);
CREATE TABLE gpkg_contents (table_name TEXT PRIMARY KEY, data_type TEXT, identifier TEXT,
                            description TEXT, min_x DOUBLE, min_y DOUBLE, max_x DOUBLE,
                            max_y DOUBLE, srs_id INTEGER);
CREATE TABLE gpkg_tile_matrix_set (table_name TEXT PRIMARY KEY, srs_id INTEGER, min_x DOUBLE,
                                   min_y DOUBLE, max_x DOUBLE, max_y DOUBLE);
CREATE TABLE gpkg_tile_matrix (table_name TEXT, zoom_level INTEGER, matrix_width INTEGER,
                               matrix_height INTEGER, tile_width INTEGER, tile_height INTEGER,
                               pixel_x_size DOUBLE, pixel_y_size DOUBLE);
INSERT INTO gpkg_contents (table_name, data_type, srs_id) VALUES ('roads', 'features', 4326);",
    )
    .await
    .unwrap();
    conn.close().await.unwrap();

    let pool = GeoPackagePool::open_readonly(&path).await.unwrap();
    assert!(pool.get_tile_pyramids().await.unwrap().is_empty());
    let summary = pool.summary(&[]).await.unwrap();
    assert!(summary.pyramids.is_empty());
    assert!(summary.page_count > 0);
    pool.close().await;
}
