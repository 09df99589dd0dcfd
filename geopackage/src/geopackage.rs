use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, SqliteConnection};
use tracing::debug;

use crate::errors::{GpkgError, GpkgResult};

/// A GeoPackage file on disk.
///
/// This type only remembers where the file is. Use one of the `open*` methods to get a
/// single connection, or [`GeoPackagePool`](crate::GeoPackagePool) for pooled read access.
#[derive(Clone, Debug)]
pub struct GeoPackage {
    filepath: String,
    filename: String,
}

impl Display for GeoPackage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filepath)
    }
}

impl GeoPackage {
    pub fn new<P: AsRef<Path>>(filepath: P) -> GpkgResult<Self> {
        let path = filepath.as_ref();
        Ok(Self {
            filepath: path
                .to_str()
                .ok_or_else(|| GpkgError::UnsupportedCharsInFilepath(path.to_path_buf()))?
                .to_string(),
            filename: path
                .file_stem()
                .unwrap_or_else(|| OsStr::new("unknown"))
                .to_string_lossy()
                .to_string(),
        })
    }

    pub async fn open(&self) -> GpkgResult<SqliteConnection> {
        debug!("Opening w/ defaults {self}");
        let opt = SqliteConnectOptions::new().filename(self.filepath());
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    pub async fn open_or_new(&self) -> GpkgResult<SqliteConnection> {
        debug!("Opening or creating {self}");
        let opt = SqliteConnectOptions::new()
            .filename(self.filepath())
            .create_if_missing(true);
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    pub async fn open_readonly(&self) -> GpkgResult<SqliteConnection> {
        debug!("Opening as readonly {self}");
        let opt = SqliteConnectOptions::new()
            .filename(self.filepath())
            .read_only(true);
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }
}
