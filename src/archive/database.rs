use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use rusqlite::{named_params, types::ValueRef, Connection, OpenFlags, OptionalExtension};
use tempfile::NamedTempFile;

use super::metadata::MbTilesMetadata;
use crate::{
    constants::{METADATA_QUERY, TILE_QUERY},
    MapError, Result,
};

/// A read-only MBTiles archive.
///
/// Archives handed over as bytes are spilled to a private temporary file
/// that lives exactly as long as this handle.
pub struct MbTilesDatabase {
    conn: Mutex<Connection>,
    has_metadata: bool,
    path: PathBuf,
    _backing: Option<NamedTempFile>,
}

impl MbTilesDatabase {
    /// Opens an archive held in memory.
    ///
    /// Needs a writable temporary directory; this fails on targets without
    /// a filesystem such as `wasm32-unknown-unknown`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(MapError::InvalidSource("archive buffer is empty".to_string()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("maplet-")
            .suffix(".mbtiles")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let mut db = Self::open(file.path())?;
        db._backing = Some(file);
        Ok(db)
    }

    /// Opens an archive file in place.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MapError::InvalidSource(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;

        // Preparing the lookup reads the schema, which rejects non-databases
        // and archives without a tiles table up front.
        conn.prepare_cached(TILE_QUERY)?;

        let has_metadata = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = 'metadata'",
                [],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !has_metadata {
            log::warn!("{} has no metadata table", path.display());
        }

        Ok(Self {
            conn: Mutex::new(conn),
            has_metadata,
            path: path.to_path_buf(),
            _backing: None,
        })
    }

    /// Location of the database file (a temporary file for in-memory archives).
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MapError::Archive("archive connection poisoned".to_string()))
    }

    /// Value of a single metadata row, if present.
    pub fn metadata_value(&self, key: &str) -> Result<Option<String>> {
        if !self.has_metadata {
            return Ok(None);
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(METADATA_QUERY)?;
        let value = stmt
            .query_row(named_params! { ":key": key }, |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Null => None,
                    ValueRef::Integer(i) => Some(i.to_string()),
                    ValueRef::Real(f) => Some(f.to_string()),
                    ValueRef::Text(t) | ValueRef::Blob(t) => {
                        Some(String::from_utf8_lossy(t).into_owned())
                    }
                })
            })
            .optional()?;

        Ok(value.flatten())
    }

    /// All recognised metadata rows.
    pub fn metadata(&self) -> Result<MbTilesMetadata> {
        MbTilesMetadata::from_lookup(|key| self.metadata_value(key))
    }

    /// Payload stored for a tile, addressed with the archive's own
    /// bottom-origin row. A NULL payload reads as an empty one.
    pub fn tile_data(&self, z: u8, x: u32, tms_y: u32) -> Result<Option<Vec<u8>>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(TILE_QUERY)?;
        let data = stmt
            .query_row(named_params! { ":z": z, ":x": x, ":y": tms_y }, |row| {
                match row.get_ref(0)? {
                    ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
                    ValueRef::Null => Ok(Vec::new()),
                    other => Err(rusqlite::Error::InvalidColumnType(
                        0,
                        "tile_data".to_string(),
                        other.data_type(),
                    )),
                }
            })
            .optional()?;

        log::debug!(
            "tile {}/{}/{} -> {}",
            z,
            x,
            tms_y,
            data.as_ref().map_or("missing".to_string(), |d| format!("{} bytes", d.len()))
        );
        Ok(data)
    }

    pub fn tile_count(&self) -> Result<u64> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Distinct zoom levels that hold at least one tile, ascending.
    pub fn zoom_levels(&self) -> Result<Vec<u8>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare_cached("SELECT DISTINCT zoom_level FROM tiles ORDER BY zoom_level")?;
        let levels = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(levels
            .into_iter()
            .filter_map(|z| u8::try_from(z).ok())
            .collect())
    }
}

impl std::fmt::Debug for MbTilesDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MbTilesDatabase")
            .field("path", &self.path)
            .field("has_metadata", &self.has_metadata)
            .field("in_memory", &self._backing.is_some())
            .finish()
    }
}
