use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use data_model::FileMetadata;
use rusqlite::{params, Connection};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("storage name already cataloged: {storage_name}")]
    Conflict { storage_name: String },
    #[error("no catalog entry with id {id}")]
    NotFound { id: i64 },
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// Relational catalog of uploaded files, one row per blob. SQLite is
/// the system of record for catalog ids; the AUTOINCREMENT keyword
/// makes ids monotonic and keeps them from ever being reused.
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS uploaded_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                storage_name TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                uploaded_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                sha256_hash TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert a new catalog entry. The id and upload timestamp are
    /// assigned here, under the connection lock, so concurrent creates
    /// serialize and ids come out in insertion order.
    pub fn create(
        &self,
        display_name: &str,
        storage_name: &str,
        size_bytes: u64,
        sha256_hash: &str,
    ) -> Result<FileMetadata, Error> {
        let conn = self.conn.lock().unwrap();
        let uploaded_at = data_model::get_epoch_time_in_ms();
        conn.execute(
            "INSERT INTO uploaded_files (storage_name, display_name, uploaded_at, size_bytes, sha256_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                storage_name,
                display_name,
                uploaded_at as i64,
                size_bytes as i64,
                sha256_hash
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict {
                    storage_name: storage_name.to_string(),
                }
            } else {
                Error::Storage(e)
            }
        })?;
        let id = conn.last_insert_rowid();
        Ok(FileMetadata {
            id,
            storage_name: storage_name.to_string(),
            display_name: display_name.to_string(),
            uploaded_at,
            size_bytes,
            sha256_hash: sha256_hash.to_string(),
        })
    }

    /// All entries ordered by id ascending.
    pub fn list_all(&self) -> Result<Vec<FileMetadata>, Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, storage_name, display_name, uploaded_at, size_bytes, sha256_hash
             FROM uploaded_files ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], row_to_metadata)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_by_id(&self, id: i64) -> Result<FileMetadata, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, storage_name, display_name, uploaded_at, size_bytes, sha256_hash
             FROM uploaded_files WHERE id = ?1",
            params![id],
            row_to_metadata,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound { id },
            other => Error::Storage(other),
        })
    }
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileMetadata> {
    Ok(FileMetadata {
        id: row.get(0)?,
        storage_name: row.get(1)?,
        display_name: row.get(2)?,
        uploaded_at: row.get::<_, i64>(3)? as u64,
        size_bytes: row.get::<_, i64>(4)? as u64,
        sha256_hash: row.get(5)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
