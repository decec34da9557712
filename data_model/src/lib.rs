use std::{
    fmt::{self, Display},
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use uuid::Uuid;

pub fn get_epoch_time_in_ms() -> u64 {
    let now = SystemTime::now();
    let duration = now
        .duration_since(UNIX_EPOCH)
        .expect("duration since epoch");
    duration.as_millis() as u64
}

/// File formats the ingestion pipeline understands. Detection goes by
/// file extension and is case sensitive, so `report.CSV` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".csv") {
            Some(FileFormat::Csv)
        } else if file_name.ends_with(".xlsx") {
            Some(FileFormat::Xlsx)
        } else {
            None
        }
    }
}

impl Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Name a blob is stored under. Uses a fresh v4 uuid so user supplied
/// file names never collide in the store, and keeps the extension so
/// the read path knows how to decode the blob later.
pub fn generate_storage_name(format: FileFormat) -> String {
    format!("{}.{}", Uuid::new_v4(), format.as_ref())
}

/// Catalog entry for one uploaded file. Written once at ingestion and
/// never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Monotonically increasing catalog id, assigned by the catalog
    /// store. Never reused, even after deletions.
    pub id: i64,
    /// Opaque name of the blob in the blob store. Unique.
    pub storage_name: String,
    /// The file name the client uploaded under, kept for display.
    pub display_name: String,
    /// Epoch millis at ingestion time.
    pub uploaded_at: u64,
    pub size_bytes: u64,
    pub sha256_hash: String,
}

/// One parsed cell. Untagged so rows serialize to plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A parsed row keyed by column header, preserving the column order of
/// the source file.
pub type Row = IndexMap<String, CellValue>;
