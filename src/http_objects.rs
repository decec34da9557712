use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_model::{FileMetadata, Row};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::files::FileError;

/// API error envelope. Serializes to `{"detail": "..."}`, which is
/// what the web UI expects to find in non-2xx responses.
#[derive(Debug, ToSchema, Serialize, Deserialize)]
pub struct DataDeckAPIError {
    #[serde(skip)]
    status_code: StatusCode,
    detail: String,
}

impl DataDeckAPIError {
    pub fn new(status_code: StatusCode, detail: &str) -> Self {
        Self {
            status_code,
            detail: detail.to_string(),
        }
    }

    pub fn bad_request(detail: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// Internal errors log the cause server side and hand the client a
    /// generic message. Storage errors carry filesystem paths that must
    /// not leak into responses.
    pub fn internal_error(e: anyhow::Error) -> Self {
        error!("internal error: {:?}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    pub fn internal_error_str(e: &str) -> Self {
        error!("internal error: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for DataDeckAPIError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.detail);
        (self.status_code, Json(self)).into_response()
    }
}

impl From<FileError> for DataDeckAPIError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::UnsupportedFormat(_) => {
                Self::bad_request("Only CSV or XLSX files are supported.")
            }
            FileError::Parse(e) => Self::bad_request(&format!("failed to parse file: {}", e)),
            FileError::Catalog(catalog_store::Error::NotFound { id }) => {
                Self::not_found(&format!("no file with id {}", id))
            }
            FileError::Catalog(e) => Self::internal_error(anyhow::Error::new(e)),
            FileError::Storage(e) => Self::internal_error(e),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// The file name the client uploaded under, not the storage name.
    pub filename: String,
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogItem {
    pub id: i64,
    pub displayname: String,
}

impl From<FileMetadata> for CatalogItem {
    fn from(entry: FileMetadata) -> Self {
        Self {
            id: entry.id,
            displayname: entry.display_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileData {
    pub id: i64,
    pub filename: String,
    /// Parsed rows in file order, one JSON object per row with columns
    /// in header order.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Row>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PingResponse {
    pub message: String,
}
