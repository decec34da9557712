use axum::{
    extract::{Multipart, State},
    Json,
};
use futures::StreamExt;
use utoipa::ToSchema;

use super::RouteState;
use crate::http_objects::{DataDeckAPIError, UploadResponse};

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(format = "binary")]
    file: String,
}

/// Upload one CSV or XLSX file
#[utoipa::path(
    post,
    path = "/files/upload",
    tag = "ingestion",
    request_body(content_type = "multipart/form-data", content = inline(UploadForm)),
    responses(
        (status = 200, description = "File stored and cataloged", body = UploadResponse),
        (status = BAD_REQUEST, description = "Unsupported file type or malformed upload", body = DataDeckAPIError),
        (status = INTERNAL_SERVER_ERROR, description = "File could not be stored", body = DataDeckAPIError)
    ),
)]
pub async fn upload_file(
    State(state): State<RouteState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, DataDeckAPIError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DataDeckAPIError::bad_request(&e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(|name| name.to_string()) else {
            return Err(DataDeckAPIError::bad_request(
                "the file field carries no filename",
            ));
        };
        // The field body goes straight into the blob store; the file is
        // never buffered whole in memory here.
        let stream = field.map(|res| res.map_err(|err| anyhow::anyhow!(err)));
        let entry = state.file_manager.ingest(&file_name, stream).await?;
        return Ok(Json(UploadResponse {
            filename: entry.display_name,
            id: entry.id,
        }));
    }
    Err(DataDeckAPIError::bad_request(
        "multipart field 'file' is required",
    ))
}
