use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Path, Request, State},
    http::{Method, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json,
    Router,
};
use datadeck_ui::Assets as UiAssets;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    files::FileManager,
    http_objects::{CatalogItem, DataDeckAPIError, FileData, PingResponse, UploadResponse},
};

mod upload;
use upload::{upload_file, UploadForm};

#[derive(OpenApi)]
#[openapi(
        paths(
            ping,
            upload::upload_file,
            list_files,
            file_data,
        ),
        components(
            schemas(
                DataDeckAPIError,
                UploadForm,
                UploadResponse,
                CatalogItem,
                FileData,
                PingResponse,
            )
        ),
        tags(
            (name = "datadeck", description = "DataDeck API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub file_manager: Arc<FileManager>,
    pub max_upload_size_bytes: usize,
}

pub fn create_routes(route_state: RouteState) -> Router {
    // The web UI is served from this process in production, but the
    // Vite dev server and the desktop webview both call in from other
    // origins.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/docs/openapi.json", get(openapi_json))
        .route("/ping", get(ping))
        .route(
            "/files/upload",
            post(upload_file)
                .with_state(route_state.clone())
                .layer(DefaultBodyLimit::max(route_state.max_upload_size_bytes)),
        )
        .route(
            "/files/all",
            get(list_files).with_state(route_state.clone()),
        )
        .route(
            "/files/data/{id}",
            get(file_data).with_state(route_state.clone()),
        )
        .fallback_service(get(ui_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/ping",
    tag = "operations",
    responses(
        (status = 200, description = "Server is up", body = PingResponse),
    ),
)]
async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "pong".to_string(),
    })
}

/// List all uploaded files
#[utoipa::path(
    get,
    path = "/files/all",
    tag = "retrieve",
    responses(
        (status = 200, description = "Every cataloged file, oldest first", body = Vec<CatalogItem>),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to read the catalog", body = DataDeckAPIError)
    ),
)]
async fn list_files(
    State(state): State<RouteState>,
) -> Result<Json<Vec<CatalogItem>>, DataDeckAPIError> {
    let entries = state.file_manager.list_all()?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Get the parsed contents of one uploaded file
#[utoipa::path(
    get,
    path = "/files/data/{id}",
    tag = "retrieve",
    params(
        ("id" = i64, Path, description = "Catalog id returned by the upload")
    ),
    responses(
        (status = 200, description = "Parsed rows in file order", body = FileData),
        (status = NOT_FOUND, description = "No file with this id", body = DataDeckAPIError),
        (status = BAD_REQUEST, description = "Stored file could not be parsed", body = DataDeckAPIError),
        (status = INTERNAL_SERVER_ERROR, description = "Stored file could not be read", body = DataDeckAPIError)
    ),
)]
async fn file_data(
    Path(id): Path<i64>,
    State(state): State<RouteState>,
) -> Result<Json<FileData>, DataDeckAPIError> {
    let (entry, rows) = state.file_manager.file_data(id).await?;
    Ok(Json(FileData {
        id: entry.id,
        filename: entry.display_name,
        data: rows,
    }))
}

// SPA fallback: unmatched GETs serve the embedded frontend, and paths
// the bundle does not contain get index.html so client side routing
// can take over.
#[tracing::instrument(skip_all)]
async fn ui_handler(uri: Uri) -> impl IntoResponse {
    let content = UiAssets::get(uri.path().trim_start_matches('/'))
        .unwrap_or_else(|| UiAssets::get("index.html").unwrap());
    (
        [(hyper::header::CONTENT_TYPE, content.metadata.mimetype())],
        content.data,
    )
        .into_response()
}
