//! API handlers for the docforge server
//!
//! Every tool endpoint takes a multipart form and answers with a JSON body
//! pointing at `/download/{filename}`. Paths are served with and without a
//! trailing slash.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use convert_core::{JobOutcome, JobService, PreviewOutcome};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

use crate::error::ApiError;
use crate::form::UploadForm;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<JobService>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "docforge",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Successful job response
#[derive(Serialize)]
pub struct JobResponse {
    pub success: bool,
    pub download_url: String,
    pub message: String,
    pub original_filename: String,
    pub converted_filename: String,
}

impl From<JobOutcome> for JobResponse {
    fn from(outcome: JobOutcome) -> Self {
        Self {
            success: true,
            download_url: outcome.download_url(),
            message: outcome.message,
            original_filename: outcome.original_filename,
            converted_filename: outcome.converted_filename,
        }
    }
}

type JobResult = Result<Json<JobResponse>, ApiError>;

/// Handler: POST /upload
pub async fn handle_upload(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    let target = form.non_blank("target_format");
    info!(
        "Upload request: {} file(s), target={:?}",
        form.files.len(),
        target
    );

    let outcome = state.service.convert(form.files, target).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /merge
pub async fn handle_merge(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    info!("Merge request: {} file(s)", form.files.len());

    let outcome = state.service.merge(form.files).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /split
pub async fn handle_split(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let upload = UploadForm::collect(multipart).await?.single_file()?;
    let outcome = state.service.split(upload).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /compress
pub async fn handle_compress(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    let level = form.non_blank("level");
    let upload = form.single_file()?;

    let outcome = state.service.compress(upload, level).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /rotate
pub async fn handle_rotate(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    let degrees = match form.non_blank("degrees") {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ApiError::InvalidRequest(format!("Invalid rotation '{}'. Must be an integer", raw))
        })?,
        None => 90,
    };
    let upload = form.single_file()?;

    let outcome = state.service.rotate(upload, degrees).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /watermark
pub async fn handle_watermark(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    let text = form.field("text").unwrap_or_default().to_string();
    let upload = form.single_file()?;

    let outcome = state.service.watermark(upload, text).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /pdf-to-image
pub async fn handle_pdf_to_image(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let upload = UploadForm::collect(multipart).await?.single_file()?;
    let outcome = state.service.export_images(upload).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /protect
pub async fn handle_protect(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    let password = form.field("password").unwrap_or_default().to_string();
    let upload = form.single_file()?;

    let outcome = state.service.protect(upload, password).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /unlock
pub async fn handle_unlock(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let form = UploadForm::collect(multipart).await?;
    let password = form.field("password").unwrap_or_default().to_string();
    let upload = form.single_file()?;

    let outcome = state.service.unlock(upload, password).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /convert/jpg
pub async fn handle_convert_jpg(State(state): State<AppState>, multipart: Multipart) -> JobResult {
    let upload = UploadForm::collect(multipart).await?.single_file()?;
    let outcome = state.service.export_jpg(upload).await?;
    Ok(Json(outcome.into()))
}

/// Handler: POST /convert/excel
pub async fn handle_convert_excel(
    State(state): State<AppState>,
    multipart: Multipart,
) -> JobResult {
    let upload = UploadForm::collect(multipart).await?.single_file()?;
    let outcome = state.service.to_spreadsheet(upload).await?;
    Ok(Json(outcome.into()))
}

/// Preview response: exactly one of the two fields is set
#[derive(Serialize, Default)]
pub struct PreviewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Handler: POST /preview
pub async fn handle_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, ApiError> {
    let upload = UploadForm::collect(multipart).await?.single_file()?;

    let response = match state.service.preview(upload).await? {
        PreviewOutcome::Thumbnail(data_url) => PreviewResponse {
            thumbnail: Some(data_url),
            ..Default::default()
        },
        PreviewOutcome::Locked => PreviewResponse {
            error: Some("locked"),
            ..Default::default()
        },
        PreviewOutcome::Failed => PreviewResponse {
            error: Some("failed"),
            ..Default::default()
        },
    };
    Ok(Json(response))
}

/// Handler: GET /download/{filename}
pub async fn handle_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let record = state.service.resolve_download(&filename).await?;
    let file = tokio::fs::File::open(&record.path)
        .await
        .map_err(|_| convert_core::JobError::ArtifactExpiredOrMissing)?;

    info!("Serving {} as {}", record.path.display(), record.download_name);
    let body = Body::from_stream(ReaderStream::new(file));
    let headers = [
        (header::CONTENT_TYPE, content_type_for(&record.download_name).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                record.download_name.replace(['"', '\\'], "_")
            ),
        ),
    ];
    Ok((headers, body).into_response())
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Register `handler` at `path` and `path/`
fn both_slashes(router: Router<AppState>, path: &str, handler: MethodRouter<AppState>) -> Router<AppState> {
    router
        .route(path, handler.clone())
        .route(&format!("{}/", path), handler)
}

/// Build the application router: API routes, static fallback, body limit,
/// CORS and request tracing. Rate limiting is layered on by the binary.
pub fn build_router(state: AppState, static_dir: Option<PathBuf>, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let tools: [(&str, MethodRouter<AppState>); 12] = [
        ("/upload", post(handle_upload)),
        ("/merge", post(handle_merge)),
        ("/split", post(handle_split)),
        ("/compress", post(handle_compress)),
        ("/rotate", post(handle_rotate)),
        ("/watermark", post(handle_watermark)),
        ("/pdf-to-image", post(handle_pdf_to_image)),
        ("/protect", post(handle_protect)),
        ("/unlock", post(handle_unlock)),
        ("/convert/jpg", post(handle_convert_jpg)),
        ("/convert/excel", post(handle_convert_excel)),
        ("/preview", post(handle_preview)),
    ];

    let mut router = Router::new()
        .route("/health", get(handle_health))
        .route("/download/:filename", get(handle_download));
    for (path, handler) in tools {
        router = both_slashes(router, path, handler);
    }
    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
