//! Router and request handlers.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use psr_core::source::{decode_grayscale, sniff_format};
use psr_core::{AnalysisParameters, AnalysisResult, IntensityGrid, PsrAnalyzer};
use psr_render::{
    panels_to_base64, render_intensity, render_overview, render_panel, to_base64_png,
    VisualizationKind,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{self, is_valid_id, ImageStore, StoredImage, UploadFormat};
use crate::API_VERSION;

type ApiResult<T> = Result<T, ApiError>;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/defaults", get(defaults))
        // ── v1 ──
        .route("/api/v1/uploads", post(upload))
        .route("/api/v1/uploads/:id", get(display).delete(delete_upload))
        .route("/api/v1/analyze", post(analyze))
        .route("/api/preview/:vis_type", post(preview))
        .route("/api/export", post(export))
        // ── legacy aliases ──
        .route("/upload", post(upload))
        .route("/api/upload", post(upload))
        .route("/display/:id", get(display))
        .route("/analyze", post(analyze))
        .route("/api/analyze", post(full_analysis))
        .layer(middleware::from_fn_with_state(state.clone(), purge_expired))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn envelope(data: Value) -> Value {
    json!({ "version": API_VERSION, "data": data })
}

/// Run a store call on the blocking pool; the disk backends do file I/O.
async fn with_store<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn ImageStore) -> store::Result<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    Ok(tokio::task::spawn_blocking(move || f(store.as_ref())).await??)
}

/// Retention maintenance ahead of every request.
async fn purge_expired(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    match with_store(&state, |store| store.purge_expired(Utc::now())).await {
        Ok(0) => {}
        Ok(n) => info!(purged = n, "expired uploads removed"),
        Err(e) => warn!(error = %e, "upload purge failed"),
    }
    next.run(req).await
}

// ── Service info ──────────────────────────────────────────────────────────────

async fn index() -> &'static str {
    "PSR analysis service is running"
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}

async fn defaults() -> Json<AnalysisParameters> {
    Json(AnalysisParameters::default())
}

// ── Uploads ───────────────────────────────────────────────────────────────────

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("upload exceeds the maximum allowed size".into())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        file = Some((filename, bytes));
        break;
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("no 'image' field in upload".into()))?;
    if filename.is_empty() {
        return Err(ApiError::BadRequest("no file selected".into()));
    }
    let ext = FsPath::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if UploadFormat::from_extension(ext).is_none() {
        return Err(ApiError::BadRequest(format!(
            "unsupported file type '{filename}'; allowed: png, jpg, jpeg, webp"
        )));
    }

    // Stored under the format the bytes actually carry.
    let format = UploadFormat::from_image_format(sniff_format(&bytes)?)
        .ok_or_else(|| ApiError::BadRequest("unsupported image format".into()))?;
    let bytes = bytes.to_vec();
    let (bytes, grid, preview) = tokio::task::spawn_blocking(move || {
        let grid = decode_grayscale(&bytes)?;
        let preview = to_base64_png(&render_intensity(&grid))?;
        Ok::<_, ApiError>((bytes, grid, preview))
    })
    .await??;

    let image = StoredImage::new(format, bytes);
    let id = image.id.clone();
    let expires_at = image.expires_at(state.ttl);
    with_store(&state, move |store| store.insert(image)).await?;
    info!(image_id = %id, width = grid.width, height = grid.height, "upload stored");

    let url = format!("/api/v1/uploads/{id}");
    let data = json!({
        "image_id": id,
        "display_url": url,
        "delete_url": url,
        "expires_at": expires_at,
        "width": grid.width,
        "height": grid.height,
        "preview": preview,
    });
    Ok((StatusCode::CREATED, Json(envelope(data))))
}

async fn load_upload(state: &AppState, id: &str) -> ApiResult<StoredImage> {
    if !is_valid_id(id) {
        return Err(ApiError::image_not_found(id));
    }
    let key = id.to_string();
    with_store(state, move |store| store.get(&key))
        .await?
        .ok_or_else(|| ApiError::image_not_found(id))
}

async fn display(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let image = load_upload(&state, &id).await?;
    Ok((
        [(header::CONTENT_TYPE, image.format.mime())],
        image.bytes.to_vec(),
    )
        .into_response())
}

async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !is_valid_id(&id) {
        return Err(ApiError::image_not_found(&id));
    }
    let key = id.clone();
    if !with_store(&state, move |store| store.remove(&key)).await? {
        return Err(ApiError::image_not_found(&id));
    }
    info!(image_id = %id, "upload deleted");
    Ok(Json(envelope(json!({ "deleted": true, "image_id": id }))))
}

// ── Analysis ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzeRequest {
    image_id: Option<String>,
    display_url: Option<String>,
    parameters: Option<Value>,
}

impl AnalyzeRequest {
    /// `image_id`, else the last path segment of `display_url`.
    fn target_id(&self) -> ApiResult<String> {
        if let Some(id) = self.image_id.as_deref().filter(|s| !s.is_empty()) {
            return Ok(id.to_string());
        }
        self.display_url
            .as_deref()
            .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("image_id or display_url is required".into()))
    }
}

/// A decoded upload together with its analysis.
struct Analysed {
    image_id: String,
    original: IntensityGrid,
    result: AnalysisResult,
}

/// Resolve, decode and analyse on a blocking worker.
async fn run_analysis_request(
    state: &AppState,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Analysed> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let image_id = req.target_id()?;
    let params = AnalysisParameters::from_json(req.parameters.unwrap_or(Value::Null))?;
    let analyzer = PsrAnalyzer::new(params)?;
    let image = load_upload(state, &image_id).await?;
    debug!(image_id = %image_id, "analysis requested");

    let (original, result) = tokio::task::spawn_blocking(move || {
        let grid = decode_grayscale(&image.bytes)?;
        let result = analyzer.analyze(&grid)?;
        Ok::<_, psr_core::Error>((grid, result))
    })
    .await??;

    Ok(Analysed { image_id, original, result })
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let done = run_analysis_request(&state, payload).await?;
    Ok(Json(envelope(json!({
        "image_id": done.image_id,
        "report": done.result.report,
    }))))
}

/// Report plus every panel as base64 PNG.
async fn full_analysis(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Analysed { image_id, original, result } = run_analysis_request(&state, payload).await?;
    let (visualizations, report) = tokio::task::spawn_blocking(move || {
        panels_to_base64(&original, &result).map(|panels| (panels, result.report))
    })
    .await??;

    Ok(Json(envelope(json!({
        "image_id": image_id,
        "report": report,
        "visualizations": visualizations,
    }))))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Path(vis_type): Path<String>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let kind: VisualizationKind = vis_type.parse()?;
    let done = run_analysis_request(&state, payload).await?;
    let encoded = tokio::task::spawn_blocking(move || {
        let panel = render_panel(kind, &done.original, &done.result);
        to_base64_png(&panel).map(|png| (png, done.result.report))
    })
    .await??;
    let (visualization, report) = encoded;

    Ok(Json(json!({
        "visualization": visualization,
        "vis_type": kind,
        "statistics": report.statistics(),
        "terrain": report.terrain,
    })))
}

async fn export(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let done = run_analysis_request(&state, payload).await?;
    let (export_image, report) = tokio::task::spawn_blocking(move || {
        let canvas = render_overview(&done.original, &done.result);
        to_base64_png(&canvas).map(|png| (png, done.result.report))
    })
    .await??;

    Ok(Json(json!({
        "export_image": export_image,
        "statistics": {
            "image_stats": report.image_stats,
            "psr_coverage": report.psr_coverage,
            "terrain": report.terrain,
            "landing_assessment": report.landing_assessment,
        },
        "parameters": report.parameters,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
