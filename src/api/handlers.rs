// src/api/handlers.rs

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use std::path::{Path as FsPath, PathBuf};
use uuid::Uuid;

use crate::api::{types::*, AppState};
use crate::infra::errors::ManifixError;
use crate::infra::paths;
use crate::infra::stats::Counter;
use crate::repair::{analyze, process_one_file, AnalyzeOutcome};
use crate::session::SessionStatus;
use crate::tools::convert::{ConversionTarget, DEFAULT_TARGET};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
            logs: None,
        }),
    )
}

fn from_manifix(e: ManifixError) -> ApiError {
    let status = match &e {
        ManifixError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

/// An uploaded file plus any plain form fields.
struct Form {
    file: Option<(String, Bytes)>,
    target_format: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<Form, ApiError> {
    let mut form = Form {
        file: None,
        target_format: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                form.file = Some((filename, bytes));
            }
            Some("target_format") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                form.target_format = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Attachment response for a file on disk.
async fn attachment(path: &FsPath, extra_output_header: bool) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "Output file missing"))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model.stl".into());

    let mut response = (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    )
        .into_response();
    if extra_output_header {
        if let Ok(value) = name.parse() {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-output-name"), value);
        }
    }
    Ok(response)
}

fn upload_name(filename: &str) -> String {
    match paths::sanitize_filename(filename) {
        name if name.is_empty() => "model.stl".to_string(),
        name => name,
    }
}

/// Scratch directory under the session root for one-off uploads; the orphan
/// sweep removes it if we don't.
async fn scratch_dir(root: &FsPath) -> Result<PathBuf, ApiError> {
    let dir = root.join(format!("scratch-{}", Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(dir)
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cfg = &state.config;
    Json(HealthResponse {
        status: "ok",
        watch_mode: cfg.watch.enabled,
        watch_workers: cfg.watch.workers,
        queue_depth: state.queue.depth(),
        poll_seconds: cfg.watch.poll_seconds,
        session_ttl_seconds: cfg.sessions.ttl_seconds,
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        status: "ok",
        active_sessions: state.store.len(),
        max_sessions: state.store.max_sessions(),
        session_ttl_seconds: state.config.sessions.ttl_seconds,
        admesh_timeout_seconds: state.config.tool.timeout_seconds,
        stats: state.stats.snapshot(),
    })
}

/// POST /analyze — Diagnose an upload and open a session.
pub async fn analyze_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeOutcome>, ApiError> {
    let form = read_form(multipart).await?;
    let Some((filename, bytes)) = form.file else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    };
    if !analyze::is_repairable_file(&filename) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Only .stl files are supported",
        ));
    }

    state.stats.incr(Counter::AnalyzeRequests);
    state.store.sweep_expired(Utc::now()).await;

    let outcome = analyze::analyze_upload(
        &state.store,
        state.tool.as_ref(),
        &state.config.sessions.root,
        &filename,
        &bytes,
    )
    .await
    .map_err(from_manifix)?;
    Ok(Json(outcome))
}

/// POST /repair/{id} — Start a staged run in the background.
pub async fn start_repair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RepairStarted>, ApiError> {
    state.stats.incr(Counter::RepairRequests);
    let start = state.pipeline.start(&id).map_err(|e| match e {
        ManifixError::SessionNotFound { .. } => api_error(
            StatusCode::NOT_FOUND,
            "Session not found. Upload and analyze again.",
        ),
        other => from_manifix(other),
    })?;
    Ok(Json(RepairStarted {
        status: start.status_message(),
    }))
}

/// GET /status/{id}
pub async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = state
        .store
        .get(&id, true)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;
    Ok(Json(StatusResponse::from(&session)))
}

/// GET /download/{id}
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state
        .store
        .get(&id, true)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;

    let output = match (&session.status, &session.output_path) {
        (SessionStatus::Completed, Some(path)) => path.clone(),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Repair not completed yet",
            ))
        }
    };
    attachment(&output, false).await
}

/// POST /convert — Convert an upload to `target_format`.
pub async fn convert_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let Some((filename, bytes)) = form.file else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    };
    if filename.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file selected"));
    }
    if !ConversionTarget::accepts_input(&filename) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Unsupported input format. Supported: {}",
                ConversionTarget::supported_list()
            ),
        ));
    }
    let target = match form.target_format.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_TARGET,
        Some(fmt) => fmt.parse::<ConversionTarget>().map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "Unsupported target format. Supported: {}",
                    ConversionTarget::supported_list()
                ),
            )
        })?,
    };

    let safe_name = upload_name(&filename);
    let output_dir = &state.config.watch.output_dir;
    paths::ensure_dirs(&[output_dir.as_path()])
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let scratch = scratch_dir(&state.config.sessions.root).await?;
    let input = scratch.join(&safe_name);
    let output = paths::unique_output_path(
        output_dir,
        &paths::safe_stem(&input),
        &format!(".converted.{}", target.extension()),
    );

    let result = match tokio::fs::write(&input, &bytes).await {
        Ok(()) => state.converter.convert(&input, &output, target).await,
        Err(e) => Err(e.into()),
    };
    let _ = tokio::fs::remove_dir_all(&scratch).await;

    match result {
        Ok(()) => attachment(&output, true).await,
        Err(e) if e.is_client_error() => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Conversion failed: {e}"),
        )),
    }
}

/// GET /sessions — Summaries, newest first.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    Json(SessionList {
        sessions: state.store.list().await,
    })
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    state
        .store
        .delete(&id)
        .await
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "Session not found"))?;
    Ok(Json(Deleted {
        status: "deleted",
        session_id: id,
    }))
}

/// POST /repair — Single-call repair; responds with the repaired file.
pub async fn repair_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let Some((filename, bytes)) = form.file else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    };
    if !analyze::is_repairable_file(&filename) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Only .stl files are supported",
        ));
    }

    let output_dir = &state.config.watch.output_dir;
    paths::ensure_dirs(&[output_dir.as_path()])
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let scratch = scratch_dir(&state.config.sessions.root).await?;
    let input = scratch.join(upload_name(&filename));
    let result = match tokio::fs::write(&input, &bytes).await {
        Ok(()) => process_one_file(state.tool.as_ref(), &input, output_dir).await,
        Err(e) => Err(e.into()),
    };
    let _ = tokio::fs::remove_dir_all(&scratch).await;

    let outcome = result.map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !outcome.success {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Repair failed".into(),
                logs: Some(outcome.diagnostics),
            }),
        ));
    }
    attachment(&outcome.output, false).await
}
