//! HTTP Server for the DMF engines.
//!
//! A workbook is uploaded as one `file` part per sheet (`Template.csv`,
//! `Parameters.csv`, ...). Runs execute on a blocking worker with their own
//! reference cache; generated files are kept in the output directory and
//! downloaded through `/api/reports/{filename}`.
//!
//! # API Endpoints
//!
//! | Method | Path                       | Description                    |
//! |--------|----------------------------|--------------------------------|
//! | GET    | `/health`                  | Health check                   |
//! | POST   | `/api/mapping`             | Map an uploaded workbook       |
//! | POST   | `/api/validate`            | Validate an uploaded workbook  |
//! | GET    | `/api/reports/{filename}`  | Download a generated file      |
//! | GET    | `/api/logs`                | SSE stream for real-time logs  |

use axum::{
    extract::{Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, log_info_indent, LOG_BROADCASTER};
use super::types::{error_response, RunResponse};
use crate::config::ServerConfig;
use crate::error::{RunError, ServerError, ServerResult};
use crate::pipeline::{
    mapping_file_name, mapping_overrides, report_stem, run_mapping, run_validation, validation_overrides,
    RunOptions,
};
use crate::workbook::MemorySource;

/// Name used for outputs when the upload carries none.
const DEFAULT_INPUT_NAME: &str = "workbook";

type Rejection = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    config: Arc<ServerConfig>,
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let port = config.port;
    let output_dir = config.output_dir.display().to_string();
    let state = AppState {
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/mapping", post(mapping_upload))
        .route("/api/validate", post(validate_upload))
        .route("/api/reports/{filename}", get(download_report))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_info(format!("DMF server running on http://localhost:{}", port));
    log_info_indent("POST /api/mapping            - Map a workbook", 1);
    log_info_indent("POST /api/validate           - Validate a workbook", 1);
    log_info_indent("GET  /api/reports/{filename} - Download a generated file", 1);
    log_info_indent("GET  /api/logs               - SSE log stream", 1);
    log_info_indent(format!("Output directory: {}", output_dir), 1);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dmf",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "mapping": "POST /api/mapping",
            "validate": "POST /api/validate",
            "reports": "GET /api/reports/{filename}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the missed entries
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Uploads
// =============================================================================

/// A parsed multipart upload.
struct Upload {
    source: MemorySource,
    rules: Option<String>,
    name: Option<String>,
}

impl Upload {
    fn input_name(&self) -> String {
        input_name(self.name.as_deref())
    }
}

fn input_name(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_INPUT_NAME)
        .to_string()
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    let mut upload = Upload {
        source: MemorySource::new(),
        rules: None,
        name: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let part = field.name().unwrap_or("").to_string();
        match part.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ServerError::BadRequest("File part without a file name".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                let sheet = upload
                    .source
                    .insert_csv(&file_name, &bytes)
                    .map_err(|source| RunError::Read {
                        file: file_name.clone(),
                        source,
                    })?;
                log_info_indent(format!("Sheet '{}' ({} bytes)", sheet, bytes.len()), 1);
            }
            "rules" | "name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                let text = Some(text).filter(|t| !t.trim().is_empty());
                if part == "rules" {
                    upload.rules = text;
                } else {
                    upload.name = text;
                }
            }
            _ => {}
        }
    }

    if upload.source.is_empty() {
        return Err(ServerError::BadRequest("No file provided".to_string()));
    }
    Ok(upload)
}

/// Map an uploaded workbook
async fn mapping_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RunResponse>, Rejection> {
    log_info("New mapping upload");
    let upload = read_upload(multipart).await.map_err(reject)?;
    let input = upload.input_name();
    let rules = upload
        .rules
        .as_deref()
        .map(mapping_overrides)
        .transpose()
        .map_err(|e| reject(e.into()))?;

    let options = RunOptions::new(&state.config.output_dir).with_output_name(Uuid::new_v4().to_string());
    let source = upload.source;
    let name = input.clone();
    let outcome = tokio::task::spawn_blocking(move || run_mapping(&source, &name, rules.as_deref(), &options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| reject(e.into()))?;

    Ok(Json(RunResponse::new(
        format!("Mapping complete: {}", outcome.info_line()),
        &outcome.output_name,
        mapping_file_name(&input),
    )))
}

/// Validate an uploaded workbook
async fn validate_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RunResponse>, Rejection> {
    log_info("New validation upload");
    let upload = read_upload(multipart).await.map_err(reject)?;
    let input = upload.input_name();
    let rules = upload
        .rules
        .as_deref()
        .map(validation_overrides)
        .transpose()
        .map_err(|e| reject(e.into()))?;

    let options = RunOptions::new(&state.config.output_dir).with_output_name(Uuid::new_v4().to_string());
    let source = upload.source;
    let name = input.clone();
    let outcome = tokio::task::spawn_blocking(move || run_validation(&source, &name, rules.as_deref(), &options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| reject(e.into()))?;

    Ok(Json(
        RunResponse::new(
            format!("Validation complete: {}", outcome.info_line()),
            &outcome.report_name,
            format!("{}.csv", report_stem(&input)),
        )
        .with_metrics(&outcome.metrics)
        .with_summary(&outcome.summary_name),
    ))
}

/// Download a generated file
async fn download_report(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    if !is_plain_file_name(&filename) {
        return Err(reject(ServerError::BadRequest(format!("Invalid file name '{}'", filename))));
    }

    let path = state.config.output_dir.join(&filename);
    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(error_response(&format!("Report '{}' not found", filename))),
        )
    })?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename.replace('"', "")),
        ),
    ];
    Ok((headers, bytes))
}

/// Basename only: no separators, no parent references.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn reject(err: ServerError) -> Rejection {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Run(RunError::Config(_) | RunError::Read { .. } | RunError::Rules(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServerError::Run(RunError::Write { .. }) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match &err {
        ServerError::Run(run) => run.to_string(),
        other => other.to_string(),
    };
    log_error(&message);
    (status, Json(error_response(&message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("3f2c review.csv"));
        assert!(!is_plain_file_name("../secret.csv"));
        assert!(!is_plain_file_name("a/b.csv"));
        assert!(!is_plain_file_name("a\\b.csv"));
        assert!(!is_plain_file_name(""));
    }

    #[test]
    fn test_input_name_default() {
        assert_eq!(input_name(None), "workbook");
        assert_eq!(input_name(Some("  ")), "workbook");
        assert_eq!(input_name(Some(" batch_07.xlsx ")), "batch_07.xlsx");
    }

    #[test]
    fn test_reject_status() {
        let (status, body) = reject(ServerError::BadRequest("No file provided".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["message"], "Invalid request: No file provided");

        let (status, body) = reject(RunError::Rules("expected value".into()).into());
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.0["message"], "Failed to read rules override: expected value");
    }
}
