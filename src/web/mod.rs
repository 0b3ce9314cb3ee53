//! HTTP front end: upload form, JSON API and health check.
//!
//! | Method | Path              | Result                                   |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/`               | upload form                              |
//! | POST   | `/`               | HTML result page or error notice         |
//! | POST   | `/api/ocr`        | `{ page_count, pages, stats }` as JSON   |
//! | POST   | `/api/ocr/export` | the export artifact as an attachment     |
//! | GET    | `/health`         | `{ status, version, engine }`            |
//!
//! Uploads are multipart with the PDF in field `file`; an optional `page`
//! field preselects a page on the HTML result.

mod error;
pub mod html;

pub use error::WebError;

use crate::output::{DocumentText, EXPORT_FILENAME, EXPORT_MIME};
use crate::pipeline::PagePipeline;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

/// Default request body limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server-level limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest accepted request body. Larger uploads get 413.
    pub max_upload_bytes: usize,
    /// Pipeline runs admitted at once; further requests wait their turn.
    pub max_concurrent_documents: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_concurrent_documents: 1,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<PagePipeline>,
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(pipeline: Arc<PagePipeline>, config: &ServerConfig) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(config.max_concurrent_documents.max(1))),
        }
    }

    /// Run one upload through the pipeline, waiting for a free slot first.
    ///
    /// The slot is released when the pipeline run finishes, not when this
    /// future is dropped.
    async fn run(&self, bytes: Vec<u8>) -> Result<DocumentText, WebError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await.map_err(|e| {
            WebError::Pipeline(crate::DrawingOcrError::Internal(format!(
                "admission semaphore closed: {e}"
            )))
        })?;
        Ok(self.pipeline.process_holding(bytes, permit).await?)
    }
}

/// Build the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(index).post(upload_form))
        .route("/api/ocr", post(api_ocr))
        .route("/api/ocr/export", post(api_export))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves when the process is asked to stop.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

// ============================================================================
// Upload parsing
// ============================================================================

/// The parts of a multipart upload the handlers care about.
#[derive(Debug)]
struct Upload {
    bytes: Vec<u8>,
    filename: Option<String>,
    page: Option<usize>,
}

fn is_pdf_part(content_type: Option<&str>, filename: Option<&str>) -> bool {
    let by_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false);
    let by_name = filename
        .map(|name| name.to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false);
    by_type || by_name
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, WebError> {
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut page = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                tracing::debug!(
                    "Received file field: filename={:?}, content_type={:?}",
                    filename,
                    content_type
                );
                if !is_pdf_part(content_type.as_deref(), filename.as_deref()) {
                    return Err(WebError::UnsupportedMediaType(
                        content_type
                            .or(filename)
                            .unwrap_or_else(|| "unknown".to_string()),
                    ));
                }
                let data = field.bytes().await?;
                tracing::debug!("Read {} bytes of file data", data.len());
                file = Some((data.to_vec(), filename));
            }
            "page" => {
                let value = field.text().await?;
                page = value.trim().parse::<usize>().ok();
            }
            _ => {}
        }
    }

    let (bytes, filename) = file.ok_or(WebError::MissingFile)?;
    Ok(Upload {
        bytes,
        filename,
        page,
    })
}

/// Clamp a requested 1-based page into `1..=page_count`.
fn selected_page(requested: Option<usize>, page_count: usize) -> usize {
    requested.unwrap_or(1).clamp(1, page_count.max(1))
}

// ============================================================================
// Handlers
// ============================================================================

async fn index() -> Html<String> {
    Html(html::index_page())
}

async fn upload_form(State(state): State<AppState>, multipart: Multipart) -> Response {
    let result = async {
        let upload = read_upload(multipart).await?;
        let doc = state.run(upload.bytes).await?;
        Ok::<_, WebError>((doc, upload.filename, upload.page))
    }
    .await;

    match result {
        Ok((doc, filename, page)) => {
            let selected = selected_page(page, doc.page_count());
            Html(html::result_page(&doc, filename.as_deref(), selected)).into_response()
        }
        Err(e) => e.into_html_response(),
    }
}

#[derive(Serialize)]
struct OcrResponse {
    page_count: usize,
    #[serde(flatten)]
    document: DocumentText,
}

async fn api_ocr(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrResponse>, WebError> {
    let upload = read_upload(multipart).await?;
    let document = state.run(upload.bytes).await?;
    Ok(Json(OcrResponse {
        page_count: document.page_count(),
        document,
    }))
}

async fn api_export(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let upload = read_upload(multipart).await?;
    let document = state.run(upload.bytes).await?;
    Ok((
        [
            (header::CONTENT_TYPE, EXPORT_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        document.export(),
    )
        .into_response())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    engine: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine: state.pipeline.engine_name(),
    })
}
