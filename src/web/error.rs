use crate::error::DrawingOcrError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Everything a request can fail with.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("No file provided. Upload the PDF in the 'file' field.")]
    MissingFile,

    #[error("Unsupported file type '{0}'; only PDF files are accepted")]
    UnsupportedMediaType(String),

    #[error("Failed to read upload: {detail}")]
    Multipart { status: StatusCode, detail: String },

    #[error(transparent)]
    Pipeline(#[from] DrawingOcrError),
}

impl From<MultipartError> for WebError {
    fn from(e: MultipartError) -> Self {
        WebError::Multipart {
            status: e.status(),
            detail: e.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::MissingFile => StatusCode::BAD_REQUEST,
            WebError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WebError::Multipart { status, .. } => *status,
            WebError::Pipeline(e) => match e {
                DrawingOcrError::DocumentFormat { .. } | DrawingOcrError::EmptyDocument => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DrawingOcrError::TooManyPages { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                DrawingOcrError::PdfiumBindingFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                DrawingOcrError::RasterisationFailed { .. }
                | DrawingOcrError::OcrEngine { .. }
                | DrawingOcrError::TempStorage { .. }
                | DrawingOcrError::InvalidConfig(_)
                | DrawingOcrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WebError::MissingFile => "MISSING_FILE",
            WebError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            WebError::Multipart { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                "UPLOAD_TOO_LARGE"
            }
            WebError::Multipart { .. } => "BAD_MULTIPART",
            WebError::Pipeline(e) => e.code(),
        }
    }

    fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {}", self);
        } else {
            tracing::warn!(code = self.code(), "upload rejected: {}", self);
        }
    }

    /// Render as the upload form with an error notice, for browser requests.
    pub fn into_html_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (status, Html(super::html::error_page(&self.to_string()))).into_response()
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });
        (status, body).into_response()
    }
}
