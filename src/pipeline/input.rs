//! Input staging: validate uploaded bytes and park them in a transient file.
//!
//! pdfium opens documents from a file-system path, so each upload is written
//! to a uniquely named temporary file for the duration of one pipeline run.
//! [`TransientDocument`] owns that file: it is removed explicitly when
//! processing succeeds and by `Drop` on every other exit path, so concurrent
//! uploads never collide and nothing outlives the request.

use crate::error::DrawingOcrError;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// PDF header marker.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Readers accept the header anywhere in the first 1024 bytes.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// Prefix of every transient upload file.
pub const TEMP_PREFIX: &str = "drawing-ocr-";

/// Check that `bytes` looks like a PDF before handing it to pdfium.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), DrawingOcrError> {
    if bytes.is_empty() {
        return Err(DrawingOcrError::DocumentFormat {
            detail: "upload is empty".to_string(),
        });
    }
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    if window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        Ok(())
    } else {
        let shown = bytes.len().min(4);
        Err(DrawingOcrError::DocumentFormat {
            detail: format!("missing %PDF- header (starts with {:?})", &bytes[..shown]),
        })
    }
}

/// An uploaded document staged on disk for the rasterizer.
#[derive(Debug)]
pub struct TransientDocument {
    file: NamedTempFile,
}

impl TransientDocument {
    /// Validate `bytes` and write them to a new temporary file.
    ///
    /// The file lands in `dir` when given, otherwise in the system temp dir.
    pub fn stage(bytes: &[u8], dir: Option<&Path>) -> Result<Self, DrawingOcrError> {
        check_pdf_magic(bytes)?;

        let target_dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(".pdf");
        let mut file = builder
            .tempfile_in(&target_dir)
            .map_err(|e| DrawingOcrError::TempStorage {
                path: target_dir.clone(),
                source: e,
            })?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| DrawingOcrError::TempStorage {
                path: file.path().to_path_buf(),
                source: e,
            })?;

        debug!(path = %file.path().display(), bytes = bytes.len(), "staged upload");
        Ok(Self { file })
    }

    /// Location of the staged PDF.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the staged file, reporting failures.
    ///
    /// A failed close is retried with a plain unlink; a file that is already
    /// gone counts as released.
    pub fn release(self) -> Result<(), DrawingOcrError> {
        let path: PathBuf = self.file.path().to_path_buf();
        let Err(first) = self.file.close() else {
            return Ok(());
        };
        if first.kind() == ErrorKind::NotFound {
            return Ok(());
        }
        warn!(path = %path.display(), "close of staged upload failed, unlinking: {}", first);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DrawingOcrError::TempStorage { path, source: e }),
        }
    }
}
