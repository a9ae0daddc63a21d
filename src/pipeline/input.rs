//! Input loading: read a PDF from disk and reject anything that is not one.
//!
//! The core works on byte buffers; this is the thin file-system shell used by
//! [`crate::parse_files`] and the CLI. Checking the `%PDF` magic here gives
//! the caller a path-bearing `NotAPdf` error instead of a parser message.

use crate::error::Pdf2QuizError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Read the file at `path` and verify its PDF magic bytes.
pub async fn read_pdf(path: &Path) -> Result<Vec<u8>, Pdf2QuizError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => Pdf2QuizError::PermissionDenied {
            path: path.to_path_buf(),
        },
        ErrorKind::NotFound => Pdf2QuizError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Pdf2QuizError::Internal(format!("reading {}: {}", path.display(), e)),
    })?;

    check_magic(path, &bytes)?;
    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2QuizError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(Pdf2QuizError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}
