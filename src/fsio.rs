//! File access shared by the document, manifest and index readers and writers

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;

use crate::error::{CatalogError, Result};

/// Reads a document as UTF-8 text, dropping a leading byte order mark.
///
/// # Errors
/// [`CatalogError::Io`] when the file cannot be read, and a structural error
/// attributed to `path` when it is not valid UTF-8.
pub fn read_document(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| CatalogError::io(path, e))?;
    let mut text = String::from_utf8(bytes).map_err(|e| {
        CatalogError::Structural {
            position: e.utf8_error().valid_up_to(),
            message: "document is not valid UTF-8".to_string(),
        }
        .in_document(path)
    })?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}

/// Replaces `path` with `bytes` so readers see either the old or the new content.
///
/// The data goes to a temporary file in the same directory, is synced, and is
/// then renamed over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = Builder::new()
        .prefix(".ts-catalog")
        .tempfile_in(dir)
        .map_err(|e| CatalogError::io(dir, e))?;
    file.write_all(bytes).map_err(|e| CatalogError::io(path, e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| CatalogError::io(path, e))?;
    file.persist(path)
        .map_err(|e| CatalogError::io(path, e.error))?;
    Ok(())
}
