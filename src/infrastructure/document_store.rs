// Single-document JSON persistence
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::domain::errors::StoreError;
use crate::domain::snapshot::Document;

/// Read one JSON document with typed errors. An existing but empty file is an
/// empty document, not an error. Mutating paths use this so a corrupt file
/// fails the operation instead of being clobbered on the write-back.
pub fn read(path: &Path) -> Result<Document, StoreError> {
    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        _ => StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if raw.trim().is_empty() {
        return Ok(Document::new());
    }

    serde_json::from_str(&raw).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read-path wrapper: never fails, degrades to an empty document and logs the
/// specific cause.
pub fn read_or_default(path: &Path) -> Document {
    match read(path) {
        Ok(doc) => doc,
        Err(StoreError::NotFound(_)) => {
            tracing::debug!("document not found: {}", path.display());
            Document::new()
        }
        Err(StoreError::Parse { source, .. }) => {
            tracing::warn!("malformed document {}: {}", path.display(), source);
            Document::new()
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {}", path.display(), e);
            Document::new()
        }
    }
}

/// Write one JSON document atomically: serialize next to the target and
/// rename over it, so readers observe either the old or the new content.
/// Output is pretty-printed with 2-space indentation, Unicode left literal.
///
/// Callers that track file mtimes must follow a successful write with
/// `ChangeTracker::note_write` for this path.
pub fn write(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let serialized = serde_json::to_string_pretty(doc).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serialized).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
