// Category directory aggregation
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::domain::snapshot::Document;
use crate::infrastructure::document_store;

/// Read every JSON document in a category directory and merge them into one
/// mapping. A missing directory is an empty mapping with a warning, never an
/// error.
pub fn read_category(dir: &Path, category_name: &str) -> Document {
    let mut result = Document::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("category directory {} unreadable: {}", dir.display(), e);
            return result;
        }
    };

    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    for path in files {
        let Some(basename) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
        else {
            continue;
        };
        let doc = document_store::read_or_default(&path);
        merge_into(&mut result, &basename, category_name, doc);
        tracing::debug!("loaded {} into category {}", path.display(), category_name);
    }

    result
}

/// Decide where a file's document lands in the category mapping:
/// - an empty document becomes an explicit empty entry under the basename,
///   marking "file exists but has no content";
/// - a basename matching the category name (case-insensitive) merges its
///   top-level keys directly into the result;
/// - a document whose only top-level key equals the basename is unwrapped, so
///   `category.json -> {"category": {...}}` does not nest twice;
/// - anything else is nested under the basename.
pub fn merge_into(result: &mut Document, basename: &str, category_name: &str, mut doc: Document) {
    if doc.is_empty() {
        result.insert(basename.to_string(), Value::Object(Document::new()));
        return;
    }

    if basename.eq_ignore_ascii_case(category_name) {
        result.append(&mut doc);
        return;
    }

    if doc.len() == 1 && doc.contains_key(basename) {
        let inner = doc.remove(basename).unwrap();
        result.insert(basename.to_string(), inner);
        return;
    }

    result.insert(basename.to_string(), Value::Object(doc));
}
