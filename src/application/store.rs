// Telemetry store - snapshot cache and document access
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;

use crate::domain::errors::StoreError;
use crate::domain::log::TIMESTAMP_FORMAT;
use crate::domain::snapshot::{Document, Snapshot};
use crate::infrastructure::change_tracker::ChangeTracker;
use crate::infrastructure::{directory_reader, document_store};

/// The snapshot categories, in merge order.
pub const CATEGORIES: [&str; 4] = ["constant", "variable", "semi-variable", "alarm"];

/// On-disk layout of the store. The directory and file names are fixed so
/// existing station data stays readable.
#[derive(Debug, Clone)]
pub struct StorePaths {
    base: PathBuf,
}

impl StorePaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.base.join(category)
    }

    /// Channel definitions, under the `channel` key.
    pub fn channel_file(&self) -> PathBuf {
        self.base.join("constant").join("channel.json")
    }

    /// Live values, under the `data` key.
    pub fn data_file(&self) -> PathBuf {
        self.base.join("variable").join("data.json")
    }

    /// Free-form alarm configuration.
    pub fn alarm_file(&self) -> PathBuf {
        self.base.join("alarm").join("alarm.json")
    }

    /// Per-channel history, under the `logs` key.
    pub fn logs_file(&self) -> PathBuf {
        self.base.join("logsfile").join("logs.json")
    }

    /// Every directory the change tracker watches.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        CATEGORIES
            .iter()
            .map(|c| self.category_dir(c))
            .chain([self.base.join("logsfile")])
            .collect()
    }
}

struct StoreState {
    tracker: ChangeTracker,
    cached: Option<Snapshot>,
}

/// Owner of all mutable store state. The JSON documents are the source of
/// truth; the cached snapshot is a read-through view invalidated by the
/// change tracker or by any successful mutation. One mutex serializes every
/// read-modify-write sequence; it is never held across an await point.
pub struct TelemetryStore {
    paths: StorePaths,
    state: Mutex<StoreState>,
}

impl TelemetryStore {
    pub fn new(paths: StorePaths, min_check_interval: Duration, always_stale: bool) -> Self {
        let tracker = ChangeTracker::new(paths.watched_dirs(), min_check_interval, always_stale);
        Self {
            paths,
            state: Mutex::new(StoreState {
                tracker,
                cached: None,
            }),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Cache-aware snapshot read: serve the cached snapshot until the tracker
    /// reports a change, then rebuild from disk.
    pub fn get_snapshot(&self) -> Snapshot {
        let mut state = self.lock();
        let stale = state.tracker.has_changed();
        if !stale {
            if let Some(cached) = &state.cached {
                return cached.clone();
            }
        } else if state.cached.is_some() {
            tracing::debug!("snapshot cache invalidated by file change");
        }
        self.refresh(&mut state)
    }

    /// Administrative reload: rescan every watched directory and rebuild
    /// unconditionally.
    pub fn force_reload(&self) -> Snapshot {
        let mut state = self.lock();
        state.tracker.rescan();
        state.cached = None;
        tracing::info!("forced reload of all tracked documents");
        self.refresh(&mut state)
    }

    /// The tracker's verdict, consumed: a positive answer also drops the
    /// cached snapshot so the next read rebuilds.
    pub fn has_pending_changes(&self) -> bool {
        let mut state = self.lock();
        if state.tracker.has_changed() {
            state.cached = None;
            true
        } else {
            false
        }
    }

    /// Run a read-modify-write sequence against the documents under the store
    /// mutex. Writes go through the transaction handle, which records the new
    /// mtimes; if anything was written the cached snapshot is dropped.
    pub fn with_documents<T>(
        &self,
        f: impl FnOnce(&mut DocumentTxn) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.lock();
        let mut txn = DocumentTxn {
            tracker: &mut state.tracker,
            wrote: false,
        };
        let result = f(&mut txn);
        let wrote = txn.wrote;
        if wrote {
            state.cached = None;
        }
        result
    }

    fn refresh(&self, state: &mut StoreState) -> Snapshot {
        let rebuilt = self.build_snapshot();
        match rebuilt.validate() {
            Ok(()) => {}
            Err(e) => {
                if let Some(last_good) = &state.cached {
                    tracing::warn!("rebuilt snapshot rejected ({}), serving previous one", e);
                    return last_good.clone();
                }
                // Nothing to fall back to; degraded data beats no data.
                tracing::warn!("first snapshot failed validation ({}), serving anyway", e);
            }
        }
        state.cached = Some(rebuilt.clone());
        rebuilt
    }

    fn build_snapshot(&self) -> Snapshot {
        let read = |category: &str| {
            directory_reader::read_category(&self.paths.category_dir(category), category)
        };
        let constant = read("constant");
        let variable = read("variable");
        let semi_variable = read("semi-variable");
        let alarm = read("alarm");
        Snapshot::new(
            Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            constant,
            variable,
            semi_variable,
            alarm,
        )
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A poisoned lock still guards consistent data: the documents on disk
        // are the source of truth and the cache is rebuilt from them.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Document access inside a store mutation. Reads are typed so a corrupt
/// document fails the operation instead of being overwritten.
pub struct DocumentTxn<'a> {
    tracker: &'a mut ChangeTracker,
    wrote: bool,
}

impl DocumentTxn<'_> {
    pub fn read(&self, path: &Path) -> Result<Document, StoreError> {
        match document_store::read(path) {
            Ok(doc) => Ok(doc),
            Err(StoreError::NotFound(_)) => Ok(Document::new()),
            Err(e) => Err(e),
        }
    }

    pub fn write(&mut self, path: &Path, doc: &Document) -> Result<(), StoreError> {
        document_store::write(path, doc)?;
        self.tracker.note_write(path);
        self.wrote = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> TelemetryStore {
        seed(dir);
        TelemetryStore::new(
            StorePaths::new(dir.path()),
            Duration::ZERO,
            false,
        )
    }

    fn seed(dir: &TempDir) {
        let constant = dir.path().join("constant");
        let variable = dir.path().join("variable");
        fs::create_dir_all(&constant).unwrap();
        fs::create_dir_all(&variable).unwrap();
        fs::write(
            constant.join("channel.json"),
            r#"{"channel": [{"id": 1, "name": "Level"}]}"#,
        )
        .unwrap();
        fs::write(
            variable.join("data.json"),
            r#"{"data": [{"id": 1, "channel": 1, "value": 3.5}]}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_snapshot_merges_categories() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let snapshot = store.get_snapshot();
        assert_eq!(snapshot.channels().len(), 1);
        assert_eq!(snapshot.live_values()[0].value, 3.5);
        assert!(!snapshot.timestamp.is_empty());
    }

    #[test]
    fn test_snapshot_is_cached_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let first = store.get_snapshot();
        let second = store.get_snapshot();
        assert_eq!(first.timestamp, second.timestamp);
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get_snapshot().channels().len(), 1);

        store
            .with_documents(|txn| {
                let path = store.paths().channel_file();
                let mut doc = txn.read(&path)?;
                doc.insert(
                    "channel".to_string(),
                    json!([{"id": 1, "name": "Level"}, {"id": 2, "name": "Flow"}]),
                );
                txn.write(&path, &doc)
            })
            .unwrap();

        assert_eq!(store.get_snapshot().channels().len(), 2);
    }

    #[test]
    fn test_invalid_rebuild_falls_back_to_last_good() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let good = store.get_snapshot();

        // Corrupt the channel list shape on disk behind the store's back.
        fs::write(
            dir.path().join("constant").join("channel.json"),
            r#"{"channel": {"id": 1}}"#,
        )
        .unwrap();
        let file = fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("constant").join("channel.json"))
            .unwrap();
        file.set_modified(std::time::SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        let served = store.get_snapshot();
        assert_eq!(served.timestamp, good.timestamp);
        assert_eq!(served.channels().len(), 1);
    }

    #[test]
    fn test_force_reload_rebuilds() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.get_snapshot();

        fs::write(
            dir.path().join("constant").join("channel.json"),
            r#"{"channel": [{"id": 1, "name": "Level"}, {"id": 2, "name": "Flow"}]}"#,
        )
        .unwrap();
        let snapshot = store.force_reload();
        assert_eq!(snapshot.channels().len(), 2);
    }

    #[test]
    fn test_has_pending_changes_consumes_the_signal() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.get_snapshot();
        assert!(!store.has_pending_changes());

        let path = dir.path().join("variable").join("data.json");
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(std::time::SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        assert!(store.has_pending_changes());
        assert!(!store.has_pending_changes());
    }
}
