// File modification bookkeeping for cache invalidation
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Tracks the modification time of every JSON file under the watched
/// directories and answers "has anything changed since the last check".
///
/// Scans are rate-limited to one per `min_interval`; between scans the cached
/// snapshot is trusted. `always_stale` short-circuits every check to `true`
/// and exists for development against files rewritten faster than the
/// interval.
pub struct ChangeTracker {
    watched: Vec<PathBuf>,
    mtimes: HashMap<PathBuf, SystemTime>,
    last_check: Option<Instant>,
    min_interval: Duration,
    always_stale: bool,
}

impl ChangeTracker {
    pub fn new(watched: Vec<PathBuf>, min_interval: Duration, always_stale: bool) -> Self {
        let mut tracker = Self {
            watched,
            mtimes: HashMap::new(),
            last_check: None,
            min_interval,
            always_stale,
        };
        tracker.rescan();
        tracker
    }

    /// True when any tracked file was modified or removed, or a new file
    /// appeared in a watched directory. Bookkeeping is updated in the same
    /// pass, so a single change is reported exactly once.
    pub fn has_changed(&mut self) -> bool {
        if self.always_stale {
            return true;
        }

        if let Some(last) = self.last_check {
            if last.elapsed() < self.min_interval {
                return false;
            }
        }
        self.last_check = Some(Instant::now());

        let mut changed = false;
        let current = self.current_files();

        for path in &current {
            let Some(mtime) = modified_time(path) else {
                continue;
            };
            match self.mtimes.get(path) {
                None => {
                    tracing::debug!("new file detected: {}", path.display());
                    self.mtimes.insert(path.clone(), mtime);
                    changed = true;
                }
                Some(recorded) if *recorded != mtime => {
                    tracing::debug!("file modified: {}", path.display());
                    self.mtimes.insert(path.clone(), mtime);
                    changed = true;
                }
                Some(_) => {}
            }
        }

        let removed: Vec<PathBuf> = self
            .mtimes
            .keys()
            .filter(|p| !current.contains(*p))
            .cloned()
            .collect();
        for path in removed {
            tracing::debug!("file removed: {}", path.display());
            self.mtimes.remove(&path);
            changed = true;
        }

        changed
    }

    /// Record the post-write mtime of a path the store itself just wrote, so
    /// the writer does not invalidate its own cache on the next check.
    pub fn note_write(&mut self, path: &Path) {
        match modified_time(path) {
            Some(mtime) => {
                self.mtimes.insert(path.to_path_buf(), mtime);
            }
            None => {
                self.mtimes.remove(path);
            }
        }
    }

    /// Rebuild the mtime map from scratch and drop the rate-limit window.
    /// Administrative reload path.
    pub fn rescan(&mut self) {
        self.mtimes.clear();
        self.last_check = None;
        for path in self.current_files() {
            if let Some(mtime) = modified_time(&path) {
                self.mtimes.insert(path, mtime);
            }
        }
    }

    fn current_files(&self) -> HashSet<PathBuf> {
        let mut files = HashSet::new();
        for dir in &self.watched {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            files.extend(
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "json")),
            );
        }
        files
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
