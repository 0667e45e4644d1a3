// Time-series log - bounded, deduplicated per-channel history
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::application::store::TelemetryStore;
use crate::domain::channel::LiveValue;
use crate::domain::errors::StoreError;
use crate::domain::log::{
    epoch_to_timestamp, format_timestamp, parse_timestamp, ChannelLog, LogEntry,
};
use crate::domain::snapshot::Document;
use crate::infrastructure::document_store;

/// Retention cap per channel; the oldest entry is evicted first.
const MAX_LOG_ENTRIES: usize = 50;

#[derive(Clone)]
pub struct LogService {
    store: Arc<TelemetryStore>,
}

impl LogService {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self { store }
    }

    /// Append one sample. The timestamp defaults to now (UTC).
    pub fn append(
        &self,
        channel_id: i64,
        value: f64,
        timestamp: Option<String>,
    ) -> Result<(), StoreError> {
        self.store.with_documents(|txn| {
            let path = self.store.paths().logs_file();
            let mut doc = txn.read(&path)?;
            let mut logs = logs_map(&doc);

            let mut log = self.channel_log(&logs, channel_id);
            let entry = LogEntry {
                id: log.next_entry_id(),
                timestamp: timestamp.unwrap_or_else(|| format_timestamp(Utc::now())),
                value,
                min_value: value,
                max_value: value,
            };
            log.data.push(entry);
            enforce_cap(&mut log.data);

            save_channel_log(&mut logs, &log)?;
            doc.insert("logs".to_string(), Value::Object(logs));
            txn.write(&path, &doc)
        })
    }

    /// Bulk-sync append: derive a sample from a live value and append it only
    /// if it is not a duplicate. Returns whether anything was written.
    pub fn append_from_live(&self, live: &LiveValue) -> Result<bool, StoreError> {
        self.store.with_documents(|txn| {
            let path = self.store.paths().logs_file();
            let mut doc = txn.read(&path)?;
            let mut logs = logs_map(&doc);

            if !self.append_candidate(&mut logs, live) {
                return Ok(false);
            }

            doc.insert("logs".to_string(), Value::Object(logs));
            txn.write(&path, &doc)?;
            Ok(true)
        })
    }

    /// Run every live value through the dedup append in one pass. Returns how
    /// many samples were actually added.
    pub fn sync_from_live(&self) -> Result<usize, StoreError> {
        let live_values = self.live_values();
        self.store.with_documents(|txn| {
            let path = self.store.paths().logs_file();
            let mut doc = txn.read(&path)?;
            let mut logs = logs_map(&doc);

            let mut appended = 0;
            for live in &live_values {
                if self.append_candidate(&mut logs, live) {
                    appended += 1;
                }
            }

            if appended > 0 {
                doc.insert("logs".to_string(), Value::Object(logs));
                txn.write(&path, &doc)?;
                tracing::debug!("synced {} live samples into the log", appended);
            }
            Ok(appended)
        })
    }

    /// Range-filtered history for one channel. `None` means the channel has
    /// never logged anything. Bounds are inclusive; entries whose stored
    /// timestamp cannot be parsed are retained rather than dropped.
    pub fn query(
        &self,
        channel_id: i64,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Option<ChannelLog> {
        let doc = document_store::read_or_default(&self.store.paths().logs_file());
        let logs = logs_map(&doc);
        let mut log: ChannelLog = logs
            .get(&channel_key(channel_id))
            .and_then(|v| serde_json::from_value(v.clone()).ok())?;

        let start = parse_bound(start);
        let end = parse_bound(end);
        if start.is_none() && end.is_none() {
            return Some(log);
        }

        log.data.retain(|entry| {
            let Some(t) = parse_timestamp(&entry.timestamp) else {
                return true;
            };
            start.is_none_or(|s| t >= s) && end.is_none_or(|e| t <= e)
        });
        Some(log)
    }

    /// Recompute every channel's min/max from its full history (falling back
    /// to the current reading when there is none) and persist the result into
    /// the live-value document. Read-triggered write: this is part of the
    /// live-value read path.
    pub fn refresh_min_max(&self) -> Result<Vec<LiveValue>, StoreError> {
        self.store.with_documents(|txn| {
            let data_path = self.store.paths().data_file();
            let mut data_doc = txn.read(&data_path)?;
            let logs = logs_map(&txn.read(&self.store.paths().logs_file())?);

            let mut entries = data_doc
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for entry in entries.iter_mut() {
                let Some(obj) = entry.as_object_mut() else {
                    continue;
                };
                let channel = obj.get("channel").and_then(Value::as_i64).unwrap_or(0);
                let current = obj.get("value").and_then(Value::as_f64).unwrap_or(0.0);

                let history: Vec<f64> = logs
                    .get(&channel_key(channel))
                    .and_then(|v| serde_json::from_value::<ChannelLog>(v.clone()).ok())
                    .map(|log| log.data.iter().map(|e| e.value).collect())
                    .unwrap_or_default();

                let (min, max) = if history.is_empty() {
                    (current, current)
                } else {
                    (
                        history.iter().copied().fold(f64::INFINITY, f64::min),
                        history.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    )
                };
                obj.insert("min_value".to_string(), min.into());
                obj.insert("max_value".to_string(), max.into());
            }

            data_doc.insert("data".to_string(), Value::Array(entries.clone()));
            txn.write(&data_path, &data_doc)?;

            Ok(entries
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect())
        })
    }

    /// Dedup-append one candidate into the in-memory logs mapping. True when
    /// the entry was added.
    fn append_candidate(&self, logs: &mut Document, live: &LiveValue) -> bool {
        let mut log = self.channel_log(logs, live.channel);
        let candidate = LogEntry {
            id: log.next_entry_id(),
            timestamp: epoch_to_timestamp(live.value_timestamp),
            value: live.value,
            min_value: live.min_value,
            max_value: live.max_value,
        };

        if log.data.iter().any(|e| e.same_sample(&candidate)) {
            return false;
        }

        log.data.push(candidate);
        enforce_cap(&mut log.data);
        if save_channel_log(logs, &log).is_err() {
            return false;
        }
        true
    }

    fn channel_log(&self, logs: &Document, channel_id: i64) -> ChannelLog {
        logs.get(&channel_key(channel_id))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(|| ChannelLog::new(channel_id, self.channel_name(channel_id)))
    }

    fn channel_name(&self, channel_id: i64) -> String {
        let doc = document_store::read_or_default(&self.store.paths().channel_file());
        doc.get("channel")
            .and_then(Value::as_array)
            .and_then(|channels| {
                channels
                    .iter()
                    .find(|c| c.get("id").and_then(Value::as_i64) == Some(channel_id))
            })
            .and_then(|c| c.get("name").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }

    fn live_values(&self) -> Vec<LiveValue> {
        let doc = document_store::read_or_default(&self.store.paths().data_file());
        doc.get("data")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn channel_key(channel_id: i64) -> String {
    format!("channel_{channel_id}")
}

fn logs_map(doc: &Document) -> Document {
    doc.get("logs")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn save_channel_log(logs: &mut Document, log: &ChannelLog) -> Result<(), StoreError> {
    let value = serde_json::to_value(log).map_err(|e| StoreError::Validation(e.to_string()))?;
    logs.insert(channel_key(log.channel_id), value);
    Ok(())
}

fn enforce_cap(data: &mut Vec<LogEntry>) {
    while data.len() > MAX_LOG_ENTRIES {
        data.remove(0);
    }
}

fn parse_bound(bound: Option<&str>) -> Option<chrono::DateTime<Utc>> {
    let raw = bound?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        tracing::warn!("ignoring unparsable log query bound '{}'", raw);
    }
    parsed
}
