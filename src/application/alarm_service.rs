// Alarm evaluation and alarm-config persistence
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::application::log_service::LogService;
use crate::application::store::TelemetryStore;
use crate::domain::alarm::{rule_groups, rules_for_channel, AlarmEvent};
use crate::domain::errors::StoreError;
use crate::domain::log::format_timestamp;
use crate::domain::snapshot::Document;
use crate::infrastructure::document_store;

#[derive(Clone)]
pub struct AlarmService {
    store: Arc<TelemetryStore>,
    logs: LogService,
}

impl AlarmService {
    pub fn new(store: Arc<TelemetryStore>, logs: LogService) -> Self {
        Self { store, logs }
    }

    /// Check every live value against the configured threshold ranges.
    /// Evaluation doubles as the sampling heartbeat: each live value is run
    /// through the dedup history append before its rules are checked. Missing
    /// configuration or missing live data yields an empty result, never an
    /// error.
    pub fn evaluate(&self) -> Vec<AlarmEvent> {
        let snapshot = self.store.get_snapshot();
        let groups = rule_groups(&snapshot.alarm);
        let timestamp = format_timestamp(Utc::now());

        let mut events = Vec::new();
        for live in snapshot.live_values() {
            if let Err(e) = self.logs.append_from_live(&live) {
                tracing::warn!("heartbeat sample for channel {} not logged: {}", live.channel, e);
            }

            let channel_name = snapshot.channel_name(live.channel).unwrap_or_default();
            for rule in rules_for_channel(&groups, live.channel) {
                if rule.matches(live.value) {
                    events.push(AlarmEvent {
                        channel_id: live.channel,
                        channel_name: channel_name.clone(),
                        value: live.value,
                        min_value: rule.min_value,
                        max_value: rule.max_value,
                        color: rule.color.clone(),
                        timestamp: timestamp.clone(),
                    });
                }
            }
        }

        if !events.is_empty() {
            tracing::info!("{} alarm(s) active", events.len());
        }
        events
    }

    /// Raw alarm configuration; `None` when none has been saved yet.
    pub fn alarm_config(&self) -> Option<Document> {
        let path = self.store.paths().alarm_file();
        match document_store::read(&path) {
            Ok(doc) => Some(doc),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!("alarm config unreadable: {}", e);
                Some(Document::new())
            }
        }
    }

    /// Persist alarm configuration with merge semantics for partial updates:
    /// incoming top-level keys overwrite, except `deviceSettings`, whose
    /// sub-fields merge individually.
    pub fn save_alarm_config(&self, incoming: Document) -> Result<(), StoreError> {
        self.store.with_documents(|txn| {
            let path = self.store.paths().alarm_file();
            let mut existing = txn.read(&path)?;

            for (key, value) in incoming {
                if key == "deviceSettings" {
                    merge_device_settings(&mut existing, value);
                } else {
                    existing.insert(key, value);
                }
            }

            txn.write(&path, &existing)?;
            tracing::info!("alarm configuration saved");
            Ok(())
        })
    }
}

fn merge_device_settings(existing: &mut Document, incoming: Value) {
    let Value::Object(incoming) = incoming else {
        existing.insert("deviceSettings".to_string(), incoming);
        return;
    };
    let settings = existing
        .entry("deviceSettings".to_string())
        .or_insert_with(|| Value::Object(Document::new()));
    match settings.as_object_mut() {
        Some(settings) => settings.extend(incoming),
        None => *settings = Value::Object(incoming),
    }
}
