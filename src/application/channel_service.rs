// Channel registry - CRUD over channel definitions and live values
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::application::store::TelemetryStore;
use crate::domain::channel::{Channel, LiveValue};
use crate::domain::errors::StoreError;
use crate::domain::snapshot::Document;
use crate::infrastructure::document_store;

/// External (camelCase) field names and their storage names. The table is the
/// whitelist: an unknown external name is rejected.
const FIELD_MAP: [(&str, &str); 9] = [
    ("id", "id"),
    ("name", "name"),
    ("description", "description"),
    ("category", "category"),
    ("subCategory", "sub_category"),
    ("parameter", "parameter"),
    ("measurementUnit", "measurement_unit"),
    ("logInterval", "log_interval"),
    ("offset", "offset"),
];

const INT_FIELDS: [&str; 6] = [
    "id",
    "category",
    "sub_category",
    "parameter",
    "measurement_unit",
    "log_interval",
];

#[derive(Clone)]
pub struct ChannelService {
    store: Arc<TelemetryStore>,
}

impl ChannelService {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self { store }
    }

    /// Register a new channel and its paired default live value.
    pub fn create(&self, channel: Channel) -> Result<(), StoreError> {
        if channel.log_interval <= 0 {
            return Err(StoreError::invalid_value(
                "log_interval",
                "must be a positive number of seconds",
            ));
        }

        self.store.with_documents(|txn| {
            let channel_path = self.store.paths().channel_file();
            let mut channel_doc = txn.read(&channel_path)?;
            let mut channels = list_field(&channel_doc, "channel");

            if channels.iter().any(|c| id_of(c) == Some(channel.id)) {
                return Err(StoreError::DuplicateId(channel.id));
            }

            let channel_id = channel.id;
            channels.push(
                serde_json::to_value(&channel)
                    .map_err(|e| StoreError::Validation(e.to_string()))?,
            );
            channel_doc.insert("channel".to_string(), Value::Array(channels));
            txn.write(&channel_path, &channel_doc)?;

            let data_path = self.store.paths().data_file();
            let mut data_doc = txn.read(&data_path)?;
            let mut entries = list_field(&data_doc, "data");

            let next_id = entries
                .iter()
                .filter_map(id_of)
                .max()
                .unwrap_or(0)
                + 1;
            let live = LiveValue::default_for_channel(next_id, channel_id, Utc::now().timestamp());
            entries.push(
                serde_json::to_value(&live).map_err(|e| StoreError::Validation(e.to_string()))?,
            );
            data_doc.insert("data".to_string(), Value::Array(entries));
            txn.write(&data_path, &data_doc)?;

            tracing::info!("channel {} created", channel_id);
            Ok(())
        })
    }

    /// Remove a channel and every live value bound to it. History is kept for
    /// audit.
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.store.with_documents(|txn| {
            let channel_path = self.store.paths().channel_file();
            let mut channel_doc = txn.read(&channel_path)?;
            let mut channels = list_field(&channel_doc, "channel");

            let before = channels.len();
            channels.retain(|c| id_of(c) != Some(id));
            if channels.len() == before {
                return Err(StoreError::NotFound(format!("channel {id}")));
            }
            channel_doc.insert("channel".to_string(), Value::Array(channels));
            txn.write(&channel_path, &channel_doc)?;

            let data_path = self.store.paths().data_file();
            let mut data_doc = txn.read(&data_path)?;
            let mut entries = list_field(&data_doc, "data");
            entries.retain(|e| e.get("channel").and_then(Value::as_i64) != Some(id));
            data_doc.insert("data".to_string(), Value::Array(entries));
            txn.write(&data_path, &data_doc)?;

            tracing::info!("channel {} deleted", id);
            Ok(())
        })
    }

    /// Update one field, translating the external name and coercing numeric
    /// fields. A successful update invalidates the cached snapshot.
    pub fn update_field(&self, id: i64, field: &str, value: &Value) -> Result<(), StoreError> {
        let internal = FIELD_MAP
            .iter()
            .find(|(external, _)| *external == field)
            .map(|(_, internal)| *internal)
            .ok_or_else(|| StoreError::invalid_value(field, "unknown field"))?;

        let stored = if INT_FIELDS.contains(&internal) {
            Value::from(coerce_int(internal, value)?)
        } else if internal == "offset" {
            Value::from(coerce_float(internal, value)?)
        } else {
            value.clone()
        };

        self.store.with_documents(|txn| {
            let channel_path = self.store.paths().channel_file();
            let mut channel_doc = txn.read(&channel_path)?;
            let mut channels = list_field(&channel_doc, "channel");

            let target = channels
                .iter_mut()
                .find(|c| id_of(c) == Some(id))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| StoreError::NotFound(format!("channel {id}")))?;
            target.insert(internal.to_string(), stored);

            channel_doc.insert("channel".to_string(), Value::Array(channels));
            txn.write(&channel_path, &channel_doc)?;

            tracing::info!("channel {} field {} updated", id, internal);
            Ok(())
        })
    }

    pub fn get(&self, id: i64) -> Option<Channel> {
        self.list().into_iter().find(|c| c.id == id)
    }

    pub fn list(&self) -> Vec<Channel> {
        let doc = document_store::read_or_default(&self.store.paths().channel_file());
        typed_list(&doc, "channel")
    }

    pub fn live_values(&self) -> Vec<LiveValue> {
        let doc = document_store::read_or_default(&self.store.paths().data_file());
        typed_list(&doc, "data")
    }

    pub fn live_value(&self, channel_id: i64) -> Option<LiveValue> {
        self.live_values()
            .into_iter()
            .find(|v| v.channel == channel_id)
    }
}

fn list_field(doc: &Document, key: &str) -> Vec<Value> {
    doc.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn typed_list<T: serde::de::DeserializeOwned>(doc: &Document, key: &str) -> Vec<T> {
    list_field(doc, key)
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

fn id_of(value: &Value) -> Option<i64> {
    value.get("id").and_then(Value::as_i64)
}

fn coerce_int(field: &str, value: &Value) -> Result<i64, StoreError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| StoreError::invalid_value(field, "number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| StoreError::invalid_value(field, format!("'{s}' is not an integer"))),
        other => Err(StoreError::invalid_value(
            field,
            format!("expected an integer, got {other}"),
        )),
    }
}

fn coerce_float(field: &str, value: &Value) -> Result<f64, StoreError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| StoreError::invalid_value(field, "number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| StoreError::invalid_value(field, format!("'{s}' is not a number"))),
        other => Err(StoreError::invalid_value(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::StorePaths;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ChannelService {
        let store = Arc::new(TelemetryStore::new(
            StorePaths::new(dir.path()),
            Duration::ZERO,
            false,
        ));
        ChannelService::new(store)
    }

    fn sample_channel(id: i64) -> Channel {
        Channel {
            id,
            name: format!("Channel {id}"),
            description: "Water level".to_string(),
            category: 1,
            sub_category: 1,
            parameter: 1,
            measurement_unit: 1,
            log_interval: 60,
            offset: 0.0,
        }
    }

    #[test]
    fn test_create_then_get_round_trips_with_paired_live_value() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        service.create(sample_channel(4)).unwrap();

        let fetched = service.get(4).unwrap();
        assert_eq!(fetched, sample_channel(4));

        let live = service.live_value(4).unwrap();
        assert_eq!(live.value, 0.0);
        assert_eq!(live.battery_percentage, 100);
        assert_eq!(live.signal_strength, 100);
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.create(sample_channel(1)).unwrap();
        assert!(matches!(
            service.create(sample_channel(1)),
            Err(StoreError::DuplicateId(1))
        ));
        assert_eq!(service.list().len(), 1);
    }

    #[test]
    fn test_live_value_ids_are_monotonic() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.create(sample_channel(7)).unwrap();
        service.create(sample_channel(9)).unwrap();

        let ids: Vec<i64> = service.live_values().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_delete_cascades_to_live_values_only() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.create(sample_channel(1)).unwrap();
        service.create(sample_channel(2)).unwrap();

        service.delete(1).unwrap();

        assert!(service.get(1).is_none());
        assert!(service.live_value(1).is_none());
        assert!(service.get(2).is_some());
        assert!(service.live_value(2).is_some());
    }

    #[test]
    fn test_delete_missing_channel_is_not_found() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert!(matches!(
            service.delete(99),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_field_translates_and_coerces() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.create(sample_channel(4)).unwrap();

        service.update_field(4, "logInterval", &json!("60")).unwrap();
        assert_eq!(service.get(4).unwrap().log_interval, 60);

        service.update_field(4, "offset", &json!("2.5")).unwrap();
        assert_eq!(service.get(4).unwrap().offset, 2.5);

        service
            .update_field(4, "name", &json!("Downstream level"))
            .unwrap();
        assert_eq!(service.get(4).unwrap().name, "Downstream level");
    }

    #[test]
    fn test_update_field_rejects_non_numeric_input() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.create(sample_channel(4)).unwrap();
        service.update_field(4, "logInterval", &json!("60")).unwrap();

        let err = service.update_field(4, "logInterval", &json!("abc"));
        assert!(matches!(err, Err(StoreError::InvalidValue { .. })));
        assert_eq!(service.get(4).unwrap().log_interval, 60);
    }

    #[test]
    fn test_update_field_rejects_unknown_field() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.create(sample_channel(4)).unwrap();
        assert!(matches!(
            service.update_field(4, "favouriteColor", &json!("red")),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_update_field_missing_channel_is_not_found() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert!(matches!(
            service.update_field(42, "name", &json!("x")),
            Err(StoreError::NotFound(_))
        ));
    }
}
