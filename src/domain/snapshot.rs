// Merged snapshot of all category directories
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channel::{Channel, LiveValue};
use super::errors::StoreError;

/// A parsed JSON document: the top-level object of one file, or one merged
/// category.
pub type Document = serde_json::Map<String, Value>;

/// The merged, cached view of every category directory at a point in time.
/// Rebuilt wholesale, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    #[serde(default)]
    pub constant: Document,
    #[serde(default)]
    pub variable: Document,
    #[serde(default, rename = "semi-variable")]
    pub semi_variable: Document,
    #[serde(default)]
    pub alarm: Document,
}

impl Snapshot {
    pub fn new(
        timestamp: String,
        constant: Document,
        variable: Document,
        semi_variable: Document,
        alarm: Document,
    ) -> Self {
        Self {
            timestamp,
            constant,
            variable,
            semi_variable,
            alarm,
        }
    }

    /// Shape check on the lists the rest of the store relies on. A failure
    /// here means a caller should prefer the previous good snapshot.
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(channels) = self.constant.get("channel") {
            if !channels.is_array() {
                return Err(StoreError::Validation(
                    "constant.channel is not a list".to_string(),
                ));
            }
        }
        if let Some(data) = self.variable.get("data") {
            if !data.is_array() {
                return Err(StoreError::Validation(
                    "variable.data is not a list".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Channel definitions, skipping entries that do not deserialize.
    pub fn channels(&self) -> Vec<Channel> {
        list_of(&self.constant, "channel")
    }

    /// Live-value entries, skipping entries that do not deserialize.
    pub fn live_values(&self) -> Vec<LiveValue> {
        list_of(&self.variable, "data")
    }

    pub fn channel_name(&self, channel_id: i64) -> Option<String> {
        self.channels()
            .into_iter()
            .find(|c| c.id == channel_id)
            .map(|c| c.name)
    }
}

fn list_of<T: serde::de::DeserializeOwned>(doc: &Document, key: &str) -> Vec<T> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_accessors() {
        let snapshot = Snapshot::new(
            "2025-03-01T10:00:00".to_string(),
            doc(json!({"channel": [{"id": 1, "name": "Level"}]})),
            doc(json!({"data": [{"id": 1, "channel": 1, "value": 4.2}]})),
            Document::new(),
            Document::new(),
        );
        assert_eq!(snapshot.channels().len(), 1);
        assert_eq!(snapshot.live_values()[0].value, 4.2);
        assert_eq!(snapshot.channel_name(1).as_deref(), Some("Level"));
        assert_eq!(snapshot.channel_name(9), None);
    }

    #[test]
    fn test_validate_rejects_non_list_channel() {
        let snapshot = Snapshot::new(
            "2025-03-01T10:00:00".to_string(),
            doc(json!({"channel": {"id": 1}})),
            Document::new(),
            Document::new(),
            Document::new(),
        );
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_serializes_semi_variable_with_hyphen() {
        let snapshot = Snapshot::new(
            "2025-03-01T10:00:00".to_string(),
            Document::new(),
            Document::new(),
            Document::new(),
            Document::new(),
        );
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("semi-variable").is_some());
    }
}
