// Channel and live-value domain models
use serde::{Deserialize, Serialize};

/// A logical measurement stream with its logging metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: i64,
    #[serde(default)]
    pub sub_category: i64,
    #[serde(default)]
    pub parameter: i64,
    #[serde(default)]
    pub measurement_unit: i64,
    #[serde(default = "default_log_interval")]
    pub log_interval: i64,
    #[serde(default)]
    pub offset: f64,
}

fn default_log_interval() -> i64 {
    60
}

/// The current reading and device-health fields for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveValue {
    pub id: i64,
    pub channel: i64,
    #[serde(default)]
    pub value_type: i64,
    #[serde(default)]
    pub value_timestamp: i64,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default)]
    pub max_value: f64,
    #[serde(default)]
    pub battery_percentage: i64,
    #[serde(default)]
    pub signal_strength: i64,
}

impl LiveValue {
    /// The entry a freshly created channel starts with.
    pub fn default_for_channel(id: i64, channel: i64, value_timestamp: i64) -> Self {
        Self {
            id,
            channel,
            value_type: 1,
            value_timestamp,
            value: 0.0,
            min_value: 0.0,
            max_value: 0.0,
            battery_percentage: 100,
            signal_strength: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_live_value() {
        let live = LiveValue::default_for_channel(3, 7, 1700000000);
        assert_eq!(live.channel, 7);
        assert_eq!(live.value, 0.0);
        assert_eq!(live.battery_percentage, 100);
        assert_eq!(live.signal_strength, 100);
    }

    #[test]
    fn test_channel_deserializes_with_missing_fields() {
        let channel: Channel = serde_json::from_str(r#"{"id": 2, "name": "Level"}"#).unwrap();
        assert_eq!(channel.id, 2);
        assert_eq!(channel.name, "Level");
        assert_eq!(channel.log_interval, 60);
        assert_eq!(channel.offset, 0.0);
    }
}
