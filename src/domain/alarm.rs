// Alarm rule and event domain models
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A configured threshold range for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRule {
    #[serde(default)]
    pub min_value: f64,
    #[serde(default)]
    pub max_value: f64,
    #[serde(default)]
    pub color: String,
}

impl AlarmRule {
    /// Inclusive on both ends.
    pub fn matches(&self, value: f64) -> bool {
        self.min_value <= value && value <= self.max_value
    }
}

/// A detected threshold breach. Derived, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmEvent {
    pub channel_id: i64,
    pub channel_name: String,
    pub value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub color: String,
    pub timestamp: String,
}

/// One top-level group of the free-form alarm document.
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmGroup {
    pub channel_id: i64,
    #[serde(default)]
    pub alarms: Vec<AlarmRule>,
}

/// Extract the rule groups from the alarm document, skipping anything that
/// does not look like one (the document also carries settings blocks such as
/// `deviceSettings`).
pub fn rule_groups(alarm_doc: &serde_json::Map<String, Value>) -> Vec<AlarmGroup> {
    alarm_doc
        .values()
        .filter_map(|v| serde_json::from_value::<AlarmGroup>(v.clone()).ok())
        .collect()
}

/// All rules configured for one channel, across every group.
pub fn rules_for_channel(groups: &[AlarmGroup], channel_id: i64) -> Vec<&AlarmRule> {
    groups
        .iter()
        .filter(|g| g.channel_id == channel_id)
        .flat_map(|g| g.alarms.iter())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_is_inclusive() {
        let rule = AlarmRule {
            min_value: 10.0,
            max_value: 50.0,
            color: "#FF0000".to_string(),
        };
        assert!(rule.matches(10.0));
        assert!(rule.matches(30.0));
        assert!(rule.matches(50.0));
        assert!(!rule.matches(9.99));
        assert!(!rule.matches(51.0));
    }

    #[test]
    fn test_rule_groups_skip_settings_blocks() {
        let doc = json!({
            "parameter1": {
                "channel_id": 1,
                "alarminfo": "High level",
                "alarms": [{"min_value": 10.0, "max_value": 50.0, "color": "#FF0000"}]
            },
            "deviceSettings": {"dataPostFrequency": 1000}
        });
        let groups = rule_groups(doc.as_object().unwrap());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].channel_id, 1);
        assert_eq!(groups[0].alarms.len(), 1);
    }

    #[test]
    fn test_rules_for_channel_spans_groups() {
        let doc = json!({
            "parameter1": {
                "channel_id": 2,
                "alarms": [{"min_value": 0.0, "max_value": 5.0, "color": "#FFAA00"}]
            },
            "parameter2": {
                "channel_id": 2,
                "alarms": [{"min_value": 90.0, "max_value": 100.0, "color": "#FF0000"}]
            },
            "parameter3": {
                "channel_id": 3,
                "alarms": [{"min_value": 0.0, "max_value": 1.0, "color": "#00FF00"}]
            }
        });
        let groups = rule_groups(doc.as_object().unwrap());
        assert_eq!(rules_for_channel(&groups, 2).len(), 2);
        assert_eq!(rules_for_channel(&groups, 3).len(), 1);
        assert!(rules_for_channel(&groups, 4).is_empty());
    }
}
