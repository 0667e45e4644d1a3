// Historical log domain models
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage format of log timestamps: naive ISO-8601, read as UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn epoch_to_timestamp(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(format_timestamp)
        .unwrap_or_else(|| format_timestamp(Utc::now()))
}

/// Parse a stored timestamp or a query bound. Naive values are interpreted as
/// UTC; a bare date means midnight.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}

/// One retained sample for a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: String,
    pub value: f64,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default)]
    pub max_value: f64,
}

impl LogEntry {
    /// Sample identity used for deduplication; the id is bookkeeping, not data.
    pub fn same_sample(&self, other: &LogEntry) -> bool {
        self.value == other.value
            && self.timestamp == other.timestamp
            && self.min_value == other.min_value
            && self.max_value == other.max_value
    }
}

/// The per-channel history as stored in logs.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelLog {
    pub channel_id: i64,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub data: Vec<LogEntry>,
}

impl ChannelLog {
    pub fn new(channel_id: i64, channel_name: String) -> Self {
        Self {
            channel_id,
            channel_name,
            data: Vec::new(),
        }
    }

    pub fn next_entry_id(&self) -> i64 {
        self.data.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, value: f64, timestamp: &str) -> LogEntry {
        LogEntry {
            id,
            timestamp: timestamp.to_string(),
            value,
            min_value: 0.0,
            max_value: 0.0,
        }
    }

    #[test]
    fn test_same_sample_ignores_id() {
        let a = entry(1, 21.5, "2025-03-01T10:00:00");
        let b = entry(9, 21.5, "2025-03-01T10:00:00");
        assert!(a.same_sample(&b));
    }

    #[test]
    fn test_same_sample_detects_field_change() {
        let a = entry(1, 21.5, "2025-03-01T10:00:00");
        let mut b = a.clone();
        b.max_value = 30.0;
        assert!(!a.same_sample(&b));
    }

    #[test]
    fn test_next_entry_id() {
        let mut log = ChannelLog::new(1, "Level".to_string());
        assert_eq!(log.next_entry_id(), 1);
        log.data.push(entry(4, 1.0, "2025-03-01T10:00:00"));
        assert_eq!(log.next_entry_id(), 5);
    }

    #[test]
    fn test_parse_naive_timestamp_as_utc() {
        let t = parse_timestamp("2025-03-01T10:30:00").unwrap();
        assert_eq!(format_timestamp(t), "2025-03-01T10:30:00");
    }

    #[test]
    fn test_parse_offset_timestamp_converts() {
        let t = parse_timestamp("2025-03-01T10:30:00+03:00").unwrap();
        assert_eq!(format_timestamp(t), "2025-03-01T07:30:00");
    }

    #[test]
    fn test_parse_bare_date_is_midnight() {
        let t = parse_timestamp("2025-03-01").unwrap();
        assert_eq!(format_timestamp(t), "2025-03-01T00:00:00");
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_epoch_round_trip() {
        assert_eq!(epoch_to_timestamp(0), "1970-01-01T00:00:00");
    }
}
