//! Telemetry record codec
//!
//! Converts a raw `(topic, payload)` pair into a typed time-series record.
//! Only topics listed in the [`SeriesTable`] map to known series; the payload
//! is parsed as a floating-point number and the record timestamp is assigned
//! at decode time (arrival time), not extracted from the payload.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A raw inbound telemetry message
///
/// Produced once per broker callback invocation and duplicated (not shared)
/// into the fan-out and persistence paths. Cheap to clone: the payload is
/// reference-counted via `Bytes`.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,
    /// Raw payload bytes
    pub payload: Bytes,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Decode the payload into a time-series record
    ///
    /// The timestamp is the arrival time (`Utc::now()`). Fails if the payload
    /// is not a UTF-8 encoded floating-point number.
    pub fn decode(&self) -> Result<TimeSeriesRecord, DecodeError> {
        let text = std::str::from_utf8(&self.payload).map_err(|_| DecodeError::NotUtf8 {
            topic: self.topic.clone(),
        })?;

        let payload = text
            .trim()
            .parse::<f64>()
            .map_err(|_| DecodeError::NotNumeric {
                topic: self.topic.clone(),
                payload: text.chars().take(32).collect(),
            })?;

        Ok(TimeSeriesRecord {
            payload,
            timestamp: Utc::now(),
        })
    }

    /// Serialize the message as the JSON text frame sent to live subscribers
    pub fn wire_frame(&self) -> String {
        serde_json::json!({
            "topic": self.topic,
            "payload": String::from_utf8_lossy(&self.payload),
        })
        .to_string()
    }
}

/// A persisted telemetry measurement
///
/// One logical series per topic name, stored in a topic-named partition.
/// Never updated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// Decoded numeric payload
    pub payload: f64,
    /// Arrival timestamp (RFC3339 on the wire)
    pub timestamp: DateTime<Utc>,
}

/// Error decoding an inbound payload
#[derive(Debug, Clone)]
pub enum DecodeError {
    /// Payload is not valid UTF-8
    NotUtf8 { topic: String },
    /// Payload is not a parseable number
    NotNumeric { topic: String, payload: String },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::NotUtf8 { topic } => {
                write!(f, "Payload on topic {:?} is not valid UTF-8", topic)
            }
            DecodeError::NotNumeric { topic, payload } => {
                write!(f, "Payload {:?} on topic {:?} is not a number", payload, topic)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// The fixed set of topic names that map to known series
///
/// Names double as partition identifiers in the store, so they are validated
/// at construction: ASCII alphanumeric or `_`, starting with a letter.
#[derive(Debug, Clone)]
pub struct SeriesTable {
    names: Vec<String>,
}

impl SeriesTable {
    /// Create a series table from topic names
    ///
    /// Returns [`Error::InvalidSeriesName`] if a name is empty or not a safe
    /// partition identifier.
    pub fn new<I, S>(names: I) -> crate::error::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for name in names {
            let name = name.into();
            if !is_valid_name(&name) {
                return Err(Error::InvalidSeriesName(name));
            }
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Ok(Self { names: out })
    }

    /// Whether a topic maps to a known series
    pub fn contains(&self, topic: &str) -> bool {
        self.names.iter().any(|n| n == topic)
    }

    /// The known series names, in registration order
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for SeriesTable {
    fn default() -> Self {
        Self {
            names: vec!["temperature".to_string(), "humidity".to_string()],
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_numeric_payload() {
        let msg = InboundMessage::new("temperature", "23.5");
        let record = msg.decode().unwrap();

        assert_eq!(record.payload, 23.5);
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let msg = InboundMessage::new("humidity", " 47.25\n");
        let record = msg.decode().unwrap();

        assert_eq!(record.payload, 47.25);
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        let msg = InboundMessage::new("temperature", "not-a-number");
        let err = msg.decode().unwrap_err();

        assert!(matches!(err, DecodeError::NotNumeric { .. }));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let msg = InboundMessage::new("temperature", vec![0xff, 0xfe]);
        let err = msg.decode().unwrap_err();

        assert!(matches!(err, DecodeError::NotUtf8 { .. }));
    }

    #[test]
    fn test_decode_assigns_arrival_timestamp() {
        let before = Utc::now();
        let record = InboundMessage::new("temperature", "1.0").decode().unwrap();
        let after = Utc::now();

        assert!(record.timestamp >= before && record.timestamp <= after);
    }

    #[test]
    fn test_wire_frame_round_trips_as_json() {
        let msg = InboundMessage::new("temperature", "23.5");
        let value: serde_json::Value = serde_json::from_str(&msg.wire_frame()).unwrap();

        assert_eq!(value["topic"], "temperature");
        assert_eq!(value["payload"], "23.5");
    }

    #[test]
    fn test_series_table_defaults() {
        let table = SeriesTable::default();

        assert!(table.contains("temperature"));
        assert!(table.contains("humidity"));
        assert!(!table.contains("pressure"));
    }

    #[test]
    fn test_series_table_rejects_unsafe_names() {
        assert!(SeriesTable::new(["ok_name"]).is_ok());
        assert!(SeriesTable::new([""]).is_err());
        assert!(SeriesTable::new(["1starts_with_digit"]).is_err());
        assert!(SeriesTable::new(["has space"]).is_err());
        assert!(SeriesTable::new(["drop;table"]).is_err());
    }

    #[test]
    fn test_series_table_deduplicates() {
        let table = SeriesTable::new(["a", "b", "a"]).unwrap();

        assert_eq!(table.names().len(), 2);
    }

    #[test]
    fn test_record_serializes_rfc3339() {
        use chrono::TimeZone;

        let record = TimeSeriesRecord {
            payload: 1.5,
            timestamp: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(record).unwrap();

        assert_eq!(json["payload"], 1.5);
        assert_eq!(json["timestamp"], "2022-01-01T00:00:00Z");
    }
}
