//! Inbound event envelope: the bus-decoding boundary where raw bytes become
//! a typed [`TelemetryRecord`] or a drop reason. Everything downstream
//! matches exhaustively on the record variant.

use super::TelemetryRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Device identity used when the message carries no key.
pub const UNKNOWN_DEVICE: &str = "unknown";

#[derive(Debug, Clone, Deserialize)]
pub struct EventHeader {
    /// Event time as epoch seconds, set by the producing device.
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    header: EventHeader,
    payload: TelemetryRecord,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Parsed as JSON but the payload is neither `Network` nor `Process`.
    #[error("payload shape is neither Network nor Process")]
    UnknownShape,
    #[error("event has no payload")]
    EmptyPayload,
}

/// A live event after decoding, with envelope context folded in.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub device: String,
    pub event_time: DateTime<Utc>,
    pub record: TelemetryRecord,
}

/// Decode one bus message. The key is the device identity; a missing key
/// falls back to the sentinel rather than rejecting the event.
pub fn decode_event(key: Option<&[u8]>, raw: Option<&[u8]>) -> Result<DecodedEvent, DecodeError> {
    let raw = raw.ok_or(DecodeError::EmptyPayload)?;
    let device = key
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());

    // Two-step parse so a syntactically valid message with an unexpected
    // payload shape is reported distinctly from garbage bytes.
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    let envelope: EventEnvelope =
        serde_json::from_value(value).map_err(|_| DecodeError::UnknownShape)?;

    let event_time = DateTime::<Utc>::from_timestamp(envelope.header.timestamp as i64, 0)
        .unwrap_or_else(Utc::now);
    let record = envelope
        .payload
        .with_context(device.clone(), event_time);

    Ok(DecodedEvent {
        device,
        event_time,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Modality;

    #[test]
    fn decodes_network_event() {
        let raw = br#"{"header":{"timestamp":1700000000},"payload":{"Network":{"protocol":"TCP","src_ip":"10.0.0.5","dest_ip":"10.0.0.9","src_port":443,"dest_port":51000}}}"#;
        let ev = decode_event(Some(b"hive-0"), Some(raw)).unwrap();
        assert_eq!(ev.device, "hive-0");
        assert_eq!(ev.record.modality(), Modality::Network);
        assert_eq!(ev.record.device(), Some("hive-0"));
    }

    #[test]
    fn missing_key_uses_sentinel() {
        let raw = br#"{"header":{"timestamp":1700000000},"payload":{"Process":{"process_id":1}}}"#;
        let ev = decode_event(None, Some(raw)).unwrap();
        assert_eq!(ev.device, UNKNOWN_DEVICE);
    }

    #[test]
    fn unknown_shape_is_its_own_error() {
        let raw = br#"{"header":{"timestamp":1700000000},"payload":{"Disk":{"reads":3}}}"#;
        match decode_event(None, Some(raw)) {
            Err(DecodeError::UnknownShape) => {}
            other => panic!("expected UnknownShape, got {:?}", other),
        }
    }

    #[test]
    fn garbage_bytes_are_malformed() {
        match decode_event(None, Some(b"not json")) {
            Err(DecodeError::Malformed(_)) => {}
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn absent_process_fields_default_to_zero() {
        let raw = br#"{"header":{"timestamp":1700000000},"payload":{"Process":{"process_id":7,"process_name":"launchd"}}}"#;
        let ev = decode_event(Some(b"d"), Some(raw)).unwrap();
        match ev.record {
            TelemetryRecord::Process(p) => {
                assert_eq!(p.process_id, 7);
                assert_eq!(p.context_switches, 0);
                assert_eq!(p.thread_count, 0);
                assert!(p.path.is_none());
            }
            _ => panic!("wrong modality"),
        }
    }
}
