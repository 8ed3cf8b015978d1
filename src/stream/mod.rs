//! Live path: consume telemetry events, score, publish alerts.

mod listener;
mod publisher;

use crate::features::NormalizeError;
use crate::model::InferenceError;
use crate::telemetry::{DecodeError, Modality};
use serde::Serialize;
use thiserror::Error;

pub use listener::{process_event, SentinelListener};
pub use publisher::AlertPublisher;

/// Outbound alert, handed to the bus the moment it is built.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub device: String,
    /// Wall-clock emission time, ISO-8601 UTC.
    pub timestamp: String,
    pub anomaly_score: f32,
    pub data_type: Modality,
}

/// Why an event left the pipeline early. Drops are logged and the loop
/// moves on; nothing here is retried.
#[derive(Debug, Error)]
pub enum DropReason {
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("inference: {0}")]
    Inference(#[from] InferenceError),
}

/// Terminal state of one event's pass through the pipeline.
#[derive(Debug)]
pub enum EventOutcome {
    Emitted(AlertEvent),
    Suppressed {
        device: String,
        modality: Modality,
        score: f32,
    },
    Dropped {
        device: String,
        reason: DropReason,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bus error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("alert serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
