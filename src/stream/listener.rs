//! Consume loop and the per-event pipeline it drives. One event runs to a
//! terminal outcome before the next is taken; a bad record is dropped and
//! logged, never allowed to stall the stream.

use super::{AlertEvent, AlertPublisher, DropReason, EventOutcome, TransportError};
use crate::config::BusConfig;
use crate::context::{ContextHandle, RuntimeContext};
use crate::telemetry::decode_event;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Run one event through decode -> classify -> normalize -> score -> decide.
/// Pure with respect to the pipeline: no event-to-event memory, so identical
/// inputs always produce identical scores. The threshold comparison is
/// strictly greater-than; a score equal to the threshold is suppressed.
pub fn process_event(
    ctx: &RuntimeContext,
    threshold: f32,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
) -> EventOutcome {
    let device_of = |key: Option<&[u8]>| {
        key.map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_else(|| crate::telemetry::UNKNOWN_DEVICE.to_string())
    };

    let decoded = match decode_event(key, payload) {
        Ok(d) => d,
        Err(e) => {
            return EventOutcome::Dropped {
                device: device_of(key),
                reason: DropReason::Decode(e),
            }
        }
    };

    let modality = decoded.record.modality();
    let params = ctx.registry.params(modality);
    let vector = match ctx.normalizer.normalize(&decoded.record, params) {
        Ok(v) => v,
        Err(e) => {
            return EventOutcome::Dropped {
                device: decoded.device,
                reason: DropReason::Normalize(e),
            }
        }
    };

    let score = match ctx.scorer.score(&vector) {
        Ok(s) => s,
        Err(e) => {
            return EventOutcome::Dropped {
                device: decoded.device,
                reason: DropReason::Inference(e),
            }
        }
    };

    if score > threshold {
        EventOutcome::Emitted(AlertEvent {
            device: decoded.device,
            timestamp: Utc::now().to_rfc3339(),
            anomaly_score: score,
            data_type: modality,
        })
    } else {
        EventOutcome::Suppressed {
            device: decoded.device,
            modality,
            score,
        }
    }
}

pub struct SentinelListener {
    consumer: StreamConsumer,
    publisher: AlertPublisher,
    ctx: ContextHandle,
    threshold: f32,
    inbound_topic: String,
}

impl SentinelListener {
    pub fn connect(
        bus: &BusConfig,
        ctx: ContextHandle,
        threshold: f32,
    ) -> Result<Self, TransportError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &bus.group_id)
            .set("bootstrap.servers", &bus.brokers)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .create()?;
        let publisher = AlertPublisher::connect(bus)?;
        Ok(Self {
            consumer,
            publisher,
            ctx,
            threshold,
            inbound_topic: bus.inbound_topic.clone(),
        })
    }

    /// Consume until the shutdown signal flips. The in-flight event always
    /// reaches a terminal state before intake stops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        self.consumer.subscribe(&[self.inbound_topic.as_str()])?;
        info!(topic = %self.inbound_topic, threshold = self.threshold, "listening for telemetry");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                message = self.consumer.recv() => match message {
                    Ok(m) => self.handle(m.key(), m.payload()).await,
                    Err(e) => {
                        // Transport-level trouble; reconnect/backoff lives in
                        // the client, the loop just keeps consuming.
                        warn!(error = %e, "bus receive failed");
                    }
                },
            }
        }

        info!("listener stopped");
        Ok(())
    }

    async fn handle(&self, key: Option<&[u8]>, payload: Option<&[u8]>) {
        let ctx = self.ctx.current();
        match process_event(&ctx, self.threshold, key, payload) {
            EventOutcome::Emitted(alert) => {
                if let Err(e) = self.publisher.publish(&alert).await {
                    warn!(device = %alert.device, error = %e, "alert publish failed");
                }
            }
            EventOutcome::Suppressed {
                device,
                modality,
                score,
            } => {
                debug!(device = %device, modality = modality.as_str(), score, "below threshold");
            }
            EventOutcome::Dropped { device, reason } => {
                warn!(device = %device, reason = %reason, "event dropped");
            }
        }
    }
}
