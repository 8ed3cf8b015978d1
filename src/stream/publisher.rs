//! Outbound alert topic. The producer handle is cheap to clone and safe to
//! share; alerts are keyed by device so downstream partitioning preserves
//! per-device order.

use super::{AlertEvent, TransportError};
use crate::config::BusConfig;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::info;

pub struct AlertPublisher {
    producer: FutureProducer,
    topic: String,
}

impl AlertPublisher {
    pub fn connect(bus: &BusConfig) -> Result<Self, TransportError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bus.brokers)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self {
            producer,
            topic: bus.alert_topic.clone(),
        })
    }

    pub async fn publish(&self, alert: &AlertEvent) -> Result<(), TransportError> {
        let payload = serde_json::to_string(alert)?;
        self.producer
            .send(
                FutureRecord::to(&self.topic)
                    .key(&alert.device)
                    .payload(&payload),
                Duration::from_secs(5),
            )
            .await
            .map_err(|(e, _)| TransportError::Kafka(e))?;
        info!(
            device = %alert.device,
            score = alert.anomaly_score,
            data_type = alert.data_type.as_str(),
            "alert published"
        );
        Ok(())
    }
}
