//! Service configuration. Read once at startup; artifacts and models are
//! validated separately and strictly, so a missing config file just means
//! the deployment defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Directory holding the versioned scaler/model bundle
    pub artifacts_dir: PathBuf,
    /// Score strictly above this raises an alert (0.0–1.0)
    pub alert_threshold: f32,
    /// Event bus endpoints
    pub bus: BusConfig,
    /// Historical store (batch/fit path only)
    pub source: SourceConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub brokers: String,
    pub inbound_topic: String,
    pub alert_topic: String,
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub org: String,
    /// Taken from INFLUX_TOKEN when empty
    pub token: String,
    pub network_bucket: String,
    pub process_bucket: String,
    /// Trailing window for fit mode (days)
    pub range_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            alert_threshold: 0.7,
            bus: BusConfig::default(),
            source: SourceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            inbound_topic: "honeypot_packets".to_string(),
            alert_topic: "anomaly_alerts".to_string(),
            group_id: "honeypot_group".to_string(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "honeypot".to_string(),
            token: String::new(),
            network_bucket: "network".to_string(),
            process_bucket: "process".to_string(),
            range_days: 7,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl SentinelConfig {
    /// Load from JSON file if present; otherwise return default. The store
    /// token may also arrive via INFLUX_TOKEN.
    pub fn load(path: &std::path::Path) -> Self {
        let mut config = Self::default();
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<SentinelConfig>(&data) {
                    config = c;
                }
            }
        }
        if config.source.token.is_empty() {
            if let Ok(token) = std::env::var("INFLUX_TOKEN") {
                config.source.token = token;
            }
        }
        config
    }
}
