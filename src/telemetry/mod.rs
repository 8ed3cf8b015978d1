//! Telemetry record types shared by the batch and streaming paths.
//! Wire field names follow the device agents (`csw`, `threadnum`, `numrunning`).

mod envelope;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use envelope::{decode_event, DecodeError, DecodedEvent, EventHeader, UNKNOWN_DEVICE};

/// Telemetry kind the pipeline reasons about independently before fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    Network,
    Process,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Network => "Network",
            Modality::Process => "Process",
        }
    }
}

/// One record from either source, immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryRecord {
    Network(NetworkRecord),
    Process(ProcessRecord),
}

impl TelemetryRecord {
    pub fn modality(&self) -> Modality {
        match self {
            TelemetryRecord::Network(_) => Modality::Network,
            TelemetryRecord::Process(_) => Modality::Process,
        }
    }

    pub fn device(&self) -> Option<&str> {
        match self {
            TelemetryRecord::Network(r) => r.device.as_deref(),
            TelemetryRecord::Process(r) => r.device.as_deref(),
        }
    }

    /// Attach the envelope-level identity and time to a decoded payload.
    pub(crate) fn with_context(mut self, device: String, ts: DateTime<Utc>) -> Self {
        match &mut self {
            TelemetryRecord::Network(r) => {
                r.device = Some(device);
                r.timestamp = Some(ts);
            }
            TelemetryRecord::Process(r) => {
                r.device = Some(device);
                r.timestamp = Some(ts);
            }
        }
        self
    }
}

/// A network connection observation. String identity fields stay optional:
/// absence is filled with zero during normalization, never rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub src_ip: Option<String>,
    #[serde(default)]
    pub dest_ip: Option<String>,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dest_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A process activity sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRecord {
    #[serde(default)]
    pub process_id: u32,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub virtual_size: u64,
    #[serde(default)]
    pub resident_size: u64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub syscalls_unix: i64,
    #[serde(default)]
    pub syscalls_mach: i64,
    #[serde(default)]
    pub faults: i64,
    #[serde(default)]
    pub pageins: i64,
    #[serde(default)]
    pub cow_faults: i64,
    #[serde(default)]
    pub messages_sent: i64,
    #[serde(default)]
    pub messages_received: i64,
    #[serde(default, rename = "csw")]
    pub context_switches: i64,
    #[serde(default, rename = "threadnum")]
    pub thread_count: i64,
    #[serde(default, rename = "numrunning")]
    pub running_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
