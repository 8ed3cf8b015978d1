//! Raw telemetry -> fixed-length ordered numeric vectors, bit-compatible
//! with the representation the models were trained on.

mod fit;
mod normalize;

use crate::telemetry::Modality;
use serde::{Deserialize, Serialize};

pub use fit::{fit_modality, fit_protocol_table, FitError};
pub use normalize::{hash_identifier, Normalizer, NormalizeError, ID_HASH_SPACE};

/// Feature order the raw-feature map produces for network records. The
/// fitted scaler records its own copy; the two must agree name-for-name.
pub const NETWORK_FEATURES: [&str; 5] = ["protocol", "src_ip", "dest_ip", "src_port", "dest_port"];

/// Feature order for process records, in wire naming.
pub const PROCESS_FEATURES: [&str; 16] = [
    "process_id",
    "virtual_size",
    "resident_size",
    "priority",
    "syscalls_unix",
    "syscalls_mach",
    "faults",
    "pageins",
    "cow_faults",
    "messages_sent",
    "messages_received",
    "csw",
    "threadnum",
    "numrunning",
    "process_name",
    "path",
];

/// Fixed-length model input for one record. Length always equals the
/// encoder input width for the vector's modality (enforced when the
/// registry is loaded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub modality: Modality,
    pub values: Vec<f32>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}
