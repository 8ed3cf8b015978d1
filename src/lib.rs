//! Hive Sentinel — dual-modality streaming anomaly detection.
//!
//! Modular structure:
//! - [`telemetry`] — Record types and the bus-decoding boundary
//! - [`scaling`] — Versioned normalization parameters (registry)
//! - [`features`] — Record → fixed-order feature vector (fit + apply)
//! - [`model`] — Encoder/fusion inference and the dual-encoder scorer
//! - [`source`] — Historical store adapter (batch path)
//! - [`stream`] — Live listener and alert publisher
//! - [`context`] — Startup-built runtime context, hot-swappable as a whole
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod context;
pub mod features;
pub mod logging;
pub mod model;
pub mod scaling;
pub mod source;
pub mod stream;
pub mod telemetry;

pub use config::SentinelConfig;
pub use context::{ContextHandle, RuntimeContext, StartupError};
pub use features::{FeatureVector, Normalizer};
pub use model::DualEncoderScorer;
pub use scaling::{ScalingParameters, ScalingRegistry};
pub use stream::{AlertEvent, SentinelListener};
pub use telemetry::{Modality, TelemetryRecord};
