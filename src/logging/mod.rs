//! Structured logging for the pipeline: drops, alerts, and startup
//! diagnostics all land in the same ndjson stream.

mod format;

pub use format::StructuredLogger;
