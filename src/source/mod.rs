//! Historical telemetry store boundary. Batch-only: the streaming path
//! never touches this module.

mod influx;

pub use influx::HistoricalSource;
