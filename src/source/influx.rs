//! InfluxDB adapter: fetch records in a trailing time range for fitting.
//! Query failures degrade to an empty result with a logged warning; the
//! batch path decides what an empty window means.

use crate::config::SourceConfig;
use crate::telemetry::{NetworkRecord, ProcessRecord, TelemetryRecord};
use influxdb2::models::Query;
use influxdb2::{Client, FromDataPoint};
use tracing::warn;

const NETWORK_MEASUREMENT: &str = "network_connections";
const PROCESS_MEASUREMENT: &str = "process_activity";

const NETWORK_COLUMNS: [&str; 7] = [
    "_time", "protocol", "src_ip", "dest_ip", "src_port", "dest_port", "device",
];
const PROCESS_COLUMNS: [&str; 18] = [
    "_time",
    "device",
    "process_id",
    "process_name",
    "path",
    "virtual_size",
    "resident_size",
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
    "priority",
];

#[derive(Debug, Default, FromDataPoint)]
struct NetworkRow {
    protocol: String,
    src_ip: String,
    dest_ip: String,
    src_port: i64,
    dest_port: i64,
    device: String,
}

#[derive(Debug, Default, FromDataPoint)]
struct ProcessRow {
    device: String,
    process_id: i64,
    process_name: String,
    path: String,
    virtual_size: i64,
    resident_size: i64,
    syscalls_unix: i64,
    syscalls_mach: i64,
    faults: i64,
    pageins: i64,
    cow_faults: i64,
    messages_sent: i64,
    messages_received: i64,
    csw: i64,
    threadnum: i64,
    numrunning: i64,
    priority: i64,
}

/// Flux query over one measurement: trailing range, pivot fields to
/// columns, keep only what the schema needs.
fn range_query(bucket: &str, days: u32, measurement: &str, columns: &[&str]) -> String {
    let keep = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"from(bucket: "{bucket}")
    |> range(start: -{days}d)
    |> filter(fn: (r) => r["_measurement"] == "{measurement}")
    |> pivot(rowKey:["_time"], columnKey: ["_field"], valueColumn: "_value")
    |> keep(columns: [{keep}])"#
    )
}

pub struct HistoricalSource {
    client: Client,
    network_bucket: String,
    process_bucket: String,
}

impl HistoricalSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            client: Client::new(&config.url, &config.org, &config.token),
            network_bucket: config.network_bucket.clone(),
            process_bucket: config.process_bucket.clone(),
        }
    }

    pub async fn network_records(&self, days: u32) -> Vec<TelemetryRecord> {
        let flux = range_query(&self.network_bucket, days, NETWORK_MEASUREMENT, &NETWORK_COLUMNS);
        let rows: Vec<NetworkRow> = match self.client.query(Some(Query::new(flux))).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(bucket = %self.network_bucket, error = %e, "network query failed, continuing with empty window");
                Vec::new()
            }
        };
        rows.into_iter()
            .map(|r| {
                TelemetryRecord::Network(NetworkRecord {
                    protocol: Some(r.protocol),
                    src_ip: Some(r.src_ip),
                    dest_ip: Some(r.dest_ip),
                    src_port: Some(r.src_port.clamp(0, u16::MAX as i64) as u16),
                    dest_port: Some(r.dest_port.clamp(0, u16::MAX as i64) as u16),
                    device: Some(r.device),
                    timestamp: None,
                })
            })
            .collect()
    }

    pub async fn process_records(&self, days: u32) -> Vec<TelemetryRecord> {
        let flux = range_query(&self.process_bucket, days, PROCESS_MEASUREMENT, &PROCESS_COLUMNS);
        let rows: Vec<ProcessRow> = match self.client.query(Some(Query::new(flux))).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(bucket = %self.process_bucket, error = %e, "process query failed, continuing with empty window");
                Vec::new()
            }
        };
        rows.into_iter()
            .map(|r| {
                TelemetryRecord::Process(ProcessRecord {
                    process_id: r.process_id.clamp(0, u32::MAX as i64) as u32,
                    process_name: Some(r.process_name),
                    path: Some(r.path),
                    virtual_size: r.virtual_size.max(0) as u64,
                    resident_size: r.resident_size.max(0) as u64,
                    priority: r.priority as i32,
                    syscalls_unix: r.syscalls_unix,
                    syscalls_mach: r.syscalls_mach,
                    faults: r.faults,
                    pageins: r.pageins,
                    cow_faults: r.cow_faults,
                    messages_sent: r.messages_sent,
                    messages_received: r.messages_received,
                    context_switches: r.csw,
                    thread_count: r.threadnum,
                    running_count: r.numrunning,
                    device: Some(r.device),
                    timestamp: None,
                })
            })
            .collect()
    }
}
