//! Fit-mode normalization: batch records -> scaling parameters. This is the
//! offline half of the contract the streaming path depends on; both halves
//! share one raw-feature mapping.

use super::{Normalizer, NETWORK_FEATURES, PROCESS_FEATURES};
use crate::scaling::{CategoricalTable, ScalingParameters};
use crate::telemetry::{Modality, TelemetryRecord};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("no {modality} records in the fitting window")]
    NoRecords { modality: &'static str },
}

/// Fit the protocol code table over every network record in the batch.
pub fn fit_protocol_table(records: &[TelemetryRecord]) -> CategoricalTable {
    let labels = records.iter().filter_map(|r| match r {
        TelemetryRecord::Network(n) => n.protocol.clone(),
        TelemetryRecord::Process(_) => None,
    });
    CategoricalTable::fit("protocol", labels)
}

/// Fit center (mean) and scale (population standard deviation) for one
/// modality. Constant features get scale 1.0 so the loaded parameters
/// always pass the nonzero-scale invariant.
pub fn fit_modality(
    records: &[TelemetryRecord],
    modality: Modality,
    version: &str,
    protocol_codes: &CategoricalTable,
) -> Result<ScalingParameters, FitError> {
    let feature_names: Vec<String> = match modality {
        Modality::Network => NETWORK_FEATURES.iter().map(|s| s.to_string()).collect(),
        Modality::Process => PROCESS_FEATURES.iter().map(|s| s.to_string()).collect(),
    };

    let normalizer = Normalizer::new(protocol_codes.clone());
    let rows: Vec<Vec<f64>> = records
        .iter()
        .filter(|r| r.modality() == modality)
        .map(|r| {
            let raw = normalizer.raw_features(r);
            feature_names
                .iter()
                .map(|name| raw.get(name.as_str()).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    if rows.is_empty() {
        return Err(FitError::NoRecords {
            modality: modality.as_str(),
        });
    }

    let n = rows.len() as f64;
    let dim = feature_names.len();
    let mut center = vec![0.0f64; dim];
    for row in &rows {
        for (c, v) in center.iter_mut().zip(row) {
            *c += v;
        }
    }
    for c in center.iter_mut() {
        *c /= n;
    }

    let mut scale = vec![0.0f64; dim];
    for row in &rows {
        for i in 0..dim {
            let d = row[i] - center[i];
            scale[i] += d * d;
        }
    }
    for s in scale.iter_mut() {
        *s = (*s / n).sqrt();
        if *s == 0.0 {
            *s = 1.0;
        }
    }

    info!(
        modality = modality.as_str(),
        records = rows.len(),
        features = dim,
        version,
        "fitted scaling parameters"
    );

    Ok(ScalingParameters {
        version: version.to_string(),
        modality,
        feature_names,
        center,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::NetworkRecord;

    fn network(protocol: &str, src_port: u16) -> TelemetryRecord {
        TelemetryRecord::Network(NetworkRecord {
            protocol: Some(protocol.into()),
            src_ip: Some("10.0.0.5".into()),
            dest_ip: Some("10.0.0.9".into()),
            src_port: Some(src_port),
            dest_port: Some(80),
            ..Default::default()
        })
    }

    #[test]
    fn fits_mean_and_std() {
        let records = vec![network("TCP", 100), network("TCP", 300)];
        let table = fit_protocol_table(&records);
        let params = fit_modality(&records, Modality::Network, "v1", &table).unwrap();
        params.validate().unwrap();

        let port_idx = params.feature_names.iter().position(|f| f == "src_port").unwrap();
        assert_eq!(params.center[port_idx], 200.0);
        assert_eq!(params.scale[port_idx], 100.0);
    }

    #[test]
    fn constant_features_get_unit_scale() {
        let records = vec![network("TCP", 100), network("TCP", 100)];
        let table = fit_protocol_table(&records);
        let params = fit_modality(&records, Modality::Network, "v1", &table).unwrap();
        // Every feature is constant across the two identical records.
        assert!(params.scale.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn fitting_mean_record_normalizes_to_zero() {
        let records = vec![network("TCP", 200), network("TCP", 200)];
        let table = fit_protocol_table(&records);
        let params = fit_modality(&records, Modality::Network, "v1", &table).unwrap();
        let normalizer = Normalizer::new(table);
        let vector = normalizer.normalize(&records[0], &params).unwrap();
        assert!(vector.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn empty_window_is_an_error() {
        let table = CategoricalTable::fit("protocol", std::iter::empty::<String>());
        assert!(matches!(
            fit_modality(&[], Modality::Process, "v1", &table),
            Err(FitError::NoRecords { .. })
        ));
    }
}
