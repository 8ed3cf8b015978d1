//! Apply-mode normalization. Deterministic and side-effect-free: the same
//! record and parameters always produce the same vector, and the feature
//! visiting order is fixed by the fitted `feature_names`.

use super::FeatureVector;
use crate::scaling::{CategoricalTable, ScalingParameters};
use crate::telemetry::{Modality, NetworkRecord, ProcessRecord, TelemetryRecord};
use std::collections::BTreeMap;
use thiserror::Error;

/// Identifier hashes are reduced into this range, matching the training job.
pub const ID_HASH_SPACE: u32 = 100_000_000;

/// Stable non-cryptographic hash for high-cardinality identifiers (IPs,
/// process names, paths). CRC32 reduced mod 10^8: the same string maps to
/// the same code in every process, on every run.
pub fn hash_identifier(s: &str) -> u32 {
    crc32fast::hash(s.as_bytes()) % ID_HASH_SPACE
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The fitted schema names a feature this record's modality never
    /// produces and no fill policy applies. Structural, not retryable.
    #[error("{modality} record lacks required feature '{feature}'")]
    SchemaMismatch {
        modality: &'static str,
        feature: String,
    },
    #[error("scaler fitted for {expected} applied to a {found} record")]
    ModalityMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Pure record -> vector transformation. Holds only the fitted categorical
/// table; scaling parameters are passed per call so the registry stays the
/// single owner.
#[derive(Debug, Clone)]
pub struct Normalizer {
    protocol_codes: CategoricalTable,
}

impl Normalizer {
    pub fn new(protocol_codes: CategoricalTable) -> Self {
        Self { protocol_codes }
    }

    /// Raw (unscaled) numeric values for every feature this record's
    /// modality produces. Fit and apply both go through here, so training
    /// and inference visit features identically.
    pub(crate) fn raw_features(&self, record: &TelemetryRecord) -> BTreeMap<&'static str, f64> {
        match record {
            TelemetryRecord::Network(r) => self.raw_network(r),
            TelemetryRecord::Process(r) => self.raw_process(r),
        }
    }

    fn raw_network(&self, r: &NetworkRecord) -> BTreeMap<&'static str, f64> {
        let mut raw = BTreeMap::new();
        // Absent or null fields fill zero. Deliberate policy: a half-empty
        // record still scores rather than being rejected.
        raw.insert(
            "protocol",
            r.protocol
                .as_deref()
                .map(|p| self.protocol_codes.code(p) as f64)
                .unwrap_or(0.0),
        );
        raw.insert(
            "src_ip",
            r.src_ip.as_deref().map(|s| hash_identifier(s) as f64).unwrap_or(0.0),
        );
        raw.insert(
            "dest_ip",
            r.dest_ip.as_deref().map(|s| hash_identifier(s) as f64).unwrap_or(0.0),
        );
        raw.insert("src_port", r.src_port.unwrap_or(0) as f64);
        raw.insert("dest_port", r.dest_port.unwrap_or(0) as f64);
        raw
    }

    fn raw_process(&self, r: &ProcessRecord) -> BTreeMap<&'static str, f64> {
        let mut raw = BTreeMap::new();
        raw.insert("process_id", r.process_id as f64);
        raw.insert("virtual_size", r.virtual_size as f64);
        raw.insert("resident_size", r.resident_size as f64);
        raw.insert("priority", r.priority as f64);
        raw.insert("syscalls_unix", r.syscalls_unix as f64);
        raw.insert("syscalls_mach", r.syscalls_mach as f64);
        raw.insert("faults", r.faults as f64);
        raw.insert("pageins", r.pageins as f64);
        raw.insert("cow_faults", r.cow_faults as f64);
        raw.insert("messages_sent", r.messages_sent as f64);
        raw.insert("messages_received", r.messages_received as f64);
        raw.insert("csw", r.context_switches as f64);
        raw.insert("threadnum", r.thread_count as f64);
        raw.insert("numrunning", r.running_count as f64);
        raw.insert(
            "process_name",
            r.process_name
                .as_deref()
                .map(|s| hash_identifier(s) as f64)
                .unwrap_or(0.0),
        );
        raw.insert(
            "path",
            r.path.as_deref().map(|s| hash_identifier(s) as f64).unwrap_or(0.0),
        );
        raw
    }

    /// Produce the model input vector for one record: encode, fill, reorder
    /// per the fitted feature order, then `(value - center) / scale`.
    /// A zero scale cannot reach this point; the registry rejects it at load.
    pub fn normalize(
        &self,
        record: &TelemetryRecord,
        params: &ScalingParameters,
    ) -> Result<FeatureVector, NormalizeError> {
        let modality = record.modality();
        if params.modality != modality {
            return Err(NormalizeError::ModalityMismatch {
                expected: params.modality.as_str(),
                found: modality.as_str(),
            });
        }

        let raw = self.raw_features(record);
        let mut values = Vec::with_capacity(params.len());
        for (i, name) in params.feature_names.iter().enumerate() {
            let raw_value =
                raw.get(name.as_str())
                    .copied()
                    .ok_or_else(|| NormalizeError::SchemaMismatch {
                        modality: modality.as_str(),
                        feature: name.clone(),
                    })?;
            values.push(((raw_value - params.center[i]) / params.scale[i]) as f32);
        }

        Ok(FeatureVector { modality, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::NETWORK_FEATURES;
    use std::collections::BTreeMap as Map;

    fn protocol_table() -> CategoricalTable {
        CategoricalTable {
            field: "protocol".into(),
            codes: Map::from([("TCP".into(), 0), ("UDP".into(), 1)]),
        }
    }

    fn network_params(center: Vec<f64>, scale: Vec<f64>) -> ScalingParameters {
        ScalingParameters {
            version: "test".into(),
            modality: Modality::Network,
            feature_names: NETWORK_FEATURES.iter().map(|s| s.to_string()).collect(),
            center,
            scale,
        }
    }

    fn sample_record() -> TelemetryRecord {
        TelemetryRecord::Network(NetworkRecord {
            protocol: Some("TCP".into()),
            src_ip: Some("10.0.0.5".into()),
            dest_ip: Some("10.0.0.9".into()),
            src_port: Some(443),
            dest_port: Some(51000),
            ..Default::default()
        })
    }

    #[test]
    fn hash_is_pinned() {
        // CRC32 mod 10^8 of known strings; these values must never change,
        // or live vectors drift from fitted ones.
        assert_eq!(hash_identifier("10.0.0.5"), 63_283_338);
        assert_eq!(hash_identifier("10.0.0.9"), 73_532_321);
        assert_eq!(hash_identifier("launchd"), 33_664_264);
        assert_eq!(hash_identifier("/usr/libexec/launchd"), 51_019_006);
    }

    #[test]
    fn hash_is_deterministic() {
        for s in ["192.168.1.77", "kernel_task", ""] {
            assert_eq!(hash_identifier(s), hash_identifier(s));
            assert!(hash_identifier(s) < ID_HASH_SPACE);
        }
    }

    #[test]
    fn scales_each_position_by_formula() {
        let normalizer = Normalizer::new(protocol_table());
        let center = vec![1.0, 100.0, 200.0, 40.0, 1000.0];
        let scale = vec![2.0, 10.0, 50.0, 4.0, 1000.0];
        let params = network_params(center.clone(), scale.clone());

        let vector = normalizer.normalize(&sample_record(), &params).unwrap();
        assert_eq!(vector.len(), 5);

        let raw = [
            0.0, // TCP
            hash_identifier("10.0.0.5") as f64,
            hash_identifier("10.0.0.9") as f64,
            443.0,
            51000.0,
        ];
        for i in 0..5 {
            let expected = ((raw[i] - center[i]) / scale[i]) as f32;
            assert_eq!(vector.values[i], expected, "feature {}", NETWORK_FEATURES[i]);
        }
    }

    #[test]
    fn missing_optional_fields_fill_zero() {
        let normalizer = Normalizer::new(protocol_table());
        let params = network_params(vec![0.0; 5], vec![1.0; 5]);
        let record = TelemetryRecord::Network(NetworkRecord::default());
        let vector = normalizer.normalize(&record, &params).unwrap();
        assert_eq!(vector.values, vec![0.0; 5]);
    }

    #[test]
    fn unseen_protocol_takes_fallback_code() {
        let normalizer = Normalizer::new(protocol_table());
        let params = network_params(vec![0.0; 5], vec![1.0; 5]);
        let record = TelemetryRecord::Network(NetworkRecord {
            protocol: Some("SCTP".into()),
            ..Default::default()
        });
        let vector = normalizer.normalize(&record, &params).unwrap();
        assert_eq!(vector.values[0], 2.0);
    }

    #[test]
    fn unknown_feature_name_is_schema_mismatch() {
        let normalizer = Normalizer::new(protocol_table());
        let mut params = network_params(vec![0.0; 5], vec![1.0; 5]);
        params.feature_names[4] = "ttl".into();
        let err = normalizer.normalize(&sample_record(), &params).unwrap_err();
        match err {
            NormalizeError::SchemaMismatch { feature, .. } => assert_eq!(feature, "ttl"),
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn modality_disagreement_is_rejected() {
        let normalizer = Normalizer::new(protocol_table());
        let params = network_params(vec![0.0; 5], vec![1.0; 5]);
        let record = TelemetryRecord::Process(ProcessRecord::default());
        assert!(matches!(
            normalizer.normalize(&record, &params),
            Err(NormalizeError::ModalityMismatch { .. })
        ));
    }

    #[test]
    fn normalize_is_pure() {
        let normalizer = Normalizer::new(protocol_table());
        let params = network_params(vec![0.5; 5], vec![3.0; 5]);
        let a = normalizer.normalize(&sample_record(), &params).unwrap();
        let b = normalizer.normalize(&sample_record(), &params).unwrap();
        assert_eq!(a, b);
    }
}
