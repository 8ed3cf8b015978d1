//! Versioned normalization parameters fitted offline and loaded read-only
//! by inference. Validation happens once at load; the streaming path never
//! re-checks a divisor.

mod registry;

use crate::telemetry::Modality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use registry::{ArtifactManifest, FusionArtifact, ModalityArtifact, ScalingRegistry};

#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("invalid scaler parameters for {modality}: {reason}")]
    InvalidScalerParameters { modality: &'static str, reason: String },
    #[error("artifact version mismatch: manifest has {expected}, {member} carries {found}")]
    VersionMismatch {
        expected: String,
        found: String,
        member: String,
    },
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-modality center/scale pairs in fitted feature order.
/// Invariant after [`validate`](Self::validate): the three vectors have the
/// same nonzero length and every scale is finite and nonzero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingParameters {
    /// Identity token tying these parameters to the encoder trained with them.
    pub version: String,
    pub modality: Modality,
    pub feature_names: Vec<String>,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ScalingParameters {
    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    pub fn validate(&self) -> Result<(), ScalingError> {
        let fail = |reason: String| ScalingError::InvalidScalerParameters {
            modality: self.modality.as_str(),
            reason,
        };
        if self.feature_names.is_empty() {
            return Err(fail("empty feature list".into()));
        }
        if self.center.len() != self.feature_names.len() || self.scale.len() != self.feature_names.len() {
            return Err(fail(format!(
                "parallel arrays disagree: {} names, {} center, {} scale",
                self.feature_names.len(),
                self.center.len(),
                self.scale.len()
            )));
        }
        for (i, (&c, &s)) in self.center.iter().zip(&self.scale).enumerate() {
            if !c.is_finite() {
                return Err(fail(format!("center[{}] ({}) is not finite", i, self.feature_names[i])));
            }
            if !s.is_finite() || s == 0.0 {
                return Err(fail(format!(
                    "scale[{}] ({}) is {}; must be finite and nonzero",
                    i, self.feature_names[i], s
                )));
            }
        }
        Ok(())
    }

    /// CRC32 token over the modality and feature order. Logged at startup so
    /// layout drift between bundles is visible in one line.
    pub fn layout_token(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.modality.as_str().as_bytes());
        for name in &self.feature_names {
            hasher.update(name.as_bytes());
        }
        hasher.finalize()
    }
}

/// Categorical label -> small-integer code table fitted at training time.
/// Unseen labels map to one past the largest fitted code, which no fitted
/// label can occupy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalTable {
    pub field: String,
    pub codes: BTreeMap<String, u32>,
}

impl CategoricalTable {
    /// Fit codes over the distinct labels, sorted, 0-based.
    pub fn fit(field: &str, labels: impl IntoIterator<Item = String>) -> Self {
        let distinct: std::collections::BTreeSet<String> = labels.into_iter().collect();
        let codes = distinct
            .into_iter()
            .enumerate()
            .map(|(i, label)| (label, i as u32))
            .collect();
        Self {
            field: field.to_string(),
            codes,
        }
    }

    pub fn fallback_code(&self) -> u32 {
        self.codes.len() as u32
    }

    pub fn code(&self, label: &str) -> u32 {
        self.codes.get(label).copied().unwrap_or_else(|| self.fallback_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(center: Vec<f64>, scale: Vec<f64>) -> ScalingParameters {
        ScalingParameters {
            version: "v1".into(),
            modality: Modality::Network,
            feature_names: vec!["a".into(), "b".into()],
            center,
            scale,
        }
    }

    #[test]
    fn valid_params_pass() {
        params(vec![0.0, 1.0], vec![1.0, 2.0]).validate().unwrap();
    }

    #[test]
    fn zero_scale_rejected() {
        let err = params(vec![0.0, 1.0], vec![1.0, 0.0]).validate().unwrap_err();
        assert!(matches!(err, ScalingError::InvalidScalerParameters { .. }));
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = params(vec![0.0], vec![1.0, 2.0]).validate().unwrap_err();
        assert!(matches!(err, ScalingError::InvalidScalerParameters { .. }));
    }

    #[test]
    fn nan_scale_rejected() {
        let err = params(vec![0.0, 0.0], vec![1.0, f64::NAN]).validate().unwrap_err();
        assert!(matches!(err, ScalingError::InvalidScalerParameters { .. }));
    }

    #[test]
    fn layout_token_tracks_order() {
        let a = params(vec![0.0, 0.0], vec![1.0, 1.0]);
        let mut b = a.clone();
        b.feature_names.swap(0, 1);
        assert_ne!(a.layout_token(), b.layout_token());
    }

    #[test]
    fn categorical_fallback_is_stable_and_disjoint() {
        let table = CategoricalTable::fit("protocol", ["UDP".into(), "TCP".into(), "UDP".into()]);
        assert_eq!(table.code("TCP"), 0);
        assert_eq!(table.code("UDP"), 1);
        assert_eq!(table.code("ICMP"), 2);
        assert_eq!(table.code("ICMP"), table.fallback_code());
        assert!(table.codes.values().all(|&c| c != table.fallback_code()));
    }
}
