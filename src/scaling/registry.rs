//! Artifact bundle loading. A bundle directory holds a manifest, one scaler
//! file per modality, the categorical table, and the ONNX files the manifest
//! points at. The whole set shares one version token; mixed bundles are
//! rejected before any model is touched.

use super::{CategoricalTable, ScalingError, ScalingParameters};
use crate::telemetry::Modality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityArtifact {
    pub scaler: String,
    pub encoder: String,
    /// Feature count the encoder was exported with.
    pub input_dim: usize,
    pub latent_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionArtifact {
    pub model: String,
    pub network_latent: usize,
    pub process_latent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: String,
    pub network: ModalityArtifact,
    pub process: ModalityArtifact,
    pub fusion: FusionArtifact,
    pub categorical: String,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ScalingError> {
    let data = std::fs::read_to_string(path).map_err(|source| ScalingError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ScalingError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ScalingError> {
    let data = serde_json::to_string_pretty(value).map_err(|source| ScalingError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ScalingError::Io {
        path: path.display().to_string(),
        source,
    })
}

impl ArtifactManifest {
    pub fn load(dir: &Path) -> Result<Self, ScalingError> {
        read_json(&dir.join(MANIFEST_FILE))
    }

    pub fn write(&self, dir: &Path) -> Result<(), ScalingError> {
        write_json(&dir.join(MANIFEST_FILE), self)
    }

    pub fn encoder_path(&self, dir: &Path, modality: Modality) -> PathBuf {
        match modality {
            Modality::Network => dir.join(&self.network.encoder),
            Modality::Process => dir.join(&self.process.encoder),
        }
    }

    pub fn fusion_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.fusion.model)
    }
}

/// The loaded, validated, read-only registry.
#[derive(Debug, Clone)]
pub struct ScalingRegistry {
    pub manifest: ArtifactManifest,
    pub network: ScalingParameters,
    pub process: ScalingParameters,
    pub protocol_codes: CategoricalTable,
}

impl ScalingRegistry {
    /// Load and validate every non-model member of the bundle.
    pub fn load(dir: &Path) -> Result<Self, ScalingError> {
        let manifest = ArtifactManifest::load(dir)?;
        let network = Self::load_scaler(dir, &manifest, Modality::Network)?;
        let process = Self::load_scaler(dir, &manifest, Modality::Process)?;
        let protocol_codes: CategoricalTable = read_json(&dir.join(&manifest.categorical))?;

        info!(
            version = %manifest.version,
            network_features = network.len(),
            network_layout = format!("{:08x}", network.layout_token()),
            process_features = process.len(),
            process_layout = format!("{:08x}", process.layout_token()),
            "scaling registry loaded"
        );

        Ok(Self {
            manifest,
            network,
            process,
            protocol_codes,
        })
    }

    fn load_scaler(
        dir: &Path,
        manifest: &ArtifactManifest,
        modality: Modality,
    ) -> Result<ScalingParameters, ScalingError> {
        let artifact = match modality {
            Modality::Network => &manifest.network,
            Modality::Process => &manifest.process,
        };
        let path = dir.join(&artifact.scaler);
        let params: ScalingParameters = read_json(&path)?;
        params.validate()?;

        if params.version != manifest.version {
            return Err(ScalingError::VersionMismatch {
                expected: manifest.version.clone(),
                found: params.version.clone(),
                member: artifact.scaler.clone(),
            });
        }
        if params.modality != modality {
            return Err(ScalingError::InvalidScalerParameters {
                modality: modality.as_str(),
                reason: format!("{} is tagged {}", artifact.scaler, params.modality.as_str()),
            });
        }
        // The normalizer emits one value per fitted feature, so the fitted
        // count must equal the encoder's input width for this bundle.
        if params.len() != artifact.input_dim {
            return Err(ScalingError::InvalidScalerParameters {
                modality: modality.as_str(),
                reason: format!(
                    "{} fitted features but encoder expects {}",
                    params.len(),
                    artifact.input_dim
                ),
            });
        }
        Ok(params)
    }

    /// Persist the fitted halves of a bundle (scalers + categorical table +
    /// manifest). Model files are produced by the training job.
    pub fn write(&self, dir: &Path) -> Result<(), ScalingError> {
        std::fs::create_dir_all(dir).map_err(|source| ScalingError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        write_json(&dir.join(&self.manifest.network.scaler), &self.network)?;
        write_json(&dir.join(&self.manifest.process.scaler), &self.process)?;
        write_json(&dir.join(&self.manifest.categorical), &self.protocol_codes)?;
        self.manifest.write(dir)
    }

    pub fn params(&self, modality: Modality) -> &ScalingParameters {
        match modality {
            Modality::Network => &self.network,
            Modality::Process => &self.process,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn scaler(modality: Modality, version: &str, names: &[&str], scale_tail: f64) -> ScalingParameters {
        ScalingParameters {
            version: version.into(),
            modality,
            feature_names: names.iter().map(|s| s.to_string()).collect(),
            center: vec![0.0; names.len()],
            scale: {
                let mut s = vec![1.0; names.len()];
                *s.last_mut().unwrap() = scale_tail;
                s
            },
        }
    }

    fn manifest(version: &str, net_dim: usize, proc_dim: usize) -> ArtifactManifest {
        ArtifactManifest {
            version: version.into(),
            network: ModalityArtifact {
                scaler: "scaler_network.json".into(),
                encoder: "network_encoder.onnx".into(),
                input_dim: net_dim,
                latent_dim: 8,
            },
            process: ModalityArtifact {
                scaler: "scaler_process.json".into(),
                encoder: "process_encoder.onnx".into(),
                input_dim: proc_dim,
                latent_dim: 8,
            },
            fusion: FusionArtifact {
                model: "fusion.onnx".into(),
                network_latent: 8,
                process_latent: 8,
            },
            categorical: "protocol_codes.json".into(),
        }
    }

    fn write_bundle(dir: &Path, version: &str, net: ScalingParameters, proc_: ScalingParameters) {
        let registry = ScalingRegistry {
            manifest: manifest(version, net.len(), proc_.len()),
            network: net,
            process: proc_,
            protocol_codes: CategoricalTable {
                field: "protocol".into(),
                codes: BTreeMap::from([("TCP".into(), 0), ("UDP".into(), 1)]),
            },
        };
        registry.write(dir).unwrap();
    }

    #[test]
    fn bundle_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(
            dir.path(),
            "v7",
            scaler(Modality::Network, "v7", &["a", "b"], 1.0),
            scaler(Modality::Process, "v7", &["x", "y", "z"], 2.0),
        );
        let loaded = ScalingRegistry::load(dir.path()).unwrap();
        assert_eq!(loaded.manifest.version, "v7");
        assert_eq!(loaded.network.len(), 2);
        assert_eq!(loaded.process.len(), 3);
        assert_eq!(loaded.protocol_codes.code("UDP"), 1);
    }

    #[test]
    fn zero_scale_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(
            dir.path(),
            "v7",
            scaler(Modality::Network, "v7", &["a", "b"], 0.0),
            scaler(Modality::Process, "v7", &["x"], 1.0),
        );
        let err = ScalingRegistry::load(dir.path()).unwrap_err();
        assert!(matches!(err, ScalingError::InvalidScalerParameters { .. }));
    }

    #[test]
    fn version_skew_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut net = scaler(Modality::Network, "v8", &["a"], 1.0);
        net.version = "v6".into();
        write_bundle(dir.path(), "v8", net, scaler(Modality::Process, "v8", &["x"], 1.0));
        let err = ScalingRegistry::load(dir.path()).unwrap_err();
        assert!(matches!(err, ScalingError::VersionMismatch { .. }));
    }

    #[test]
    fn encoder_width_disagreement_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ScalingRegistry {
            manifest: manifest("v1", 4, 1),
            network: scaler(Modality::Network, "v1", &["a", "b"], 1.0),
            process: scaler(Modality::Process, "v1", &["x"], 1.0),
            protocol_codes: CategoricalTable {
                field: "protocol".into(),
                codes: BTreeMap::new(),
            },
        };
        registry.write(dir.path()).unwrap();
        let err = ScalingRegistry::load(dir.path()).unwrap_err();
        assert!(matches!(err, ScalingError::InvalidScalerParameters { .. }));
    }

    #[test]
    fn missing_bundle_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScalingRegistry::load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ScalingError::Io { .. }));
    }
}
