//! Runtime context: everything the live path shares, built once at startup
//! and immutable afterwards. No ambient globals; constructors take the
//! context, so tests hand in fixtures.

use crate::features::Normalizer;
use crate::model::{DualEncoderScorer, InferenceError, OnnxEncoder, OnnxFusion};
use crate::scaling::{ScalingError, ScalingRegistry};
use crate::telemetry::Modality;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;

/// Startup failures terminate the process before it starts consuming;
/// running with unsafe defaults is not an option.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("scaling registry rejected: {0}")]
    Scaling(#[from] ScalingError),
    #[error("model artifact rejected: {0}")]
    Model(#[from] InferenceError),
}

pub struct RuntimeContext {
    pub registry: ScalingRegistry,
    pub normalizer: Normalizer,
    pub scorer: DualEncoderScorer,
}

impl RuntimeContext {
    pub fn new(registry: ScalingRegistry, scorer: DualEncoderScorer) -> Self {
        let normalizer = Normalizer::new(registry.protocol_codes.clone());
        Self {
            registry,
            normalizer,
            scorer,
        }
    }

    /// Load and validate the whole artifact bundle. Scalers are checked
    /// before any model file is opened, so a broken scaler never costs a
    /// session load.
    pub fn load(artifacts_dir: &Path) -> Result<Self, StartupError> {
        let registry = ScalingRegistry::load(artifacts_dir)?;
        let manifest = &registry.manifest;

        let network = OnnxEncoder::load(
            &manifest.encoder_path(artifacts_dir, Modality::Network),
            manifest.network.input_dim,
        )?;
        let process = OnnxEncoder::load(
            &manifest.encoder_path(artifacts_dir, Modality::Process),
            manifest.process.input_dim,
        )?;
        let fusion = OnnxFusion::load(
            &manifest.fusion_path(artifacts_dir),
            manifest.fusion.network_latent,
            manifest.fusion.process_latent,
        )?;

        info!(version = %manifest.version, "runtime context ready");
        Ok(Self::new(
            registry,
            DualEncoderScorer::new(Box::new(network), Box::new(process), Box::new(fusion)),
        ))
    }
}

/// Shared handle over the current context. Hot reload swaps the whole
/// registry+model set in one step; a reader either sees the old set or the
/// new one, never a mix.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Arc<RwLock<Arc<RuntimeContext>>>,
}

impl ContextHandle {
    pub fn new(ctx: RuntimeContext) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(ctx))),
        }
    }

    pub fn current(&self) -> Arc<RuntimeContext> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn swap(&self, ctx: RuntimeContext) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(ctx);
    }
}
