//! Dual-encoder scoring: one real latent, one placeholder, one fusion pass.

use super::{InferenceError, LatentEncoder, ScoreFusion};
use crate::features::FeatureVector;
use crate::telemetry::Modality;
use tracing::warn;

/// Compatibility shim for latent/fusion dimension skew between
/// independently-versioned artifacts. Over-long latents are truncated and
/// logged; short latents pass through unpadded and fail inside the fusion
/// backend instead, so no fabricated values ever reach the model. Delete
/// once bundle versioning makes skew impossible.
fn fit_latent(modality: Modality, mut latent: Vec<f32>, expected: usize) -> Vec<f32> {
    if latent.len() != expected {
        warn!(
            modality = modality.as_str(),
            expected,
            found = latent.len(),
            "latent dimension mismatch, adapting"
        );
        latent.truncate(expected);
    }
    latent
}

pub struct DualEncoderScorer {
    network: Box<dyn LatentEncoder>,
    process: Box<dyn LatentEncoder>,
    fusion: Box<dyn ScoreFusion>,
}

impl DualEncoderScorer {
    pub fn new(
        network: Box<dyn LatentEncoder>,
        process: Box<dyn LatentEncoder>,
        fusion: Box<dyn ScoreFusion>,
    ) -> Self {
        Self {
            network,
            process,
            fusion,
        }
    }

    /// Score one single-modality vector in [0, 1].
    ///
    /// The fusion model always takes both latents, but live events carry one
    /// modality; the absent side gets an all-zero latent of the exact length
    /// the fusion model expects. Known approximation inherited from how the
    /// fusion model is exercised in this streaming mode; do not substitute a
    /// different placeholder without retraining.
    pub fn score(&self, vector: &FeatureVector) -> Result<f32, InferenceError> {
        let (expect_network, expect_process) = self.fusion.expected_dims();

        let (latent_network, latent_process) = match vector.modality {
            Modality::Network => (
                self.network.encode(vector.as_slice())?,
                vec![0.0f32; expect_process],
            ),
            Modality::Process => (
                vec![0.0f32; expect_network],
                self.process.encode(vector.as_slice())?,
            ),
        };

        let latent_network = fit_latent(Modality::Network, latent_network, expect_network);
        let latent_process = fit_latent(Modality::Process, latent_process, expect_process);

        // Network first, process second, whichever side is the placeholder.
        let score = self.fusion.fuse(&latent_network, &latent_process)?;
        Ok(score.clamp(0.0, 1.0))
    }
}
