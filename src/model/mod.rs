//! Encoder and fusion inference. ONNX Runtime backs production; the traits
//! are the seams deterministic tests plug fixtures into.

mod onnx;
mod scorer;

use thiserror::Error;

pub use onnx::{OnnxEncoder, OnnxFusion};
pub use scorer::DualEncoderScorer;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model file not found: {0}")]
    MissingModel(String),
    #[error("inference backend error: {0}")]
    Backend(String),
    #[error("encoder expects {expected} inputs, vector has {found}")]
    InputDim { expected: usize, found: usize },
    #[error("model produced no output tensor")]
    EmptyOutput,
}

/// One modality's trained encoder: feature vector in, latent vector out.
pub trait LatentEncoder: Send + Sync {
    fn encode(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// The fusion model combining both latents into one anomaly score.
pub trait ScoreFusion: Send + Sync {
    /// (network latent length, process latent length) the model was
    /// exported with.
    fn expected_dims(&self) -> (usize, usize);
    /// Arguments are always ordered network-first, process-second.
    fn fuse(&self, network: &[f32], process: &[f32]) -> Result<f32, InferenceError>;
}
