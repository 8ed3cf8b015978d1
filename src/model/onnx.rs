//! ONNX Runtime backends for the per-modality encoders and the fusion model.
//! Sessions load once at startup; a load failure refuses startup, a run
//! failure is event-local.

use super::{InferenceError, LatentEncoder, ScoreFusion};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

fn open_session(path: &Path) -> Result<(Session, String, String), InferenceError> {
    if !path.exists() {
        return Err(InferenceError::MissingModel(path.display().to_string()));
    }
    let session = Session::builder()
        .map_err(|e| InferenceError::Backend(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::Backend(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| InferenceError::Backend(e.to_string()))?;
    let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .unwrap_or_else(|| "input".to_string());
    let output_name = session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or(InferenceError::EmptyOutput)?;
    Ok((session, input_name, output_name))
}

fn run_single(
    session: &Mutex<Session>,
    output_name: &str,
    input: Value,
) -> Result<Vec<f32>, InferenceError> {
    let mut guard = session
        .lock()
        .map_err(|_| InferenceError::Backend("session lock poisoned".into()))?;
    let outputs = guard
        .run(ort::inputs![input])
        .map_err(|e| InferenceError::Backend(e.to_string()))?;
    let output = outputs.get(output_name).ok_or(InferenceError::EmptyOutput)?;
    let tensor = output
        .try_extract_tensor::<f32>()
        .map_err(|e| InferenceError::Backend(e.to_string()))?;
    Ok(tensor.1.to_vec())
}

fn row(values: &[f32]) -> Result<Value, InferenceError> {
    let array = Array2::<f32>::from_shape_vec((1, values.len()), values.to_vec())
        .map_err(|e| InferenceError::Backend(e.to_string()))?;
    Value::from_array(array)
        .map(|v| v.into_dyn())
        .map_err(|e| InferenceError::Backend(e.to_string()))
}

pub struct OnnxEncoder {
    session: Mutex<Session>,
    output_name: String,
    input_dim: usize,
}

impl OnnxEncoder {
    pub fn load(path: &Path, input_dim: usize) -> Result<Self, InferenceError> {
        let (session, _, output_name) = open_session(path)?;
        Ok(Self {
            session: Mutex::new(session),
            output_name,
            input_dim,
        })
    }
}

impl LatentEncoder for OnnxEncoder {
    fn encode(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if input.len() != self.input_dim {
            return Err(InferenceError::InputDim {
                expected: self.input_dim,
                found: input.len(),
            });
        }
        run_single(&self.session, &self.output_name, row(input)?)
    }
}

pub struct OnnxFusion {
    session: Mutex<Session>,
    output_name: String,
    network_latent: usize,
    process_latent: usize,
}

impl OnnxFusion {
    pub fn load(path: &Path, network_latent: usize, process_latent: usize) -> Result<Self, InferenceError> {
        let (session, _, output_name) = open_session(path)?;
        Ok(Self {
            session: Mutex::new(session),
            output_name,
            network_latent,
            process_latent,
        })
    }
}

impl ScoreFusion for OnnxFusion {
    fn expected_dims(&self) -> (usize, usize) {
        (self.network_latent, self.process_latent)
    }

    fn fuse(&self, network: &[f32], process: &[f32]) -> Result<f32, InferenceError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| InferenceError::Backend("session lock poisoned".into()))?;
        let outputs = guard
            .run(ort::inputs![row(network)?, row(process)?])
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        let output = outputs
            .get(&self.output_name)
            .ok_or(InferenceError::EmptyOutput)?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        tensor.1.first().copied().ok_or(InferenceError::EmptyOutput)
    }
}
