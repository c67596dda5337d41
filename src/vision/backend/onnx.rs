//! ONNX Runtime backend

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{BackendKind, BackendOutput, InferenceBackend};
use crate::error::OcrError;
use crate::vision::decode::ProbabilityMatrix;
use crate::vision::preprocess::Tensor;

/// Recognition model running on ONNX Runtime
pub struct OnnxBackend {
    /// `None` once disposed. `Session::run` needs `&mut`, hence the lock.
    session: Arc<Mutex<Option<Session>>>,
    input_name: String,
    output_name: String,
    label: String,
}

impl OnnxBackend {
    /// Load a model file. The output is read from `output_name` when given,
    /// otherwise from the session's first output.
    pub fn load(model_path: &Path, output_name: Option<&str>) -> Result<Self, OcrError> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.with_intra_threads(4))
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| OcrError::model_load(model_path, e))?;

        let input_names: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        let input_name = input_names
            .first()
            .cloned()
            .ok_or_else(|| OcrError::model_load(model_path, "model declares no inputs"))?;

        let output_name = match output_name {
            Some(name) if output_names.iter().any(|n| n == name) => name.to_string(),
            Some(name) => {
                return Err(OcrError::model_load(
                    model_path,
                    format!("no output named {name:?} (available: {output_names:?})"),
                ))
            }
            None => output_names
                .first()
                .cloned()
                .ok_or_else(|| OcrError::model_load(model_path, "model declares no outputs"))?,
        };

        Ok(Self {
            session: Arc::new(Mutex::new(Some(session))),
            input_name,
            output_name,
            label: model_path.display().to_string(),
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

fn run_session(
    session: &Mutex<Option<Session>>,
    input_name: &str,
    output_name: &str,
    label: &str,
    tensor: Tensor,
) -> Result<BackendOutput, OcrError> {
    let mut guard = session.lock();
    let session = guard
        .as_mut()
        .ok_or_else(|| OcrError::Disposed(label.to_string()))?;

    let input = TensorRef::from_array_view(tensor.view())?;
    let outputs = session.run(ort::inputs![input_name => input])?;
    let (shape, data) = outputs[output_name].try_extract_tensor::<f32>()?;

    let dims = shape
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<Result<Vec<usize>, _>>()
        .map_err(|_| OcrError::Inference(format!("negative output dimension in {shape:?}")))?;
    debug!("ONNX output dims: {:?}", dims);

    let matrix = ProbabilityMatrix::from_dims(data.to_vec(), &dims).ok_or_else(|| {
        OcrError::Inference(format!(
            "unexpected output shape {dims:?} with {} values",
            data.len()
        ))
    })?;

    Ok(BackendOutput::exact(matrix))
}

#[async_trait]
impl InferenceBackend for OnnxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Onnx
    }

    async fn run(&self, tensor: Tensor) -> Result<BackendOutput, OcrError> {
        let session = Arc::clone(&self.session);
        let input_name = self.input_name.clone();
        let output_name = self.output_name.clone();
        let label = self.label.clone();

        tokio::task::spawn_blocking(move || {
            run_session(&session, &input_name, &output_name, &label, tensor)
        })
        .await
        .map_err(|e| OcrError::Inference(format!("inference task failed: {e}")))?
    }

    fn dispose(&self) {
        if self.session.lock().take().is_some() {
            info!("ONNX model {} disposed", self.label);
        }
    }

    fn is_disposed(&self) -> bool {
        self.session.lock().is_none()
    }
}
