//! Paddle Lite backend
//!
//! The Paddle Lite engine is provided by the host environment through
//! [`LiteRuntime`]. Its models take interleaved (NHWC) input normalized with
//! mean/std 0.5, and the output arrives in one of several shapes depending on
//! the engine build.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{BackendKind, BackendOutput, DegradedOutput, InferenceBackend, DEFAULT_OUTPUT_DIMS};
use crate::error::OcrError;
use crate::vision::decode::ProbabilityMatrix;
use crate::vision::preprocess::{Normalization, TargetShape, Tensor};

/// Error type of the external engine
pub type LiteError = Box<dyn std::error::Error + Send + Sync>;

/// Options handed to the engine when loading a `.nb` model
#[derive(Debug, Clone, PartialEq)]
pub struct LiteLoadOptions {
    pub model_path: PathBuf,
    pub feed_shape: TargetShape,
    /// Padding colour (white)
    pub fill: [u8; 3],
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl LiteLoadOptions {
    pub fn new(model_path: PathBuf, feed_shape: TargetShape) -> Self {
        let (mean, std) = match Normalization::PADDLE_LITE {
            Normalization::MeanStd { mean, std } => (mean, std),
            Normalization::UnitRange => ([0.0; 3], [1.0; 3]),
        };
        Self {
            model_path,
            feed_shape,
            fill: [255, 255, 255],
            mean,
            std,
        }
    }
}

/// Engine entry point: loads models
#[async_trait]
pub trait LiteRuntime: Send + Sync {
    async fn load(&self, options: &LiteLoadOptions) -> Result<Arc<dyn LiteRunner>, LiteError>;
}

/// A loaded Paddle Lite model
#[async_trait]
pub trait LiteRunner: Send + Sync {
    /// Run one NHWC input of `shape` = `[1, H, W, 3]`
    async fn predict(&self, input: &[f32], shape: [usize; 4]) -> Result<LiteOutput, LiteError>;

    fn dispose(&self) -> Result<(), LiteError>;
}

/// Arbitrarily nested numeric output
#[derive(Debug, Clone, PartialEq)]
pub enum NestedValue {
    Value(f32),
    List(Vec<NestedValue>),
}

/// Raw Paddle Lite prediction result
#[derive(Debug, Clone, PartialEq)]
pub enum LiteOutput {
    /// Flat data with explicit dims
    Shaped { data: Vec<f32>, shape: Vec<usize> },
    /// Nested sequences; dims follow the nesting
    Nested(NestedValue),
    /// Flat data without dims
    Flat(Vec<f32>),
}

impl NestedValue {
    /// Dims recovered by following the first element at each depth
    pub fn infer_shape(&self) -> Vec<usize> {
        let mut shape = Vec::new();
        let mut current = self;
        while let NestedValue::List(items) = current {
            shape.push(items.len());
            match items.first() {
                Some(first) => current = first,
                None => break,
            }
        }
        shape
    }

    /// Flatten, checking every list matches `shape` at its depth and every
    /// leaf sits at full depth. Returns `None` for ragged input.
    pub fn flatten_checked(&self, shape: &[usize]) -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(shape.iter().product());
        self.flatten_into(shape, &mut out).then_some(out)
    }

    fn flatten_into(&self, shape: &[usize], out: &mut Vec<f32>) -> bool {
        match (self, shape.split_first()) {
            (NestedValue::Value(v), None) => {
                out.push(*v);
                true
            }
            (NestedValue::List(items), Some((&len, rest))) => {
                items.len() == len && items.iter().all(|item| item.flatten_into(rest, out))
            }
            _ => false,
        }
    }

    /// Flatten ignoring structure
    pub fn flatten_lossy(&self) -> Vec<f32> {
        match self {
            NestedValue::Value(v) => vec![*v],
            NestedValue::List(items) => items.iter().flat_map(NestedValue::flatten_lossy).collect(),
        }
    }
}

/// Normalize a raw prediction into the canonical matrix. When no consistent
/// shape is found the result falls back to [`DEFAULT_OUTPUT_DIMS`] and
/// carries a [`DegradedOutput`] marker.
pub fn normalize_output(output: LiteOutput) -> BackendOutput {
    let (data, dims, reason) = match output {
        LiteOutput::Shaped { data, shape } => {
            let product = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
            if product == Some(data.len()) {
                (data, Some(shape), None)
            } else {
                let reason = format!("declared shape {shape:?} does not match {} values", data.len());
                (data, None, Some(reason))
            }
        }
        LiteOutput::Nested(nested) => {
            let shape = nested.infer_shape();
            match nested.flatten_checked(&shape) {
                Some(data) => (data, Some(shape), None),
                None => (
                    nested.flatten_lossy(),
                    None,
                    Some(format!("ragged nested output (first-element shape {shape:?})")),
                ),
            }
        }
        LiteOutput::Flat(data) => (data, None, Some("flat output without shape".to_string())),
    };

    let len = data.len();
    let reason = match dims {
        Some(dims) => match ProbabilityMatrix::matrix_dims(&dims) {
            // Element count was already checked against the dims
            Some((t, c)) => return BackendOutput::exact(ProbabilityMatrix::fitted(data, t, c)),
            None => format!("unsupported output dims {dims:?}"),
        },
        None => reason.unwrap_or_else(|| "unknown output format".to_string()),
    };
    fallback(data, len, reason)
}

fn fallback(data: Vec<f32>, received_len: usize, reason: String) -> BackendOutput {
    let [_, time_steps, num_classes] = DEFAULT_OUTPUT_DIMS;
    warn!(
        "Unknown Paddle Lite output format ({}), assuming dims {:?}",
        reason, DEFAULT_OUTPUT_DIMS
    );
    BackendOutput {
        matrix: ProbabilityMatrix::fitted(data, time_steps, num_classes),
        degraded: Some(DegradedOutput {
            reason,
            received_len,
            assumed_dims: DEFAULT_OUTPUT_DIMS,
        }),
    }
}

/// Recognition model running on a host-provided Paddle Lite engine
pub struct LiteBackend {
    runner: Arc<dyn LiteRunner>,
    disposed: AtomicBool,
    label: String,
}

impl LiteBackend {
    /// Load a `.nb` model through the runtime
    pub async fn load(runtime: &dyn LiteRuntime, options: &LiteLoadOptions) -> Result<Self, OcrError> {
        info!("Loading Paddle Lite model from {:?}...", options.model_path);
        let runner = runtime
            .load(options)
            .await
            .map_err(|e| OcrError::model_load(&options.model_path, e))?;
        info!("Paddle Lite model loaded successfully");

        Ok(Self::from_runner(runner, options.model_path.display().to_string()))
    }

    /// Wrap an already loaded runner
    pub fn from_runner(runner: Arc<dyn LiteRunner>, label: impl Into<String>) -> Self {
        Self {
            runner,
            disposed: AtomicBool::new(false),
            label: label.into(),
        }
    }
}

#[async_trait]
impl InferenceBackend for LiteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PaddleLite
    }

    async fn run(&self, tensor: Tensor) -> Result<BackendOutput, OcrError> {
        if self.is_disposed() {
            return Err(OcrError::Disposed(self.label.clone()));
        }

        let nhwc = tensor.to_nhwc();
        let shape = nhwc.shape();
        debug!("Paddle Lite input shape: {:?}", shape);

        let raw = self
            .runner
            .predict(&nhwc.to_flat(), shape)
            .await
            .map_err(|e| OcrError::Inference(e.to_string()))?;

        Ok(normalize_output(raw))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.runner.dispose() {
            Ok(()) => info!("Paddle Lite model disposed"),
            Err(e) => warn!("Error disposing Paddle Lite model: {}", e),
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
