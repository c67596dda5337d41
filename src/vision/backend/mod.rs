//! Inference backends
//!
//! Two engine families run recognition models:
//! - ONNX Runtime (`onnx`): planar input, `[1, T, C]` output
//! - Paddle Lite (`paddle_lite`): interleaved input with mean/std
//!   normalization, output format varies by build
//!
//! Both are normalized to a [`ProbabilityMatrix`] behind [`InferenceBackend`].

pub mod lite;
pub mod onnx;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::error::{ConfigError, OcrError};
use crate::vision::decode::ProbabilityMatrix;
use crate::vision::preprocess::{Normalization, Tensor, TensorLayout};

pub use lite::{LiteLoadOptions, LiteOutput, LiteRunner, LiteRuntime, NestedValue};
pub use onnx::OnnxBackend;

/// Output dims assumed when a backend's output shape cannot be recovered:
/// 1 batch, 40 timesteps, 6625 classes (blank + ppocr_keys_v1)
pub const DEFAULT_OUTPUT_DIMS: [usize; 3] = [1, 40, 6625];

/// Engine family, selected by the model config's `backend` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Onnx,
    PaddleLite,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Onnx, BackendKind::PaddleLite];

    /// Parse a config tag
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| ConfigError::UnsupportedBackend(tag.to_string()))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            BackendKind::Onnx => "onnx",
            BackendKind::PaddleLite => "paddle_lite",
        }
    }

    /// Normalization the engine's models were trained with
    pub fn normalization(&self) -> Normalization {
        match self {
            BackendKind::Onnx => Normalization::UnitRange,
            BackendKind::PaddleLite => Normalization::PADDLE_LITE,
        }
    }

    /// Tensor layout handed to the engine
    pub fn input_layout(&self) -> TensorLayout {
        match self {
            BackendKind::Onnx => TensorLayout::Nchw,
            BackendKind::PaddleLite => TensorLayout::Nhwc,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Marker attached to results whose output shape had to be assumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedOutput {
    /// Why the real shape was not usable
    pub reason: String,
    /// Number of values the engine actually returned
    pub received_len: usize,
    /// Dims used instead
    pub assumed_dims: [usize; 3],
}

/// Canonical backend result
#[derive(Debug, Clone)]
pub struct BackendOutput {
    pub matrix: ProbabilityMatrix,
    /// Set when the shape was assumed; the matrix is then of degraded quality
    pub degraded: Option<DegradedOutput>,
}

impl BackendOutput {
    pub fn exact(matrix: ProbabilityMatrix) -> Self {
        Self {
            matrix,
            degraded: None,
        }
    }
}

/// A loaded model on some engine
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Normalization to use when preprocessing input for this backend
    fn normalization(&self) -> Normalization {
        self.kind().normalization()
    }

    /// Run one NCHW tensor through the model. Engine errors propagate as
    /// [`OcrError::Inference`]; there is no retry.
    async fn run(&self, tensor: Tensor) -> Result<BackendOutput, OcrError>;

    /// Release engine resources. Must tolerate repeated calls.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Engines the environment has initialized
#[derive(Clone, Default)]
pub struct Runtimes {
    onnx: bool,
    paddle_lite: Option<Arc<dyn LiteRuntime>>,
}

impl Runtimes {
    /// No engines initialized
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the global ONNX Runtime environment
    pub fn with_onnx(mut self) -> Result<Self, OcrError> {
        ort::init().with_name("ocr-harness").commit()?;
        info!("ONNX Runtime environment initialized");
        self.onnx = true;
        Ok(self)
    }

    /// Register a Paddle Lite runtime supplied by the host environment
    pub fn with_paddle_lite(mut self, runtime: Arc<dyn LiteRuntime>) -> Self {
        info!("Paddle Lite runtime registered");
        self.paddle_lite = Some(runtime);
        self
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Onnx => self.onnx,
            BackendKind::PaddleLite => self.paddle_lite.is_some(),
        }
    }

    pub(crate) fn paddle_lite(&self) -> Result<&Arc<dyn LiteRuntime>, OcrError> {
        self.paddle_lite
            .as_ref()
            .ok_or(OcrError::BackendUnavailable(BackendKind::PaddleLite))
    }

    pub(crate) fn require(&self, kind: BackendKind) -> Result<(), OcrError> {
        if self.is_available(kind) {
            Ok(())
        } else {
            Err(OcrError::BackendUnavailable(kind))
        }
    }
}

impl fmt::Debug for Runtimes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtimes")
            .field("onnx", &self.onnx)
            .field("paddle_lite", &self.paddle_lite.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_tags() {
        assert_eq!(BackendKind::from_tag("onnx").unwrap(), BackendKind::Onnx);
        assert_eq!(
            BackendKind::from_tag("paddle_lite").unwrap(),
            BackendKind::PaddleLite
        );
        for tag in ["", "ONNX", "tflite", "paddle-lite"] {
            assert!(matches!(
                BackendKind::from_tag(tag),
                Err(ConfigError::UnsupportedBackend(ref t)) if t == tag
            ));
        }
    }

    #[test]
    fn test_per_variant_settings() {
        assert_eq!(BackendKind::Onnx.normalization(), Normalization::UnitRange);
        assert_eq!(BackendKind::Onnx.input_layout(), TensorLayout::Nchw);
        assert_eq!(
            BackendKind::PaddleLite.normalization(),
            Normalization::PADDLE_LITE
        );
        assert_eq!(BackendKind::PaddleLite.input_layout(), TensorLayout::Nhwc);
    }

    #[test]
    fn test_empty_runtimes() {
        let runtimes = Runtimes::new();
        for kind in BackendKind::ALL {
            assert!(!runtimes.is_available(kind));
            assert!(matches!(
                runtimes.require(kind),
                Err(OcrError::BackendUnavailable(k)) if k == kind
            ));
        }
    }
}
