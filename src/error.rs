//! Error types for the recognition pipeline

use std::path::PathBuf;
use thiserror::Error;

use crate::vision::backend::BackendKind;

/// Configuration problems detected before any work is done
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid target dimensions {width}x{height}: both must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("unsupported backend tag: {0:?}")]
    UnsupportedBackend(String),

    #[error("invalid correction pattern {pattern:?}: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while loading models or running recognition
#[derive(Error, Debug)]
pub enum OcrError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} runtime was not initialized")]
    BackendUnavailable(BackendKind),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to load model {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("failed to load dictionary {path:?}: {source}")]
    Dictionary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load ground truth {path:?}: {reason}")]
    GroundTruth { path: PathBuf, reason: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("model {0:?} has been disposed")]
    Disposed(String),
}

impl From<ort::Error> for OcrError {
    fn from(err: ort::Error) -> Self {
        OcrError::Inference(err.to_string())
    }
}

impl OcrError {
    pub fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        OcrError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
