//! Model loading and lifetime
//!
//! Turns a [`ModelConfig`] into a [`ModelHandle`] on the configured engine,
//! verifying the model file on the way.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use super::backend::lite::LiteBackend;
use super::backend::{
    BackendKind, BackendOutput, InferenceBackend, LiteLoadOptions, OnnxBackend, Runtimes,
};
use super::preprocess::{Normalization, TargetShape, Tensor};
use crate::config::ModelConfig;
use crate::error::OcrError;

/// A loaded model plus the configuration it came from
pub struct ModelHandle {
    config: ModelConfig,
    backend: Box<dyn InferenceBackend>,
}

impl ModelHandle {
    /// Wrap an already constructed backend
    pub fn new(config: ModelConfig, backend: Box<dyn InferenceBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn input_shape(&self) -> TargetShape {
        self.config.input_shape
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn normalization(&self) -> Normalization {
        self.backend.normalization()
    }

    pub async fn run(&self, tensor: Tensor) -> Result<BackendOutput, OcrError> {
        if self.backend.is_disposed() {
            return Err(OcrError::Disposed(self.config.id.clone()));
        }
        self.backend.run(tensor).await
    }

    /// Release the engine resources. Later calls do nothing.
    pub fn dispose(&self) {
        if self.backend.is_disposed() {
            debug!("Model {} already disposed", self.config.id);
            return;
        }
        self.backend.dispose();
        info!("Model {} disposed", self.config.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.backend.is_disposed()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("id", &self.config.id)
            .field("kind", &self.backend.kind())
            .field("disposed", &self.backend.is_disposed())
            .finish()
    }
}

/// Dispose a handle if there is one
pub fn dispose_model(handle: Option<&ModelHandle>) {
    if let Some(handle) = handle {
        handle.dispose();
    }
}

/// Hex SHA-256 of a file
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a model file against its expected checksum
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), OcrError> {
    let hash = file_sha256(path).map_err(|e| OcrError::model_load(path, e))?;
    if hash.eq_ignore_ascii_case(expected) {
        debug!("Checksum verified for {:?}", path);
        Ok(())
    } else {
        warn!("Checksum mismatch for {:?}", path);
        Err(OcrError::model_load(
            path,
            format!("checksum mismatch: expected {expected}, got {hash}"),
        ))
    }
}

/// Load a model on the engine named by its config
pub async fn load_model(config: &ModelConfig, runtimes: &Runtimes) -> Result<ModelHandle, OcrError> {
    let kind = BackendKind::from_tag(&config.backend)?;
    config.input_shape.validate()?;
    runtimes.require(kind)?;

    let path = config.model_path.as_path();
    if !path.is_file() {
        return Err(OcrError::model_load(path, "model file not found"));
    }
    if let Some(expected) = &config.sha256 {
        verify_checksum(path, expected)?;
    }

    info!("Loading model {} ({}) from {:?}", config.id, kind, path);

    let backend: Box<dyn InferenceBackend> = match kind {
        BackendKind::Onnx => Box::new(OnnxBackend::load(path, config.output_name.as_deref())?),
        BackendKind::PaddleLite => {
            let runtime = runtimes.paddle_lite()?;
            let options = LiteLoadOptions::new(path.to_path_buf(), config.input_shape);
            Box::new(LiteBackend::load(runtime.as_ref(), &options).await?)
        }
    };

    Ok(ModelHandle::new(config.clone(), backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_models;
    use crate::error::ConfigError;
    use crate::vision::backend::lite::tests::FakeRunner;
    use crate::vision::backend::lite::LiteError;
    use crate::vision::backend::{LiteOutput, LiteRunner, LiteRuntime};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    struct FakeRuntime {
        loaded: Mutex<Vec<LiteLoadOptions>>,
    }

    #[async_trait]
    impl LiteRuntime for FakeRuntime {
        async fn load(&self, options: &LiteLoadOptions) -> Result<Arc<dyn LiteRunner>, LiteError> {
            self.loaded.lock().push(options.clone());
            Ok(Arc::new(FakeRunner::new(LiteOutput::Flat(vec![]))))
        }
    }

    fn lite_config(path: &Path) -> ModelConfig {
        let mut config = default_models()
            .into_iter()
            .find(|model| model.backend == "paddle_lite")
            .unwrap();
        config.model_path = path.to_path_buf();
        config
    }

    fn model_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"fake model bytes").unwrap();
        file
    }

    fn lite_runtimes() -> (Arc<FakeRuntime>, Runtimes) {
        let runtime = Arc::new(FakeRuntime {
            loaded: Mutex::new(Vec::new()),
        });
        let runtimes = Runtimes::new().with_paddle_lite(runtime.clone());
        (runtime, runtimes)
    }

    #[test]
    fn test_file_sha256() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        assert_eq!(
            file_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_checksum() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let good = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert!(verify_checksum(file.path(), good).is_ok());
        assert!(matches!(
            verify_checksum(file.path(), "00"),
            Err(OcrError::ModelLoad { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_backend_tag() {
        let mut config = lite_config(Path::new("rec.nb"));
        config.backend = "tflite".to_string();
        let result = load_model(&config, &Runtimes::new()).await;
        assert!(matches!(
            result,
            Err(OcrError::Config(ConfigError::UnsupportedBackend(ref tag))) if tag == "tflite"
        ));
    }

    #[tokio::test]
    async fn test_uninitialized_runtime() {
        let file = model_file();
        let config = lite_config(file.path());
        let result = load_model(&config, &Runtimes::new()).await;
        assert!(matches!(
            result,
            Err(OcrError::BackendUnavailable(BackendKind::PaddleLite))
        ));
    }

    #[tokio::test]
    async fn test_missing_model_file() {
        let (_, runtimes) = lite_runtimes();
        let config = lite_config(Path::new("/nonexistent/rec_v3.nb"));
        let result = load_model(&config, &runtimes).await;
        assert!(matches!(result, Err(OcrError::ModelLoad { .. })));
    }

    #[tokio::test]
    async fn test_zero_input_shape_rejected() {
        let (_, runtimes) = lite_runtimes();
        let file = model_file();
        let mut config = lite_config(file.path());
        config.input_shape = TargetShape {
            width: 0,
            height: 48,
        };
        let result = load_model(&config, &runtimes).await;
        assert!(matches!(
            result,
            Err(OcrError::Config(ConfigError::InvalidDimensions { .. }))
        ));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_rejected() {
        let (runtime, runtimes) = lite_runtimes();
        let file = model_file();
        let mut config = lite_config(file.path());
        config.sha256 = Some("deadbeef".to_string());

        let result = load_model(&config, &runtimes).await;
        assert!(matches!(result, Err(OcrError::ModelLoad { .. })));
        assert!(runtime.loaded.lock().is_empty());
    }

    #[tokio::test]
    async fn test_load_lite_model() {
        let (runtime, runtimes) = lite_runtimes();
        let file = model_file();
        let mut config = lite_config(file.path());
        config.sha256 = Some(file_sha256(file.path()).unwrap());

        let handle = load_model(&config, &runtimes).await.unwrap();
        assert_eq!(handle.kind(), BackendKind::PaddleLite);
        assert_eq!(handle.id(), config.id);
        assert_eq!(handle.normalization(), Normalization::PADDLE_LITE);

        let loaded = runtime.loaded.lock();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].feed_shape, TargetShape::RECOGNITION);
        assert_eq!(loaded[0].mean, [0.5; 3]);
        assert_eq!(loaded[0].fill, [255, 255, 255]);
    }

    #[tokio::test]
    async fn test_dispose_handle() {
        let (_, runtimes) = lite_runtimes();
        let file = model_file();
        let handle = load_model(&lite_config(file.path()), &runtimes)
            .await
            .unwrap();

        dispose_model(None);
        dispose_model(Some(&handle));
        dispose_model(Some(&handle));
        assert!(handle.is_disposed());

        let tensor = crate::vision::preprocess::preprocess(
            &image::RgbaImage::new(4, 4),
            handle.input_shape(),
            handle.normalization(),
        )
        .unwrap();
        assert!(matches!(handle.run(tensor).await, Err(OcrError::Disposed(_))));
    }
}
