//! Application Configuration
//!
//! Evaluation settings, correction rules and the model registry, stored in
//! TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::vision::correction::{default_rules, CorrectionRule, TextCorrector};
use crate::vision::preprocess::TargetShape;

/// Model used when none is requested
pub const DEFAULT_MODEL_ID: &str = "paddleocr_v1";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Evaluation settings
    pub evaluation: EvaluationConfig,
    /// Text correction settings
    pub correction: CorrectionConfig,
    /// Model registry
    pub models: Vec<ModelConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationConfig::default(),
            correction: CorrectionConfig::default(),
            models: default_models(),
        }
    }
}

impl AppConfig {
    /// Models marked available, in registry order
    pub fn available_models(&self) -> Vec<&ModelConfig> {
        self.models.iter().filter(|model| model.available).collect()
    }

    /// Look up a model by id
    pub fn model_config(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn default_model_id(&self) -> &str {
        &self.evaluation.default_model
    }
}

/// Batch evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Model used when none is requested
    pub default_model: String,
    /// Directory holding the test images
    pub tests_dir: PathBuf,
    /// Ground truth table (JSON)
    pub ground_truth: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL_ID.to_string(),
            tests_dir: PathBuf::from("static/tests"),
            ground_truth: PathBuf::from("static/tests/ground_truth.json"),
        }
    }
}

/// Post-recognition correction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Apply correction rules at all
    pub enabled: bool,
    /// Rules in evaluation order
    pub rules: Vec<CorrectionRule>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: default_rules(),
        }
    }
}

impl CorrectionConfig {
    /// Compile the configured rules; disabled correction yields no rules
    pub fn build_corrector(&self) -> Result<TextCorrector, ConfigError> {
        if self.enabled {
            TextCorrector::new(&self.rules)
        } else {
            Ok(TextCorrector::empty())
        }
    }
}

/// One recognition model in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Engine tag: `onnx` or `paddle_lite`
    pub backend: String,
    pub model_path: PathBuf,
    pub dictionary_path: PathBuf,
    #[serde(default)]
    pub input_shape: TargetShape,
    #[serde(default)]
    pub version: String,
    /// Whether the model files have been provisioned
    #[serde(default)]
    pub available: bool,
    /// Expected SHA-256 of the model file, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// ONNX output to read; defaults to the first output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

fn registry_entry(
    id: &str,
    name: &str,
    description: &str,
    backend: &str,
    model_file: &str,
    version: &str,
    available: bool,
) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        backend: backend.to_string(),
        model_path: Path::new("static/models").join(model_file),
        dictionary_path: PathBuf::from("static/models/ppocr_keys_v1.txt"),
        input_shape: TargetShape::RECOGNITION,
        version: version.to_string(),
        available,
        sha256: None,
        output_name: None,
    }
}

/// Built-in registry. Only the original model ships with the harness; the
/// others become available once their files are provisioned.
pub fn default_models() -> Vec<ModelConfig> {
    vec![
        registry_entry(
            "paddleocr_v1",
            "PaddleOCR v1 (Original)",
            "Original PaddleOCR recognition model (ONNX)",
            "onnx",
            "rec_model.onnx",
            "1.0",
            true,
        ),
        registry_entry(
            "paddleocr_mobile_v2",
            "PP-OCRv2 Mobile",
            "Lightweight mobile-optimized model, fast inference (8.5MB)",
            "onnx",
            "rec_mobile_v2.onnx",
            "2.0",
            false,
        ),
        registry_entry(
            "paddleocr_server_v2",
            "PP-OCRv2 Server",
            "High accuracy server model (94MB)",
            "onnx",
            "rec_server_v2.onnx",
            "2.0",
            false,
        ),
        registry_entry(
            "paddleocr_v3",
            "PP-OCRv3",
            "Improved accuracy and speed (12MB)",
            "onnx",
            "rec_v3.onnx",
            "3.0",
            false,
        ),
        registry_entry(
            "paddleocr_v4",
            "PP-OCRv4 (Newest)",
            "Best performance and accuracy (10MB)",
            "onnx",
            "rec_v4.onnx",
            "4.0",
            false,
        ),
        registry_entry(
            "paddleocr_lite_v2_mobile",
            "PP-OCRv2 Lite Mobile",
            "Optimized with Paddle Lite, 30-50% smaller",
            "paddle_lite",
            "rec_mobile_v2.nb",
            "2.0",
            false,
        ),
        registry_entry(
            "paddleocr_lite_v3",
            "PP-OCRv3 Lite",
            "v3 optimized with Paddle Lite for mobile deployment",
            "paddle_lite",
            "rec_v3.nb",
            "3.0",
            false,
        ),
    ]
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Load configuration from file, falling back to defaults when it is absent
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
