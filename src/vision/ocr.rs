//! Text recognition
//!
//! Runs a single text-line image through preprocessing, the model, CTC
//! decoding and correction.

use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::backend::DegradedOutput;
use super::correction::TextCorrector;
use super::decode::decode_matrix;
use super::dictionary::Dictionary;
use super::models::ModelHandle;
use super::preprocess::preprocess;
use crate::analysis::accuracy::round2;
use crate::error::OcrError;

/// Result of recognizing one image
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    /// Decoder output before correction
    pub raw_text: String,
    /// Corrected text
    pub text: String,
    /// Present when the backend had to guess its output shape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradedOutput>,
    /// Wall time from preprocessing to corrected text
    pub processing_time_ms: f64,
}

/// Recognition pipeline bound to one model
#[derive(Clone)]
pub struct Recognizer {
    handle: Arc<ModelHandle>,
    dictionary: Dictionary,
    corrector: Arc<TextCorrector>,
}

impl Recognizer {
    pub fn new(handle: Arc<ModelHandle>, dictionary: Dictionary, corrector: Arc<TextCorrector>) -> Self {
        Self {
            handle,
            dictionary,
            corrector,
        }
    }

    pub fn handle(&self) -> &Arc<ModelHandle> {
        &self.handle
    }

    pub fn model_id(&self) -> &str {
        self.handle.id()
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Recognize the text in one line image
    pub async fn recognize(&self, image: &RgbaImage) -> Result<Recognition, OcrError> {
        let start = Instant::now();

        let tensor = preprocess(image, self.handle.input_shape(), self.handle.normalization())?;
        let output = self.handle.run(tensor).await?;

        let matrix = &output.matrix;
        if matrix.num_classes() != self.dictionary.len() {
            warn!(
                "Model {} emits {} classes but the dictionary has {} entries",
                self.handle.id(),
                matrix.num_classes(),
                self.dictionary.len()
            );
        }

        let raw_text = decode_matrix(matrix, &self.dictionary);
        let text = self.corrector.correct(&raw_text);

        let processing_time_ms = round2(start.elapsed().as_secs_f64() * 1000.0);
        debug!(
            "Recognized {:?} (raw {:?}) in {}ms",
            text, raw_text, processing_time_ms
        );

        Ok(Recognition {
            raw_text,
            text,
            degraded: output.degraded,
            processing_time_ms,
        })
    }
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("model", &self.handle.id())
            .field("dictionary_len", &self.dictionary.len())
            .field("rules", &self.corrector.rule_count())
            .finish()
    }
}
