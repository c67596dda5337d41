//! Evaluation against ground truth
//!
//! Recognizes test images, scores them against a ground truth table and
//! feeds the results into a [`StatisticsStore`].

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::accuracy::{round2, score, AccuracyResult};
use super::statistics::{StatisticsStore, TestRecord};
use crate::error::OcrError;
use crate::vision::ocr::{Recognition, Recognizer};

/// One row of the ground truth table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthEntry {
    pub file_name: String,
    pub ground_truth_text: String,
}

/// Expected text per test image, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruth {
    entries: Vec<GroundTruthEntry>,
}

impl GroundTruth {
    pub fn from_entries(entries: Vec<GroundTruthEntry>) -> Self {
        Self { entries }
    }

    /// Parse a JSON array of `{ file_name, ground_truth_text }`
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        Ok(Self::from_entries(serde_json::from_str(json)?))
    }

    pub fn load(path: &Path) -> Result<Self, OcrError> {
        let content = std::fs::read_to_string(path).map_err(|e| OcrError::GroundTruth {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let ground_truth = Self::parse(&content).map_err(|e| OcrError::GroundTruth {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded {} ground truth entries from {:?}", ground_truth.len(), path);
        Ok(ground_truth)
    }

    /// Expected text for a file; the first entry wins on duplicates
    pub fn lookup(&self, file_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.file_name == file_name)
            .map(|entry| entry.ground_truth_text.as_str())
    }

    pub fn entries(&self) -> &[GroundTruthEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome for one image
#[derive(Debug, Clone, Serialize)]
pub struct FileEvaluation {
    pub file_name: String,
    pub recognition: Recognition,
    pub ground_truth: Option<String>,
    pub accuracy: AccuracyResult,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub model_id: String,
    pub results: Vec<FileEvaluation>,
    pub avg_accuracy: f64,
    pub avg_time_ms: f64,
    pub total_correct: usize,
    pub total_chars: usize,
    pub perfect_matches: usize,
}

impl BatchSummary {
    fn from_results(model_id: &str, results: Vec<FileEvaluation>) -> Self {
        let count = results.len();
        let (avg_accuracy, avg_time_ms) = if count == 0 {
            (0.0, 0.0)
        } else {
            let accuracy: f64 = results.iter().map(|r| r.accuracy.percentage).sum();
            let time: f64 = results.iter().map(|r| r.recognition.processing_time_ms).sum();
            (round2(accuracy / count as f64), round2(time / count as f64))
        };

        Self {
            model_id: model_id.to_string(),
            total_correct: results.iter().map(|r| r.accuracy.correct).sum(),
            total_chars: results.iter().map(|r| r.accuracy.total).sum(),
            perfect_matches: results.iter().filter(|r| r.accuracy.exact_match).count(),
            avg_accuracy,
            avg_time_ms,
            results,
        }
    }
}

/// Recognize an in-memory image and score it against `reference`
pub async fn evaluate_image(
    recognizer: &Recognizer,
    file_name: &str,
    image: &RgbaImage,
    reference: Option<&str>,
) -> Result<FileEvaluation, OcrError> {
    let recognition = recognizer.recognize(image).await?;
    let accuracy = score(&recognition.text, reference);

    Ok(FileEvaluation {
        file_name: file_name.to_string(),
        recognition,
        ground_truth: reference.map(str::to_string),
        accuracy,
    })
}

/// Recognize one image file. The reference is looked up by file name and
/// may be absent.
pub async fn evaluate_file(
    recognizer: &Recognizer,
    path: &Path,
    ground_truth: &GroundTruth,
) -> Result<FileEvaluation, OcrError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image = image::open(path)?.to_rgba8();

    evaluate_image(recognizer, &file_name, &image, ground_truth.lookup(&file_name)).await
}

/// Recognize every ground truth image under `tests_dir`, in table order,
/// recording each result. The first image that fails aborts the batch.
pub async fn evaluate_all(
    recognizer: &Recognizer,
    ground_truth: &GroundTruth,
    tests_dir: &Path,
    store: &mut StatisticsStore,
) -> Result<BatchSummary, OcrError> {
    let model_id = recognizer.model_id().to_string();
    info!(
        "Evaluating {} images with model {}",
        ground_truth.len(),
        model_id
    );

    let mut results = Vec::with_capacity(ground_truth.len());
    for entry in ground_truth.entries() {
        let image = image::open(tests_dir.join(&entry.file_name))?.to_rgba8();
        let evaluation = evaluate_image(
            recognizer,
            &entry.file_name,
            &image,
            Some(&entry.ground_truth_text),
        )
        .await?;

        info!(
            "{}: {}% ({}ms)",
            entry.file_name, evaluation.accuracy.percentage, evaluation.recognition.processing_time_ms
        );

        store.record(
            &model_id,
            TestRecord {
                file_name: entry.file_name.clone(),
                accuracy: evaluation.accuracy,
                processing_time_ms: evaluation.recognition.processing_time_ms,
            },
        );
        results.push(evaluation);
    }

    Ok(BatchSummary::from_results(&model_id, results))
}
