//! Per-model evaluation statistics
//!
//! Accumulates test results for each model so models can be compared after
//! a run. The store is a plain value owned by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::accuracy::{round2, AccuracyResult};

/// One result to record
#[derive(Debug, Clone, PartialEq)]
pub struct TestRecord {
    pub file_name: String,
    pub accuracy: AccuracyResult,
    pub processing_time_ms: f64,
}

/// A recorded result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedTest {
    pub file_name: String,
    /// Accuracy percentage
    pub accuracy: f64,
    pub processing_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Summary of one model's recorded results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatistics {
    pub model_id: String,
    pub total_tests: usize,
    pub avg_processing_time_ms: f64,
    pub avg_accuracy: f64,
    pub perfect_matches: usize,
    /// Percentage of exact matches
    pub perfect_match_rate: f64,
    pub tests: Vec<RecordedTest>,
}

impl ModelStatistics {
    fn empty(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            total_tests: 0,
            avg_processing_time_ms: 0.0,
            avg_accuracy: 0.0,
            perfect_matches: 0,
            perfect_match_rate: 0.0,
            tests: Vec::new(),
        }
    }
}

/// Row of a model comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub model_id: String,
    pub avg_accuracy: f64,
    pub avg_processing_time_ms: f64,
    pub total_tests: usize,
    pub perfect_matches: usize,
    pub perfect_match_rate: f64,
}

#[derive(Debug, Default)]
struct ModelTotals {
    total_processing_time_ms: f64,
    total_accuracy: f64,
    perfect_matches: usize,
    tests: Vec<RecordedTest>,
}

/// Results accumulated per model id
#[derive(Debug, Default)]
pub struct StatisticsStore {
    models: BTreeMap<String, ModelTotals>,
}

impl StatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result, stamped with the current UTC time
    pub fn record(&mut self, model_id: &str, record: TestRecord) {
        let totals = self.models.entry(model_id.to_string()).or_default();
        totals.total_processing_time_ms += record.processing_time_ms;
        totals.total_accuracy += record.accuracy.percentage;
        if record.accuracy.exact_match {
            totals.perfect_matches += 1;
        }
        totals.tests.push(RecordedTest {
            file_name: record.file_name,
            accuracy: record.accuracy.percentage,
            processing_time_ms: record.processing_time_ms,
            timestamp: Utc::now(),
        });
    }

    /// Statistics for one model; zeros when nothing was recorded
    pub fn snapshot(&self, model_id: &str) -> ModelStatistics {
        let Some(totals) = self.models.get(model_id).filter(|t| !t.tests.is_empty()) else {
            return ModelStatistics::empty(model_id);
        };

        let count = totals.tests.len() as f64;
        ModelStatistics {
            model_id: model_id.to_string(),
            total_tests: totals.tests.len(),
            avg_processing_time_ms: round2(totals.total_processing_time_ms / count),
            avg_accuracy: round2(totals.total_accuracy / count),
            perfect_matches: totals.perfect_matches,
            perfect_match_rate: round2(totals.perfect_matches as f64 / count * 100.0),
            tests: totals.tests.clone(),
        }
    }

    /// Statistics for every model with recorded results, keyed by id
    pub fn snapshot_all(&self) -> BTreeMap<String, ModelStatistics> {
        self.models
            .keys()
            .map(|id| (id.clone(), self.snapshot(id)))
            .collect()
    }

    /// Drop one model's results
    pub fn clear(&mut self, model_id: &str) {
        self.models.remove(model_id);
    }

    /// Drop everything
    pub fn reset(&mut self) {
        self.models.clear();
    }

    /// Pretty-printed JSON of [`snapshot_all`](Self::snapshot_all)
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot_all())
    }

    /// Summaries for the given models, best average accuracy first.
    /// Models with equal accuracy keep their requested order.
    pub fn compare(&self, model_ids: &[&str]) -> Vec<ModelComparison> {
        let mut comparison: Vec<ModelComparison> = model_ids
            .iter()
            .map(|id| {
                let stats = self.snapshot(id);
                ModelComparison {
                    model_id: stats.model_id,
                    avg_accuracy: stats.avg_accuracy,
                    avg_processing_time_ms: stats.avg_processing_time_ms,
                    total_tests: stats.total_tests,
                    perfect_matches: stats.perfect_matches,
                    perfect_match_rate: stats.perfect_match_rate,
                }
            })
            .collect();

        comparison.sort_by(|a, b| b.avg_accuracy.total_cmp(&a.avg_accuracy));
        comparison
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::accuracy::score;

    fn record(file_name: &str, hypothesis: &str, reference: &str, time_ms: f64) -> TestRecord {
        TestRecord {
            file_name: file_name.to_string(),
            accuracy: score(hypothesis, Some(reference)),
            processing_time_ms: time_ms,
        }
    }

    #[test]
    fn test_unknown_model_is_zeroed() {
        let store = StatisticsStore::new();
        let stats = store.snapshot("paddleocr_v1");
        assert_eq!(stats.model_id, "paddleocr_v1");
        assert_eq!(stats.total_tests, 0);
        assert_eq!(stats.avg_accuracy, 0.0);
        assert_eq!(stats.perfect_match_rate, 0.0);
        assert!(stats.tests.is_empty());
        assert!(store.snapshot_all().is_empty());
    }

    #[test]
    fn test_averages() {
        let mut store = StatisticsStore::new();
        store.record("v1", record("a.png", "什么", "什么", 10.0));
        store.record("v1", record("b.png", "什2么", "什么", 20.0));
        store.record("v1", record("c.png", "x", "y", 15.5));

        let stats = store.snapshot("v1");
        assert_eq!(stats.total_tests, 3);
        // (100 + 66.67 + 0) / 3
        assert_eq!(stats.avg_accuracy, 55.56);
        assert_eq!(stats.avg_processing_time_ms, 15.17);
        assert_eq!(stats.perfect_matches, 1);
        assert_eq!(stats.perfect_match_rate, 33.33);

        let files: Vec<&str> = stats.tests.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(files, vec!["a.png", "b.png", "c.png"]);
        assert!(stats.tests.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_clear_and_reset() {
        let mut store = StatisticsStore::new();
        store.record("v1", record("a.png", "a", "a", 1.0));
        store.record("v3", record("a.png", "a", "b", 1.0));

        store.clear("v1");
        assert_eq!(store.snapshot("v1").total_tests, 0);
        assert_eq!(store.snapshot("v3").total_tests, 1);
        // Clearing an unknown model is harmless
        store.clear("v9");

        store.reset();
        assert!(store.snapshot_all().is_empty());
    }

    #[test]
    fn test_compare_sorted_by_accuracy() {
        let mut store = StatisticsStore::new();
        store.record("v1", record("a.png", "什2么", "什么", 5.0));
        store.record("v3", record("a.png", "什么", "什么", 8.0));
        store.record("v4", record("a.png", "xy", "什么", 3.0));

        let ids: Vec<String> = store
            .compare(&["v1", "v4", "v3", "unknown"])
            .into_iter()
            .map(|c| c.model_id)
            .collect();
        assert_eq!(ids, vec!["v3", "v1", "v4", "unknown"]);
    }

    #[test]
    fn test_export_json() {
        let mut store = StatisticsStore::new();
        store.record("v1", record("a.png", "什么", "什么", 12.0));

        let json = store.export_json().unwrap();
        let parsed: BTreeMap<String, ModelStatistics> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["v1"].total_tests, 1);
        assert_eq!(parsed["v1"].avg_accuracy, 100.0);
        assert_eq!(parsed["v1"].tests[0].file_name, "a.png");
        assert!(json.contains('\n'));
    }
}
