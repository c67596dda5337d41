//! Analysis Layer
//!
//! Scores recognized text against ground truth and aggregates results per
//! model.

pub mod accuracy;
pub mod evaluation;
pub mod statistics;

pub use accuracy::{edit_distance, score, AccuracyResult};
pub use evaluation::{
    evaluate_all, evaluate_file, evaluate_image, BatchSummary, FileEvaluation, GroundTruth,
    GroundTruthEntry,
};
pub use statistics::{ModelComparison, ModelStatistics, StatisticsStore, TestRecord};
