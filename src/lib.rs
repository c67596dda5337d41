//! OCR model evaluation harness
//!
//! Runs PaddleOCR-style text recognition models on single text-line images
//! and measures character accuracy against ground truth.

pub mod analysis;
pub mod config;
pub mod error;
pub mod storage;
pub mod vision;

pub use error::{ConfigError, OcrError};
