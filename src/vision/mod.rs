//! Vision/OCR Layer
//!
//! Text recognition over single text-line images:
//! preprocessing, model inference on one of the supported backends, CTC
//! decoding against a character dictionary, and rule-based correction.

pub mod backend;
pub mod correction;
pub mod decode;
pub mod dictionary;
pub mod models;
pub mod ocr;
pub mod preprocess;

pub use backend::{BackendKind, BackendOutput, DegradedOutput, InferenceBackend, Runtimes};
pub use correction::{default_rules, CorrectionRule, TextCorrector};
pub use decode::{ctc_decode, decode_matrix, ProbabilityMatrix};
pub use dictionary::Dictionary;
pub use models::{dispose_model, load_model, ModelHandle};
pub use ocr::{Recognition, Recognizer};
pub use preprocess::{preprocess, Normalization, TargetShape, Tensor, TensorLayout};
