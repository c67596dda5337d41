//! Character dictionary for CTC decoding

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::OcrError;

/// Synthetic symbol occupying index 0
pub const BLANK_SYMBOL: &str = "<blank>";

/// Ordered recognition alphabet. Index 0 is always the blank symbol; indices
/// 1..N map to the loaded symbols in file order. Duplicates and odd entries
/// are kept as-is since only the index-to-symbol mapping matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    symbols: Arc<[String]>,
}

impl Dictionary {
    /// Build a dictionary from loaded symbols, prepending the blank
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: Vec<String> = std::iter::once(BLANK_SYMBOL.to_string())
            .chain(symbols.into_iter().map(Into::into))
            .collect();
        Self {
            symbols: symbols.into(),
        }
    }

    /// Parse a dictionary file body: one symbol per line, empty lines skipped
    pub fn parse(content: &str) -> Self {
        Self::from_symbols(content.split('\n').filter(|line| !line.is_empty()))
    }

    /// Load a dictionary file such as `ppocr_keys_v1.txt`
    pub fn load(path: &Path) -> Result<Self, OcrError> {
        let content = std::fs::read_to_string(path).map_err(|source| OcrError::Dictionary {
            path: path.to_path_buf(),
            source,
        })?;
        let dictionary = Self::parse(&content);
        info!("Dictionary loaded from {:?}: {} characters", path, dictionary.len());
        Ok(dictionary)
    }

    /// Number of classes including the blank
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false: the blank is present in every dictionary
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_blank_prepended() {
        let dict = Dictionary::from_symbols(["什", "么"]);
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get(0), Some(BLANK_SYMBOL));
        assert_eq!(dict.get(1), Some("什"));
        assert_eq!(dict.get(2), Some("么"));
        assert_eq!(dict.get(3), None);
    }

    #[test]
    fn test_parse_skips_empty_lines_only() {
        let dict = Dictionary::parse("a\n\nb\n \na\n");
        assert_eq!(dict.len(), 5);
        assert_eq!(dict.get(3), Some(" "));
        // Duplicates are not removed
        assert_eq!(dict.get(4), Some("a"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "0\n1\n2\n").unwrap();

        let dict = Dictionary::load(file.path()).unwrap();
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.get(1), Some("0"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Dictionary::load(Path::new("/nonexistent/ppocr_keys_v1.txt"));
        assert!(matches!(result, Err(OcrError::Dictionary { .. })));
    }
}
