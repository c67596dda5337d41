//! CTC decoding of recognition model output
//!
//! The recognition head emits one score per class for every timestep. Greedy
//! decoding takes the arg-max class per timestep, then collapses repeats and
//! strips blanks.

use super::dictionary::Dictionary;

/// Blank class index
pub const BLANK_INDEX: usize = 0;

/// Per-timestep class scores, `[time_steps, num_classes]` row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    data: Vec<f32>,
    time_steps: usize,
    num_classes: usize,
}

impl ProbabilityMatrix {
    /// Returns `None` when `data.len() != time_steps * num_classes`
    pub fn new(data: Vec<f32>, time_steps: usize, num_classes: usize) -> Option<Self> {
        if time_steps.checked_mul(num_classes)? != data.len() {
            return None;
        }
        Some(Self {
            data,
            time_steps,
            num_classes,
        })
    }

    /// Build from model output dims. Accepts `[1, T, C]` and `[T, C]`.
    pub fn from_dims(data: Vec<f32>, dims: &[usize]) -> Option<Self> {
        let (t, c) = Self::matrix_dims(dims)?;
        Self::new(data, t, c)
    }

    /// `(T, C)` for dims [`from_dims`](Self::from_dims) accepts
    pub fn matrix_dims(dims: &[usize]) -> Option<(usize, usize)> {
        match *dims {
            [1, t, c] | [t, c] => Some((t, c)),
            _ => None,
        }
    }

    /// Zero-pad or truncate `data` to exactly `time_steps * num_classes`
    pub fn fitted(mut data: Vec<f32>, time_steps: usize, num_classes: usize) -> Self {
        data.resize(time_steps.saturating_mul(num_classes), 0.0);
        Self {
            data,
            time_steps,
            num_classes,
        }
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Arg-max class index for every timestep. Ties go to the lowest index:
    /// the scan moves left to right and only replaces on a strictly greater
    /// value.
    pub fn argmax_indices(&self) -> Vec<usize> {
        if self.num_classes == 0 {
            return vec![BLANK_INDEX; self.time_steps];
        }

        self.data
            .chunks_exact(self.num_classes)
            .map(|row| {
                let mut max_idx = 0;
                let mut max_val = row[0];
                for (c, &value) in row.iter().enumerate().skip(1) {
                    if value > max_val {
                        max_val = value;
                        max_idx = c;
                    }
                }
                max_idx
            })
            .collect()
    }
}

/// Greedy CTC collapse of arg-max indices into text.
///
/// `previous` tracks the last *seen* index, including blanks and indices that
/// fall outside the dictionary, so `[0, 5, 5]` emits one symbol and
/// `[5, 0, 5]` emits two. Out-of-range indices are dropped silently.
pub fn ctc_decode(indices: &[usize], dictionary: &Dictionary) -> String {
    let mut text = String::new();
    let mut previous: Option<usize> = None;

    for &index in indices {
        if index == BLANK_INDEX {
            previous = Some(index);
            continue;
        }

        if Some(index) == previous {
            continue;
        }

        if index >= 1 {
            if let Some(symbol) = dictionary.get(index) {
                text.push_str(symbol);
            }
        }

        previous = Some(index);
    }

    text
}

/// Arg-max then CTC collapse
pub fn decode_matrix(matrix: &ProbabilityMatrix, dictionary: &Dictionary) -> String {
    ctc_decode(&matrix.argmax_indices(), dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> Dictionary {
        Dictionary::from_symbols(["a", "b", "c", "d", "e"])
    }

    #[test]
    fn test_concrete_scenario() {
        let dict = Dictionary::from_symbols(["什", "么"]);
        assert_eq!(ctc_decode(&[0, 1, 1, 0, 2, 0], &dict), "什么");
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(ctc_decode(&[], &digits()), "");
    }

    #[test]
    fn test_all_blank() {
        for len in [1, 2, 10, 40] {
            assert_eq!(ctc_decode(&vec![0; len], &digits()), "");
        }
    }

    #[test]
    fn test_blank_separates_repeats() {
        // Index 5 is "e"
        assert_eq!(ctc_decode(&[0, 5, 5, 0, 5], &digits()), "ee");
        assert_eq!(ctc_decode(&[5, 5, 5], &digits()), "e");
        assert_eq!(ctc_decode(&[1, 2, 1], &digits()), "aba");
    }

    #[test]
    fn test_out_of_range_dropped_but_tracked() {
        let dict = digits();
        assert_eq!(ctc_decode(&[9, 1, 9, 2], &dict), "ab");
        // The second 9 collapses into the first even though neither emitted
        assert_eq!(ctc_decode(&[1, 9, 9, 1], &dict), "aa");
        // An out-of-range index between repeats still separates them
        assert_eq!(ctc_decode(&[3, 99, 3], &dict), "cc");
    }

    #[test]
    fn test_argmax_tie_breaks_to_lowest_index() {
        let matrix = ProbabilityMatrix::new(
            vec![
                0.1, 0.7, 0.7, 0.1, // tie between 1 and 2
                0.5, 0.5, 0.5, 0.5, // all equal
                0.0, 0.1, 0.2, 0.9, //
            ],
            3,
            4,
        )
        .unwrap();
        assert_eq!(matrix.argmax_indices(), vec![1, 0, 3]);
    }

    #[test]
    fn test_argmax_handles_negative_logits() {
        let matrix = ProbabilityMatrix::new(vec![-3.0, -1.0, -2.0], 1, 3).unwrap();
        assert_eq!(matrix.argmax_indices(), vec![1]);
    }

    #[test]
    fn test_from_dims() {
        assert!(ProbabilityMatrix::from_dims(vec![0.0; 6], &[1, 2, 3]).is_some());
        assert!(ProbabilityMatrix::from_dims(vec![0.0; 6], &[2, 3]).is_some());
        assert!(ProbabilityMatrix::from_dims(vec![0.0; 6], &[2, 2, 3]).is_none());
        assert!(ProbabilityMatrix::from_dims(vec![0.0; 5], &[1, 2, 3]).is_none());
        assert!(ProbabilityMatrix::from_dims(vec![0.0; 6], &[6]).is_none());
    }

    #[test]
    fn test_fitted_pads_and_truncates() {
        let padded = ProbabilityMatrix::fitted(vec![1.0, 2.0], 2, 2);
        assert_eq!(padded.data(), &[1.0, 2.0, 0.0, 0.0]);

        let truncated = ProbabilityMatrix::fitted(vec![1.0; 10], 2, 2);
        assert_eq!(truncated.data().len(), 4);
    }

    #[test]
    fn test_decode_matrix() {
        let dict = Dictionary::from_symbols(["什", "么"]);
        #[rustfmt::skip]
        let matrix = ProbabilityMatrix::new(
            vec![
                0.9, 0.05, 0.05,
                0.1, 0.8, 0.1,
                0.1, 0.8, 0.1,
                0.9, 0.05, 0.05,
                0.1, 0.1, 0.8,
            ],
            5,
            3,
        )
        .unwrap();
        assert_eq!(decode_matrix(&matrix, &dict), "什么");
    }
}
