//! Greedy decoding of recognition output sequences.
//!
//! The recognition graph emits `[1, T, C]` per-timestep class probabilities
//! over the character dictionary, with class 0 reserved for the blank.
//! Decoding is a per-timestep argmax: blanks and timesteps below the
//! confidence threshold are skipped, everything else maps through the
//! dictionary. There is no beam search and no collapse of repeats.

/// Maps recognition class indices to dictionary characters.
///
/// Dictionary entry `i` corresponds to class index `i + 1`; class 0 is the
/// blank.
#[derive(Debug)]
pub struct SequenceDecoder {
    characters: Vec<String>,
}

impl SequenceDecoder {
    /// Creates a decoder over a newline-delimited dictionary's entries.
    pub fn new(characters: Vec<String>) -> Self {
        Self { characters }
    }

    /// Number of dictionary characters (excluding the blank class).
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// The dictionary character for a recognition class index, if any.
    pub fn character(&self, class_index: usize) -> Option<&str> {
        if class_index == 0 {
            return None;
        }
        self.characters.get(class_index - 1).map(String::as_str)
    }

    /// Decodes a `[1, T, C]` probability tensor into text and confidence.
    ///
    /// The reported confidence is the mean of the per-character probabilities
    /// that passed the threshold, or 0 when none did. The text may be empty.
    pub fn decode(
        &self,
        probabilities: &[f32],
        timesteps: usize,
        classes: usize,
        confidence_threshold: f32,
    ) -> (String, f32) {
        let mut text = String::new();
        let mut kept_probabilities = Vec::new();

        for t in 0..timesteps {
            let row = &probabilities[t * classes..(t + 1) * classes];
            let Some((best_index, &best_probability)) = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            else {
                continue;
            };

            if best_index == 0 || best_probability < confidence_threshold {
                continue;
            }
            let Some(character) = self.character(best_index) else {
                continue;
            };
            text.push_str(character);
            kept_probabilities.push(best_probability);
        }

        let confidence = if kept_probabilities.is_empty() {
            0.0
        } else {
            kept_probabilities.iter().sum::<f32>() / kept_probabilities.len() as f32
        };
        (text, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascii_dict() -> Vec<String> {
        "0123456789abcdefghijklmnopqrstuvwxyz"
            .chars()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn dictionary_indexing_skips_blank() {
        let decoder = SequenceDecoder::new(ascii_dict());
        assert_eq!(decoder.character_count(), 36);
        assert_eq!(decoder.character(0), None);
        assert_eq!(decoder.character(1), Some("0"));
        assert_eq!(decoder.character(11), Some("a"));
        assert_eq!(decoder.character(37), None);
    }

    #[test]
    fn greedy_decode_applies_blank_and_threshold() {
        // 3 timesteps over 36 characters + blank: t0 argmax is the blank,
        // t1 is dictionary index 5 at 0.9, t2 is index 5 again at 0.4.
        let decoder = SequenceDecoder::new(ascii_dict());
        let classes = 37;
        let mut probabilities = vec![0.0f32; 3 * classes];
        probabilities[0] = 0.95; // t0: blank
        probabilities[classes + 6] = 0.9; // t1: class 6 -> dict index 5
        probabilities[2 * classes + 6] = 0.4; // t2: below threshold

        let (text, confidence) = decoder.decode(&probabilities, 3, classes, 0.5);
        assert_eq!(text, "5");
        assert_eq!(confidence, 0.9);
    }

    #[test]
    fn repeats_are_not_collapsed() {
        let decoder = SequenceDecoder::new(ascii_dict());
        let classes = 37;
        let mut probabilities = vec![0.0f32; 2 * classes];
        probabilities[8] = 0.8; // t0: class 8 -> "7"
        probabilities[classes + 8] = 0.8; // t1: class 8 again

        let (text, confidence) = decoder.decode(&probabilities, 2, classes, 0.5);
        assert_eq!(text, "77");
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn empty_result_reports_zero_confidence() {
        let decoder = SequenceDecoder::new(ascii_dict());
        let classes = 37;
        let mut probabilities = vec![0.0f32; classes];
        probabilities[0] = 1.0;

        let (text, confidence) = decoder.decode(&probabilities, 1, classes, 0.5);
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }
}
