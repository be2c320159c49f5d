use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maps normalized text to fixed-length integer sequences through a
/// frequency-ranked vocabulary. Index 0 is padding, index 1 is the
/// out-of-vocabulary bucket; both count against `vocab_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextVectorizer {
    vocab_size: usize,
    max_sequence_length: usize,
    vocabulary: HashMap<String, usize>,
    inverse_vocabulary: Vec<String>,
}

pub const PADDING_INDEX: usize = 0;
pub const OOV_INDEX: usize = 1;
pub const PADDING_TOKEN: &str = "";
pub const OOV_TOKEN: &str = "[OOV]";

impl TextVectorizer {
    pub fn new(vocab_size: usize, max_sequence_length: usize) -> Self {
        Self {
            vocab_size,
            max_sequence_length,
            vocabulary: HashMap::new(),
            inverse_vocabulary: vec![PADDING_TOKEN.to_string(), OOV_TOKEN.to_string()],
        }
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Number of indices actually assigned, padding and OOV included.
    pub fn vocabulary_len(&self) -> usize {
        self.inverse_vocabulary.len()
    }

    /// Fits the vocabulary on a corpus: tokens ranked by frequency (ties by
    /// first occurrence), capped at `vocab_size` including the two reserved
    /// indices. Any previous fit is discarded.
    pub fn fit(&mut self, corpus: &[String]) {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut order = 0;
        for utterance in corpus {
            for token in utterance.split_whitespace() {
                let entry = counts.entry(token).or_insert_with(|| {
                    order += 1;
                    (0, order)
                });
                entry.0 += 1;
            }
        }
        let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|(_, (count_a, order_a)), (_, (count_b, order_b))| {
            count_b.cmp(count_a).then(order_a.cmp(order_b))
        });

        self.vocabulary = HashMap::new();
        self.inverse_vocabulary = vec![PADDING_TOKEN.to_string(), OOV_TOKEN.to_string()];
        for (token, _) in ranked.into_iter().take(self.vocab_size.saturating_sub(2)) {
            self.vocabulary
                .insert(token.to_string(), self.inverse_vocabulary.len());
            self.inverse_vocabulary.push(token.to_string());
        }
    }

    /// Vectorizes one utterance: vocabulary lookup (OOV bucket for unknown
    /// tokens), then truncation or zero padding to `max_sequence_length`.
    pub fn transform(&self, text: &str) -> Vec<usize> {
        let mut sequence: Vec<usize> = text
            .split_whitespace()
            .map(|token| *self.vocabulary.get(token).unwrap_or(&OOV_INDEX))
            .take(self.max_sequence_length)
            .collect();
        sequence.resize(self.max_sequence_length, PADDING_INDEX);
        sequence
    }

    /// Maps indices back to tokens, dropping padding; the inverse of
    /// `transform` up to truncation and OOV collapse.
    pub fn decode(&self, sequence: &[usize]) -> Vec<String> {
        sequence
            .iter()
            .filter(|&&index| index != PADDING_INDEX)
            .map(|&index| {
                self.inverse_vocabulary
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| OOV_TOKEN.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "tabelle gesperrt".to_string(),
            "tabelle fehlt".to_string(),
            "email ungültig".to_string(),
        ]
    }

    #[test]
    fn fit_ranks_tokens_by_frequency_then_first_seen() {
        // Given
        let mut vectorizer = TextVectorizer::new(10, 4);

        // When
        vectorizer.fit(&corpus());

        // Then
        // "tabelle" occurs twice and gets the first free index
        assert_eq!(vec![2, 3, 0, 0], vectorizer.transform("tabelle gesperrt"));
        assert_eq!(7, vectorizer.vocabulary_len());
    }

    #[test]
    fn vocab_size_caps_vocabulary_including_reserved_indices() {
        // Given
        let mut vectorizer = TextVectorizer::new(4, 4);

        // When
        vectorizer.fit(&corpus());

        // Then
        assert_eq!(4, vectorizer.vocabulary_len());
        // low-frequency tokens fall into the OOV bucket
        assert_eq!(vec![2, OOV_INDEX, 0, 0], vectorizer.transform("tabelle ungültig"));
    }

    #[test]
    fn transform_truncates_and_pads_to_fixed_length() {
        // Given
        let mut vectorizer = TextVectorizer::new(10, 3);
        vectorizer.fit(&corpus());

        // When
        let long = vectorizer.transform("tabelle gesperrt tabelle fehlt email");
        let short = vectorizer.transform("email");

        // Then
        assert_eq!(3, long.len());
        assert_eq!(3, short.len());
        assert_eq!(PADDING_INDEX, short[1]);
        assert_eq!(PADDING_INDEX, short[2]);
    }

    #[test]
    fn known_tokens_round_trip_through_decode() {
        // Given
        let mut vectorizer = TextVectorizer::new(10, 6);
        vectorizer.fit(&corpus());
        let text = "tabelle gesperrt email";

        // When
        let sequence = vectorizer.transform(text);
        let decoded = vectorizer.decode(&sequence);

        // Then
        assert_eq!(vec!["tabelle", "gesperrt", "email"], decoded);
    }
}
