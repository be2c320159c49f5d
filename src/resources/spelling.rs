use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use crate::errors::*;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzäöüß";

/// Frequency-dictionary spell checker.
///
/// The dictionary file is line oriented: a word optionally followed by a
/// whitespace-separated frequency (defaulting to 1). Domain vocabulary is
/// loaded into the same table, so domain words count as known and are kept
/// verbatim during correction.
pub struct SpellChecker {
    frequencies: HashMap<String, u64>,
}

impl SpellChecker {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = BufReader::new(reader);
        let mut frequencies = HashMap::<String, u64>::new();
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            if let Some(word) = parts.next() {
                let frequency = parts
                    .next()
                    .and_then(|raw_count| raw_count.parse::<u64>().ok())
                    .unwrap_or(1);
                *frequencies.entry(word.to_lowercase()).or_insert(0) += frequency;
            }
        }
        Ok(Self { frequencies })
    }

    pub fn is_known(&self, word: &str) -> bool {
        self.frequencies.contains_key(word)
    }

    /// The most frequent in-dictionary candidate within edit distance 1,
    /// falling back to distance 2. `None` when the word is already known or
    /// no candidate exists.
    pub fn correction(&self, word: &str) -> Option<String> {
        if self.is_known(word) {
            return None;
        }
        let single_edits = edits(word);
        if let Some(best) = self.best_candidate(single_edits.iter()) {
            return Some(best);
        }
        let double_edits = single_edits.iter().flat_map(|edit| edits(edit));
        self.best_candidate_owned(double_edits)
    }

    fn best_candidate<'a, I: Iterator<Item = &'a String>>(&self, candidates: I) -> Option<String> {
        self.best_candidate_owned(candidates.cloned())
    }

    fn best_candidate_owned<I: Iterator<Item = String>>(&self, candidates: I) -> Option<String> {
        candidates
            .filter(|candidate| self.frequencies.contains_key(candidate))
            .max_by(|lhs, rhs| {
                let lhs_freq = self.frequencies[lhs];
                let rhs_freq = self.frequencies[rhs];
                // ties resolved lexicographically to keep corrections stable
                lhs_freq.cmp(&rhs_freq).then(rhs.cmp(lhs))
            })
    }
}

fn edits(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut results = Vec::new();
    for i in 0..chars.len() {
        let mut deleted = chars.clone();
        deleted.remove(i);
        results.push(deleted.into_iter().collect());
    }
    for i in 0..chars.len().saturating_sub(1) {
        let mut transposed = chars.clone();
        transposed.swap(i, i + 1);
        results.push(transposed.into_iter().collect());
    }
    for i in 0..chars.len() {
        for c in ALPHABET.chars() {
            let mut replaced = chars.clone();
            replaced[i] = c;
            results.push(replaced.into_iter().collect());
        }
    }
    for i in 0..=chars.len() {
        for c in ALPHABET.chars() {
            let mut inserted = chars.clone();
            inserted.insert(i, c);
            results.push(inserted.into_iter().collect());
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> SpellChecker {
        let dictionary: &[u8] = r#"
fehler 120
tabelle 80
gesperrt 40
bestellungen 30
"#
        .as_ref();
        SpellChecker::from_reader(dictionary).unwrap()
    }

    #[test]
    fn known_word_is_not_corrected() {
        // Given
        let checker = checker();

        // When
        let correction = checker.correction("tabelle");

        // Then
        assert!(checker.is_known("tabelle"));
        assert_eq!(None, correction);
    }

    #[test]
    fn close_misspelling_is_corrected() {
        // Given
        let checker = checker();

        // When
        let correction = checker.correction("tabele");

        // Then
        assert_eq!(Some("tabelle".to_string()), correction);
    }

    #[test]
    fn distance_two_misspelling_is_corrected() {
        // Given
        let checker = checker();

        // When
        let correction = checker.correction("gesprrrt");

        // Then
        assert_eq!(Some("gesperrt".to_string()), correction);
    }

    #[test]
    fn hopeless_word_has_no_correction() {
        // Given
        let checker = checker();

        // When
        let correction = checker.correction("xxxxxxxxxxxxxxxx");

        // Then
        assert_eq!(None, correction);
    }
}
