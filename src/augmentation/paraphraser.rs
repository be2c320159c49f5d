use std::collections::HashMap;

/// Marker emitted by a paraphraser in place of a word it has no candidate
/// for; the augmenter later substitutes stop words for these markers.
pub const UNKNOWN_TOKEN: &str = "[UNK]";

/// Seam for the pretrained paraphrasing model: generates `n` variants of an
/// utterance by inserting or substituting semantically related words.
pub trait Paraphraser: Send + Sync {
    fn insert(&self, utterance: &str, n: usize) -> Vec<String>;
    fn substitute(&self, utterance: &str, n: usize) -> Vec<String>;
}

/// Paraphraser backed by a pretrained word-similarity table
/// (word -> related words, most similar first).
///
/// Variant `i` works on token position `i % len`, cycling through the
/// related-word candidates of that position, so repeated calls are
/// deterministic and the requested count is always produced.
pub struct SimilarityParaphraser {
    similarities: HashMap<String, Vec<String>>,
}

impl SimilarityParaphraser {
    pub fn new(similarities: HashMap<String, Vec<String>>) -> Self {
        Self { similarities }
    }

    fn related_word(&self, word: &str, variant: usize) -> Option<String> {
        self.similarities
            .get(&word.to_lowercase())
            .map(|candidates| candidates[variant % candidates.len()].clone())
    }
}

impl Paraphraser for SimilarityParaphraser {
    fn insert(&self, utterance: &str, n: usize) -> Vec<String> {
        let tokens: Vec<&str> = utterance.split_whitespace().collect();
        if tokens.is_empty() {
            return vec![utterance.to_string(); n];
        }
        (0..n)
            .map(|i| {
                let position = i % tokens.len();
                let inserted = self
                    .related_word(tokens[position], i / tokens.len())
                    .unwrap_or_else(|| UNKNOWN_TOKEN.to_string());
                let mut new_tokens: Vec<String> =
                    tokens.iter().map(|t| t.to_string()).collect();
                new_tokens.insert(position + 1, inserted);
                new_tokens.join(" ")
            })
            .collect()
    }

    fn substitute(&self, utterance: &str, n: usize) -> Vec<String> {
        let tokens: Vec<&str> = utterance.split_whitespace().collect();
        if tokens.is_empty() {
            return vec![utterance.to_string(); n];
        }
        (0..n)
            .map(|i| {
                let position = i % tokens.len();
                let replacement = self
                    .related_word(tokens[position], i / tokens.len())
                    .unwrap_or_else(|| UNKNOWN_TOKEN.to_string());
                let new_tokens: Vec<String> = tokens
                    .iter()
                    .enumerate()
                    .map(|(ix, t)| {
                        if ix == position {
                            replacement.clone()
                        } else {
                            t.to_string()
                        }
                    })
                    .collect();
                new_tokens.join(" ")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    fn paraphraser() -> SimilarityParaphraser {
        SimilarityParaphraser::new(hashmap! {
            "fehler".to_string() => vec!["problem".to_string(), "störung".to_string()],
            "tabelle".to_string() => vec!["datentabelle".to_string()],
        })
    }

    #[test]
    fn insert_produces_requested_count() {
        // Given
        let paraphraser = paraphraser();

        // When
        let variants = paraphraser.insert("Fehler in Tabelle", 4);

        // Then
        assert_eq!(4, variants.len());
        assert_eq!("Fehler problem in Tabelle", variants[0]);
        assert!(variants.iter().all(|v| v.split_whitespace().count() == 4));
    }

    #[test]
    fn unknown_context_words_become_markers() {
        // Given
        let paraphraser = paraphraser();

        // When
        let variants = paraphraser.substitute("Xyz kaputt", 2);

        // Then
        assert_eq!(vec!["[UNK] kaputt", "Xyz [UNK]"], variants);
    }

    #[test]
    fn substitution_replaces_in_place() {
        // Given
        let paraphraser = paraphraser();

        // When
        let variants = paraphraser.substitute("fehler tabelle", 2);

        // Then
        assert_eq!(vec!["problem tabelle", "fehler datentabelle"], variants);
    }
}
