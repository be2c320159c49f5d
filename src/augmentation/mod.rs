mod paraphraser;

use log::{info, warn};

use crate::utils::IntentTag;

pub use self::paraphraser::{Paraphraser, SimilarityParaphraser, UNKNOWN_TOKEN};

/// Balances the training corpus by paraphrasing under-represented labels up
/// to a target utterance count.
pub struct Augmenter {
    paraphraser: Box<dyn Paraphraser>,
}

impl Augmenter {
    pub fn new(paraphraser: Box<dyn Paraphraser>) -> Self {
        Self { paraphraser }
    }

    /// For every label with fewer than `target_count` utterances, generates
    /// paraphrases of the label's first utterance until the target is
    /// reached; labels at or above the target pass through unchanged.
    ///
    /// Labels are emitted one per produced utterance, so the returned lists
    /// always have equal length even if the paraphraser under-delivers.
    pub fn balance(
        &self,
        utterances_by_label: &[(IntentTag, Vec<String>)],
        target_count: usize,
        stop_words: &[String],
    ) -> (Vec<String>, Vec<IntentTag>) {
        let mut aug_utterances: Vec<String> = Vec::new();
        let mut aug_labels: Vec<IntentTag> = Vec::new();

        for (idx, (label, utterances)) in utterances_by_label.iter().enumerate() {
            aug_utterances.extend(utterances.iter().cloned());
            aug_labels.extend(utterances.iter().map(|_| label.clone()));

            let count = utterances.len();
            if target_count > count && !utterances.is_empty() {
                let deficit = target_count - count;
                let generated =
                    self.augmented_utterances(&utterances[0], stop_words, deficit);
                if generated.len() < deficit {
                    warn!(
                        "Label '{}' under-filled: requested {} paraphrases, got {}",
                        label,
                        deficit,
                        generated.len()
                    );
                }
                aug_labels.extend(generated.iter().map(|_| label.clone()));
                aug_utterances.extend(generated);
            }

            if (idx + 1) % 10 == 0 || idx + 1 == utterances_by_label.len() {
                info!("Processed {} labels.", idx + 1);
            }
        }

        (aug_utterances, aug_labels)
    }

    /// `ceil(n/2)` insertion paraphrases followed by `floor(n/2)` substitution
    /// paraphrases (substitution only when more than one is requested), with
    /// placeholder markers resolved against stop words of the seed utterance.
    fn augmented_utterances(
        &self,
        utterance: &str,
        stop_words: &[String],
        n: usize,
    ) -> Vec<String> {
        let mut combined = self.paraphraser.insert(utterance, (n + 1) / 2);
        if n > 1 {
            combined.extend(self.paraphraser.substitute(utterance, n / 2));
        }
        let found_stop_words = stop_words_in_utterance(utterance, stop_words);
        replace_unknown_markers(combined, &found_stop_words)
    }
}

/// Stop words contained (as substrings) in the utterance, in stop-word list
/// order.
fn stop_words_in_utterance(utterance: &str, stop_words: &[String]) -> Vec<String> {
    stop_words
        .iter()
        .filter(|word| utterance.contains(word.as_str()))
        .cloned()
        .collect()
}

/// Replaces `[UNK]` markers left to right with the given stop words, one per
/// marker; markers beyond the stop-word supply stay in place.
fn replace_unknown_markers(utterances: Vec<String>, stop_words: &[String]) -> Vec<String> {
    utterances
        .into_iter()
        .map(|utterance| {
            let mut utterance = utterance;
            for word in stop_words {
                utterance = utterance.replacen(UNKNOWN_TOKEN, word, 1);
            }
            utterance
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedParaphraser {
        insert_output: Vec<String>,
        substitute_output: Vec<String>,
    }

    impl Paraphraser for FixedParaphraser {
        fn insert(&self, _utterance: &str, n: usize) -> Vec<String> {
            self.insert_output.iter().take(n).cloned().collect()
        }

        fn substitute(&self, _utterance: &str, n: usize) -> Vec<String> {
            self.substitute_output.iter().take(n).cloned().collect()
        }
    }

    fn stop_words() -> Vec<String> {
        vec!["die", "ist", "in"]
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn balances_each_label_to_target_count() {
        // Given
        let paraphraser = SimilarityParaphraser::new(Default::default());
        let augmenter = Augmenter::new(Box::new(paraphraser));
        let grouped = vec![
            (
                "a".to_string(),
                vec!["die tabelle ist gesperrt".to_string()],
            ),
            (
                "b".to_string(),
                vec![
                    "b eins".to_string(),
                    "b zwei".to_string(),
                    "b drei".to_string(),
                    "b vier".to_string(),
                    "b fünf".to_string(),
                ],
            ),
        ];

        // When
        let (utterances, labels) = augmenter.balance(&grouped, 5, &stop_words());

        // Then
        assert_eq!(10, utterances.len());
        assert_eq!(10, labels.len());
        assert_eq!(5, labels.iter().filter(|l| l.as_str() == "a").count());
        assert_eq!(5, labels.iter().filter(|l| l.as_str() == "b").count());
    }

    #[test]
    fn label_above_target_passes_through_unchanged() {
        // Given
        let augmenter = Augmenter::new(Box::new(SimilarityParaphraser::new(Default::default())));
        let utterances: Vec<String> = (0..7).map(|i| format!("utterance {}", i)).collect();
        let grouped = vec![("big".to_string(), utterances.clone())];

        // When
        let (out_utterances, out_labels) = augmenter.balance(&grouped, 5, &stop_words());

        // Then
        assert_eq!(utterances, out_utterances);
        assert_eq!(7, out_labels.len());
    }

    #[test]
    fn insertion_results_precede_substitution_results() {
        // Given
        let paraphraser = FixedParaphraser {
            insert_output: vec!["ins eins".to_string(), "ins zwei".to_string()],
            substitute_output: vec!["sub eins".to_string()],
        };
        let augmenter = Augmenter::new(Box::new(paraphraser));
        let grouped = vec![("a".to_string(), vec!["seed zwei".to_string()])];

        // When
        let (utterances, _) = augmenter.balance(&grouped, 4, &stop_words());

        // Then
        // deficit 3 -> 2 insertions then 1 substitution, after the seed
        assert_eq!(
            vec!["seed zwei", "ins eins", "ins zwei", "sub eins"],
            utterances
        );
    }

    #[test]
    fn single_deficit_uses_insertion_only() {
        // Given
        let paraphraser = FixedParaphraser {
            insert_output: vec!["nur einfügung".to_string()],
            substitute_output: vec!["nie benutzt".to_string()],
        };
        let augmenter = Augmenter::new(Box::new(paraphraser));
        let grouped = vec![(
            "a".to_string(),
            vec![
                "eins".to_string(),
                "zwei".to_string(),
                "drei".to_string(),
                "vier".to_string(),
            ],
        )];

        // When
        let (utterances, labels) = augmenter.balance(&grouped, 5, &stop_words());

        // Then
        assert_eq!(5, utterances.len());
        assert_eq!(5, labels.len());
        assert_eq!("nur einfügung", utterances[4]);
    }

    #[test]
    fn markers_are_replaced_by_seed_stop_words_left_to_right() {
        // Given
        let paraphraser = FixedParaphraser {
            insert_output: vec!["[UNK] tabelle [UNK] gesperrt [UNK]".to_string()],
            substitute_output: vec![],
        };
        let augmenter = Augmenter::new(Box::new(paraphraser));
        let grouped = vec![(
            "a".to_string(),
            vec![
                "die tabelle ist gesperrt".to_string(),
                "zweite".to_string(),
                "dritte".to_string(),
                "vierte".to_string(),
            ],
        )];

        // When
        let (utterances, _) = augmenter.balance(&grouped, 5, &stop_words());

        // Then
        // "die" and "ist" occur in the seed, "in" does not occur as its own
        // stop word before them; the third marker has no stop word left
        assert_eq!("die tabelle ist gesperrt [UNK]", utterances[4]);
    }
}
