use std::collections::{HashMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::resources::{Lemmatizer, SharedResources, SpellChecker};

/// One stage of the text normalization pipeline.
///
/// Stage names not known to this version deserialize to `Unknown`, which is
/// an identity pass-through; configurations may thus name stages from newer
/// versions without breaking older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessingStep {
    Lowercase,
    RemoveUnimportant,
    ReplaceAbbreviations,
    RemoveStopwords,
    CorrectSpelling,
    Lemmatize,
    Unknown,
}

impl PreprocessingStep {
    pub fn name(&self) -> &'static str {
        match self {
            PreprocessingStep::Lowercase => "lowercase",
            PreprocessingStep::RemoveUnimportant => "remove_unimportant",
            PreprocessingStep::ReplaceAbbreviations => "replace_abbreviations",
            PreprocessingStep::RemoveStopwords => "remove_stopwords",
            PreprocessingStep::CorrectSpelling => "correct_spelling",
            PreprocessingStep::Lemmatize => "lemmatize",
            PreprocessingStep::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "lowercase" => PreprocessingStep::Lowercase,
            "remove_unimportant" => PreprocessingStep::RemoveUnimportant,
            "replace_abbreviations" => PreprocessingStep::ReplaceAbbreviations,
            "remove_stopwords" => PreprocessingStep::RemoveStopwords,
            "correct_spelling" => PreprocessingStep::CorrectSpelling,
            "lemmatize" => PreprocessingStep::Lemmatize,
            _ => PreprocessingStep::Unknown,
        }
    }
}

impl fmt::Display for PreprocessingStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for PreprocessingStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PreprocessingStep {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> ::std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(PreprocessingStep::from_name(&name))
    }
}

/// Applies the configured stages in order. The same stage slice and the same
/// resources are used at training and at inference time.
pub fn preprocess_utterance(
    text: &str,
    steps: &[PreprocessingStep],
    resources: &SharedResources,
) -> String {
    steps.iter().fold(text.to_string(), |current, step| {
        apply_step(&current, *step, resources)
    })
}

fn apply_step(text: &str, step: PreprocessingStep, resources: &SharedResources) -> String {
    match step {
        PreprocessingStep::Lowercase => lower_text(text),
        PreprocessingStep::RemoveUnimportant => remove_unimportant_data(text),
        PreprocessingStep::ReplaceAbbreviations => {
            replace_abbreviations(text, &resources.contractions)
        }
        PreprocessingStep::RemoveStopwords => remove_stop_words(text, &resources.stop_word_set),
        PreprocessingStep::CorrectSpelling => correct_spelling(text, &resources.spell_checker),
        PreprocessingStep::Lemmatize => lemmatize(text, &*resources.lemmatizer),
        PreprocessingStep::Unknown => text.to_string(),
    }
}

pub fn lower_text(text: &str) -> String {
    text.to_lowercase()
}

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"https?://.*[\r\n]*").unwrap();
    static ref HTML_LINK_RE: Regex = Regex::new(r"<a href").unwrap();
    static ref AMP_RE: Regex = Regex::new(r"&amp;").unwrap();
    static ref SPECIAL_CHARS_RE: Regex = Regex::new(r"[_'\-;%()|+&=*%.,!?:#$@\[\]/]").unwrap();
    static ref HTML_BREAK_RE: Regex = Regex::new(r"<br />").unwrap();
    static ref QUOTE_RE: Regex = Regex::new("\"").unwrap();
}

/// Strips links and noise characters. The substitution order is significant:
/// URLs must go before the generic special-character class.
pub fn remove_unimportant_data(text: &str) -> String {
    let text = URL_RE.replace_all(text, "");
    let text = HTML_LINK_RE.replace_all(&text, " ");
    let text = AMP_RE.replace_all(&text, "");
    let text = SPECIAL_CHARS_RE.replace_all(&text, " ");
    let text = HTML_BREAK_RE.replace_all(&text, " ");
    let text = QUOTE_RE.replace_all(&text, " ");
    text.to_string()
}

pub fn replace_abbreviations(text: &str, contractions: &HashMap<String, String>) -> String {
    text.split_whitespace()
        .map(|word| {
            contractions
                .get(word)
                .map(|expansion| expansion.as_str())
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn remove_stop_words(text: &str, stop_words: &HashSet<String>) -> String {
    text.split_whitespace()
        .filter(|word| !stop_words.contains(*word))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn correct_spelling(text: &str, spell_checker: &SpellChecker) -> String {
    text.split_whitespace()
        .map(|word| {
            if spell_checker.is_known(word) {
                word.to_string()
            } else {
                spell_checker
                    .correction(word)
                    .unwrap_or_else(|| word.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn lemmatize(text: &str, lemmatizer: &dyn Lemmatizer) -> String {
    text.split_whitespace()
        .map(|word| lemmatizer.lemma(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{EntityGazetteer, HashMapLemmatizer, SharedResources};
    use maplit::hashmap;
    use std::iter::FromIterator;
    use std::sync::Arc;

    pub fn test_resources() -> SharedResources {
        let stop_words: Vec<String> = vec!["die", "ist", "in", "der"]
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let stop_word_set = stop_words.iter().cloned().collect();
        let spelling: &[u8] =
            b"fehler 120\ntabelle 80\ngesperrt 40\nnummer 10\ndatenbank 10\nbestellungen 30";
        SharedResources {
            stop_words,
            stop_word_set,
            contractions: hashmap! {
                "db".to_string() => "datenbank".to_string(),
                "nr".to_string() => "nummer".to_string(),
            },
            entity_gazetteer: EntityGazetteer::default(),
            spell_checker: SpellChecker::from_reader(spelling).unwrap(),
            lemmatizer: Arc::new(HashMapLemmatizer::from_iter(vec![(
                "gesperrt".to_string(),
                "sperren".to_string(),
            )])),
            word_similarities: hashmap! {},
        }
    }

    #[test]
    fn removes_urls_before_special_characters() {
        // Given
        let text = "siehe https://wiki.local/seite?id=1 tabelle [Bestellungen]";

        // When
        let cleaned = remove_unimportant_data(text);

        // Then
        assert!(!cleaned.contains("https"));
        assert!(!cleaned.contains('['));
        assert!(cleaned.contains("tabelle"));
    }

    #[test]
    fn expands_abbreviations_token_wise() {
        // Given
        let resources = test_resources();

        // When
        let expanded = replace_abbreviations("db nr unbekannt", &resources.contractions);

        // Then
        assert_eq!("datenbank nummer unbekannt", expanded);
    }

    #[test]
    fn removes_stop_words_preserving_order() {
        // Given
        let resources = test_resources();

        // When
        let filtered = remove_stop_words("die tabelle ist gesperrt", &resources.stop_word_set);

        // Then
        assert_eq!("tabelle gesperrt", filtered);
    }

    #[test]
    fn corrects_spelling_keeping_known_words() {
        // Given
        let resources = test_resources();

        // When
        let corrected = correct_spelling("tabele gesperrt zzzzzzzz", &resources.spell_checker);

        // Then
        assert_eq!("tabelle gesperrt zzzzzzzz", corrected);
    }

    #[test]
    fn full_pipeline_is_deterministic() {
        // Given
        let resources = test_resources();
        let steps = vec![
            PreprocessingStep::Lowercase,
            PreprocessingStep::RemoveUnimportant,
            PreprocessingStep::ReplaceAbbreviations,
            PreprocessingStep::RemoveStopwords,
            PreprocessingStep::CorrectSpelling,
            PreprocessingStep::Lemmatize,
        ];
        let text = "Die Tabelle [Bestellungen] ist gesperrt!";

        // When
        let first = preprocess_utterance(text, &steps, &resources);
        let second = preprocess_utterance(text, &steps, &resources);

        // Then
        assert_eq!(first, second);
        assert_eq!("tabelle bestellungen sperren", first);
    }

    #[test]
    fn unknown_step_is_identity() {
        // Given
        let resources = test_resources();
        let steps = vec![PreprocessingStep::Unknown];

        // When
        let processed = preprocess_utterance("Die Tabelle", &steps, &resources);

        // Then
        assert_eq!("Die Tabelle", processed);
    }

    #[test]
    fn step_names_round_trip_through_serde() {
        // Given
        let steps = vec![
            PreprocessingStep::Lowercase,
            PreprocessingStep::CorrectSpelling,
        ];

        // When
        let raw = serde_json::to_string(&steps).unwrap();
        let parsed: Vec<PreprocessingStep> = serde_json::from_str(&raw).unwrap();

        // Then
        assert_eq!(steps, parsed);
    }
}
