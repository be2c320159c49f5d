mod matchers;
mod tagger;

use log::info;
use rand::rngs::StdRng;

use crate::config::NerConfig;
use crate::resources::EntityGazetteer;
use crate::utils::{substring_with_char_range, tokenize};

pub use self::matchers::{
    EntitySpan, PatternMatcher, PhraseMatcher, EMAIL_ENTITY, NUMBER_ENTITY, USER_ENTITY,
};
pub use self::tagger::EntityTagger;

/// An utterance together with the entity spans detected by the matchers;
/// the training input of the entity tagger.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedUtterance {
    pub text: String,
    pub entities: Vec<EntitySpan>,
}

/// Detects and anonymizes domain entities: two rule-based matchers derive
/// training annotations, a statistical tagger learns from them and is then
/// used to replace entity mentions with placeholder tokens.
pub struct EntityRecognizer {
    pattern_matcher: PatternMatcher,
    phrase_matcher: PhraseMatcher,
    tagger: Option<EntityTagger>,
}

impl EntityRecognizer {
    pub fn new(gazetteer: &EntityGazetteer) -> Self {
        Self {
            pattern_matcher: PatternMatcher::new(),
            phrase_matcher: PhraseMatcher::from_gazetteer(gazetteer),
            tagger: None,
        }
    }

    pub fn with_tagger(gazetteer: &EntityGazetteer, tagger: EntityTagger) -> Self {
        Self {
            pattern_matcher: PatternMatcher::new(),
            phrase_matcher: PhraseMatcher::from_gazetteer(gazetteer),
            tagger: Some(tagger),
        }
    }

    /// Applies both matchers to every utterance. The matcher outputs are
    /// unioned as-is; overlapping spans are not deduplicated.
    pub fn get_training_data(&self, utterances: &[String]) -> Vec<AnnotatedUtterance> {
        utterances
            .iter()
            .map(|utterance| {
                let tokens = tokenize(utterance);
                let mut entities = self.pattern_matcher.find_matches(&tokens);
                entities.extend(self.phrase_matcher.find_matches(&tokens));
                AnnotatedUtterance {
                    text: utterance.clone(),
                    entities,
                }
            })
            .collect()
    }

    /// Trains a fresh tagger on the annotation records and keeps it for
    /// anonymization. Returns the per-iteration training losses.
    pub fn train(
        &mut self,
        training_data: &[AnnotatedUtterance],
        config: &NerConfig,
        rng: &mut StdRng,
    ) -> Vec<f32> {
        info!(
            "Training entity tagger for {} iterations on {} annotated utterances",
            config.iterations,
            training_data.len()
        );
        let mut tagger = EntityTagger::new(training_data);
        let losses = tagger.train(
            training_data,
            config.iterations,
            config.learning_rate,
            config.dropout,
            rng,
        );
        self.tagger = Some(tagger);
        losses
    }

    pub fn tagger(&self) -> Option<&EntityTagger> {
        self.tagger.as_ref()
    }

    /// Replaces every detected entity mention with a placeholder encoding
    /// its type. Replacement is by literal text, first occurrence; a message
    /// without recognizable entities (or an untrained recognizer) passes
    /// through unchanged.
    pub fn anonymize(&self, utterance: &str) -> String {
        let tagger = match self.tagger.as_ref() {
            Some(tagger) => tagger,
            None => return utterance.to_string(),
        };
        let mut anonymized = utterance.to_string();
        for span in tagger.extract_entities(utterance) {
            let entity_text = substring_with_char_range(utterance, &span.char_range);
            if entity_text.is_empty() {
                continue;
            }
            let placeholder = entity_placeholder(&span.label);
            anonymized = anonymized.replacen(&entity_text, &placeholder, 1);
        }
        anonymized
    }

    pub fn anonymize_all(&self, utterances: &[String]) -> Vec<String> {
        utterances
            .iter()
            .map(|utterance| self.anonymize(utterance))
            .collect()
    }
}

pub fn entity_placeholder(label: &str) -> String {
    format!("`ENTITY:{}`", label.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NerConfig;
    use crate::resources::gazetteer::EntityGazetteer;
    use rand::SeedableRng;

    fn gazetteer() -> EntityGazetteer {
        EntityGazetteer::from_reader("Tabelle:\n- Bestellungen\n".as_bytes()).unwrap()
    }

    fn ner_config() -> NerConfig {
        NerConfig {
            iterations: 40,
            learning_rate: 0.1,
            dropout: 0.1,
        }
    }

    fn trained_recognizer(corpus: &[String]) -> EntityRecognizer {
        let mut recognizer = EntityRecognizer::new(&gazetteer());
        let training_data = recognizer.get_training_data(corpus);
        let mut rng = StdRng::seed_from_u64(42);
        recognizer.train(&training_data, &ner_config(), &mut rng);
        recognizer
    }

    fn table_corpus() -> Vec<String> {
        vec![
            "Fehler in Bestellungen".to_string(),
            "Bestellungen ist gesperrt".to_string(),
            "Die Tabelle Bestellungen fehlt".to_string(),
            "Zugriff auf Bestellungen verweigert".to_string(),
            "Meldung ohne Inhalt".to_string(),
        ]
    }

    #[test]
    fn training_data_unions_both_matchers_without_dedup() {
        // Given
        let recognizer = EntityRecognizer::new(&gazetteer());
        let utterances = vec!["Bestellungen 4711".to_string()];

        // When
        let training_data = recognizer.get_training_data(&utterances);

        // Then
        assert_eq!(1, training_data.len());
        let labels: Vec<&str> = training_data[0]
            .entities
            .iter()
            .map(|span| span.label.as_str())
            .collect();
        assert_eq!(vec![NUMBER_ENTITY, "Tabelle"], labels);
    }

    #[test]
    fn anonymizes_gazetteer_table_name() {
        // Given
        let recognizer = trained_recognizer(&table_corpus());

        // When
        let anonymized = recognizer.anonymize("Fehler in Bestellungen");

        // Then
        assert_eq!("Fehler in `ENTITY:TABELLE`", anonymized);
    }

    #[test]
    fn anonymizes_email_address_via_pattern_training() {
        // Given
        let corpus = vec![
            "email test@x.de ist ungueltig".to_string(),
            "email admin@y.de ist ungueltig".to_string(),
            "email foo@bar.de wurde abgelehnt".to_string(),
            "nachricht ohne adresse".to_string(),
        ];
        let recognizer = trained_recognizer(&corpus);

        // When
        let anonymized = recognizer.anonymize("email test@x.de ist ungueltig");

        // Then
        assert!(!anonymized.contains("test@x.de"));
        assert!(anonymized.contains("`ENTITY:EMAIL`"));
    }

    #[test]
    fn anonymization_is_idempotent_without_entities() {
        // Given
        let recognizer = trained_recognizer(&table_corpus());
        let utterance = "Meldung ohne Inhalt";

        // When
        let once = recognizer.anonymize(utterance);
        let twice = recognizer.anonymize(&once);

        // Then
        assert_eq!(once, twice);
        assert_eq!(utterance, once);
    }

    #[test]
    fn untrained_recognizer_passes_text_through() {
        // Given
        let recognizer = EntityRecognizer::new(&gazetteer());

        // When
        let anonymized = recognizer.anonymize("Fehler in Bestellungen");

        // Then
        assert_eq!("Fehler in Bestellungen", anonymized);
    }
}
