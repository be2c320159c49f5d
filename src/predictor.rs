use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use failure::{bail, ResultExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::catalog::IntentCatalog;
use crate::classifier::{argmax, LabelEncoder, TextCnn, TextVectorizer};
use crate::config::NluConfig;
use crate::entity_recognizer::{EntityRecognizer, EntityTagger};
use crate::errors::*;
use crate::models::{ClassifierModel, EntityTaggerModel, ModelMetadata, PipelineModel};
use crate::preprocessing::{preprocess_utterance, PreprocessingStep};
use crate::resources::loading::load_shared_resources;
use crate::resources::SharedResources;

/// A predicted remediation: the canonical response text of the most likely
/// intent plus the model's confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    pub response: String,
    pub confidence: f32,
}

/// Inference engine over a persisted model directory. All artifacts are
/// loaded once and never mutated, so a predictor can be shared across
/// concurrent callers.
pub struct SolutionPredictor {
    catalog: IntentCatalog,
    resources: Arc<SharedResources>,
    recognizer: EntityRecognizer,
    steps: Vec<PreprocessingStep>,
    vectorizer: TextVectorizer,
    label_encoder: LabelEncoder,
    network: TextCnn,
}

impl SolutionPredictor {
    pub fn from_path<P: AsRef<Path>>(model_dir: P, config: &NluConfig) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        Self::check_model_version(model_dir.join("model.json"))?;

        let catalog = IntentCatalog::from_path(&config.paths.intents)?;
        let resources = load_shared_resources(&config.paths)?;

        let tagger_model: EntityTaggerModel = read_json(model_dir.join("tagger.json"))?;
        let recognizer = EntityRecognizer::with_tagger(
            &resources.entity_gazetteer,
            EntityTagger::from_model(tagger_model),
        );
        let pipeline: PipelineModel = read_json(model_dir.join("pipeline.json"))?;
        let vectorizer: TextVectorizer = read_json(model_dir.join("vectorizer.json"))?;
        let label_encoder: LabelEncoder = read_json(model_dir.join("label_encoder.json"))?;
        let classifier_model: ClassifierModel = read_json(model_dir.join("classifier.json"))?;
        let network = TextCnn::from_model(classifier_model)?;

        Ok(Self {
            catalog,
            resources,
            recognizer,
            steps: pipeline.steps,
            vectorizer,
            label_encoder,
            network,
        })
    }

    fn check_model_version<P: AsRef<Path>>(path: P) -> Result<()> {
        let metadata: ModelMetadata = read_json(&path)?;
        if metadata.model_version != crate::MODEL_VERSION {
            bail!(JobQueueNluError::WrongModelVersion(
                metadata.model_version,
                crate::MODEL_VERSION
            ));
        }
        Ok(())
    }

    /// Deterministic inference: replays the training-time anonymization,
    /// normalization and vectorization on the message, runs the classifier
    /// and maps the arg-max label back to its catalog response.
    pub fn predict(&self, message: &str) -> Result<Prediction> {
        let message = message.replace('=', " ").replace('\'', " ");
        let anonymized = self.recognizer.anonymize(&message);
        let normalized = preprocess_utterance(&anonymized, &self.steps, &self.resources);
        let sequence = self.vectorizer.transform(&normalized);
        let probabilities = self.network.predict_probabilities(&sequence);
        let index = argmax(&probabilities);
        let confidence = probabilities[index];
        let tag = self.label_encoder.inverse_transform(index)?;
        let response = self
            .catalog
            .response_for_tag(tag)
            .ok_or_else(|| JobQueueNluError::UnknownTag(tag.to_string()))?;
        Ok(Prediction {
            response: response.to_string(),
            confidence,
        })
    }
}

fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(&path).with_context(|_| {
        JobQueueNluError::ArtifactUnreadable(path.as_ref().to_string_lossy().to_string())
    })?;
    let value = serde_json::from_reader(file)
        .with_context(|_| format!("Invalid artifact file {:?}", path.as_ref()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NluConfig;
    use crate::training::run_training;

    fn test_config(model_dir: &Path) -> NluConfig {
        let raw = format!(
            r#"{{
                "paths": {{
                    "intents": "data/intents.json",
                    "entities": "data/entities.txt",
                    "contractions": "data/contractions.txt",
                    "stopwords": "data/stopwords.txt",
                    "spelling": "data/spelling_de.txt",
                    "lemmas": "data/lemmas_de.txt",
                    "word_similarities": "data/word_similarities.txt",
                    "model_dir": {:?}
                }},
                "vocabulary": {{ "vocab_size": 200, "max_sequence_length": 12 }},
                "model": {{
                    "embedding_dim": 16,
                    "filters": 8,
                    "kernel_size": 3,
                    "strides": 1,
                    "padding": "same",
                    "activation": "relu",
                    "units": 16,
                    "dropout_rate": 0.1,
                    "final_activation": "softmax",
                    "optimizer": "adam",
                    "metric": "accuracy"
                }},
                "training": {{
                    "epochs": 25,
                    "batch_size": 4,
                    "num_folds": 3,
                    "learning_rate": 0.01
                }},
                "augmentation": {{ "target_count": 6 }},
                "ner": {{ "iterations": 30, "learning_rate": 0.1, "dropout": 0.1 }},
                "preprocessing": [
                    "lowercase",
                    "remove_unimportant",
                    "replace_abbreviations",
                    "remove_stopwords",
                    "correct_spelling",
                    "lemmatize"
                ]
            }}"#,
            model_dir.to_string_lossy()
        );
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn end_to_end_training_and_prediction() {
        // Given
        let model_dir = tempfile::tempdir().unwrap();
        let config = test_config(model_dir.path());

        // When
        let output = run_training(&config).unwrap();
        let predictor = SolutionPredictor::from_path(model_dir.path(), &config).unwrap();
        let prediction = predictor
            .predict("Die Tabelle Bestellungen ist gesperrt")
            .unwrap();

        // Then
        assert_eq!(config.ner.iterations, output.ner_losses.len());
        let num_labels = output.evaluation.confusion_matrix.dim().0;
        assert_eq!(num_labels, output.evaluation.confusion_matrix.dim().1);
        assert!(prediction.confidence >= 0.0 && prediction.confidence <= 1.0);
        assert!(!prediction.response.is_empty());
    }

    #[test]
    fn out_of_vocabulary_message_still_yields_a_prediction() {
        // Given
        let model_dir = tempfile::tempdir().unwrap();
        let config = test_config(model_dir.path());
        run_training(&config).unwrap();
        let predictor = SolutionPredictor::from_path(model_dir.path(), &config).unwrap();

        // When
        let prediction = predictor.predict("qwertz uiopü asdfgh").unwrap();

        // Then
        assert!(prediction.confidence >= 0.0 && prediction.confidence <= 1.0);
        assert!(!prediction.response.is_empty());
    }

    #[test]
    fn wrong_model_version_is_rejected() {
        // Given
        let model_dir = tempfile::tempdir().unwrap();
        let config = test_config(model_dir.path());
        run_training(&config).unwrap();
        std::fs::write(
            model_dir.path().join("model.json"),
            r#"{ "model_version": "0.0.1" }"#,
        )
        .unwrap();

        // When
        let result = SolutionPredictor::from_path(model_dir.path(), &config);

        // Then
        assert!(result.is_err());
    }
}
