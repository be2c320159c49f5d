use std::fs::File;
use std::path::{Path, PathBuf};

use failure::ResultExt;
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::preprocessing::PreprocessingStep;

/// Configuration of a training run, loaded from a JSON document.
///
/// Relative paths are resolved against the directory containing the
/// configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct NluConfig {
    pub paths: PathsConfig,
    pub vocabulary: VocabularyConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub augmentation: AugmentationConfig,
    pub ner: NerConfig,
    pub preprocessing: Vec<PreprocessingStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub intents: PathBuf,
    pub entities: PathBuf,
    pub contractions: PathBuf,
    pub stopwords: PathBuf,
    pub spelling: PathBuf,
    pub lemmas: PathBuf,
    pub word_similarities: PathBuf,
    pub model_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VocabularyConfig {
    pub vocab_size: usize,
    pub max_sequence_length: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub embedding_dim: usize,
    pub filters: usize,
    pub kernel_size: usize,
    pub strides: usize,
    pub padding: Padding,
    pub activation: Activation,
    pub units: usize,
    pub dropout_rate: f32,
    pub final_activation: Activation,
    pub optimizer: OptimizerKind,
    pub metric: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub num_folds: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
}

fn default_seed() -> u64 {
    42
}

fn default_learning_rate() -> f32 {
    1e-3
}

#[derive(Debug, Clone, Deserialize)]
pub struct AugmentationConfig {
    /// Number of utterances every label should reach after balancing.
    pub target_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NerConfig {
    pub iterations: usize,
    pub learning_rate: f32,
    pub dropout: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    Same,
    Valid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    Linear,
    Softmax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

impl NluConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_file = File::open(&path).with_context(|_| {
            JobQueueNluError::ArtifactUnreadable(path.as_ref().to_string_lossy().to_string())
        })?;
        let mut config: NluConfig = serde_json::from_reader(config_file)
            .with_context(|_| format!("Invalid configuration file {:?}", path.as_ref()))?;
        if let Some(base_dir) = path.as_ref().parent() {
            config.paths.resolve_relative_to(base_dir);
        }
        Ok(config)
    }
}

impl PathsConfig {
    fn resolve_relative_to(&mut self, base_dir: &Path) {
        fn resolve(path: &mut PathBuf, base_dir: &Path) {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        resolve(&mut self.intents, base_dir);
        resolve(&mut self.entities, base_dir);
        resolve(&mut self.contractions, base_dir);
        resolve(&mut self.stopwords, base_dir);
        resolve(&mut self.spelling, base_dir);
        resolve(&mut self.lemmas, base_dir);
        resolve(&mut self.word_similarities, base_dir);
        resolve(&mut self.model_dir, base_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_with_defaults() {
        // Given
        let raw = r#"{
            "paths": {
                "intents": "intents.json",
                "entities": "entities.txt",
                "contractions": "contractions.txt",
                "stopwords": "stopwords.txt",
                "spelling": "spelling_de.txt",
                "lemmas": "lemmas_de.txt",
                "word_similarities": "word_similarities.txt",
                "model_dir": "model"
            },
            "vocabulary": { "vocab_size": 500, "max_sequence_length": 16 },
            "model": {
                "embedding_dim": 16,
                "filters": 8,
                "kernel_size": 3,
                "strides": 1,
                "padding": "same",
                "activation": "relu",
                "units": 16,
                "dropout_rate": 0.2,
                "final_activation": "softmax",
                "optimizer": "adam",
                "metric": "accuracy"
            },
            "training": { "epochs": 5, "batch_size": 4, "num_folds": 3 },
            "augmentation": { "target_count": 5 },
            "ner": { "iterations": 10, "learning_rate": 0.05, "dropout": 0.3 },
            "preprocessing": [
                "lowercase",
                "remove_unimportant",
                "replace_abbreviations",
                "remove_stopwords",
                "correct_spelling",
                "lemmatize"
            ]
        }"#;

        // When
        let config: NluConfig = serde_json::from_str(raw).unwrap();

        // Then
        assert_eq!(42, config.training.seed);
        assert_eq!(Padding::Same, config.model.padding);
        assert_eq!(OptimizerKind::Adam, config.model.optimizer);
        assert_eq!(6, config.preprocessing.len());
    }

    #[test]
    fn unknown_preprocessing_step_deserializes_as_unknown() {
        // Given
        let raw = r#"["lowercase", "brand_new_stage"]"#;

        // When
        let steps: Vec<PreprocessingStep> = serde_json::from_str(raw).unwrap();

        // Then
        assert_eq!(
            vec![PreprocessingStep::Lowercase, PreprocessingStep::Unknown],
            steps
        );
    }
}
