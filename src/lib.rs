pub mod augmentation;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod entity_recognizer;
pub mod errors;
pub mod models;
pub mod predictor;
pub mod preprocessing;
pub mod resources;
#[cfg(test)]
mod testutils;
pub mod training;
mod utils;

pub const MODEL_VERSION: &str = "0.1.0";

pub use crate::augmentation::{Augmenter, Paraphraser, SimilarityParaphraser};
pub use crate::catalog::{Intent, IntentCatalog};
pub use crate::classifier::{ClassifierTrainer, EvaluationReport, LabelEncoder, TextVectorizer};
pub use crate::config::NluConfig;
pub use crate::entity_recognizer::{EntityRecognizer, EntitySpan};
pub use crate::errors::*;
pub use crate::predictor::{Prediction, SolutionPredictor};
pub use crate::preprocessing::{preprocess_utterance, PreprocessingStep};
pub use crate::training::{run_training, TrainingOutput};
pub use crate::utils::{tokenize, Token};
