use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::preprocessing::PreprocessingStep;

/// Version stamp of a persisted model directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_version: String,
}

/// Persisted state of the trained entity tagger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTaggerModel {
    pub tags: Vec<String>,
    pub weights: HashMap<String, Vec<f32>>,
    pub bias: Vec<f32>,
}

/// Persisted weights and hyperparameters of the trained text classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub hyperparameters: ModelConfig,
    pub vocab_size: usize,
    pub num_labels: usize,
    pub embedding: Vec<Vec<f32>>,
    pub conv1_weights: Vec<Vec<f32>>,
    pub conv1_bias: Vec<f32>,
    pub conv2_weights: Vec<Vec<f32>>,
    pub conv2_bias: Vec<f32>,
    pub dense1_weights: Vec<Vec<f32>>,
    pub dense1_bias: Vec<f32>,
    pub dense2_weights: Vec<Vec<f32>>,
    pub dense2_bias: Vec<f32>,
    pub output_weights: Vec<Vec<f32>>,
    pub output_bias: Vec<f32>,
}

/// Ordered preprocessing stage list persisted at training time so inference
/// replays exactly the same pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineModel {
    pub steps: Vec<PreprocessingStep>,
}
