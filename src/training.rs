use std::fs;
use std::fs::File;
use std::path::Path;

use failure::ResultExt;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::augmentation::{Augmenter, SimilarityParaphraser};
use crate::catalog::IntentCatalog;
use crate::classifier::{ClassifierTrainer, EvaluationReport, LabelEncoder, TextCnn, TextVectorizer};
use crate::config::NluConfig;
use crate::entity_recognizer::EntityRecognizer;
use crate::errors::*;
use crate::models::{ModelMetadata, PipelineModel};
use crate::preprocessing::preprocess_utterance;
use crate::resources::loading::load_shared_resources;
use crate::utils::IntentTag;

/// Result of a full training run.
pub struct TrainingOutput {
    pub evaluation: EvaluationReport,
    /// Per-iteration entity tagger losses.
    pub ner_losses: Vec<f32>,
}

/// Runs the end-to-end training pipeline: catalog loading, augmentation,
/// entity recognition and anonymization, normalization, cross-validated
/// classifier training, final fit and artifact persistence.
pub fn run_training(config: &NluConfig) -> Result<TrainingOutput> {
    let catalog = IntentCatalog::from_path(&config.paths.intents)?;
    let resources = load_shared_resources(&config.paths)?;

    info!("Balancing corpus to {} utterances per label", config.augmentation.target_count);
    let augmenter = Augmenter::new(Box::new(SimilarityParaphraser::new(
        resources.word_similarities.clone(),
    )));
    let grouped = catalog.utterances_by_label();
    let (aug_utterances, aug_labels) = augmenter.balance(
        &grouped,
        config.augmentation.target_count,
        &resources.stop_words,
    );
    let aug_utterances: Vec<String> = aug_utterances
        .iter()
        .map(|utterance| utterance.replace('=', " ").replace('\'', " "))
        .collect();
    info!("Corpus balanced: {} utterances", aug_utterances.len());

    let mut recognizer = EntityRecognizer::new(&resources.entity_gazetteer);
    let training_data = recognizer.get_training_data(&aug_utterances);
    let mut rng = StdRng::seed_from_u64(config.training.seed);
    let ner_losses = recognizer.train(&training_data, &config.ner, &mut rng);
    let anonymized = recognizer.anonymize_all(&aug_utterances);

    let mut preprocessed = Vec::with_capacity(anonymized.len());
    for (ix, utterance) in anonymized.iter().enumerate() {
        preprocessed.push(preprocess_utterance(
            utterance,
            &config.preprocessing,
            &resources,
        ));
        if (ix + 1) % 10 == 0 || ix + 1 == anonymized.len() {
            info!("Processed {} utterances.", ix + 1);
        }
    }

    let label_encoder = LabelEncoder::fit(&aug_labels);
    let targets = label_encoder.transform(&aug_labels)?;
    let report_labels: Vec<(usize, IntentTag)> = catalog
        .labels()
        .into_iter()
        .map(|tag| Ok((label_encoder.encode(&tag)?, tag)))
        .collect::<Result<_>>()?;
    let num_labels = label_encoder.classes().len();

    let trainer = ClassifierTrainer::new(config);
    let evaluation = trainer.train_and_evaluate(
        &preprocessed,
        &targets,
        config.training.num_folds,
        &report_labels,
        num_labels,
    )?;
    info!(
        "Cross-validation done: mean loss {:.4}, mean accuracy {:.4}",
        evaluation.mean_loss, evaluation.mean_accuracy
    );

    let (vectorizer, network) = trainer.train_final(&preprocessed, &targets, num_labels)?;
    persist_model(config, &recognizer, &vectorizer, &label_encoder, &network)?;
    info!("Model persisted to {:?}", config.paths.model_dir);

    Ok(TrainingOutput {
        evaluation,
        ner_losses,
    })
}

fn persist_model(
    config: &NluConfig,
    recognizer: &EntityRecognizer,
    vectorizer: &TextVectorizer,
    label_encoder: &LabelEncoder,
    network: &TextCnn,
) -> Result<()> {
    let model_dir = &config.paths.model_dir;
    fs::create_dir_all(model_dir)
        .with_context(|_| format!("Cannot create model directory {:?}", model_dir))?;

    let tagger = recognizer.tagger().ok_or_else(|| {
        JobQueueNluError::InternalError("Entity tagger missing after training".to_string())
    })?;

    write_json(
        model_dir.join("model.json"),
        &ModelMetadata {
            model_version: crate::MODEL_VERSION.to_string(),
        },
    )?;
    write_json(model_dir.join("tagger.json"), &tagger.to_model())?;
    write_json(model_dir.join("classifier.json"), &network.to_model())?;
    write_json(model_dir.join("vectorizer.json"), vectorizer)?;
    write_json(model_dir.join("label_encoder.json"), label_encoder)?;
    write_json(
        model_dir.join("pipeline.json"),
        &PipelineModel {
            steps: config.preprocessing.clone(),
        },
    )?;
    Ok(())
}

fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let file = File::create(&path)
        .with_context(|_| format!("Cannot create artifact file {:?}", path.as_ref()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|_| format!("Cannot serialize artifact {:?}", path.as_ref()))?;
    Ok(())
}
