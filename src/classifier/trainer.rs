use failure::bail;
use log::info;
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::classifier::metrics::{classification_report, confusion_matrix};
use crate::classifier::network::TextCnn;
use crate::classifier::vectorizer::TextVectorizer;
use crate::config::{ModelConfig, NluConfig, TrainingConfig, VocabularyConfig};
use crate::errors::*;
use crate::utils::IntentTag;

/// Aggregated k-fold evaluation result.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub mean_loss: f32,
    pub mean_accuracy: f32,
    /// Confusion matrix summed over folds, then divided by the fold count.
    pub confusion_matrix: Array2<f32>,
    pub report: String,
}

/// Vectorizes normalized utterances and trains/evaluates the convolutional
/// classifier with k-fold cross-validation.
pub struct ClassifierTrainer {
    vocabulary: VocabularyConfig,
    model: ModelConfig,
    training: TrainingConfig,
}

impl ClassifierTrainer {
    pub fn new(config: &NluConfig) -> Self {
        Self {
            vocabulary: config.vocabulary.clone(),
            model: config.model.clone(),
            training: config.training.clone(),
        }
    }

    /// K-fold cross-validation with a fixed shuffle seed. Every fold refits
    /// the vectorizer on its training split only and trains a freshly
    /// constructed network; nothing is shared between folds.
    ///
    /// `labels` pairs each encoder index with its display name, in the order
    /// the classification report should list them.
    pub fn train_and_evaluate(
        &self,
        corpus: &[String],
        targets: &[usize],
        num_folds: usize,
        labels: &[(usize, IntentTag)],
        num_labels: usize,
    ) -> Result<EvaluationReport> {
        let folds = k_fold_indices(corpus.len(), num_folds, self.training.seed)?;

        let mut loss_scores = Vec::with_capacity(num_folds);
        let mut accuracy_scores = Vec::with_capacity(num_folds);
        let mut predictions_all: Vec<usize> = Vec::new();
        let mut targets_all: Vec<usize> = Vec::new();
        let mut matrix = Array2::<f32>::zeros((num_labels, num_labels));

        for (fold_ix, validation_indices) in folds.iter().enumerate() {
            let train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(other_ix, _)| *other_ix != fold_ix)
                .flat_map(|(_, indices)| indices.iter().cloned())
                .collect();

            let train_corpus: Vec<String> = train_indices
                .iter()
                .map(|&ix| corpus[ix].clone())
                .collect();
            let train_targets: Vec<usize> = train_indices.iter().map(|&ix| targets[ix]).collect();
            let validation_corpus: Vec<String> = validation_indices
                .iter()
                .map(|&ix| corpus[ix].clone())
                .collect();
            let validation_targets: Vec<usize> =
                validation_indices.iter().map(|&ix| targets[ix]).collect();

            // per-fold refit on the training split only, to avoid leakage
            let mut vectorizer = TextVectorizer::new(
                self.vocabulary.vocab_size,
                self.vocabulary.max_sequence_length,
            );
            vectorizer.fit(&train_corpus);
            let train_sequences: Vec<Vec<usize>> = train_corpus
                .iter()
                .map(|text| vectorizer.transform(text))
                .collect();
            let validation_sequences: Vec<Vec<usize>> = validation_corpus
                .iter()
                .map(|text| vectorizer.transform(text))
                .collect();

            // fold-local seed, so parallel fold execution would reproduce
            // the sequential aggregate
            let mut rng = StdRng::seed_from_u64(self.training.seed + fold_ix as u64);
            let mut network = TextCnn::new(
                self.vocabulary.vocab_size,
                num_labels,
                &self.model,
                &mut rng,
            );
            network.fit(
                &train_sequences,
                &train_targets,
                self.training.epochs,
                self.training.batch_size,
                self.training.learning_rate,
                &mut rng,
            )?;

            let (loss, accuracy) = network.evaluate(&validation_sequences, &validation_targets);
            let fold_predictions: Vec<usize> = validation_sequences
                .iter()
                .map(|sequence| network.predict(sequence))
                .collect();
            matrix += &confusion_matrix(&validation_targets, &fold_predictions, num_labels);

            info!(
                "Fold {}: loss {:.4}, accuracy {:.4} ({} validation samples)",
                fold_ix,
                loss,
                accuracy,
                validation_indices.len()
            );
            loss_scores.push(loss);
            accuracy_scores.push(accuracy);
            predictions_all.extend(fold_predictions);
            targets_all.extend(validation_targets);
        }

        let mean_loss = loss_scores.iter().sum::<f32>() / num_folds.max(1) as f32;
        let mean_accuracy = accuracy_scores.iter().sum::<f32>() / num_folds.max(1) as f32;
        let matrix_avg = matrix / num_folds.max(1) as f32;
        let report = classification_report(&targets_all, &predictions_all, labels);

        Ok(EvaluationReport {
            mean_loss,
            mean_accuracy,
            confusion_matrix: matrix_avg,
            report,
        })
    }

    /// Fits the vectorizer on the full corpus and trains one fresh network
    /// on all data; this is the pair that gets persisted.
    pub fn train_final(
        &self,
        corpus: &[String],
        targets: &[usize],
        num_labels: usize,
    ) -> Result<(TextVectorizer, TextCnn)> {
        let mut vectorizer = TextVectorizer::new(
            self.vocabulary.vocab_size,
            self.vocabulary.max_sequence_length,
        );
        vectorizer.fit(corpus);
        let sequences: Vec<Vec<usize>> =
            corpus.iter().map(|text| vectorizer.transform(text)).collect();

        let mut rng = StdRng::seed_from_u64(self.training.seed);
        let mut network = TextCnn::new(
            self.vocabulary.vocab_size,
            num_labels,
            &self.model,
            &mut rng,
        );
        network.fit(
            &sequences,
            targets,
            self.training.epochs,
            self.training.batch_size,
            self.training.learning_rate,
            &mut rng,
        )?;
        Ok((vectorizer, network))
    }
}

/// Shuffled k-fold split: the first `n % k` folds get one extra sample, the
/// shuffle is fixed by `seed`.
fn k_fold_indices(num_samples: usize, num_folds: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
    if num_folds < 2 {
        bail!("Cross-validation needs at least 2 folds, got {}", num_folds);
    }
    if num_folds > num_samples {
        bail!(
            "Cannot split {} samples into {} folds",
            num_samples,
            num_folds
        );
    }
    let mut indices: Vec<usize> = (0..num_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base_size = num_samples / num_folds;
    let remainder = num_samples % num_folds;
    let mut folds = Vec::with_capacity(num_folds);
    let mut cursor = 0;
    for fold_ix in 0..num_folds {
        let fold_size = base_size + if fold_ix < remainder { 1 } else { 0 };
        folds.push(indices[cursor..cursor + fold_size].to_vec());
        cursor += fold_size;
    }
    Ok(folds)
}
