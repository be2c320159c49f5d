use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::entity_recognizer::matchers::EntitySpan;
use crate::entity_recognizer::AnnotatedUtterance;
use crate::models::EntityTaggerModel;
use crate::utils::{tokenize, Token};

const OUTSIDE: &str = "O";
const BEGINNING_PREFIX: &str = "B-";
const INSIDE_PREFIX: &str = "I-";

/// Statistical entity tagger: a linear softmax classifier over BIO tags with
/// sparse string features, trained online on matcher-derived annotations.
pub struct EntityTagger {
    tags: Vec<String>,
    weights: HashMap<String, Vec<f32>>,
    bias: Vec<f32>,
}

impl EntityTagger {
    /// Creates a blank tagger whose tag inventory covers every entity label
    /// observed in the annotation records.
    pub fn new(training_data: &[AnnotatedUtterance]) -> Self {
        let mut tags = vec![OUTSIDE.to_string()];
        for record in training_data {
            for span in &record.entities {
                let beginning = format!("{}{}", BEGINNING_PREFIX, span.label);
                let inside = format!("{}{}", INSIDE_PREFIX, span.label);
                if !tags.contains(&beginning) {
                    tags.push(beginning);
                }
                if !tags.contains(&inside) {
                    tags.push(inside);
                }
            }
        }
        let num_tags = tags.len();
        Self {
            tags,
            weights: HashMap::new(),
            bias: vec![0.0; num_tags],
        }
    }

    /// Online training: `iterations` passes over minibatches of size 2 with
    /// per-example gradient updates and feature dropout. Updates are strictly
    /// sequential; each one depends on the weights left by the previous.
    /// Returns the summed cross-entropy loss of each iteration.
    pub fn train(
        &mut self,
        training_data: &[AnnotatedUtterance],
        iterations: usize,
        learning_rate: f32,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Vec<f32> {
        let mut iteration_losses = Vec::with_capacity(iterations);
        for iteration in 0..iterations {
            let mut loss = 0.0;
            for batch in training_data.chunks(2) {
                for record in batch {
                    loss += self.update_on_example(record, learning_rate, dropout, rng);
                }
            }
            debug!("losses (iteration {}): {}", iteration, loss);
            iteration_losses.push(loss);
        }
        iteration_losses
    }

    fn update_on_example(
        &mut self,
        record: &AnnotatedUtterance,
        learning_rate: f32,
        dropout: f32,
        rng: &mut StdRng,
    ) -> f32 {
        let tokens = tokenize(&record.text);
        let gold_tags = gold_tag_indices(&tokens, &record.entities, &self.tags);
        let num_tags = self.tags.len();
        let mut loss = 0.0;
        for (token_ix, gold) in gold_tags.iter().enumerate() {
            let features = token_features(&tokens, token_ix)
                .into_iter()
                .filter(|_| rng.gen::<f32>() >= dropout)
                .collect_vec();
            let probabilities = softmax(&self.scores(&features));
            loss += -probabilities[*gold].max(1e-12).ln();
            for tag_ix in 0..num_tags {
                let target = if tag_ix == *gold { 1.0 } else { 0.0 };
                let gradient = probabilities[tag_ix] - target;
                self.bias[tag_ix] -= learning_rate * gradient;
                for feature in &features {
                    let row = self
                        .weights
                        .entry(feature.clone())
                        .or_insert_with(|| vec![0.0; num_tags]);
                    row[tag_ix] -= learning_rate * gradient;
                }
            }
        }
        loss
    }

    /// Tags a new utterance and decodes the BIO sequence back to character
    /// spans.
    pub fn extract_entities(&self, text: &str) -> Vec<EntitySpan> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![];
        }
        let tags: Vec<String> = (0..tokens.len())
            .map(|token_ix| {
                let features = token_features(&tokens, token_ix);
                let probabilities = softmax(&self.scores(&features));
                let best = probabilities
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| {
                        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(ix, _)| ix)
                    .unwrap_or(0);
                self.tags[best].clone()
            })
            .collect();
        tags_to_spans(&tokens, &tags)
    }

    fn scores(&self, features: &[String]) -> Vec<f32> {
        let mut scores = self.bias.clone();
        for feature in features {
            if let Some(row) = self.weights.get(feature) {
                for (score, weight) in scores.iter_mut().zip(row.iter()) {
                    *score += weight;
                }
            }
        }
        scores
    }

    pub fn to_model(&self) -> EntityTaggerModel {
        EntityTaggerModel {
            tags: self.tags.clone(),
            weights: self.weights.clone(),
            bias: self.bias.clone(),
        }
    }

    pub fn from_model(model: EntityTaggerModel) -> Self {
        Self {
            tags: model.tags,
            weights: model.weights,
            bias: model.bias,
        }
    }
}

/// Token-level BIO tag indices for an annotated utterance. Later annotations
/// overwrite earlier ones on overlap; the exported annotations are a raw
/// union of both matchers.
fn gold_tag_indices(tokens: &[Token], entities: &[EntitySpan], tags: &[String]) -> Vec<usize> {
    let outside_ix = 0;
    let mut gold = vec![outside_ix; tokens.len()];
    for span in entities {
        let covered: Vec<usize> = tokens
            .iter()
            .positions(|token| {
                token.char_range.start >= span.char_range.start
                    && token.char_range.end <= span.char_range.end
            })
            .collect();
        for (position_ix, token_ix) in covered.iter().enumerate() {
            let tag = if position_ix == 0 {
                format!("{}{}", BEGINNING_PREFIX, span.label)
            } else {
                format!("{}{}", INSIDE_PREFIX, span.label)
            };
            if let Some(tag_ix) = tags.iter().position(|t| *t == tag) {
                gold[*token_ix] = tag_ix;
            }
        }
    }
    gold
}

fn token_features(tokens: &[Token], ix: usize) -> Vec<String> {
    let word = &tokens[ix].value;
    let lower = word.to_lowercase();
    let suffix: String = {
        let chars: Vec<char> = lower.chars().collect();
        let start = chars.len().saturating_sub(3);
        chars[start..].iter().collect()
    };
    let mut features = vec![
        format!("word={}", word),
        format!("lower={}", lower),
        format!("suffix3={}", suffix),
        format!("shape={}", word_shape(word)),
    ];
    if word.chars().any(|c| c.is_ascii_digit()) {
        features.push("has_digit".to_string());
    }
    if word.contains('@') {
        features.push("has_at".to_string());
    }
    if word.contains('\\') {
        features.push("has_backslash".to_string());
    }
    if ix == 0 {
        features.push("prev=<BOS>".to_string());
    } else {
        features.push(format!("prev={}", tokens[ix - 1].value.to_lowercase()));
    }
    if ix + 1 == tokens.len() {
        features.push("next=<EOS>".to_string());
    } else {
        features.push(format!("next={}", tokens[ix + 1].value.to_lowercase()));
    }
    features
}

fn word_shape(word: &str) -> String {
    word.chars()
        .map(|c| {
            if c.is_ascii_digit() {
                'd'
            } else if c.is_uppercase() {
                'X'
            } else if c.is_lowercase() {
                'x'
            } else {
                c
            }
        })
        .collect()
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn is_start_of_bio_span(tags: &[String], i: usize) -> bool {
    if tags[i] == OUTSIDE {
        false
    } else if tags[i].starts_with(BEGINNING_PREFIX) {
        true
    } else if i == 0 {
        true
    } else {
        tags[i - 1] == OUTSIDE
    }
}

fn is_end_of_bio_span(tags: &[String], i: usize) -> bool {
    if tags[i] == OUTSIDE {
        false
    } else if i + 1 == tags.len() {
        true
    } else {
        !tags[i + 1].starts_with(INSIDE_PREFIX)
    }
}

fn tag_label(tag: &str) -> String {
    tag.chars().skip(2).collect()
}

fn tags_to_spans(tokens: &[Token], tags: &[String]) -> Vec<EntitySpan> {
    let mut spans = Vec::new();
    let mut current_start: Option<usize> = None;
    for i in 0..tags.len() {
        if is_start_of_bio_span(tags, i) {
            current_start = Some(i);
        }
        if is_end_of_bio_span(tags, i) {
            if let Some(start) = current_start.take() {
                spans.push(EntitySpan {
                    char_range: tokens[start].char_range.start..tokens[i].char_range.end,
                    label: tag_label(&tags[start]),
                });
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn annotated(text: &str, spans: Vec<(usize, usize, &str)>) -> AnnotatedUtterance {
        AnnotatedUtterance {
            text: text.to_string(),
            entities: spans
                .into_iter()
                .map(|(start, end, label)| EntitySpan {
                    char_range: start..end,
                    label: label.to_string(),
                })
                .collect(),
        }
    }

    fn training_data() -> Vec<AnnotatedUtterance> {
        vec![
            annotated("Fehler in Bestellungen", vec![(10, 22, "Tabelle")]),
            annotated("Bestellungen ist gesperrt", vec![(0, 12, "Tabelle")]),
            annotated("Auftrag 4711 abgebrochen", vec![(8, 12, "Nummer")]),
            annotated("Job 234 fehlgeschlagen", vec![(4, 7, "Nummer")]),
            annotated("Meldung ohne Entität", vec![]),
        ]
    }

    #[test]
    fn registers_bio_tags_from_annotations() {
        // Given
        let data = training_data();

        // When
        let tagger = EntityTagger::new(&data);

        // Then
        assert_eq!(
            vec!["O", "B-Tabelle", "I-Tabelle", "B-Nummer", "I-Nummer"],
            tagger.tags
        );
    }

    #[test]
    fn training_loss_decreases() {
        // Given
        let data = training_data();
        let mut tagger = EntityTagger::new(&data);
        let mut rng = StdRng::seed_from_u64(42);

        // When
        let losses = tagger.train(&data, 30, 0.1, 0.0, &mut rng);

        // Then
        assert_eq!(30, losses.len());
        assert!(losses[29] < losses[0]);
    }

    #[test]
    fn trained_tagger_finds_seen_entities() {
        // Given
        let data = training_data();
        let mut tagger = EntityTagger::new(&data);
        let mut rng = StdRng::seed_from_u64(42);
        tagger.train(&data, 40, 0.1, 0.1, &mut rng);

        // When
        let spans = tagger.extract_entities("Fehler in Bestellungen");

        // Then
        assert!(spans
            .iter()
            .any(|span| span.label == "Tabelle" && span.char_range == (10..22)));
    }

    #[test]
    fn untrained_tagger_on_plain_text_finds_nothing_harmful() {
        // Given
        let data = training_data();
        let tagger = EntityTagger::new(&data);

        // When
        let spans = tagger.extract_entities("");

        // Then
        assert!(spans.is_empty());
    }

    #[test]
    fn bio_decoding_merges_inside_tags() {
        // Given
        let tokens = tokenize("Fehler in Verkaufszeile Eins jetzt");
        let tags: Vec<String> = vec!["O", "O", "B-Tabelle", "I-Tabelle", "O"]
            .into_iter()
            .map(|t| t.to_string())
            .collect();

        // When
        let spans = tags_to_spans(&tokens, &tags);

        // Then
        assert_eq!(
            vec![EntitySpan {
                char_range: 10..28,
                label: "Tabelle".to_string(),
            }],
            spans
        );
    }
}
