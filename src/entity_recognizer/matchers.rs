use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::resources::EntityGazetteer;
use crate::utils::{EntityName, Token};

/// A detected entity: character range in the utterance plus entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpan {
    pub char_range: Range<usize>,
    pub label: EntityName,
}

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"\d+").unwrap();
    static ref USER_RE: Regex =
        Regex::new(r"^FUM-GLOBAL\\[A-Za-z]+(?:\.[A-Za-z]+)?$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"[a-z0-9.\-+_]+ *@[a-z0-9.\-+_]+").unwrap();
}

pub const NUMBER_ENTITY: &str = "Nummer";
pub const USER_ENTITY: &str = "Benutzer";
pub const EMAIL_ENTITY: &str = "Email";

/// Token-level matcher with the three hard-coded domain patterns: digit
/// sequences, domain usernames and email-like strings.
pub struct PatternMatcher;

impl PatternMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn find_matches(&self, tokens: &[Token]) -> Vec<EntitySpan> {
        let mut spans = Vec::new();
        for token in tokens {
            if NUMBER_RE.is_match(&token.value) {
                spans.push(EntitySpan {
                    char_range: token.char_range.clone(),
                    label: NUMBER_ENTITY.to_string(),
                });
            }
            if USER_RE.is_match(&token.value) {
                spans.push(EntitySpan {
                    char_range: token.char_range.clone(),
                    label: USER_ENTITY.to_string(),
                });
            }
            if EMAIL_RE.is_match(&token.value) {
                spans.push(EntitySpan {
                    char_range: token.char_range.clone(),
                    label: EMAIL_ENTITY.to_string(),
                });
            }
        }
        spans
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches literal token sequences from the entity gazetteer, group order
/// preserved from the gazetteer file.
pub struct PhraseMatcher {
    patterns: Vec<(EntityName, Vec<String>)>,
}

impl PhraseMatcher {
    pub fn from_gazetteer(gazetteer: &EntityGazetteer) -> Self {
        let patterns = gazetteer
            .groups
            .iter()
            .flat_map(|group| {
                group.phrases.iter().map(move |phrase| {
                    let phrase_tokens = phrase
                        .split_whitespace()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>();
                    (group.name.clone(), phrase_tokens)
                })
            })
            .filter(|(_, phrase_tokens)| !phrase_tokens.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn find_matches(&self, tokens: &[Token]) -> Vec<EntitySpan> {
        let mut spans = Vec::new();
        for (label, phrase_tokens) in &self.patterns {
            if phrase_tokens.len() > tokens.len() {
                continue;
            }
            for start in 0..=(tokens.len() - phrase_tokens.len()) {
                let window = &tokens[start..start + phrase_tokens.len()];
                let matches = window
                    .iter()
                    .zip(phrase_tokens.iter())
                    .all(|(token, phrase_token)| token.value == *phrase_token);
                if matches {
                    spans.push(EntitySpan {
                        char_range: window[0].char_range.start
                            ..window[window.len() - 1].char_range.end,
                        label: label.clone(),
                    });
                }
            }
        }
        spans
    }
}
