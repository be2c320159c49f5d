use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use failure::ResultExt;
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::utils::IntentTag;

/// One labeled intent: a tag, its example utterances and the canonical
/// response returned when the tag is predicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: IntentTag,
    pub utterances: Vec<String>,
    pub response: String,
}

/// The full intent catalog, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCatalog {
    pub intents: Vec<Intent>,
}

impl IntentCatalog {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let catalog_file = File::open(&path).with_context(|_| {
            JobQueueNluError::ArtifactUnreadable(path.as_ref().to_string_lossy().to_string())
        })?;
        let catalog = serde_json::from_reader(catalog_file)
            .with_context(|_| format!("Invalid intent catalog file {:?}", path.as_ref()))?;
        Ok(catalog)
    }

    pub fn training_utterances(&self) -> Vec<String> {
        self.intents
            .iter()
            .flat_map(|intent| intent.utterances.iter().cloned())
            .collect()
    }

    pub fn training_labels(&self) -> Vec<IntentTag> {
        self.intents
            .iter()
            .flat_map(|intent| intent.utterances.iter().map(move |_| intent.tag.clone()))
            .collect()
    }

    /// Unique tags in catalog order.
    pub fn labels(&self) -> Vec<IntentTag> {
        let mut seen = HashSet::new();
        self.intents
            .iter()
            .filter(|intent| seen.insert(intent.tag.clone()))
            .map(|intent| intent.tag.clone())
            .collect()
    }

    /// Utterances grouped by tag, in catalog order. Utterances of duplicate
    /// tags are merged into the first occurrence of the tag.
    pub fn utterances_by_label(&self) -> Vec<(IntentTag, Vec<String>)> {
        let mut grouped: Vec<(IntentTag, Vec<String>)> = Vec::new();
        for intent in &self.intents {
            match grouped.iter_mut().find(|(tag, _)| *tag == intent.tag) {
                Some((_, utterances)) => utterances.extend(intent.utterances.iter().cloned()),
                None => grouped.push((intent.tag.clone(), intent.utterances.clone())),
            }
        }
        grouped
    }

    /// The response of the first catalog entry carrying `tag`.
    pub fn response_for_tag(&self, tag: &str) -> Option<&str> {
        self.intents
            .iter()
            .find(|intent| intent.tag == tag)
            .map(|intent| intent.response.as_str())
    }
}
