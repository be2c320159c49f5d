use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::utils::IntentTag;

/// Bidirectional mapping between intent tags and class indices. Classes are
/// sorted lexicographically on fit, so the encoding is independent of the
/// order in which labels appear in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<IntentTag>,
}

impl LabelEncoder {
    pub fn fit(labels: &[IntentTag]) -> Self {
        let mut classes: Vec<IntentTag> = labels.to_vec();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[IntentTag] {
        &self.classes
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|class| class == label)
            .ok_or_else(|| JobQueueNluError::UnknownTag(label.to_string()).into())
    }

    pub fn transform(&self, labels: &[IntentTag]) -> Result<Vec<usize>> {
        labels.iter().map(|label| self.encode(label)).collect()
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(|class| class.as_str())
            .ok_or_else(|| {
                JobQueueNluError::InternalError(format!("No class with index {}", index)).into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_sorted_classes() {
        // Given
        let labels: Vec<String> = vec!["table_locked", "email_invalid", "table_locked"]
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        // When
        let encoder = LabelEncoder::fit(&labels);

        // Then
        assert_eq!(vec!["email_invalid", "table_locked"], encoder.classes());
        assert_eq!(1, encoder.encode("table_locked").unwrap());
        assert_eq!("email_invalid", encoder.inverse_transform(0).unwrap());
    }

    #[test]
    fn unknown_label_fails() {
        // Given
        let encoder = LabelEncoder::fit(&["a".to_string()]);

        // When
        let result = encoder.encode("b");

        // Then
        assert!(result.is_err());
    }
}
