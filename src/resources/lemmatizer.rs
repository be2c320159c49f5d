use std::collections::HashMap;
use std::io::Read;
use std::iter::FromIterator;

use crate::errors::*;

pub trait Lemmatizer: Send + Sync {
    fn lemma(&self, value: &str) -> String;
}

/// Dictionary lemmatizer backed by a CSV lemma table: the first column is the
/// lemma, the remaining columns are inflected forms.
pub struct HashMapLemmatizer {
    values: HashMap<String, String>,
}

impl HashMapLemmatizer {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut values = HashMap::<String, String>::new();
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b',')
            .quoting(false)
            .flexible(true)
            .has_headers(false)
            .from_reader(reader);

        for record in csv_reader.records() {
            let elements = record?;
            let lemma = &elements[0];
            for form in elements.iter().skip(1) {
                values.insert(form.to_string(), lemma.to_string());
            }
        }
        Ok(Self { values })
    }
}

impl FromIterator<(String, String)> for HashMapLemmatizer {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: HashMap::from_iter(iter),
        }
    }
}

impl Lemmatizer for HashMapLemmatizer {
    fn lemma(&self, value: &str) -> String {
        self.values
            .get(value)
            .map(|lemma| lemma.to_string())
            .unwrap_or_else(|| value.to_string())
    }
}
