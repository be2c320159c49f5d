pub mod gazetteer;
pub mod lemmatizer;
pub mod loading;
pub mod spelling;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use self::gazetteer::{EntityGazetteer, EntityGroup};
pub use self::lemmatizer::{HashMapLemmatizer, Lemmatizer};
pub use self::spelling::SpellChecker;

/// Linguistic resources loaded once from the configured paths; immutable for
/// the lifetime of a training run or predictor, safe to share across threads.
pub struct SharedResources {
    /// Stop words in file order; the augmenter relies on this order when
    /// replacing placeholder markers.
    pub stop_words: Vec<String>,
    pub stop_word_set: HashSet<String>,
    pub contractions: HashMap<String, String>,
    pub entity_gazetteer: EntityGazetteer,
    pub spell_checker: SpellChecker,
    pub lemmatizer: Arc<dyn Lemmatizer>,
    /// Pretrained word-similarity table backing the paraphraser.
    pub word_similarities: HashMap<String, Vec<String>>,
}
