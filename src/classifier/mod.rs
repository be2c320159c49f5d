mod label_encoder;
pub mod metrics;
mod network;
mod trainer;
mod vectorizer;

pub use self::label_encoder::LabelEncoder;
pub use self::network::{argmax, softmax, TextCnn};
pub use self::trainer::{ClassifierTrainer, EvaluationReport};
pub use self::vectorizer::{TextVectorizer, OOV_INDEX, PADDING_INDEX};
