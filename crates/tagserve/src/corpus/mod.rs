pub mod parser;

pub use parser::{parse_json_lines, ParseOptions};

/// One document of a training corpus with its known topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingDocument {
    pub id: String,
    pub text: String,
    pub topics: Vec<String>,
}

impl TrainingDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            topics,
        }
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }
}

/// A parsed training corpus. `skipped` counts input documents and lines that
/// could not be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub documents: Vec<TrainingDocument>,
    pub skipped: usize,
}

impl Corpus {
    pub fn new(documents: Vec<TrainingDocument>) -> Self {
        Self {
            documents,
            skipped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
