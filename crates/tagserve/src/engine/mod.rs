//! Interface to the topic-indexing engine.
//!
//! Training and topic extraction are delegated to an engine implementation
//! supplied by the embedding application. This crate only fixes the contract:
//! given a corpus and a vocabulary an engine trains a model, and a model turns
//! text into ranked topics.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::corpus::TrainingDocument;
use crate::error::EngineError;
use crate::jobs::CancellationToken;
use crate::storage::Codec;

/// A topic recommended for a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub id: String,
    pub label: String,
    pub probability: f64,
}

impl Topic {
    pub fn new(id: impl Into<String>, label: impl Into<String>, probability: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            probability,
        }
    }
}

/// Ranked topics for one document, with low-probability topics removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationResult {
    topics: Vec<Topic>,
}

impl RecommendationResult {
    /// Keeps the topics whose probability reaches `threshold`, in the order
    /// the engine ranked them.
    pub fn new(topics: Vec<Topic>, threshold: f64) -> Self {
        Self {
            topics: topics
                .into_iter()
                .filter(|t| t.probability >= threshold)
                .collect(),
        }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// True if any recommended topic has `topic` as its id or label.
    pub fn contains(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t.id == topic || t.label == topic)
    }
}

impl fmt::Display for RecommendationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.topics.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\"|\"{}\"({})", t.label, t.id, t.probability)?;
        }
        write!(f, "]")
    }
}

/// A SKOS vocabulary in Turtle syntax. The engine parses it; this crate
/// only stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary(String);

impl Vocabulary {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Vocabulary {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl AsRef<str> for Vocabulary {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Language settings handed to the engine for training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSettings {
    pub language: String,
    pub stemmer: Option<String>,
    pub stopwords: Option<String>,
}

/// Trains topic models.
pub trait TaggingEngine: Send + Sync {
    /// Trains a model on `corpus`. Long-running implementations should poll
    /// `cancel` and return [`EngineError::Interrupted`] once it is set.
    fn train(
        &self,
        corpus: &[TrainingDocument],
        vocabulary: &Vocabulary,
        settings: &TrainingSettings,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn TopicModel>, EngineError>;

    /// Restores a model written by [`TopicModel::encode`].
    fn decode_model(&self, bytes: &[u8]) -> Result<Arc<dyn TopicModel>, EngineError>;
}

/// A trained model.
pub trait TopicModel: Send + Sync {
    /// Up to `max_topics` topics for `text`, best first.
    fn recommend(
        &self,
        vocabulary: &Vocabulary,
        text: &str,
        max_topics: usize,
    ) -> Result<Vec<Topic>, EngineError>;

    fn encode(&self) -> Result<Vec<u8>, EngineError>;
}

/// Stores models in the engine's own binary format.
pub struct ModelCodec {
    engine: Arc<dyn TaggingEngine>,
}

impl ModelCodec {
    pub fn new(engine: Arc<dyn TaggingEngine>) -> Self {
        Self { engine }
    }
}

impl Codec<Arc<dyn TopicModel>> for ModelCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn TopicModel>, String> {
        self.engine.decode_model(bytes).map_err(|e| e.to_string())
    }

    fn encode(&self, value: &Arc<dyn TopicModel>) -> Result<Vec<u8>, String> {
        value.encode().map_err(|e| e.to_string())
    }
}
