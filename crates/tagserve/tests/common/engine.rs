//! A small deterministic tagging engine for integration tests.
//!
//! Training collects every topic label seen in the corpus. The resulting
//! model recommends each known label that occurs as a word in the text, so a
//! corpus whose texts name their own topics scores perfect precision and
//! recall under cross-validation.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tagserve::error::EngineError;
use tagserve::{
    CancellationToken, TaggingEngine, Topic, TopicModel, TrainingDocument, TrainingSettings,
    Vocabulary,
};

/// How the next training runs behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMode {
    /// Train immediately.
    Normal,
    /// Fail every training with this message.
    Fail(String),
    /// Block until [`KeywordEngine::release`] or cancellation.
    Gated,
}

pub struct KeywordEngine {
    mode: Mutex<EngineMode>,
    gate: AtomicBool,
    entered: AtomicUsize,
    trainings: AtomicUsize,
}

impl KeywordEngine {
    pub fn new() -> Self {
        Self::with_mode(EngineMode::Normal)
    }

    pub fn with_mode(mode: EngineMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            gate: AtomicBool::new(false),
            entered: AtomicUsize::new(0),
            trainings: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: EngineMode) {
        *self.mode.lock().unwrap() = mode;
        self.gate.store(false, Ordering::SeqCst);
    }

    /// Lets gated trainings finish.
    pub fn release(&self) {
        self.gate.store(true, Ordering::SeqCst);
    }

    /// Number of trainings that finished with a model.
    pub fn trainings(&self) -> usize {
        self.trainings.load(Ordering::SeqCst)
    }

    /// Blocks until `count` trainings have started.
    pub fn wait_until_entered(&self, count: usize) {
        for _ in 0..1000 {
            if self.entered.load(Ordering::SeqCst) >= count {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("engine never entered training");
    }
}

impl Default for KeywordEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggingEngine for KeywordEngine {
    fn train(
        &self,
        corpus: &[TrainingDocument],
        _vocabulary: &Vocabulary,
        _settings: &TrainingSettings,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn TopicModel>, EngineError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            EngineMode::Normal => {}
            EngineMode::Fail(message) => return Err(EngineError::Training(message)),
            EngineMode::Gated => {
                while !self.gate.load(Ordering::SeqCst) {
                    if cancel.is_cancelled() {
                        return Err(EngineError::Interrupted);
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }

        let labels: BTreeSet<String> = corpus
            .iter()
            .flat_map(|doc| doc.topics.iter().cloned())
            .collect();
        self.trainings.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(KeywordModel { labels }))
    }

    fn decode_model(&self, bytes: &[u8]) -> Result<Arc<dyn TopicModel>, EngineError> {
        let text = std::str::from_utf8(bytes).map_err(|e| EngineError::Model(e.to_string()))?;
        let labels = text.lines().map(str::to_string).collect();
        Ok(Arc::new(KeywordModel { labels }))
    }
}

pub struct KeywordModel {
    labels: BTreeSet<String>,
}

impl TopicModel for KeywordModel {
    fn recommend(
        &self,
        _vocabulary: &Vocabulary,
        text: &str,
        max_topics: usize,
    ) -> Result<Vec<Topic>, EngineError> {
        let words: BTreeSet<&str> = text.split_whitespace().collect();
        Ok(self
            .labels
            .iter()
            .filter(|label| words.contains(label.as_str()))
            .take(max_topics)
            .map(|label| Topic::new(format!("http://example.org/{}", label), label.as_str(), 0.9))
            .collect())
    }

    fn encode(&self) -> Result<Vec<u8>, EngineError> {
        let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        Ok(labels.join("\n").into_bytes())
    }
}
