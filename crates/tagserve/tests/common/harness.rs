//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct owns a temporary data directory, a
//! [`KeywordEngine`] and a `TaggerCollection` over both, so each test works
//! against real files without touching anything outside its temp dir.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use tagserve::{DataDirectory, JobKind, Tagger, TaggerCollection, TaggingEngine, Vocabulary};

use super::builders::VOCABULARY;
use super::engine::KeywordEngine;

/// Upper bound for waiting on a background job.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestHarness {
    temp_dir: TempDir,
    pub engine: Arc<KeywordEngine>,
    pub collection: TaggerCollection,
}

impl TestHarness {
    /// Create a new harness with an empty data directory.
    pub fn new() -> Self {
        Self::with_engine(KeywordEngine::new())
    }

    pub fn with_engine(engine: KeywordEngine) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = Arc::new(engine);
        let collection = open_collection(temp_dir.path(), &engine);
        Self {
            temp_dir,
            engine,
            collection,
        }
    }

    pub fn data_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of one of a tagger's files.
    pub fn tagger_file(&self, id: &str, file_name: &str) -> PathBuf {
        self.collection
            .data_directory()
            .tagger_directory(id)
            .join(file_name)
    }

    pub fn report_file(&self, id: &str, kind: JobKind) -> PathBuf {
        self.tagger_file(id, kind.report_file_name())
    }

    /// Creates a tagger and uploads the test vocabulary.
    pub fn create_tagger(&self, id: &str) -> Arc<Tagger> {
        let tagger = self.collection.create(id).expect("Failed to create tagger");
        tagger
            .set_vocabulary(Some(Vocabulary::new(VOCABULARY)))
            .expect("Failed to set vocabulary");
        tagger
    }

    /// A fresh collection over the same data directory, as after a restart.
    pub fn reopen(&self) -> TaggerCollection {
        open_collection(self.temp_dir.path(), &self.engine)
    }
}

fn open_collection(path: &Path, engine: &Arc<KeywordEngine>) -> TaggerCollection {
    let data = DataDirectory::open(path).expect("Failed to open data directory");
    let engine: Arc<dyn TaggingEngine> = Arc::clone(engine) as Arc<dyn TaggingEngine>;
    TaggerCollection::new(data, engine, "en")
}
