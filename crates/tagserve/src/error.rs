use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Malformed tagger id: '{0}'")]
    InvalidTaggerId(String),

    #[error("Tagger id already in use: '{0}'")]
    TaggerExists(String),

    #[error("Tagger does not exist: '{0}'")]
    TaggerNotFound(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("{field} must be at least {minimum}, was {value}")]
    TooSmall {
        field: &'static str,
        minimum: i64,
        value: i64,
    },

    #[error("Corpus of {documents} documents is too small for {passes} cross-validation passes")]
    CorpusTooSmall { documents: usize, passes: usize },
}

/// Failures of an [`ObjectStore`](crate::storage::ObjectStore). Every variant
/// names the backing file and the tagger that owns it.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Error reading from {file} for tagger {owner}: {source}")]
    Read {
        file: PathBuf,
        owner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error writing to {file} for tagger {owner}: {source}")]
    Write {
        file: PathBuf,
        owner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error deleting {file} for tagger {owner}: {source}")]
    Delete {
        file: PathBuf,
        owner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error decoding {file} for tagger {owner}: {reason}")]
    Decode {
        file: PathBuf,
        owner: String,
        reason: String,
    },

    #[error("Error encoding {file} for tagger {owner}: {reason}")]
    Encode {
        file: PathBuf,
        owner: String,
        reason: String,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete directory '{path}': {source}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list directory '{path}': {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid data directory '{path}': {reason}")]
    DataDirectory { path: PathBuf, reason: String },
}

/// Conflicts and launch failures reported by a
/// [`JobController`](crate::jobs::JobController).
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{activity} already in progress")]
    Busy { activity: String },

    #[error("Cannot reset while {activity} is in progress")]
    Running { activity: String },

    #[error("Tagger must have a vocabulary before {activity} can be started")]
    NoVocabulary { activity: String },

    #[error("Failed to spawn {activity} thread: {source}")]
    Spawn {
        activity: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Vocabulary changed while {activity} was running")]
    VocabularyChanged { activity: String },

    #[error("{activity} was cancelled")]
    Cancelled { activity: String },
}

/// Failures raised by the external tagging engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model training failed: {0}")]
    Training(String),

    #[error("Topic extraction failed: {0}")]
    Recommendation(String),

    #[error("Model serialization failed: {0}")]
    Model(String),

    #[error("Tagger is not trained")]
    NotTrained,

    #[error("Training was interrupted")]
    Interrupted,
}

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read training corpus: {0}")]
    Read(#[from] std::io::Error),

    #[error("JSON Lines parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(
        "0 out of {skipped} documents were usable as training documents; check expected JSON format!"
    )]
    Empty { skipped: usize },
}

pub type Result<T> = std::result::Result<T, TaggerError>;

impl JobError {
    /// True for the errors that an HTTP layer maps to 409 Conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            JobError::Busy { .. } | JobError::Running { .. } | JobError::NoVocabulary { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_names_file_and_owner() {
        let err = StorageError::Read {
            file: PathBuf::from("/data/demo/config.json"),
            owner: "demo".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/demo/config.json"));
        assert!(msg.contains("tagger demo"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_conflict_classification() {
        assert!(JobError::Busy {
            activity: "Training".into()
        }
        .is_conflict());
        assert!(JobError::Running {
            activity: "training".into()
        }
        .is_conflict());
        assert!(!JobError::Cancelled {
            activity: "training".into()
        }
        .is_conflict());
    }

    #[test]
    fn test_empty_corpus_message() {
        let err = CorpusError::Empty { skipped: 3 };
        assert_eq!(
            err.to_string(),
            "0 out of 3 documents were usable as training documents; check expected JSON format!"
        );
    }
}
