pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod storage;
pub mod tagger;
pub mod telemetry;

pub use config::{LogFormat, LogSettings, ServerSettings, TaggerConfiguration};
pub use corpus::{parse_json_lines, Corpus, ParseOptions, TrainingDocument};
pub use engine::{RecommendationResult, TaggingEngine, Topic, TopicModel, TrainingSettings, Vocabulary};
pub use error::{
    ConfigError, CorpusError, EngineError, JobError, Result, StorageError, TaggerError,
};
pub use jobs::{
    AsyncJob, CancellationToken, CrossValidationJob, JobContext, JobController, JobHandle,
    JobOutcome, JobReport, JobState, RunTicket, TrainingJob,
};
pub use storage::{DataDirectory, FileStore, MemoryStore, ObjectStore};
pub use tagger::{JobKind, ServiceStatus, Tagger, TaggerCollection, TaggerStores};
pub use telemetry::init_logging;
