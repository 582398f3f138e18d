//! The tagger: one configured topic-tagging service instance.

pub mod collection;

pub use collection::{is_valid_tagger_id, TaggerCollection};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::config::TaggerConfiguration;
use crate::corpus::Corpus;
use crate::engine::{RecommendationResult, TaggingEngine, TopicModel, TrainingSettings, Vocabulary};
use crate::error::{EngineError, JobError, StorageError, TaggerError};
use crate::jobs::cross_validation::CROSS_VALIDATION_ACTIVITY;
use crate::jobs::training::TRAINING_ACTIVITY;
use crate::jobs::{
    AsyncJob, CrossValidationJob, JobController, JobHandle, JobReport, JobState, TrainingJob,
};
use crate::storage::{MemoryStore, ObjectStore};

/// The two activity slots of a tagger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Training,
    CrossValidation,
}

impl JobKind {
    pub fn activity_name(&self) -> &'static str {
        match self {
            JobKind::Training => TRAINING_ACTIVITY,
            JobKind::CrossValidation => CROSS_VALIDATION_ACTIVITY,
        }
    }

    pub fn report_file_name(&self) -> &'static str {
        match self {
            JobKind::Training => "trainer-report.json",
            JobKind::CrossValidation => "xvalidator-report.json",
        }
    }
}

/// Status of an activity slot as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Error,
    Ready,
    /// Ready, but nothing can start until a vocabulary is uploaded.
    NoVocabulary,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Error => "error",
            ServiceStatus::Ready => "ready",
            ServiceStatus::NoVocabulary => "no vocabulary",
        }
    }
}

/// Stores backing one tagger.
pub struct TaggerStores {
    pub configuration: Arc<dyn ObjectStore<TaggerConfiguration>>,
    pub vocabulary: Arc<dyn ObjectStore<Vocabulary>>,
    pub model: Arc<dyn ObjectStore<Arc<dyn TopicModel>>>,
    pub training_report: Arc<dyn ObjectStore<JobReport>>,
    pub cross_validation_report: Arc<dyn ObjectStore<JobReport>>,
}

impl TaggerStores {
    /// Non-persistent stores, starting with the given configuration.
    pub fn in_memory(configuration: TaggerConfiguration) -> Self {
        Self {
            configuration: Arc::new(MemoryStore::with_value(configuration)),
            vocabulary: Arc::new(MemoryStore::new()),
            model: Arc::new(MemoryStore::new()),
            training_report: Arc::new(MemoryStore::new()),
            cross_validation_report: Arc::new(MemoryStore::new()),
        }
    }
}

enum Cached<T> {
    Unloaded,
    Loaded(Option<T>),
}

impl<T> Cached<T> {
    fn is_loaded(&self) -> bool {
        matches!(self, Cached::Loaded(_))
    }

    fn value(&self) -> Option<&T> {
        match self {
            Cached::Loaded(Some(value)) => Some(value),
            _ => None,
        }
    }
}

struct TaggerState {
    configuration: TaggerConfiguration,
    vocabulary: Cached<Vocabulary>,
    model: Cached<Arc<dyn TopicModel>>,
    /// Bumped on every vocabulary change; a model trained against an older
    /// generation is never installed.
    vocabulary_generation: u64,
}

/// A tagger with its configuration, vocabulary, trained model and the job
/// controllers for training and cross-validation.
///
/// Vocabulary and model are loaded on first use and cached; setters write
/// through to the store before updating the cache. Changing the vocabulary
/// deletes the trained model.
pub struct Tagger {
    id: String,
    engine: Arc<dyn TaggingEngine>,
    default_lang: String,
    stores: TaggerStores,
    state: RwLock<TaggerState>,
    /// Serializes job starts against vocabulary changes.
    start_lock: Mutex<()>,
    training: JobController,
    cross_validation: JobController,
}

impl Tagger {
    /// Opens a tagger from its stores. A missing configuration is replaced by
    /// the defaults. A configuration naming a different tagger is rejected
    /// with [`TaggerError::TaggerNotFound`].
    pub fn open(
        id: &str,
        stores: TaggerStores,
        engine: Arc<dyn TaggingEngine>,
        default_lang: &str,
    ) -> Result<Self, TaggerError> {
        let configuration = match stores.configuration.get()? {
            Some(config) => config,
            None => {
                warn!("Configuration for tagger {} not found. Using defaults.", id);
                let config = TaggerConfiguration::with_defaults(id);
                stores.configuration.put(Some(&config))?;
                config
            }
        };
        if !configuration.id().eq_ignore_ascii_case(id) {
            warn!(
                "Tagger ID \"{}\" in configuration does not match directory name \"{}\"; skipping tagger",
                configuration.id(),
                id
            );
            return Err(TaggerError::TaggerNotFound(id.to_string()));
        }

        let training = JobController::new(TRAINING_ACTIVITY, Arc::clone(&stores.training_report))?;
        let cross_validation = JobController::new(
            CROSS_VALIDATION_ACTIVITY,
            Arc::clone(&stores.cross_validation_report),
        )?;

        Ok(Self {
            id: id.to_string(),
            engine,
            default_lang: default_lang.to_string(),
            stores,
            state: RwLock::new(TaggerState {
                configuration,
                vocabulary: Cached::Unloaded,
                model: Cached::Unloaded,
                vocabulary_generation: 0,
            }),
            start_lock: Mutex::new(()),
            training,
            cross_validation,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn engine(&self) -> &Arc<dyn TaggingEngine> {
        &self.engine
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TaggerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TaggerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_start(&self) -> MutexGuard<'_, ()> {
        self.start_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn configuration(&self) -> TaggerConfiguration {
        self.read_state().configuration.clone()
    }

    pub fn set_configuration(&self, configuration: TaggerConfiguration) -> Result<(), StorageError> {
        let mut state = self.write_state();
        self.stores.configuration.put(Some(&configuration))?;
        state.configuration = configuration;
        Ok(())
    }

    /// Applies a partial JSON update and stores the result.
    pub fn update_configuration(&self, json: &Value) -> Result<TaggerConfiguration, TaggerError> {
        let mut state = self.write_state();
        let mut configuration = state.configuration.clone();
        configuration.update_from_json(json)?;
        self.stores.configuration.put(Some(&configuration))?;
        state.configuration = configuration.clone();
        debug!("Updated configuration of tagger {}", self.id);
        Ok(configuration)
    }

    /// Engine settings derived from the configuration and the server default
    /// language.
    pub fn training_settings(&self) -> TrainingSettings {
        self.read_state()
            .configuration
            .training_settings(&self.default_lang)
    }

    fn ensure_vocabulary_loaded(&self) -> Result<(), StorageError> {
        if self.read_state().vocabulary.is_loaded() {
            return Ok(());
        }
        let mut state = self.write_state();
        if !state.vocabulary.is_loaded() {
            state.vocabulary = Cached::Loaded(self.stores.vocabulary.get()?);
        }
        Ok(())
    }

    pub fn vocabulary(&self) -> Result<Option<Vocabulary>, StorageError> {
        Ok(self.vocabulary_with_generation()?.map(|(vocabulary, _)| vocabulary))
    }

    /// The vocabulary together with its generation, read atomically.
    pub fn vocabulary_with_generation(&self) -> Result<Option<(Vocabulary, u64)>, StorageError> {
        self.ensure_vocabulary_loaded()?;
        let state = self.read_state();
        Ok(state
            .vocabulary
            .value()
            .map(|vocabulary| (vocabulary.clone(), state.vocabulary_generation)))
    }

    pub fn has_vocabulary(&self) -> bool {
        match &self.read_state().vocabulary {
            Cached::Loaded(vocabulary) => vocabulary.is_some(),
            Cached::Unloaded => self.stores.vocabulary.contains(),
        }
    }

    /// Replaces the vocabulary; `None` deletes it. A running training job is
    /// cancelled, and the trained model and training report are cleared since
    /// they belong to the previous vocabulary.
    pub fn set_vocabulary(&self, vocabulary: Option<Vocabulary>) -> Result<(), TaggerError> {
        let _start = self.lock_start();
        if self.training.is_locked() {
            info!("Vocabulary of tagger {} changed; cancelling training", self.id);
            self.training.cancel();
        }

        {
            let mut state = self.write_state();
            self.stores.vocabulary.put(vocabulary.as_ref())?;
            state.vocabulary = Cached::Loaded(vocabulary);
            state.vocabulary_generation += 1;
            self.stores.model.delete()?;
            state.model = Cached::Loaded(None);
        }

        self.training.reset()?;
        info!("Vocabulary of tagger {} updated; model cleared", self.id);
        Ok(())
    }

    pub fn is_trained(&self) -> bool {
        match &self.read_state().model {
            Cached::Loaded(model) => model.is_some(),
            Cached::Unloaded => self.stores.model.contains(),
        }
    }

    pub fn model(&self) -> Result<Option<Arc<dyn TopicModel>>, StorageError> {
        if let Cached::Loaded(model) = &self.read_state().model {
            return Ok(model.clone());
        }
        let mut state = self.write_state();
        if !state.model.is_loaded() {
            state.model = Cached::Loaded(self.stores.model.get()?);
        }
        Ok(state.model.value().cloned())
    }

    /// Replaces the trained model; `None` deletes it.
    pub fn set_model(&self, model: Option<Arc<dyn TopicModel>>) -> Result<(), StorageError> {
        let mut state = self.write_state();
        self.stores.model.put(model.as_ref())?;
        state.model = Cached::Loaded(model);
        Ok(())
    }

    /// Installs `model` only if the vocabulary is still at `generation`.
    /// Returns false, leaving the current model alone, if it changed.
    pub fn set_model_if_generation(
        &self,
        generation: u64,
        model: Arc<dyn TopicModel>,
    ) -> Result<bool, StorageError> {
        let mut state = self.write_state();
        if state.vocabulary_generation != generation {
            warn!(
                "Discarding model of tagger {} trained on an outdated vocabulary",
                self.id
            );
            return Ok(false);
        }
        self.stores.model.put(Some(&model))?;
        state.model = Cached::Loaded(Some(model));
        Ok(true)
    }

    /// Recommends topics for `text` with the trained model.
    pub fn recommend(&self, text: &str) -> Result<RecommendationResult, TaggerError> {
        let vocabulary = self.vocabulary()?.ok_or_else(|| JobError::NoVocabulary {
            activity: "recommendation".to_string(),
        })?;
        let model = self.model()?.ok_or(EngineError::NotTrained)?;
        let config = self.configuration();

        if log::log_enabled!(log::Level::Debug) {
            let short: String = text.chars().take(100).collect();
            let ellipsis = if text.chars().nth(100).is_some() { "…" } else { "" };
            debug!("Running recommender: {}{}", short, ellipsis);
        }

        let topics = model.recommend(&vocabulary, text, config.max_topics_per_document())?;
        let result = RecommendationResult::new(topics, config.probability_threshold());
        debug!("Recommendation result: {}", result);
        Ok(result)
    }

    pub fn controller(&self, kind: JobKind) -> &JobController {
        match kind {
            JobKind::Training => &self.training,
            JobKind::CrossValidation => &self.cross_validation,
        }
    }

    /// Status of one slot. A ready slot reports "no vocabulary" while the
    /// tagger has none.
    pub fn status(&self, kind: JobKind) -> ServiceStatus {
        self.service_status(self.controller(kind).state())
    }

    fn service_status(&self, state: JobState) -> ServiceStatus {
        match state {
            JobState::Running => ServiceStatus::Running,
            JobState::Failed => ServiceStatus::Error,
            JobState::Ready if !self.has_vocabulary() => ServiceStatus::NoVocabulary,
            JobState::Ready => ServiceStatus::Ready,
        }
    }

    /// `{"service_status": ..., <report fields>}`, with status and report
    /// taken from the same moment.
    pub fn status_document(&self, kind: JobKind) -> Map<String, Value> {
        let (state, report) = self.controller(kind).snapshot();
        let mut document = Map::new();
        document.insert(
            "service_status".to_string(),
            Value::String(self.service_status(state).as_str().to_string()),
        );
        document.extend(report.to_json());
        document
    }

    /// Trains a new model on `corpus` in the background.
    pub fn start_training(self: &Arc<Self>, corpus: Corpus) -> Result<JobHandle, TaggerError> {
        self.start(JobKind::Training, || {
            let job: Box<dyn AsyncJob> = Box::new(TrainingJob::new(Arc::clone(self), corpus)?);
            Ok(job)
        })
    }

    /// Cross-validates the current configuration on `corpus` in the
    /// background.
    pub fn start_cross_validation(
        self: &Arc<Self>,
        corpus: Corpus,
    ) -> Result<JobHandle, TaggerError> {
        self.start(JobKind::CrossValidation, || {
            let job: Box<dyn AsyncJob> = Box::new(CrossValidationJob::new(self, corpus)?);
            Ok(job)
        })
    }

    fn start(
        &self,
        kind: JobKind,
        build: impl FnOnce() -> Result<Box<dyn AsyncJob>, TaggerError>,
    ) -> Result<JobHandle, TaggerError> {
        let _start = self.lock_start();
        if !self.has_vocabulary() {
            return Err(JobError::NoVocabulary {
                activity: kind.activity_name().to_string(),
            }
            .into());
        }

        let controller = self.controller(kind);
        let ticket = controller.lock()?;
        let job = match build() {
            Ok(job) => job,
            Err(e) => {
                controller.release(ticket);
                return Err(e);
            }
        };
        // Fails with JobError::Cancelled if cancel_jobs() ran since lock()
        Ok(controller.start_job(ticket, job)?)
    }

    /// Cancels whatever is running in either slot.
    pub fn cancel_jobs(&self) {
        self.training.cancel();
        self.cross_validation.cancel();
    }
}
