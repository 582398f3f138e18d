use std::sync::Arc;

use log::{debug, info};

use crate::corpus::{Corpus, TrainingDocument};
use crate::engine::{TrainingSettings, Vocabulary};
use crate::error::{JobError, TaggerError};
use crate::jobs::job::{AsyncJob, JobContext};
use crate::jobs::report::JobReport;
use crate::tagger::Tagger;

pub const TRAINING_ACTIVITY: &str = "training";

/// Trains a model on a whole corpus and installs it as the tagger's model.
pub struct TrainingJob {
    tagger: Arc<Tagger>,
    documents: Vec<TrainingDocument>,
    skipped: usize,
    vocabulary: Vocabulary,
    generation: u64,
    settings: TrainingSettings,
}

impl TrainingJob {
    /// Captures the tagger's current vocabulary and language settings.
    pub fn new(tagger: Arc<Tagger>, corpus: Corpus) -> Result<Self, TaggerError> {
        let (vocabulary, generation) =
            tagger
                .vocabulary_with_generation()?
                .ok_or_else(|| JobError::NoVocabulary {
                    activity: TRAINING_ACTIVITY.to_string(),
                })?;
        let settings = tagger.training_settings();

        Ok(Self {
            tagger,
            documents: corpus.documents,
            skipped: corpus.skipped,
            vocabulary,
            generation,
            settings,
        })
    }
}

impl AsyncJob for TrainingJob {
    fn activity_name(&self) -> &str {
        TRAINING_ACTIVITY
    }

    fn prepare(&self, report: &mut JobReport) {
        report.log_document_counts(self.documents.len(), self.skipped);
    }

    fn run(&self, ctx: &JobContext) -> Result<(), TaggerError> {
        debug!("Training started on {} documents", self.documents.len());
        info!(
            "Using document language: {}, stemmer: {}, stopwords: {}",
            self.settings.language,
            self.settings.stemmer.as_deref().unwrap_or("default"),
            self.settings.stopwords.as_deref().unwrap_or("default")
        );

        let model = self.tagger.engine().train(
            &self.documents,
            &self.vocabulary,
            &self.settings,
            ctx.cancellation(),
        )?;
        if ctx.is_cancelled() {
            debug!("Training interrupted; model discarded");
            return Ok(());
        }

        let tagger = Arc::clone(&self.tagger);
        let generation = self.generation;
        ctx.commit(move || {
            if !tagger.set_model_if_generation(generation, model)? {
                return Err(JobError::VocabularyChanged {
                    activity: TRAINING_ACTIVITY.to_string(),
                }
                .into());
            }
            debug!("Training finished; model installed for tagger {}", tagger.id());
            Ok(())
        });
        Ok(())
    }
}
