use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use tracing::info_span;

use crate::corpus::{Corpus, TrainingDocument};
use crate::engine::{RecommendationResult, TaggingEngine, TrainingSettings, Vocabulary};
use crate::error::{ConfigError, JobError, TaggerError};
use crate::jobs::job::{AsyncJob, JobContext};
use crate::jobs::report::JobReport;
use crate::tagger::Tagger;

pub const CROSS_VALIDATION_ACTIVITY: &str = "cross-validation";

/// `x / y`, or 0 when `y` is 0.
pub fn safe_division(x: f64, y: f64) -> f64 {
    if y == 0.0 {
        0.0
    } else {
        x / y
    }
}

/// Test-set range `[start, end)` of one fold. Folds differ in size by at most
/// one document when `documents` is not a multiple of `passes`.
pub fn fold_bounds(pass: usize, passes: usize, documents: usize) -> (usize, usize) {
    let start = pass * documents / passes;
    let end = (pass + 1) * documents / passes;
    (start, end)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrecisionRecall {
    pub precision: f64,
    pub recall: f64,
}

impl PrecisionRecall {
    /// Scores one document's recommendations against its known topics. A
    /// topic counts as found when it equals a recommendation's id or label.
    pub fn score(doc: &TrainingDocument, result: &RecommendationResult) -> Self {
        let correct_topics_found = doc.topics.iter().filter(|t| result.contains(t)).count();
        let found_topics_correct = result
            .topics()
            .iter()
            .filter(|t| doc.has_topic(&t.id) || doc.has_topic(&t.label))
            .count();
        Self {
            precision: safe_division(found_topics_correct as f64, result.len() as f64),
            recall: safe_division(correct_topics_found as f64, doc.topics.len() as f64),
        }
    }

    /// Component-wise mean; zero for an empty input.
    pub fn mean(values: &[PrecisionRecall]) -> Self {
        let n = values.len() as f64;
        Self {
            precision: safe_division(values.iter().map(|v| v.precision).sum(), n),
            recall: safe_division(values.iter().map(|v| v.recall).sum(), n),
        }
    }
}

fn as_percent(value: f64) -> String {
    format!("{}%", (value * 10000.0).round() / 100.0)
}

impl fmt::Display for PrecisionRecall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision = {}, recall = {}",
            as_percent(self.precision),
            as_percent(self.recall)
        )
    }
}

/// k-fold cross-validation of the tagger's configuration on a corpus.
///
/// Each pass holds out one fold as the test set, trains a throwaway model on
/// the rest and scores its recommendations for the held-out documents. The
/// tagger's own model is never touched.
pub struct CrossValidationJob {
    engine: Arc<dyn TaggingEngine>,
    documents: Vec<TrainingDocument>,
    skipped: usize,
    vocabulary: Vocabulary,
    settings: TrainingSettings,
    passes: usize,
    max_topics: usize,
    threshold: f64,
}

impl CrossValidationJob {
    /// Captures the corpus and the tagger's vocabulary and configuration.
    /// Fails if the corpus has fewer documents than there are passes.
    pub fn new(tagger: &Tagger, corpus: Corpus) -> Result<Self, TaggerError> {
        let vocabulary = tagger.vocabulary()?.ok_or_else(|| JobError::NoVocabulary {
            activity: CROSS_VALIDATION_ACTIVITY.to_string(),
        })?;
        let config = tagger.configuration();
        let passes = config.cross_validation_passes();
        if corpus.len() < passes {
            return Err(ConfigError::CorpusTooSmall {
                documents: corpus.len(),
                passes,
            }
            .into());
        }

        Ok(Self {
            engine: Arc::clone(tagger.engine()),
            documents: corpus.documents,
            skipped: corpus.skipped,
            vocabulary,
            settings: tagger.training_settings(),
            passes,
            max_topics: config.max_topics_per_document(),
            threshold: config.probability_threshold(),
        })
    }

    /// Runs one pass; `None` if cancelled.
    fn run_pass(&self, pass: usize, ctx: &JobContext) -> Result<Option<PrecisionRecall>, TaggerError> {
        let (start, end) = fold_bounds(pass, self.passes, self.documents.len());
        let test_set = &self.documents[start..end];
        let training_set: Vec<TrainingDocument> = self.documents[..start]
            .iter()
            .chain(&self.documents[end..])
            .cloned()
            .collect();

        let model = self.engine.train(
            &training_set,
            &self.vocabulary,
            &self.settings,
            ctx.cancellation(),
        )?;
        if ctx.is_cancelled() {
            return Ok(None);
        }

        let mut scores = Vec::with_capacity(test_set.len());
        for doc in test_set {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            let topics = model.recommend(&self.vocabulary, &doc.text, self.max_topics)?;
            let result = RecommendationResult::new(topics, self.threshold);
            scores.push(PrecisionRecall::score(doc, &result));
        }

        let result = PrecisionRecall::mean(&scores);
        debug!(
            "Cross-validation pass {}/{} on {} documents complete, {}",
            pass + 1,
            self.passes,
            test_set.len(),
            result
        );
        Ok(Some(result))
    }
}

impl AsyncJob for CrossValidationJob {
    fn activity_name(&self) -> &str {
        CROSS_VALIDATION_ACTIVITY
    }

    fn prepare(&self, report: &mut JobReport) {
        report.log_document_counts(self.documents.len(), self.skipped);
    }

    fn run(&self, ctx: &JobContext) -> Result<(), TaggerError> {
        debug!("Cross-validation started");

        let mut pass_results = Vec::with_capacity(self.passes);
        for pass in 0..self.passes {
            let span = info_span!("cross_validation_pass", pass = pass + 1, passes = self.passes);
            let _enter = span.enter();

            match self.run_pass(pass, ctx)? {
                Some(result) => pass_results.push(result),
                None => {
                    debug!("Cross-validation interrupted in pass {}", pass + 1);
                    return Ok(());
                }
            }
        }

        let result = PrecisionRecall::mean(&pass_results);
        ctx.update_report(|report| report.log_precision_and_recall(result.precision, result.recall));
        info!("Cross-validation results: {}", result);
        debug!("Cross-validation stopped");
        Ok(())
    }
}
