use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TaggerError;
use crate::jobs::cancel::CancellationToken;
use crate::jobs::report::JobReport;

/// A unit of work run by a [`JobController`](crate::jobs::JobController) on
/// its own thread.
///
/// Jobs capture their inputs at construction time. Errors returned from
/// [`run`](Self::run) are recorded in the job report by the controller and
/// never reach the caller that started the job.
pub trait AsyncJob: Send + 'static {
    /// Lower-case name used in log lines and error messages, e.g. `"training"`.
    fn activity_name(&self) -> &str;

    /// Called synchronously by `start_job` before the job thread is spawned,
    /// so the first status poll already sees what is recorded here.
    fn prepare(&self, _report: &mut JobReport) {}

    fn run(&self, ctx: &JobContext) -> Result<(), TaggerError>;
}

/// Publishes a job's result, e.g. installs a trained model.
pub type Commit = Box<dyn FnOnce() -> Result<(), TaggerError> + Send>;

/// Handle given to a running job.
pub struct JobContext {
    report: Arc<Mutex<JobReport>>,
    cancel: CancellationToken,
    commit: Mutex<Option<Commit>>,
}

impl JobContext {
    pub(crate) fn new(report: Arc<Mutex<JobReport>>, cancel: CancellationToken) -> Self {
        Self {
            report,
            cancel,
            commit: Mutex::new(None),
        }
    }

    /// Mutates the live report. After a cancel the report written here is
    /// detached from the controller and simply dropped.
    pub fn update_report<R>(&self, f: impl FnOnce(&mut JobReport) -> R) -> R {
        let mut report = self
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut report)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Registers the step that publishes the job's result. It runs after
    /// `run` returns `Ok`, under the controller mutex and in the same critical
    /// section that persists the final report, so a cancelled run never
    /// publishes and a published run is never rolled back. An error from `f`
    /// fails the job. A later call replaces an earlier one.
    pub fn commit(&self, f: impl FnOnce() -> Result<(), TaggerError> + Send + 'static) {
        *self.lock_commit() = Some(Box::new(f));
    }

    pub(crate) fn take_commit(&self) -> Option<Commit> {
        self.lock_commit().take()
    }

    fn lock_commit(&self) -> MutexGuard<'_, Option<Commit>> {
        self.commit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
