use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use tracing::info_span;

use crate::error::{JobError, TaggerError};
use crate::jobs::cancel::CancellationToken;
use crate::jobs::job::{AsyncJob, Commit, JobContext};
use crate::jobs::report::JobReport;
use crate::storage::ObjectStore;

/// Lifecycle state of one activity slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Running,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Ready => "ready",
            JobState::Running => "running",
            JobState::Failed => "error",
        }
    }

    fn settled(report: &JobReport) -> Self {
        if report.error_message().is_some() {
            JobState::Failed
        } else {
            JobState::Ready
        }
    }
}

/// How a job run ended, as seen by its [`JobHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

struct ActiveRun {
    id: u64,
    previous: JobReport,
    cancel: CancellationToken,
    started: bool,
}

/// Proof of a reservation made by [`JobController::lock`], consumed by
/// [`JobController::start_job`].
#[derive(Debug)]
pub struct RunTicket {
    controller: usize,
    run_id: u64,
}

impl RunTicket {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

/// Everything guarded by the controller mutex.
struct ControllerState {
    state: JobState,
    report: Arc<Mutex<JobReport>>,
    active: Option<ActiveRun>,
    next_run: u64,
}

impl ControllerState {
    fn is_active_run(&self, run_id: u64) -> bool {
        self.active.as_ref().is_some_and(|run| run.id == run_id)
    }
}

fn lock_report(report: &Mutex<JobReport>) -> MutexGuard<'_, JobReport> {
    report.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs at most one job at a time for one activity slot and keeps the report
/// of the current or most recent run.
///
/// `lock()` reserves the slot and hands out a [`RunTicket`], `start_job()`
/// runs a job for that ticket on a new thread, and `cancel()` releases the
/// slot again, restoring the report from before the lock. Completed and
/// failed runs persist their report through the store; cancelled runs never
/// do.
pub struct JobController {
    activity: String,
    shared: Arc<Mutex<ControllerState>>,
    store: Arc<dyn ObjectStore<JobReport>>,
}

impl JobController {
    /// Creates a controller, loading the last persisted report if present.
    pub fn new(
        activity: &str,
        store: Arc<dyn ObjectStore<JobReport>>,
    ) -> Result<Self, TaggerError> {
        let report = store.get()?.unwrap_or_default();
        let state = JobState::settled(&report);
        debug!("Loaded {} report, state {}", activity, state.as_str());

        Ok(Self {
            activity: activity.to_string(),
            shared: Arc::new(Mutex::new(ControllerState {
                state,
                report: Arc::new(Mutex::new(report)),
                active: None,
                next_run: 0,
            })),
            store,
        })
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    fn lock_shared(&self) -> MutexGuard<'_, ControllerState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    /// Reserves the slot and starts a fresh report. The returned ticket is
    /// needed to start the job.
    pub fn lock(&self) -> Result<RunTicket, JobError> {
        let mut shared = self.lock_shared();
        if shared.state == JobState::Running {
            return Err(JobError::Busy {
                activity: self.activity.clone(),
            });
        }

        let previous = lock_report(&shared.report).clone();
        let mut fresh = JobReport::new();
        fresh.log_start();

        shared.next_run += 1;
        let id = shared.next_run;
        shared.report = Arc::new(Mutex::new(fresh));
        shared.active = Some(ActiveRun {
            id,
            previous,
            cancel: CancellationToken::new(),
            started: false,
        });
        shared.state = JobState::Running;
        info!("Locked {} slot (run {})", self.activity, id);
        Ok(RunTicket {
            controller: self.identity(),
            run_id: id,
        })
    }

    /// Runs `job` on a new thread and returns without waiting for it.
    ///
    /// Fails with [`JobError::Cancelled`] if the reservation behind `ticket`
    /// was cancelled in the meantime.
    ///
    /// # Panics
    /// Panics if `ticket` was issued by a different controller.
    pub fn start_job(
        &self,
        ticket: RunTicket,
        job: Box<dyn AsyncJob>,
    ) -> Result<JobHandle, JobError> {
        if ticket.controller != self.identity() {
            panic!("Must lock() before starting {} job", job.activity_name());
        }
        let run_id = ticket.run_id;

        let launch = {
            let mut shared = self.lock_shared();
            let report = Arc::clone(&shared.report);
            match shared.active.as_mut() {
                Some(run) if run.id == run_id && !run.started => {
                    run.started = true;
                    Some((run.cancel.clone(), report))
                }
                _ => None,
            }
        };
        let Some((cancel, report)) = launch else {
            info!(
                "Not starting {} job: run {} was cancelled",
                self.activity, run_id
            );
            return Err(JobError::Cancelled {
                activity: self.activity.clone(),
            });
        };

        job.prepare(&mut lock_report(&report));

        let ctx = JobContext::new(report, cancel);
        let shared = Arc::clone(&self.shared);
        let store = Arc::clone(&self.store);
        let (sender, receiver) = bounded::<JobOutcome>(1);

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.activity, run_id))
            .spawn(move || run_job(job, ctx, run_id, shared, store, sender));

        match spawned {
            Ok(_) => {
                info!("Started {} job (run {})", self.activity, run_id);
                Ok(JobHandle { receiver })
            }
            Err(e) => {
                error!("Failed to spawn {} thread: {}", self.activity, e);
                self.cancel_run(run_id);
                Err(JobError::Spawn {
                    activity: self.activity.clone(),
                    source: e,
                })
            }
        }
    }

    /// Gives up a reservation that will not be started. Does nothing if that
    /// run is no longer the active one.
    pub fn release(&self, ticket: RunTicket) {
        if ticket.controller == self.identity() {
            self.cancel_run(ticket.run_id);
        }
    }

    /// Releases the slot and restores the report from before `lock()`. The
    /// running job is asked to stop but not waited for. No-op unless running.
    pub fn cancel(&self) {
        let mut shared = self.lock_shared();
        if let Some(run) = shared.active.take() {
            self.rollback(&mut shared, run);
        }
    }

    fn cancel_run(&self, run_id: u64) {
        let mut shared = self.lock_shared();
        if shared.is_active_run(run_id) {
            if let Some(run) = shared.active.take() {
                self.rollback(&mut shared, run);
            }
        }
    }

    fn rollback(&self, shared: &mut ControllerState, run: ActiveRun) {
        run.cancel.cancel();
        shared.state = JobState::settled(&run.previous);
        shared.report = Arc::new(Mutex::new(run.previous));
        info!("Cancelled {} (run {})", self.activity, run.id);
    }

    /// Replaces the report with an empty one and persists it, clearing any
    /// recorded failure.
    pub fn reset(&self) -> Result<(), TaggerError> {
        let mut shared = self.lock_shared();
        if shared.state == JobState::Running {
            return Err(JobError::Running {
                activity: self.activity.clone(),
            }
            .into());
        }
        let fresh = JobReport::new();
        self.store.put(Some(&fresh))?;
        shared.report = Arc::new(Mutex::new(fresh));
        shared.state = JobState::Ready;
        info!("Reset {} report", self.activity);
        Ok(())
    }

    pub fn state(&self) -> JobState {
        self.lock_shared().state
    }

    /// `"running"`, `"error"` or `"ready"`.
    pub fn status(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn is_locked(&self) -> bool {
        self.state() == JobState::Running
    }

    pub fn is_failed(&self) -> bool {
        self.state() == JobState::Failed
    }

    /// Copy of the current report.
    pub fn report(&self) -> JobReport {
        let shared = self.lock_shared();
        let report = lock_report(&shared.report).clone();
        report
    }

    /// State and report, read together.
    pub fn snapshot(&self) -> (JobState, JobReport) {
        let shared = self.lock_shared();
        let report = lock_report(&shared.report).clone();
        (shared.state, report)
    }

    pub fn report_snapshot(&self) -> Map<String, Value> {
        self.report().to_json()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

fn run_job(
    job: Box<dyn AsyncJob>,
    ctx: JobContext,
    run_id: u64,
    shared: Arc<Mutex<ControllerState>>,
    store: Arc<dyn ObjectStore<JobReport>>,
    sender: Sender<JobOutcome>,
) {
    let activity = job.activity_name().to_string();
    let span = info_span!("job", activity = %activity, run = run_id);
    let _enter = span.enter();

    let result = match panic::catch_unwind(AssertUnwindSafe(|| job.run(&ctx))) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => Err(panic_message(payload)),
    };
    let commit = ctx.take_commit();

    let outcome = finish_run(&activity, run_id, result, commit, &shared, store.as_ref());
    // The handle may have been dropped
    let _ = sender.send(outcome);
}

fn run_commit(commit: Commit) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(commit)) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => Err(panic_message(payload)),
    }
}

/// Decides between the completed and the cancelled path under the controller
/// mutex, so exactly one of them wins. The job's commit runs in the same
/// critical section, so its side effect and the persisted report go together.
fn finish_run(
    activity: &str,
    run_id: u64,
    result: Result<(), String>,
    commit: Option<Commit>,
    shared: &Mutex<ControllerState>,
    store: &dyn ObjectStore<JobReport>,
) -> JobOutcome {
    let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
    if !shared.is_active_run(run_id) {
        info!("Discarding report of cancelled {} (run {})", activity, run_id);
        return JobOutcome::Cancelled;
    }
    shared.active = None;

    let result = match (result, commit) {
        (Ok(()), Some(commit)) => run_commit(commit),
        (result, _) => result,
    };

    let report_cell = Arc::clone(&shared.report);
    let mut report = lock_report(&report_cell);
    let mut outcome = match result {
        Ok(()) => {
            info!("Finished {} (run {})", activity, run_id);
            JobOutcome::Completed
        }
        Err(message) => {
            let message = format!("error while {}: {}", activity, message);
            error!("{}", message);
            report.log_error(message.as_str());
            JobOutcome::Failed(message)
        }
    };
    report.log_end();

    if let Err(e) = store.put(Some(&report)) {
        let message = format!("error while {}: {}", activity, e);
        warn!("Failed to persist {} report: {}", activity, e);
        if report.error_message().is_none() {
            report.log_error(message.as_str());
            outcome = JobOutcome::Failed(message);
        }
    }

    shared.state = JobState::settled(&report);
    outcome
}

/// Receives the outcome of one started job.
#[derive(Debug)]
pub struct JobHandle {
    receiver: Receiver<JobOutcome>,
}

impl JobHandle {
    /// Blocks until the job thread finishes.
    pub fn wait(self) -> JobOutcome {
        self.receiver
            .recv()
            .unwrap_or_else(|_| JobOutcome::Failed("job thread terminated".to_string()))
    }

    /// Waits up to `timeout`; `None` if the job is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                Some(JobOutcome::Failed("job thread terminated".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::storage::MemoryStore;
    use crossbeam_channel::unbounded;

    const TIMEOUT: Duration = Duration::from_secs(10);

    struct CountingJob;

    impl AsyncJob for CountingJob {
        fn activity_name(&self) -> &str {
            "counting"
        }

        fn prepare(&self, report: &mut JobReport) {
            report.log_document_counts(4, 1);
        }

        fn run(&self, ctx: &JobContext) -> Result<(), TaggerError> {
            ctx.update_report(|r| r.set_metric("score", 0.5));
            Ok(())
        }
    }

    struct FailingJob;

    impl AsyncJob for FailingJob {
        fn activity_name(&self) -> &str {
            "training"
        }

        fn run(&self, _ctx: &JobContext) -> Result<(), TaggerError> {
            Err(EngineError::Training("no documents".to_string()).into())
        }
    }

    struct PanickingJob;

    impl AsyncJob for PanickingJob {
        fn activity_name(&self) -> &str {
            "training"
        }

        fn run(&self, _ctx: &JobContext) -> Result<(), TaggerError> {
            panic!("engine crashed");
        }
    }

    /// Registers a commit that reports through `committed`, then blocks
    /// until released.
    struct GatedJob {
        release: Receiver<()>,
        committed: Sender<()>,
        commit_result: Result<(), String>,
    }

    impl GatedJob {
        fn new(release: Receiver<()>, committed: Sender<()>) -> Self {
            Self {
                release,
                committed,
                commit_result: Ok(()),
            }
        }
    }

    impl AsyncJob for GatedJob {
        fn activity_name(&self) -> &str {
            "gated"
        }

        fn run(&self, ctx: &JobContext) -> Result<(), TaggerError> {
            let committed = self.committed.clone();
            let commit_result = self.commit_result.clone();
            ctx.commit(move || {
                let _ = committed.send(());
                commit_result.map_err(|m| EngineError::Model(m).into())
            });
            let _ = self.release.recv();
            ctx.update_report(|r| r.set_metric("partial", 1.0));
            Ok(())
        }
    }

    fn controller() -> (JobController, Arc<MemoryStore<JobReport>>) {
        let store = Arc::new(MemoryStore::new());
        let controller = JobController::new("testing", store.clone()).unwrap();
        (controller, store)
    }

    fn failed_report() -> JobReport {
        let mut report = JobReport::new();
        report.log_start();
        report.log_error("error while training: boom");
        report.log_end();
        report
    }

    #[test]
    fn test_new_controller_is_ready() {
        let (controller, _) = controller();
        assert_eq!(controller.status(), "ready");
        assert!(!controller.is_locked());
        assert!(!controller.is_failed());
    }

    #[test]
    fn test_loads_failed_report() {
        let store = Arc::new(MemoryStore::with_value(failed_report()));
        let controller = JobController::new("training", store).unwrap();
        assert_eq!(controller.state(), JobState::Failed);
        assert_eq!(controller.status(), "error");
    }

    #[test]
    fn test_double_lock_is_busy() {
        let (controller, _) = controller();
        let _ticket = controller.lock().unwrap();
        let before = controller.report();

        let err = controller.lock().unwrap_err();
        assert!(matches!(err, JobError::Busy { .. }));
        assert!(err.is_conflict());
        assert_eq!(controller.report(), before);
    }

    #[test]
    fn test_lock_stamps_start_time() {
        let (controller, _) = controller();
        let _ticket = controller.lock().unwrap();
        let report = controller.report();
        assert!(report.start_time().is_some());
        assert!(report.end_time().is_none());
        assert_eq!(controller.status(), "running");
    }

    #[test]
    fn test_cancel_before_start_restores_report() {
        let mut previous = JobReport::new();
        previous.log_start();
        previous.log_document_counts(7, 0);
        previous.log_end();
        let store = Arc::new(MemoryStore::with_value(previous.clone()));
        let controller = JobController::new("testing", store).unwrap();

        let _ticket = controller.lock().unwrap();
        controller.cancel();

        assert_eq!(controller.report(), previous);
        assert_eq!(controller.status(), "ready");
    }

    #[test]
    fn test_cancel_before_start_restores_failed_state() {
        let previous = failed_report();
        let store = Arc::new(MemoryStore::with_value(previous.clone()));
        let controller = JobController::new("training", store.clone()).unwrap();

        let _ticket = controller.lock().unwrap();
        assert_eq!(controller.state(), JobState::Running);
        controller.cancel();

        assert_eq!(controller.state(), JobState::Failed);
        assert_eq!(controller.report(), previous);
        assert_eq!(store.get().unwrap(), Some(previous));
    }

    #[test]
    fn test_start_after_cancel_is_rejected() {
        let (controller, store) = controller();
        let ticket = controller.lock().unwrap();
        controller.cancel();

        let err = controller.start_job(ticket, Box::new(CountingJob)).unwrap_err();
        assert!(matches!(err, JobError::Cancelled { .. }));
        assert!(!err.is_conflict());
        assert_eq!(controller.status(), "ready");
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_stale_ticket_does_not_start_newer_run() {
        let (controller, _) = controller();
        let stale = controller.lock().unwrap();
        controller.cancel();
        let _current = controller.lock().unwrap();

        let err = controller.start_job(stale, Box::new(CountingJob)).unwrap_err();
        assert!(matches!(err, JobError::Cancelled { .. }));
        // The newer reservation is untouched
        assert!(controller.is_locked());
    }

    #[test]
    fn test_release_only_affects_its_own_run() {
        let (controller, _) = controller();
        let stale = controller.lock().unwrap();
        controller.cancel();
        let _current = controller.lock().unwrap();

        controller.release(stale);
        assert!(controller.is_locked());
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let (controller, _) = controller();
        controller.cancel();
        assert_eq!(controller.status(), "ready");
    }

    #[test]
    fn test_completed_job_persists_report() {
        let (controller, store) = controller();
        let ticket = controller.lock().unwrap();
        let handle = controller.start_job(ticket, Box::new(CountingJob)).unwrap();

        assert_eq!(handle.wait_timeout(TIMEOUT), Some(JobOutcome::Completed));
        assert_eq!(controller.status(), "ready");

        let stored = store.get().unwrap().unwrap();
        assert!(stored.is_completed());
        assert!(stored.end_time().is_some());
        assert_eq!(stored.document_count(), Some(4));
        assert_eq!(stored.skipped_document_count(), Some(1));
        assert_eq!(stored.field("score"), Some(&serde_json::json!(0.5)));
    }

    #[test]
    fn test_failing_job_records_error() {
        let (controller, store) = controller();
        let ticket = controller.lock().unwrap();
        let handle = controller.start_job(ticket, Box::new(FailingJob)).unwrap();

        match handle.wait() {
            JobOutcome::Failed(message) => {
                assert!(message.starts_with("error while training: "))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(controller.status(), "error");
        assert!(!controller.is_locked());
        let report = controller.report();
        assert!(!report.error_message().unwrap_or_default().is_empty());
        assert!(report.end_time().is_some());
        assert_eq!(store.get().unwrap(), Some(report));
    }

    #[test]
    fn test_panicking_job_is_caught() {
        let (controller, _) = controller();
        let ticket = controller.lock().unwrap();
        let handle = controller.start_job(ticket, Box::new(PanickingJob)).unwrap();

        assert_eq!(
            handle.wait(),
            JobOutcome::Failed("error while training: engine crashed".to_string())
        );
        assert!(controller.is_failed());
        let failed = controller.report();

        // The slot can be reused after a failure
        let _ticket = controller.lock().unwrap();
        assert!(controller.is_locked());
        controller.cancel();
        assert!(controller.is_failed());
        assert_eq!(controller.report(), failed);
    }

    #[test]
    fn test_cancel_running_job_discards_report() {
        let (controller, store) = controller();
        let (release_tx, release_rx) = unbounded();
        let (committed_tx, committed_rx) = unbounded();

        let ticket = controller.lock().unwrap();
        let handle = controller
            .start_job(ticket, Box::new(GatedJob::new(release_rx, committed_tx)))
            .unwrap();

        controller.cancel();
        assert_eq!(controller.status(), "ready");
        release_tx.send(()).unwrap();

        assert_eq!(handle.wait_timeout(TIMEOUT), Some(JobOutcome::Cancelled));
        // The job's registered commit was dropped without running
        assert!(committed_rx.recv_timeout(TIMEOUT).is_err());
        assert!(store.get().unwrap().is_none());
        assert!(controller.report().field("partial").is_none());
    }

    #[test]
    fn test_commit_runs_with_final_report() {
        let (controller, store) = controller();
        let (release_tx, release_rx) = unbounded();
        let (committed_tx, committed_rx) = unbounded();

        let ticket = controller.lock().unwrap();
        let handle = controller
            .start_job(ticket, Box::new(GatedJob::new(release_rx, committed_tx)))
            .unwrap();
        release_tx.send(()).unwrap();

        assert_eq!(handle.wait_timeout(TIMEOUT), Some(JobOutcome::Completed));
        assert_eq!(committed_rx.try_recv(), Ok(()));
        assert_eq!(controller.report().field("partial"), Some(&serde_json::json!(1.0)));
        assert!(store.get().unwrap().unwrap().is_completed());
    }

    #[test]
    fn test_cancel_after_commit_registered_publishes_nothing() {
        let (controller, store) = controller();
        let (release_tx, release_rx) = unbounded();
        let (committed_tx, committed_rx) = unbounded();

        let ticket = controller.lock().unwrap();
        let handle = controller
            .start_job(ticket, Box::new(GatedJob::new(release_rx, committed_tx)))
            .unwrap();

        // Give the job time to register its commit and block
        thread::sleep(Duration::from_millis(50));
        controller.cancel();
        release_tx.send(()).unwrap();

        // No side effect and no report
        assert_eq!(handle.wait_timeout(TIMEOUT), Some(JobOutcome::Cancelled));
        assert!(committed_rx.recv_timeout(TIMEOUT).is_err());
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_failed_commit_fails_job() {
        let (controller, store) = controller();
        let (release_tx, release_rx) = unbounded();
        let (committed_tx, _committed_rx) = unbounded();
        let mut job = GatedJob::new(release_rx, committed_tx);
        job.commit_result = Err("disk full".to_string());

        let ticket = controller.lock().unwrap();
        let handle = controller.start_job(ticket, Box::new(job)).unwrap();
        release_tx.send(()).unwrap();

        let outcome = handle.wait_timeout(TIMEOUT).unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(ref m) if m.contains("disk full")));
        assert!(controller.is_failed());
        assert!(store.get().unwrap().unwrap().error_message().is_some());
    }

    #[test]
    fn test_reset_while_running_conflicts() {
        let (controller, _) = controller();
        let _ticket = controller.lock().unwrap();
        let err = controller.reset().unwrap_err();
        assert!(matches!(
            err,
            TaggerError::Job(JobError::Running { .. })
        ));
        assert!(controller.is_locked());
    }

    #[test]
    fn test_reset_clears_failure() {
        let (controller, store) = controller();
        let ticket = controller.lock().unwrap();
        controller
            .start_job(ticket, Box::new(FailingJob))
            .unwrap()
            .wait();
        assert!(controller.is_failed());

        controller.reset().unwrap();
        assert_eq!(controller.status(), "ready");
        let stored = store.get().unwrap().unwrap();
        assert!(stored.error_message().is_none());
        assert!(!stored.is_completed());
    }

    #[test]
    #[should_panic(expected = "Must lock()")]
    fn test_start_with_foreign_ticket_panics() {
        let (other, _) = controller();
        let (controller, _) = controller();
        let ticket = other.lock().unwrap();
        let _ = controller.start_job(ticket, Box::new(CountingJob));
    }

    #[test]
    fn test_snapshot_reads_state_and_report_together() {
        let (controller, _) = controller();
        let _ticket = controller.lock().unwrap();
        let (state, report) = controller.snapshot();
        assert_eq!(state, JobState::Running);
        assert!(!report.is_completed());
        assert!(report.start_time().is_some());
    }

    #[test]
    fn test_report_snapshot_omits_absent_fields() {
        let (controller, _) = controller();
        let snapshot = controller.report_snapshot();
        assert!(!snapshot.contains_key("start_time"));
        assert!(!snapshot.contains_key("error_message"));
        assert!(!snapshot.contains_key("runtime_millis"));
    }
}
