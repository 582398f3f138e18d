pub mod cancel;
pub mod controller;
pub mod cross_validation;
pub mod job;
pub mod report;
pub mod training;

pub use cancel::CancellationToken;
pub use controller::{JobController, JobHandle, JobOutcome, JobState, RunTicket};
pub use cross_validation::{fold_bounds, safe_division, CrossValidationJob, PrecisionRecall};
pub use job::{AsyncJob, Commit, JobContext};
pub use report::JobReport;
pub use training::TrainingJob;
