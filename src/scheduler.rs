pub mod cadence;
pub mod daemon;
pub mod gate;
pub mod jobs;
pub mod ledger;

pub use gate::{GateDecision, SchedulerGate};
pub use jobs::{AllJobsOutcome, JobOrchestrator, JobOutcome};
pub use ledger::{Attempt, RetryLedger, RetryPolicy, RetryStatus};
