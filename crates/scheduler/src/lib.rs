//! Daily violation-check scheduling.
//!
//! - [`time`]: next-run computation in the reference timezone
//! - [`DiffTracker`]: filters out violations already reported
//! - [`CheckOrchestrator`]: one search → diff → email cycle
//! - [`Scheduler`]: timer lifecycle, persistence and startup recovery

pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod time;

#[cfg(test)]
mod testing;

pub use diff::DiffTracker;
pub use error::ScheduleError;
pub use orchestrator::{CheckOrchestrator, CheckOutcome, EmailOutcome};
pub use scheduler::{RecoveryAction, Scheduler, SchedulerStatus};
