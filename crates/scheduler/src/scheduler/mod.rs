//! Timer lifecycle for the daily check.
//!
//! The [`Scheduler`] owns at most one outstanding timer. Its state and the
//! persisted `next_check_at` move together: arming persists the due time,
//! disarming clears it, and a restarted process recovers from what was
//! persisted.

mod core;
mod state;

#[cfg(test)]
mod tests;

pub use self::core::{RecoveryAction, Scheduler};
pub use self::state::SchedulerStatus;
