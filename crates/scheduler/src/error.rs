use thiserror::Error;

use vwatch_core::CoreError;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("target hour must be 0-23, got {0}")]
    InvalidHour(u32),

    #[error("invalid cron expression {expr}: {reason}")]
    Cron { expr: String, reason: String },

    #[error("schedule has no upcoming run")]
    NoUpcomingRun,

    #[error(transparent)]
    Core(#[from] CoreError),
}
