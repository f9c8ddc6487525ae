//! Next-run computation for the daily check.
//!
//! The check runs when the reference-zone clock reads `target_hour:00:00`.
//! The daily occurrence is expressed as a cron schedule evaluated in the
//! reference zone, so seasonal offset changes come from the tz database.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::ScheduleError;

/// Six-field cron expression firing once a day at `target_hour:00:00`.
pub(crate) fn daily_cron(target_hour: u32) -> Result<String, ScheduleError> {
    if target_hour > 23 {
        return Err(ScheduleError::InvalidHour(target_hour));
    }
    Ok(format!("0 0 {target_hour} * * *"))
}

/// Next instant after `now` at which the `tz` clock reads `target_hour:00:00`.
///
/// If today's occurrence has passed, this is tomorrow's (one calendar day
/// later in `tz`, so 23 or 25 hours across an offset change).
pub fn next_run_time(
    target_hour: u32,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let expr = daily_cron(target_hour)?;
    let schedule = Schedule::from_str(&expr).map_err(|e| ScheduleError::Cron {
        expr: expr.clone(),
        reason: e.to_string(),
    })?;

    schedule
        .after(&now.with_timezone(&tz))
        .next()
        .map(|at| at.with_timezone(&Utc))
        .ok_or(ScheduleError::NoUpcomingRun)
}

/// [`next_run_time`] from the current instant.
pub fn next_run_time_from_now(target_hour: u32, tz: Tz) -> Result<DateTime<Utc>, ScheduleError> {
    next_run_time(target_hour, tz, Utc::now())
}

/// Signed milliseconds from `now` to `target`. Negative when `target` is past.
pub fn milliseconds_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (target - now).num_milliseconds()
}

/// Sleep duration until `target`, clamped at zero.
pub fn delay_until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    Duration::from_millis(milliseconds_until(target, now).max(0) as u64)
}

/// `at` in the machine's local zone, for display.
pub fn to_local(at: DateTime<Utc>) -> DateTime<Local> {
    at.with_timezone(&Local)
}
