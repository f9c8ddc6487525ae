//! [`Scheduler`]: arms, fires, cancels and recovers the daily check.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vwatch_core::config::ScheduleConfig;
use vwatch_core::{ScheduleSettings, SettingsPatch};
use vwatch_store::SettingsStore;

use crate::error::ScheduleError;
use crate::orchestrator::{CheckOrchestrator, CheckOutcome};
use crate::time::{daily_cron, delay_until, next_run_time_from_now, to_local};

use super::state::{SchedulerState, SchedulerStatus};

type Cycle = Pin<Box<dyn Future<Output = ()> + Send>>;

/// What [`Scheduler::recover_on_startup`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Checks are disabled; nothing armed.
    Disabled,
    /// The persisted check was already due; it ran before re-arming.
    FiredImmediately {
        outcome: CheckOutcome,
        next: DateTime<Utc>,
    },
    /// The persisted future check was re-armed as is.
    Rearmed { due: DateTime<Utc> },
    /// No usable persisted time; a fresh run was scheduled.
    Scheduled { due: DateTime<Utc> },
}

/// How a firing timer relates to the persisted schedule, which another
/// `vwatch` process may have changed since the timer was armed.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Persisted {
    /// Still enabled for this timer's slot.
    Current,
    Disabled,
    /// Enabled, but for a different future time.
    Moved(DateTime<Utc>),
}

impl Persisted {
    fn against(settings: &ScheduleSettings, due: DateTime<Utc>) -> Self {
        if !settings.checks_enabled {
            return Persisted::Disabled;
        }
        match settings.next_check_at {
            Some(at) if !same_slot(at, due) && at > Utc::now() => Persisted::Moved(at),
            _ => Persisted::Current,
        }
    }
}

/// Postgres keeps microseconds; compare at that precision.
fn same_slot(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp_micros() == b.timestamp_micros()
}

pub struct Scheduler {
    orchestrator: Arc<CheckOrchestrator>,
    settings: Arc<SettingsStore>,
    target_hour: u32,
    tz: Tz,
    state: Mutex<SchedulerState>,
    /// Serializes lifecycle transitions (enable, disable, re-arm, recovery).
    /// Never held while a fired cycle runs.
    ops: tokio::sync::Mutex<()>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<CheckOrchestrator>,
        settings: Arc<SettingsStore>,
        config: &ScheduleConfig,
    ) -> Result<Arc<Self>, ScheduleError> {
        let tz = config.timezone()?;
        daily_cron(config.target_hour)?;
        Ok(Arc::new(Self {
            orchestrator,
            settings,
            target_hour: config.target_hour,
            tz,
            state: Mutex::new(SchedulerState::Idle),
            ops: tokio::sync::Mutex::new(()),
        }))
    }

    pub fn orchestrator(&self) -> &Arc<CheckOrchestrator> {
        &self.orchestrator
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn status(&self) -> SchedulerStatus {
        self.lock_state().status()
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedule the next daily check, replacing any armed timer.
    pub async fn enable(self: &Arc<Self>) -> Result<DateTime<Utc>, ScheduleError> {
        let _op = self.ops.lock().await;
        self.enable_locked().await
    }

    /// Cancel the armed timer and clear the persisted schedule. A cycle
    /// already in flight finishes but does not re-arm.
    pub async fn disable(&self) {
        let _op = self.ops.lock().await;
        self.lock_state().take_and_cancel();
        let persisted = self.settings.save(&SettingsPatch::disarmed()).await;
        self.settings.set_timer_id(None);
        info!(persisted, "Daily violation check disabled");
    }

    /// Drop the in-process timer without touching the persisted schedule,
    /// so the next process start recovers it.
    pub async fn shutdown(&self) {
        let _op = self.ops.lock().await;
        self.lock_state().take_and_cancel();
        self.settings.set_timer_id(None);
        debug!("Scheduler stopped");
    }

    /// Cancel the timer, return settings to defaults and forget every
    /// reported violation. Returns whether the remote settings write succeeded.
    pub async fn reset(&self) -> bool {
        let _op = self.ops.lock().await;
        self.lock_state().take_and_cancel();
        let remote = self.settings.reset().await;
        if let Err(e) = self.orchestrator.diff().reset().await {
            warn!(error = %e, "Failed to clear known-violation index");
        }
        remote
    }

    /// Restore the schedule persisted by a previous process.
    ///
    /// A timer handle left in the local cache belongs to a process that is
    /// gone and is discarded. With checks enabled: a due time in the past
    /// runs the check now and then re-arms; a future one is re-armed as is;
    /// none schedules a fresh run.
    pub async fn recover_on_startup(self: &Arc<Self>) -> Result<RecoveryAction, ScheduleError> {
        let _op = self.ops.lock().await;
        let settings = self.settings.refresh().await;

        if let Some(orphan) = self.settings.timer_id() {
            info!(timer = %orphan, "Discarding timer handle left by a previous process");
            self.settings.set_timer_id(None);
        }

        if !settings.checks_enabled {
            self.lock_state().take_and_cancel();
            info!("Daily violation checks are disabled");
            return Ok(RecoveryAction::Disabled);
        }

        match settings.next_check_at {
            Some(due) if due <= Utc::now() => {
                info!(missed = %due, "Scheduled check was missed; running it now");
                let id = Uuid::new_v4();
                {
                    let mut state = self.lock_state();
                    state.take_and_cancel();
                    *state = SchedulerState::Running { id };
                }
                let outcome = self.orchestrator.run_saved().await;
                let next = self.enable_or_idle().await?;
                Ok(RecoveryAction::FiredImmediately { outcome, next })
            }
            Some(due) => {
                self.arm(due).await;
                info!(due = %due, local = %to_local(due), "Restored pending violation check");
                Ok(RecoveryAction::Rearmed { due })
            }
            None => {
                let due = self.enable_or_idle().await?;
                Ok(RecoveryAction::Scheduled { due })
            }
        }
    }

    /// Bring the in-process timer in line with the persisted schedule.
    ///
    /// One-shot commands (`vwatch enable`, `vwatch disable`) only write
    /// settings; the long-running process calls this periodically to pick
    /// them up. A cycle in flight is left alone, it re-checks on its own.
    pub async fn sync_with_persisted(self: &Arc<Self>) -> SchedulerStatus {
        let _op = self.ops.lock().await;
        let persisted = self.settings.refresh().await;

        match (self.status(), persisted.checks_enabled, persisted.next_check_at) {
            (SchedulerStatus::Running, _, _) => {}
            (SchedulerStatus::Armed { .. }, false, _) => {
                self.lock_state().take_and_cancel();
                self.settings.set_timer_id(None);
                info!("Checks were disabled by another process; timer dropped");
            }
            (SchedulerStatus::Armed { due }, true, Some(at)) if same_slot(due, at) => {}
            (_, true, Some(at)) if at > Utc::now() => {
                self.arm(at).await;
                info!(due = %at, local = %to_local(at), "Adopted check scheduled by another process");
            }
            _ => {}
        }
        self.status()
    }

    async fn enable_locked(self: &Arc<Self>) -> Result<DateTime<Utc>, ScheduleError> {
        let due = next_run_time_from_now(self.target_hour, self.tz)?;
        self.arm(due).await;
        info!(
            due = %due,
            reference = %due.with_timezone(&self.tz),
            local = %to_local(due),
            "Daily violation check scheduled"
        );
        Ok(due)
    }

    async fn enable_or_idle(self: &Arc<Self>) -> Result<DateTime<Utc>, ScheduleError> {
        let result = self.enable_locked().await;
        if result.is_err() {
            *self.lock_state() = SchedulerState::Idle;
        }
        result
    }

    /// Persist `due`, then replace whatever timer is armed with one for `due`.
    async fn arm(self: &Arc<Self>, due: DateTime<Utc>) {
        self.lock_state().take_and_cancel();
        let persisted = self.settings.save(&SettingsPatch::armed(due)).await;

        let id = Uuid::new_v4();
        let (cancel, cancelled) = oneshot::channel();
        *self.lock_state() = SchedulerState::Armed { id, due, cancel };

        let delay = delay_until(due, Utc::now());
        let fired = Arc::clone(self).fire(id, due);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => fired.await,
                _ = cancelled => debug!(timer = %id, "Timer cancelled"),
            }
        });

        self.settings.set_timer_id(Some(id.to_string()));
        debug!(timer = %id, delay_ms = delay.as_millis() as u64, persisted, "Timer armed");
    }

    /// Timer callback. Runs one cycle and re-arms for the next day, unless
    /// the schedule was changed while the timer was pending or the cycle
    /// was in flight, by this process or another one.
    fn fire(self: Arc<Self>, id: Uuid, due: DateTime<Utc>) -> Cycle {
        Box::pin(async move {
            let claimed = {
                let mut state = self.lock_state();
                let armed_here =
                    matches!(&*state, SchedulerState::Armed { id: armed, .. } if *armed == id);
                if armed_here {
                    *state = SchedulerState::Running { id };
                }
                armed_here
            };
            if !claimed {
                debug!(timer = %id, "Ignoring stale timer");
                return;
            }

            let before = Persisted::against(&self.settings.refresh().await, due);
            if before == Persisted::Current {
                info!(timer = %id, "Daily violation check firing");
                let outcome = self.orchestrator.run_saved().await;
                debug!(timer = %id, outcome = ?outcome, "Daily violation check finished");
            }

            let _op = self.ops.lock().await;
            let still_ours = {
                let state = self.lock_state();
                matches!(&*state, SchedulerState::Running { id: running } if *running == id)
            };
            if !still_ours {
                info!(timer = %id, "Schedule changed during check; not re-arming");
                return;
            }

            let after = match before {
                Persisted::Current => Persisted::against(&self.settings.refresh().await, due),
                changed => changed,
            };
            match after {
                Persisted::Current => {
                    if let Err(e) = self.enable_or_idle().await {
                        warn!(error = %e, "Could not schedule the next violation check");
                    }
                }
                Persisted::Disabled => {
                    *self.lock_state() = SchedulerState::Idle;
                    self.settings.set_timer_id(None);
                    info!(timer = %id, "Checks were disabled elsewhere; not re-arming");
                }
                Persisted::Moved(at) => {
                    self.arm(at).await;
                    info!(timer = %id, due = %at, "Check was rescheduled elsewhere; following it");
                }
            }
        })
    }
}
