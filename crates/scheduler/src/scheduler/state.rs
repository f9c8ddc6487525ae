use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Internal timer state. `Running` lasts while a fired cycle is in flight.
pub(crate) enum SchedulerState {
    Idle,
    Armed {
        id: Uuid,
        due: DateTime<Utc>,
        cancel: oneshot::Sender<()>,
    },
    Running {
        id: Uuid,
    },
}

impl SchedulerState {
    pub(crate) fn status(&self) -> SchedulerStatus {
        match self {
            SchedulerState::Idle => SchedulerStatus::Idle,
            SchedulerState::Armed { due, .. } => SchedulerStatus::Armed { due: *due },
            SchedulerState::Running { .. } => SchedulerStatus::Running,
        }
    }

    /// Cancel an armed timer, leaving `Idle`. A running cycle is not
    /// interrupted; it just loses its claim to re-arm.
    pub(crate) fn take_and_cancel(&mut self) {
        if let SchedulerState::Armed { cancel, .. } = std::mem::replace(self, SchedulerState::Idle) {
            // The timer task may already have fired; nothing to do then.
            let _ = cancel.send(());
        }
    }
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Idle,
    Armed { due: DateTime<Utc> },
    Running,
}
