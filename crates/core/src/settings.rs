//! The singleton schedule settings record and partial updates to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schedule and email-report settings.
///
/// `next_check_at` is `Some` only while a check is armed; it is cleared
/// whenever checks are disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub checks_enabled: bool,
    pub email_enabled: bool,
    pub email_address: String,
    pub next_check_at: Option<DateTime<Utc>>,
}

impl ScheduleSettings {
    /// Apply a patch, leaving fields the patch does not define untouched.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.checks_enabled {
            self.checks_enabled = v;
        }
        if let Some(v) = patch.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = &patch.email_address {
            self.email_address = v.clone();
        }
        if let Some(v) = patch.next_check_at {
            self.next_check_at = v;
        }
    }

    /// Address to send reports to, if reports are enabled and an address is set.
    pub fn report_recipient(&self) -> Option<&str> {
        let addr = self.email_address.trim();
        (self.email_enabled && !addr.is_empty()).then_some(addr)
    }
}

/// A partial settings write. `None` means "leave as is".
///
/// `next_check_at` is doubly optional so a patch can distinguish "not
/// touched" (`None`) from "clear it" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub checks_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub email_address: Option<String>,
    pub next_check_at: Option<Option<DateTime<Utc>>>,
}

impl SettingsPatch {
    /// Patch that arms the schedule for `at`.
    pub fn armed(at: DateTime<Utc>) -> Self {
        Self {
            checks_enabled: Some(true),
            next_check_at: Some(Some(at)),
            ..Default::default()
        }
    }

    /// Patch that disables the schedule and clears the pending check.
    pub fn disarmed() -> Self {
        Self {
            checks_enabled: Some(false),
            next_check_at: Some(None),
            ..Default::default()
        }
    }

    /// Patch that overwrites every field, used by reset.
    pub fn full(settings: &ScheduleSettings) -> Self {
        Self {
            checks_enabled: Some(settings.checks_enabled),
            email_enabled: Some(settings.email_enabled),
            email_address: Some(settings.email_address.clone()),
            next_check_at: Some(settings.next_check_at),
        }
    }
}
