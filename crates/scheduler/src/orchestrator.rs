//! One check cycle: search the saved addresses, keep only violations not
//! reported before, and email a report when reports are enabled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use vwatch_core::ViolationRecord;
use vwatch_notify::EmailNotifier;
use vwatch_store::{AddressBook, SettingsStore};
use vwatch_wprdc::ViolationSearch;

use crate::diff::DiffTracker;

/// Upper bound on one multi-address search.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailOutcome {
    /// Reports disabled or no address set.
    NotRequested,
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Nothing to check.
    Skipped,
    /// Search timed out or failed, or the index could not be updated.
    Abandoned { reason: String },
    Completed {
        checked: usize,
        new_violations: Vec<ViolationRecord>,
        email: EmailOutcome,
    },
}

impl CheckOutcome {
    pub fn new_violations(&self) -> &[ViolationRecord] {
        match self {
            CheckOutcome::Completed { new_violations, .. } => new_violations,
            _ => &[],
        }
    }
}

pub struct CheckOrchestrator {
    search: Arc<dyn ViolationSearch>,
    diff: DiffTracker,
    notifier: Arc<EmailNotifier>,
    settings: Arc<SettingsStore>,
    addresses: Arc<dyn AddressBook>,
    timeout: Duration,
}

impl CheckOrchestrator {
    pub fn new(
        search: Arc<dyn ViolationSearch>,
        diff: DiffTracker,
        notifier: Arc<EmailNotifier>,
        settings: Arc<SettingsStore>,
        addresses: Arc<dyn AddressBook>,
    ) -> Self {
        Self {
            search,
            diff,
            notifier,
            settings,
            addresses,
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn diff(&self) -> &DiffTracker {
        &self.diff
    }

    /// Run a check against the saved address list.
    pub async fn run_saved(&self) -> CheckOutcome {
        match self.addresses.list().await {
            Ok(addresses) => self.run_check(&addresses).await,
            Err(e) => {
                warn!(error = %e, "Could not read saved addresses; check abandoned");
                CheckOutcome::Abandoned {
                    reason: format!("address list unavailable: {e}"),
                }
            }
        }
    }

    /// Search `addresses`, filter to new violations and report them.
    ///
    /// Never fails; every problem is logged and reflected in the outcome.
    pub async fn run_check(&self, addresses: &[String]) -> CheckOutcome {
        if addresses.is_empty() {
            info!("No saved addresses; skipping violation check");
            return CheckOutcome::Skipped;
        }

        info!(addresses = addresses.len(), "Starting violation check");

        let records = match tokio::time::timeout(self.timeout, self.search.search(addresses)).await
        {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(error = %e, "Violation search failed; check abandoned");
                return CheckOutcome::Abandoned {
                    reason: e.to_string(),
                };
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Violation search timed out; check abandoned"
                );
                return CheckOutcome::Abandoned {
                    reason: format!("search timed out after {}s", self.timeout.as_secs()),
                };
            }
        };

        let found = records.len();
        let new_violations = match self.diff.filter_new(records).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Could not update known-violation index; check abandoned");
                return CheckOutcome::Abandoned {
                    reason: format!("known-violation index unavailable: {e}"),
                };
            }
        };

        let settings = self.settings.effective().await;
        let email = match settings.report_recipient() {
            Some(to) => {
                if self.notifier.send_report(to, &new_violations).await {
                    EmailOutcome::Sent
                } else {
                    EmailOutcome::Failed
                }
            }
            None => EmailOutcome::NotRequested,
        };

        info!(
            addresses = addresses.len(),
            found,
            new = new_violations.len(),
            email = ?email,
            "Violation check complete"
        );

        CheckOutcome::Completed {
            checked: addresses.len(),
            new_violations,
            email,
        }
    }
}
