//! Settings persistence: a remote source of truth plus a local cache.
//!
//! [`SettingsStore`] never fails its callers. Remote errors are logged and
//! reported as `None`/`false`; the local cache keeps the schedule usable
//! for the lifetime of the process when the remote store is unreachable.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vwatch_core::{ScheduleSettings, SettingsPatch};

use crate::error::StoreError;
use crate::local_cache::LocalCache;

/// Durable store for the singleton settings record.
#[async_trait::async_trait]
pub trait SettingsBackend: Send + Sync {
    /// Fetch the record. `Ok(None)` when it has never been written.
    async fn fetch(&self) -> Result<Option<ScheduleSettings>, StoreError>;

    /// Insert or update the record, touching only the fields the patch defines.
    async fn upsert(&self, patch: &SettingsPatch) -> Result<(), StoreError>;
}

pub struct SettingsStore {
    remote: Option<Arc<dyn SettingsBackend>>,
    cache: Arc<dyn LocalCache>,
}

impl SettingsStore {
    pub fn new(remote: Option<Arc<dyn SettingsBackend>>, cache: Arc<dyn LocalCache>) -> Self {
        Self { remote, cache }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Fetch settings from the remote store. Does not touch the local cache.
    pub async fn load(&self) -> Option<ScheduleSettings> {
        let remote = match &self.remote {
            Some(r) => r,
            None => {
                debug!("No remote settings store configured");
                return None;
            }
        };
        match remote.fetch().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load settings from remote store");
                None
            }
        }
    }

    /// Persist a partial update. The local cache is always updated; the
    /// return value reports whether the remote write succeeded.
    pub async fn save(&self, patch: &SettingsPatch) -> bool {
        self.save_local_cache(patch);

        let remote = match &self.remote {
            Some(r) => r,
            None => return false,
        };
        match remote.upsert(patch).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save settings to remote store");
                false
            }
        }
    }

    pub fn load_local_cache(&self) -> ScheduleSettings {
        self.cache.load().to_settings()
    }

    pub fn save_local_cache(&self, patch: &SettingsPatch) {
        let mut record = self.cache.load();
        record.apply(patch);
        if let Err(e) = self.cache.store(&record) {
            warn!(error = %e, "Failed to write local settings cache");
        }
    }

    /// Remote settings if available, otherwise the cached copy.
    pub async fn effective(&self) -> ScheduleSettings {
        match self.load().await {
            Some(settings) => settings,
            None => self.load_local_cache(),
        }
    }

    /// Load remote settings and mirror them into the local cache.
    /// Falls back to the cache when the remote store cannot answer.
    pub async fn refresh(&self) -> ScheduleSettings {
        match self.load().await {
            Some(settings) => {
                self.save_local_cache(&SettingsPatch::full(&settings));
                settings
            }
            None => self.load_local_cache(),
        }
    }

    /// Id of the timer armed by the last process that scheduled a check.
    pub fn timer_id(&self) -> Option<String> {
        self.cache.load().timer_id
    }

    pub fn set_timer_id(&self, timer_id: Option<String>) {
        let mut record = self.cache.load();
        record.timer_id = timer_id;
        if let Err(e) = self.cache.store(&record) {
            warn!(error = %e, "Failed to record timer handle in local cache");
        }
    }

    /// Return every field to its default, remotely and locally.
    pub async fn reset(&self) -> bool {
        let defaults = ScheduleSettings::default();
        let ok = self.save(&SettingsPatch::full(&defaults)).await;
        self.set_timer_id(None);
        info!(remote = ok, "Settings reset to defaults");
        ok
    }
}
