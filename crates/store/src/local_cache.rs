//! Fast local key-value cache mirroring the settings record.
//!
//! Used to bootstrap before the remote store answers and as the offline
//! fallback. Also holds the id of the timer armed by the running process,
//! so the next process can tell a stale handle from a live one.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use vwatch_core::{ScheduleSettings, SettingsPatch};

use crate::error::StoreError;
use crate::json_file;

/// On-disk shape of the local cache. Every key is optional: a missing key
/// means "never written".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCacheRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// RFC 3339 timestamp, kept as text so a corrupt value is detectable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_check_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_id: Option<String>,
}

impl LocalCacheRecord {
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.checks_enabled {
            self.checks_enabled = Some(v);
        }
        if let Some(v) = patch.email_enabled {
            self.email_enabled = Some(v);
        }
        if let Some(v) = &patch.email_address {
            self.email_address = Some(v.clone());
        }
        if let Some(v) = patch.next_check_at {
            self.next_check_at = v.map(|t| t.to_rfc3339());
        }
    }

    /// Parsed `next_check_at`. A malformed value is logged and treated as absent.
    pub fn next_check_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.next_check_at.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                warn!(value = %raw, error = %e, "Malformed nextCheckAt in local cache, ignoring");
                None
            }
        }
    }

    /// Settings view with defaults filled in for unwritten keys.
    pub fn to_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            checks_enabled: self.checks_enabled.unwrap_or(false),
            email_enabled: self.email_enabled.unwrap_or(false),
            email_address: self.email_address.clone().unwrap_or_default(),
            next_check_at: self.next_check_at(),
        }
    }
}

/// A synchronous key-value cache for [`LocalCacheRecord`].
pub trait LocalCache: Send + Sync {
    /// Read the cache. Unreadable caches read as empty.
    fn load(&self) -> LocalCacheRecord;

    /// Replace the cache contents.
    fn store(&self, record: &LocalCacheRecord) -> Result<(), StoreError>;
}

/// [`LocalCache`] backed by a JSON file in the data directory.
pub struct JsonFileCache {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl LocalCache for JsonFileCache {
    fn load(&self) -> LocalCacheRecord {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match json_file::load::<LocalCacheRecord>(&self.path) {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Local cache unreadable, starting empty");
                LocalCacheRecord::default()
            }
        }
    }

    fn store(&self, record: &LocalCacheRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        json_file::save(&self.path, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn keys_are_camel_case() {
        let record = LocalCacheRecord {
            checks_enabled: Some(true),
            next_check_at: Some("2026-01-01T14:00:00+00:00".into()),
            timer_id: Some("t-1".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["checksEnabled"], true);
        assert_eq!(json["nextCheckAt"], "2026-01-01T14:00:00+00:00");
        assert_eq!(json["timerId"], "t-1");
        assert!(json.get("emailAddress").is_none());
    }

    #[test]
    fn malformed_timestamp_reads_as_absent() {
        let record = LocalCacheRecord {
            checks_enabled: Some(true),
            next_check_at: Some("tomorrow-ish".into()),
            ..Default::default()
        };
        let settings = record.to_settings();
        assert!(settings.checks_enabled);
        assert!(settings.next_check_at.is_none());
    }

    #[test]
    fn apply_clears_next_check() {
        let at = Utc.with_ymd_and_hms(2026, 7, 4, 13, 0, 0).unwrap();
        let mut record = LocalCacheRecord::default();
        record.apply(&SettingsPatch::armed(at));
        assert_eq!(record.next_check_at(), Some(at));
        record.apply(&SettingsPatch::disarmed());
        assert_eq!(record.next_check_at, None);
        assert_eq!(record.checks_enabled, Some(false));
    }

    #[test]
    fn file_cache_roundtrip_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_cache.json");
        let cache = JsonFileCache::new(&path);
        assert_eq!(cache.load(), LocalCacheRecord::default());

        let record = LocalCacheRecord {
            email_enabled: Some(true),
            email_address: Some("me@example.com".into()),
            ..Default::default()
        };
        cache.store(&record).unwrap();
        assert_eq!(cache.load(), record);

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(cache.load(), LocalCacheRecord::default());
    }
}
