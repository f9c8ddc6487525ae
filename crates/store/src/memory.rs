//! In-process stores. Nothing survives a restart; used by tests and by
//! callers that want a throwaway run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use vwatch_core::{normalize_address, ScheduleSettings, SettingsPatch};

use crate::addresses::AddressBook;
use crate::error::StoreError;
use crate::index::{DiffIndexStore, KnownViolationIndex};
use crate::local_cache::{LocalCache, LocalCacheRecord};
use crate::settings::SettingsBackend;

fn unavailable() -> StoreError {
    StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "store unavailable",
    ))
}

#[derive(Default)]
pub struct MemoryCache {
    record: Mutex<LocalCacheRecord>,
}

impl MemoryCache {
    pub fn with_record(record: LocalCacheRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> LocalCacheRecord {
        self.record.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn store(&self, record: &LocalCacheRecord) -> Result<(), StoreError> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = record.clone();
        Ok(())
    }
}

/// Settings backend that can be switched into a failing state.
#[derive(Default)]
pub struct MemorySettingsBackend {
    record: Mutex<Option<ScheduleSettings>>,
    failing: AtomicBool,
}

impl MemorySettingsBackend {
    pub fn with_settings(settings: ScheduleSettings) -> Self {
        Self {
            record: Mutex::new(Some(settings)),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<ScheduleSettings> {
        self.record.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl SettingsBackend for MemorySettingsBackend {
    async fn fetch(&self) -> Result<Option<ScheduleSettings>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.snapshot())
    }

    async fn upsert(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.get_or_insert_with(ScheduleSettings::default).apply(patch);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryIndexStore {
    index: Mutex<KnownViolationIndex>,
    writes: AtomicUsize,
}

impl MemoryIndexStore {
    pub fn with_index(index: KnownViolationIndex) -> Self {
        Self {
            index: Mutex::new(index),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> KnownViolationIndex {
        self.index.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `replace` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DiffIndexStore for MemoryIndexStore {
    async fn load(&self) -> Result<KnownViolationIndex, StoreError> {
        Ok(self.snapshot())
    }

    async fn replace(&self, index: &KnownViolationIndex) -> Result<(), StoreError> {
        *self.index.lock().unwrap_or_else(|e| e.into_inner()) = index.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.replace(&KnownViolationIndex::new()).await
    }
}

#[derive(Default)]
pub struct MemoryAddressBook {
    addresses: Mutex<Vec<String>>,
}

impl MemoryAddressBook {
    pub fn with_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: Mutex::new(addresses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait::async_trait]
impl AddressBook for MemoryAddressBook {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.addresses.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn add(&self, address: &str) -> Result<bool, StoreError> {
        let normalized = normalize_address(address);
        let mut all = self.addresses.lock().unwrap_or_else(|e| e.into_inner());
        if normalized.is_empty() || all.contains(&normalized) {
            return Ok(false);
        }
        all.push(normalized);
        Ok(true)
    }

    async fn remove(&self, address: &str) -> Result<bool, StoreError> {
        let normalized = normalize_address(address);
        let mut all = self.addresses.lock().unwrap_or_else(|e| e.into_inner());
        let before = all.len();
        all.retain(|a| *a != normalized);
        Ok(all.len() != before)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.addresses.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}
