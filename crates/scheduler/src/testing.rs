//! Test doubles shared by the orchestrator and scheduler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vwatch_core::{ScheduleSettings, ViolationRecord};
use vwatch_notify::{EmailMessage, EmailNotifier, EmailTransport, NotifyError};
use vwatch_store::memory::{MemoryAddressBook, MemoryCache, MemoryIndexStore, MemorySettingsBackend};
use vwatch_store::{LocalCache, LocalCacheRecord, SettingsBackend, SettingsStore};
use vwatch_wprdc::{SearchError, ViolationSearch};

use crate::diff::DiffTracker;
use crate::orchestrator::CheckOrchestrator;

#[derive(Clone, Copy)]
pub enum SearchMode {
    Succeed,
    Fail,
    Hang,
}

pub struct MockSearch {
    records: Mutex<Vec<ViolationRecord>>,
    mode: Mutex<SearchMode>,
    calls: AtomicUsize,
}

impl MockSearch {
    pub fn returning(records: Vec<ViolationRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            mode: Mutex::new(SearchMode::Succeed),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: SearchMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_records(&self, records: Vec<ViolationRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ViolationSearch for MockSearch {
    async fn search(&self, _addresses: &[String]) -> Result<Vec<ViolationRecord>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        match mode {
            SearchMode::Succeed => Ok(self.records.lock().unwrap().clone()),
            SearchMode::Fail => Err(SearchError::Api {
                status: 503,
                body: "unavailable".into(),
            }),
            SearchMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingTransport {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl EmailTransport for RecordingTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Smtp("connection refused".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// A fully wired orchestrator over in-memory stores.
pub struct Harness {
    pub search: Arc<MockSearch>,
    pub transport: Arc<RecordingTransport>,
    pub remote: Arc<MemorySettingsBackend>,
    pub cache: Arc<MemoryCache>,
    pub index: Arc<MemoryIndexStore>,
    pub addresses: Arc<MemoryAddressBook>,
    pub settings: Arc<SettingsStore>,
    pub orchestrator: Arc<CheckOrchestrator>,
}

impl Harness {
    pub fn new(addresses: &[&str], records: Vec<ViolationRecord>) -> Self {
        Self::build(addresses, records, ScheduleSettings::default(), LocalCacheRecord::default())
    }

    pub fn with_settings(
        addresses: &[&str],
        records: Vec<ViolationRecord>,
        settings: ScheduleSettings,
    ) -> Self {
        Self::build(addresses, records, settings, LocalCacheRecord::default())
    }

    pub fn build(
        addresses: &[&str],
        records: Vec<ViolationRecord>,
        settings: ScheduleSettings,
        cache: LocalCacheRecord,
    ) -> Self {
        let search = Arc::new(MockSearch::returning(records));
        let transport = Arc::new(RecordingTransport::default());
        let remote = Arc::new(MemorySettingsBackend::with_settings(settings));
        let cache = Arc::new(MemoryCache::with_record(cache));
        let index = Arc::new(MemoryIndexStore::default());
        let addresses = Arc::new(MemoryAddressBook::with_addresses(addresses.iter().copied()));

        let settings = Arc::new(SettingsStore::new(
            Some(remote.clone() as Arc<dyn SettingsBackend>),
            cache.clone() as Arc<dyn LocalCache>,
        ));
        let orchestrator = CheckOrchestrator::new(
            search.clone(),
            DiffTracker::new(index.clone()),
            Arc::new(EmailNotifier::with_transport(transport.clone())),
            settings.clone(),
            addresses.clone(),
        )
        .with_timeout(Duration::from_millis(200));

        Self {
            search,
            transport,
            remote,
            cache,
            index,
            addresses,
            settings,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn reporting_settings() -> ScheduleSettings {
    ScheduleSettings {
        email_enabled: true,
        email_address: "me@example.com".into(),
        ..Default::default()
    }
}
