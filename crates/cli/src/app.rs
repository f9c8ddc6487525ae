//! Wires configuration into stores, the search client, the notifier and
//! the scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use vwatch_core::Config;
use vwatch_notify::EmailNotifier;
use vwatch_scheduler::{CheckOrchestrator, DiffTracker, Scheduler};
use vwatch_store::{
    AddressBook, DiffIndexStore, JsonFileAddressBook, JsonFileCache, JsonFileIndexStore,
    LocalCache, PgStore, SettingsBackend, SettingsStore,
};
use vwatch_wprdc::WprdcClient;

pub struct App {
    pub config: Config,
    pub settings: Arc<SettingsStore>,
    pub addresses: Arc<dyn AddressBook>,
    pub search: Arc<WprdcClient>,
    pub notifier: Arc<EmailNotifier>,
    pub orchestrator: Arc<CheckOrchestrator>,
    pub scheduler: Arc<Scheduler>,
}

/// Where settings, the index and saved addresses live.
struct Backends {
    remote: Option<Arc<dyn SettingsBackend>>,
    index: Arc<dyn DiffIndexStore>,
    addresses: Arc<dyn AddressBook>,
}

impl Backends {
    fn postgres(pg: PgStore) -> Self {
        let pg = Arc::new(pg);
        Self {
            remote: Some(pg.clone()),
            index: pg.clone(),
            addresses: pg,
        }
    }

    fn local(config: &Config) -> Self {
        Self {
            remote: None,
            index: Arc::new(JsonFileIndexStore::new(config.storage.known_violations_path())),
            addresses: Arc::new(JsonFileAddressBook::new(config.storage.addresses_path())),
        }
    }
}

impl App {
    pub async fn build(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
            format!(
                "failed to create data directory {}",
                config.storage.data_dir.display()
            )
        })?;

        let backends = match PgStore::connect(&config.database).await {
            Some(pg) => Backends::postgres(pg),
            None => {
                info!(
                    data_dir = %config.storage.data_dir.display(),
                    "Using local JSON storage"
                );
                Backends::local(&config)
            }
        };

        let cache: Arc<dyn LocalCache> =
            Arc::new(JsonFileCache::new(config.storage.local_cache_path()));
        let settings = Arc::new(SettingsStore::new(backends.remote, cache));

        let search = Arc::new(
            WprdcClient::new(&config.wprdc).context("invalid WPRDC configuration")?,
        );

        let notifier = Arc::new(EmailNotifier::from_config(config.email.clone()));
        notifier.initialize();

        let orchestrator = Arc::new(
            CheckOrchestrator::new(
                search.clone(),
                DiffTracker::new(backends.index),
                notifier.clone(),
                settings.clone(),
                backends.addresses.clone(),
            )
            .with_timeout(Duration::from_secs(config.schedule.check_timeout_secs)),
        );

        let scheduler = Scheduler::new(orchestrator.clone(), settings.clone(), &config.schedule)
            .context("invalid schedule configuration")?;

        Ok(Self {
            config,
            settings,
            addresses: backends.addresses,
            search,
            notifier,
            orchestrator,
            scheduler,
        })
    }
}
