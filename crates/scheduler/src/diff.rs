//! Filters search results down to violations not reported before.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use vwatch_core::ViolationRecord;
use vwatch_store::{DiffIndexStore, StoreError};

pub struct DiffTracker {
    store: Arc<dyn DiffIndexStore>,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl DiffTracker {
    pub fn new(store: Arc<dyn DiffIndexStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Return the records whose id is not yet known for their address, in
    /// input order, and record those ids.
    ///
    /// The updated index is persisted before returning, so calling this
    /// twice with the same input yields an empty second result.
    pub async fn filter_new(
        &self,
        records: Vec<ViolationRecord>,
    ) -> Result<Vec<ViolationRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut index = self.store.load().await?;

        let total = records.len();
        let fresh: Vec<ViolationRecord> = records
            .into_iter()
            .filter(|r| index.insert(&r.address, &r.id))
            .collect();

        if !fresh.is_empty() {
            self.store.replace(&index).await?;
        }

        debug!(
            total,
            new = fresh.len(),
            known_ids = index.total_ids(),
            "Filtered violations against known index"
        );
        Ok(fresh)
    }

    /// Forget every reported id.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.store.clear().await?;
        info!("Known-violation index cleared");
        Ok(())
    }
}
