//! The known-violation index: per-address sets of violation ids that have
//! already been reported.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::json_file;

/// Address (exact string) → ids already surfaced for that address.
///
/// Ids are only ever added; [`DiffIndexStore::clear`] is the one way to
/// forget them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownViolationIndex(BTreeMap<String, BTreeSet<String>>);

impl KnownViolationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &str, id: &str) -> bool {
        self.0.get(address).is_some_and(|ids| ids.contains(id))
    }

    /// Record an id. Returns `true` if it was not known before.
    pub fn insert(&mut self, address: &str, id: &str) -> bool {
        self.0
            .entry(address.to_string())
            .or_default()
            .insert(id.to_string())
    }

    pub fn ids_for(&self, address: &str) -> Option<&BTreeSet<String>> {
        self.0.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn address_count(&self) -> usize {
        self.0.len()
    }

    pub fn total_ids(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A, I, Ids> FromIterator<(A, Ids)> for KnownViolationIndex
where
    A: Into<String>,
    I: Into<String>,
    Ids: IntoIterator<Item = I>,
{
    fn from_iter<T: IntoIterator<Item = (A, Ids)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(a, ids)| (a.into(), ids.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

/// Durable storage for the [`KnownViolationIndex`].
///
/// The index is always read and written whole; `replace` must be atomic.
#[async_trait::async_trait]
pub trait DiffIndexStore: Send + Sync {
    async fn load(&self) -> Result<KnownViolationIndex, StoreError>;
    async fn replace(&self, index: &KnownViolationIndex) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// [`DiffIndexStore`] backed by a JSON file.
pub struct JsonFileIndexStore {
    path: PathBuf,
}

impl JsonFileIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl DiffIndexStore for JsonFileIndexStore {
    async fn load(&self) -> Result<KnownViolationIndex, StoreError> {
        Ok(json_file::load_async(&self.path).await?.unwrap_or_default())
    }

    async fn replace(&self, index: &KnownViolationIndex) -> Result<(), StoreError> {
        json_file::save_async(&self.path, index).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.replace(&KnownViolationIndex::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_novelty() {
        let mut index = KnownViolationIndex::new();
        assert!(index.insert("1 MAIN ST", "V1"));
        assert!(!index.insert("1 MAIN ST", "V1"));
        assert!(index.insert("2 MAIN ST", "V1"));
        assert!(index.contains("1 MAIN ST", "V1"));
        assert!(!index.contains("1 Main St", "V1"));
        assert_eq!(index.address_count(), 2);
        assert_eq!(index.total_ids(), 2);
    }

    #[test]
    fn serializes_as_plain_map() {
        let index: KnownViolationIndex = [("1 Main St", vec!["V2", "V1"])].into_iter().collect();
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"1 Main St":["V1","V2"]}"#);
    }

    #[tokio::test]
    async fn file_store_replace_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileIndexStore::new(dir.path().join("known_violations.json"));
        assert!(store.load().await.unwrap().is_empty());

        let index: KnownViolationIndex = [("1 Main St", vec!["V1"])].into_iter().collect();
        store.replace(&index).await.unwrap();
        assert_eq!(store.load().await.unwrap(), index);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }
}
