//! Saved addresses the daily check runs against.

use std::path::PathBuf;

use tokio::sync::Mutex;

use vwatch_core::normalize_address;

use crate::error::StoreError;
use crate::json_file;

/// The user's saved address list. Addresses are stored normalized.
#[async_trait::async_trait]
pub trait AddressBook: Send + Sync {
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Add an address. Returns `false` if it was already saved or normalizes
    /// to nothing.
    async fn add(&self, address: &str) -> Result<bool, StoreError>;

    /// Remove an address. Returns `false` if it was not saved.
    async fn remove(&self, address: &str) -> Result<bool, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// Split bulk-import text into addresses: one per line, blank lines and
/// `#` comments skipped.
pub fn parse_address_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

/// [`AddressBook`] backed by a JSON array on disk, in insertion order.
pub struct JsonFileAddressBook {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileAddressBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Vec<String>, StoreError> {
        Ok(json_file::load_async(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AddressBook for JsonFileAddressBook {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn add(&self, address: &str) -> Result<bool, StoreError> {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return Ok(false);
        }
        let _guard = self.lock.lock().await;
        let mut all = self.read().await?;
        if all.contains(&normalized) {
            return Ok(false);
        }
        all.push(normalized);
        json_file::save_async(&self.path, &all).await?;
        Ok(true)
    }

    async fn remove(&self, address: &str) -> Result<bool, StoreError> {
        let normalized = normalize_address(address);
        let _guard = self.lock.lock().await;
        let mut all = self.read().await?;
        let before = all.len();
        all.retain(|a| *a != normalized);
        if all.len() == before {
            return Ok(false);
        }
        json_file::save_async(&self.path, &all).await?;
        Ok(true)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        json_file::save_async(&self.path, &Vec::<String>::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_blanks_and_comments() {
        let text = "# my list\n123 Main Street\n\n   \n  5 Forbes Ave  \n#old\n";
        assert_eq!(
            parse_address_list(text),
            vec!["123 Main Street".to_string(), "5 Forbes Ave".to_string()]
        );
    }

    #[tokio::test]
    async fn add_normalizes_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let book = JsonFileAddressBook::new(dir.path().join("addresses.json"));

        assert!(book.add("123 North Main Street, Pittsburgh, PA").await.unwrap());
        assert!(!book.add("123 N Main St").await.unwrap());
        assert!(!book.add(" , ").await.unwrap());
        assert!(book.add("5 Forbes Avenue").await.unwrap());

        assert_eq!(
            book.list().await.unwrap(),
            vec!["123 N MAIN ST".to_string(), "5 FORBES AVE".to_string()]
        );
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let book = JsonFileAddressBook::new(dir.path().join("addresses.json"));
        book.add("1 Elm St").await.unwrap();
        book.add("2 Elm St").await.unwrap();

        assert!(book.remove("1 elm street").await.unwrap());
        assert!(!book.remove("1 elm street").await.unwrap());
        assert_eq!(book.list().await.unwrap(), vec!["2 ELM ST".to_string()]);

        book.clear().await.unwrap();
        assert!(book.list().await.unwrap().is_empty());
    }
}
