//! Persistence for schedule settings, the known-violation index and
//! saved addresses.
//!
//! Every store sits behind a trait so the scheduler can run against
//! Supabase Postgres, local JSON files, or in-memory doubles:
//! - `SettingsBackend` + `LocalCache`, combined by `SettingsStore`
//! - `DiffIndexStore` for the known-violation index
//! - `AddressBook` for the saved address list

pub mod addresses;
pub mod error;
pub mod index;
pub mod json_file;
pub mod local_cache;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;
pub mod settings;

pub use addresses::{parse_address_list, AddressBook, JsonFileAddressBook};
pub use error::StoreError;
pub use index::{DiffIndexStore, JsonFileIndexStore, KnownViolationIndex};
pub use local_cache::{JsonFileCache, LocalCache, LocalCacheRecord};
pub use postgres::PgStore;
pub use settings::{SettingsBackend, SettingsStore};
