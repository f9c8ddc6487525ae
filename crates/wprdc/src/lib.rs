//! Violation search against the WPRDC open-data portal.
//!
//! This crate provides:
//! - `ViolationSearch` trait for multi-address violation lookups
//! - `WprdcClient`, a CKAN `datastore_search_sql` implementation

pub mod client;
pub mod search;

pub use client::WprdcClient;
pub use search::{SearchError, ViolationSearch};
