//! Search trait definition and shared error types.

use vwatch_core::ViolationRecord;

/// Errors that can occur while searching for violations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A source of violation records for a list of addresses.
///
/// Implementations return records for all addresses in one awaitable
/// result; ordering follows the input address order.
#[async_trait::async_trait]
pub trait ViolationSearch: Send + Sync {
    async fn search(&self, addresses: &[String]) -> Result<Vec<ViolationRecord>, SearchError>;
}
