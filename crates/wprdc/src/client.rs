//! CKAN datastore client for the Pittsburgh PLI violations dataset.
//!
//! Issues one `datastore_search_sql` query per address and maps the raw
//! rows into [`ViolationRecord`]s. Addresses are normalized before
//! matching so "123 North Main Street" finds rows stored as "123 N MAIN ST".

use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use vwatch_core::config::WprdcConfig;
use vwatch_core::{normalize_address, ViolationRecord};

use crate::search::{SearchError, ViolationSearch};

/// Source columns lifted out of the opaque payload.
const CASE_FIELD: &str = "casefile_number";
/// Tells apart the violation rows of one case.
const VIOLATION_KEY_FIELDS: &[&str] = &["violation_code_section", "_id"];
const ROW_ID_FIELD: &str = "_id";
const ADDRESS_FIELD: &str = "address";
const DESCRIPTION_FIELDS: &[&str] = &["violation_description", "violation_spec_instructions"];
const STATUS_FIELDS: &[&str] = &["status", "investigation_outcome"];
const DATE_FIELD: &str = "investigation_date";

pub struct WprdcClient {
    client: reqwest::Client,
    base_url: String,
    resource_id: String,
    result_limit: u32,
}

#[derive(Deserialize)]
struct CkanResponse {
    success: bool,
    #[serde(default)]
    result: Option<CkanResult>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct CkanResult {
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

impl WprdcClient {
    pub fn new(config: &WprdcConfig) -> Result<Self, SearchError> {
        if !is_valid_resource_id(&config.resource_id) {
            return Err(SearchError::Config(format!(
                "invalid resource id: {}",
                config.resource_id
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            resource_id: config.resource_id.clone(),
            result_limit: config.result_limit,
        })
    }

    /// Fetch all violation rows matching a single address.
    pub async fn search_address(&self, address: &str) -> Result<Vec<ViolationRecord>, SearchError> {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let sql = build_query(&self.resource_id, &normalized, self.result_limit);
        let url = format!("{}/datastore_search_sql", self.base_url);
        debug!(address = %normalized, "WPRDC query");

        let response = self
            .client
            .get(&url)
            .query(&[("sql", sql.as_str())])
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api { status, body });
        }

        let body: CkanResponse = response.json().await?;
        if !body.success {
            return Err(SearchError::Parse(format!(
                "datastore_search_sql failed: {}",
                body.error.unwrap_or(Value::Null)
            )));
        }

        let records = body
            .result
            .map(|r| r.records)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| map_record(row, &normalized))
            .collect();
        Ok(records)
    }
}

#[async_trait::async_trait]
impl ViolationSearch for WprdcClient {
    async fn search(&self, addresses: &[String]) -> Result<Vec<ViolationRecord>, SearchError> {
        let results = join_all(addresses.iter().map(|a| self.search_address(a))).await;

        let mut records = Vec::new();
        let mut last_error = None;
        let mut failures = 0usize;
        for (address, result) in addresses.iter().zip(results) {
            match result {
                Ok(mut found) => records.append(&mut found),
                Err(e) => {
                    warn!(address = %address, error = %e, "WPRDC search failed for address");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        // Partial failure still yields what we have; total failure is an error.
        match last_error {
            Some(e) if failures == addresses.len() => Err(e),
            _ => Ok(records),
        }
    }
}

/// CKAN resource ids are UUIDs; anything else would end up inside SQL.
fn is_valid_resource_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn build_query(resource_id: &str, normalized_address: &str, limit: u32) -> String {
    let escaped = normalized_address
        .replace('\'', "''")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!(
        "SELECT * FROM \"{resource_id}\" WHERE \"{ADDRESS_FIELD}\" ILIKE '{escaped}%' \
         ORDER BY \"{DATE_FIELD}\" DESC LIMIT {limit}"
    )
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn peek_string(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| row.get(*k).and_then(as_text))
}

fn take_string(row: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| row.remove(*k).as_ref().and_then(as_text))
}

/// Identity of one violation row: `CASE:CODE`, since a case can carry
/// several violations. Rows without a case number use the datastore row id.
fn record_id(row: &Map<String, Value>) -> Option<String> {
    match peek_string(row, &[CASE_FIELD]) {
        Some(case) => Some(match peek_string(row, VIOLATION_KEY_FIELDS) {
            Some(key) => format!("{case}:{key}"),
            None => case,
        }),
        None => peek_string(row, &[ROW_ID_FIELD]),
    }
}

/// Map a raw datastore row into a record. Rows without an id are dropped.
fn map_record(mut row: Map<String, Value>, searched: &str) -> Option<ViolationRecord> {
    let id = record_id(&row)?;
    let address = take_string(&mut row, &[ADDRESS_FIELD]).unwrap_or_else(|| searched.to_string());
    let description = take_string(&mut row, DESCRIPTION_FIELDS);
    let status = take_string(&mut row, STATUS_FIELDS);
    let investigation_date = take_string(&mut row, &[DATE_FIELD]);
    row.remove("_full_text");

    Some(ViolationRecord {
        id,
        address,
        description,
        status,
        investigation_date,
        payload: row,
    })
}
