//! Supabase (Postgres) backed stores.
//!
//! Expected tables (created outside this crate):
//!
//! ```sql
//! CREATE TABLE schedule_settings (
//!     id                    bigint PRIMARY KEY,
//!     checks_enabled        boolean NOT NULL DEFAULT false,
//!     email_reports_enabled boolean NOT NULL DEFAULT false,
//!     email_report_address  text    NOT NULL DEFAULT '',
//!     next_check_at         timestamptz,
//!     created_at            timestamptz NOT NULL DEFAULT now(),
//!     updated_at            timestamptz NOT NULL DEFAULT now()
//! );
//! CREATE TABLE known_violations (
//!     address       text PRIMARY KEY,
//!     violation_ids text[] NOT NULL,
//!     updated_at    timestamptz NOT NULL DEFAULT now()
//! );
//! CREATE TABLE saved_addresses (
//!     address    text PRIMARY KEY,
//!     created_at timestamptz NOT NULL DEFAULT now()
//! );
//! ```

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use vwatch_core::config::DatabaseConfig;
use vwatch_core::{normalize_address, ScheduleSettings, SettingsPatch};

use crate::addresses::AddressBook;
use crate::error::StoreError;
use crate::index::{DiffIndexStore, KnownViolationIndex};
use crate::settings::SettingsBackend;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    settings_row_id: i64,
}

impl PgStore {
    pub fn new(pool: PgPool, settings_row_id: i64) -> Self {
        Self {
            pool,
            settings_row_id,
        }
    }

    /// Connect to the configured database.
    /// Returns `None` when no database is configured or it cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Option<Self> {
        if !config.is_configured() {
            warn!("SUPABASE_DB_URL / PG_USERNAME not set; running with local storage only");
            return None;
        }

        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await
        {
            Ok(pool) => {
                info!("Supabase Postgres connected");
                Some(Self::new(pool, config.settings_row_id))
            }
            Err(e) => {
                warn!("Failed to connect to Supabase Postgres: {}; running with local storage only", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl SettingsBackend for PgStore {
    async fn fetch(&self) -> Result<Option<ScheduleSettings>, StoreError> {
        let row = sqlx::query_as::<_, (bool, bool, String, Option<DateTime<Utc>>)>(
            "SELECT checks_enabled, email_reports_enabled, email_report_address, next_check_at
             FROM schedule_settings WHERE id = $1",
        )
        .bind(self.settings_row_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(checks_enabled, email_enabled, email_address, next_check_at)| ScheduleSettings {
                checks_enabled,
                email_enabled,
                email_address,
                next_check_at,
            },
        ))
    }

    async fn upsert(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        // $6 says whether next_check_at is part of the patch; $5 alone can't
        // tell "leave alone" from "clear".
        sqlx::query(
            "INSERT INTO schedule_settings
                (id, checks_enabled, email_reports_enabled, email_report_address, next_check_at)
             VALUES ($1, COALESCE($2, false), COALESCE($3, false), COALESCE($4, ''), $5)
             ON CONFLICT (id) DO UPDATE SET
                checks_enabled        = COALESCE($2, schedule_settings.checks_enabled),
                email_reports_enabled = COALESCE($3, schedule_settings.email_reports_enabled),
                email_report_address  = COALESCE($4, schedule_settings.email_report_address),
                next_check_at         = CASE WHEN $6 THEN $5 ELSE schedule_settings.next_check_at END,
                updated_at            = now()",
        )
        .bind(self.settings_row_id)
        .bind(patch.checks_enabled)
        .bind(patch.email_enabled)
        .bind(patch.email_address.as_deref())
        .bind(patch.next_check_at.flatten())
        .bind(patch.next_check_at.is_some())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DiffIndexStore for PgStore {
    async fn load(&self) -> Result<KnownViolationIndex, StoreError> {
        let rows = sqlx::query_as::<_, (String, Vec<String>)>(
            "SELECT address, violation_ids FROM known_violations",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn replace(&self, index: &KnownViolationIndex) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM known_violations")
            .execute(&mut *tx)
            .await?;

        for (address, ids) in index.iter() {
            let ids: Vec<String> = ids.iter().cloned().collect();
            sqlx::query(
                "INSERT INTO known_violations (address, violation_ids, updated_at)
                 VALUES ($1, $2, now())",
            )
            .bind(address)
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM known_violations")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AddressBook for PgStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT address FROM saved_addresses ORDER BY created_at, address",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    async fn add(&self, address: &str) -> Result<bool, StoreError> {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return Ok(false);
        }
        let result = sqlx::query(
            "INSERT INTO saved_addresses (address) VALUES ($1) ON CONFLICT (address) DO NOTHING",
        )
        .bind(&normalized)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, address: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM saved_addresses WHERE address = $1")
            .bind(normalize_address(address))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM saved_addresses")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
