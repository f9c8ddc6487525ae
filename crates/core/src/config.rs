use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub database: DatabaseConfig,
    pub wprdc: WprdcConfig,
    pub email: EmailConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VWATCH_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("VWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            database: DatabaseConfig::from_env_profiled(p),
            wprdc: WprdcConfig::from_env_profiled(p),
            email: EmailConfig::from_env_profiled(p),
            schedule: ScheduleConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  database:  configured={}, settings_row={}",
            self.database.is_configured(),
            self.database.settings_row_id
        );
        tracing::info!(
            "  wprdc:     url={}, resource={}",
            self.wprdc.base_url,
            self.wprdc.resource_id
        );
        tracing::info!(
            "  email:     emailjs={}, smtp={}",
            self.email.emailjs_configured(),
            self.email.smtp_configured()
        );
        tracing::info!(
            "  schedule:  {:02}:00 {}, timeout={}s, poll={}s",
            self.schedule.target_hour,
            self.schedule.reference_tz,
            self.schedule.check_timeout_secs,
            self.schedule.settings_poll_secs
        );
        tracing::info!("  storage:   data_dir={}", self.storage.data_dir.display());
    }
}

// ── Database (Supabase Postgres) ──────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the discrete fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
    /// Primary key of the singleton settings row.
    pub settings_row_id: i64,
}

impl DatabaseConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "SUPABASE_DB_URL"),
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "postgres"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "require"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 5),
            settings_row_id: profiled_env_or(p, "SETTINGS_ROW_ID", "1")
                .parse()
                .unwrap_or(1),
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.username.is_some()
    }
}

// ── WPRDC open-data API ───────────────────────────────────────

/// Pittsburgh PLI violations resource on data.wprdc.org.
pub const DEFAULT_WPRDC_RESOURCE_ID: &str = "70c06278-92c5-4040-ab28-17671866f81c";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WprdcConfig {
    pub base_url: String,
    pub resource_id: String,
    pub timeout_secs: u64,
    pub result_limit: u32,
}

impl WprdcConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(p, "WPRDC_BASE_URL", "https://data.wprdc.org/api/3/action"),
            resource_id: profiled_env_or(p, "WPRDC_RESOURCE_ID", DEFAULT_WPRDC_RESOURCE_ID),
            timeout_secs: profiled_env_u64(p, "WPRDC_TIMEOUT_SECS", 20),
            result_limit: profiled_env_u32(p, "WPRDC_RESULT_LIMIT", 500),
        }
    }
}

impl Default for WprdcConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.wprdc.org/api/3/action".to_string(),
            resource_id: DEFAULT_WPRDC_RESOURCE_ID.to_string(),
            timeout_secs: 20,
            result_limit: 500,
        }
    }
}

// ── Email ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    pub emailjs_url: String,
    pub emailjs_service_id: Option<String>,
    pub emailjs_template_id: Option<String>,
    /// EmailJS account ("user") id.
    pub emailjs_public_key: Option<String>,
    pub emailjs_private_key: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_tls: Option<bool>,
    pub smtp_from: Option<String>,
}

impl EmailConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            emailjs_url: profiled_env_or(
                p,
                "EMAILJS_URL",
                "https://api.emailjs.com/api/v1.0/email/send",
            ),
            emailjs_service_id: profiled_env_opt(p, "EMAILJS_SERVICE_ID"),
            emailjs_template_id: profiled_env_opt(p, "EMAILJS_TEMPLATE_ID"),
            emailjs_public_key: profiled_env_opt(p, "EMAILJS_PUBLIC_KEY"),
            emailjs_private_key: profiled_env_opt(p, "EMAILJS_PRIVATE_KEY"),
            smtp_host: profiled_env_opt(p, "SMTP_HOST"),
            smtp_port: profiled_env_opt(p, "SMTP_PORT").and_then(|v| v.parse().ok()),
            smtp_tls: profiled_env_opt(p, "SMTP_TLS").map(|v| v != "false"),
            smtp_from: profiled_env_opt(p, "SMTP_FROM"),
        }
    }

    pub fn emailjs_configured(&self) -> bool {
        self.emailjs_service_id.is_some()
            && self.emailjs_template_id.is_some()
            && self.emailjs_public_key.is_some()
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some()
    }
}

// ── Schedule ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA name of the zone whose clock defines the daily check.
    pub reference_tz: String,
    /// Hour (0-23) in the reference zone.
    pub target_hour: u32,
    /// Upper bound on waiting for search results.
    pub check_timeout_secs: u64,
    /// How often `vwatch run` re-reads persisted settings so changes made
    /// by other `vwatch` commands take effect.
    pub settings_poll_secs: u64,
}

impl ScheduleConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            reference_tz: profiled_env_or(p, "CHECK_REFERENCE_TZ", "America/Los_Angeles"),
            target_hour: profiled_env_u32(p, "CHECK_TARGET_HOUR", 6),
            check_timeout_secs: profiled_env_u64(p, "CHECK_TIMEOUT_SECS", 30),
            settings_poll_secs: profiled_env_u64(p, "SETTINGS_POLL_SECS", 60).max(1),
        }
    }

    pub fn timezone(&self) -> Result<Tz, CoreError> {
        self.reference_tz
            .parse::<Tz>()
            .map_err(|_| CoreError::InvalidTimezone(self.reference_tz.clone()))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reference_tz: "America/Los_Angeles".to_string(),
            target_hour: 6,
            check_timeout_secs: 30,
            settings_poll_secs: 60,
        }
    }
}

// ── Local storage ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "VWATCH_DATA_DIR", "data")),
        }
    }

    pub fn local_cache_path(&self) -> PathBuf {
        self.data_dir.join("local_cache.json")
    }

    pub fn known_violations_path(&self) -> PathBuf {
        self.data_dir.join("known_violations.json")
    }

    pub fn addresses_path(&self) -> PathBuf {
        self.data_dir.join("addresses.json")
    }
}
