use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THREAD_COUNT: usize = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Top-level config (cronbind.toml + CRONBIND_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronbindConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Free-form values available to `${key:default}` placeholders in job schedules.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// When false the daemon starts without a scheduler.
    /// Defaults to on: a deployment that must stay idle has to opt out here.
    /// Override with env var: CRONBIND_SCHEDULER__ENABLED=false
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Upper bound on jobs executing at the same time.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Replace stored jobs/triggers on startup so config edits reach the store.
    #[serde(default = "bool_true")]
    pub overwrite_existing_jobs: bool,
    /// IANA zone cron expressions are evaluated in (`Europe/Berlin`, `UTC`).
    /// Unset means the host's local zone.
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thread_count: DEFAULT_THREAD_COUNT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            overwrite_existing_jobs: true,
            time_zone: None,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_thread_count() -> usize {
    DEFAULT_THREAD_COUNT
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronbind/cronbind.db", home)
}

impl CronbindConfig {
    /// Load config from a TOML file with CRONBIND_* env var overrides.
    ///
    /// Nested keys use a double underscore: `CRONBIND_SCHEDULER__THREAD_COUNT=4`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CRONBIND_").split("__"))
    }

    /// Look up a free-form property, falling back to the process environment.
    ///
    /// Environment lookups try the exact key first, then the relaxed
    /// `UPPER_SNAKE` form (`job3.cron` → `JOB3_CRON`).
    pub fn property(&self, key: &str) -> Option<String> {
        if let Some(v) = self.properties.get(key) {
            return Some(v.clone());
        }
        if let Ok(v) = std::env::var(key) {
            return Some(v);
        }
        std::env::var(relaxed_env_name(key)).ok()
    }
}

fn relaxed_env_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronbind/cronbind.toml", home)
}
