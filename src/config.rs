//! Process configuration (spec §6), layered the way `rustymail::config`
//! layers its `Settings`: an optional `config/default.toml` file overridden
//! by `APP__`-prefixed environment variables, deserialized once at startup.

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerMode {
    Single,
    Cluster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub bind_host: String,
    pub bind_port: u16,

    pub database_host: String,
    pub database_name: String,
    pub database_min_pool_size: u32,
    pub database_max_pool_size: u32,

    pub imap_timeout: u64,
    pub imap_poll_interval: u64,
    pub imap_poll_jitter: u64,
    pub imap_idle_timeout: u64,
    pub imap_listener_mode: ListenerMode,

    pub workers_num: usize,
    pub worker_max_connections_per_provider: usize,

    pub webhook_max_retries: u32,
    pub webhook_timeout: u64,

    pub password_encryption_key: String,
    pub environment: String,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load or parse configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl Settings {
    /// Loads from `config/default.toml` (optional) then `APP__`-prefixed env
    /// vars, matching spec §6's flat variable names via the `separator("__")`
    /// convention the teacher already uses for nested keys.
    pub fn load() -> Result<Self, SettingsError> {
        let builder = config::Config::builder()
            .set_default("bind_host", "0.0.0.0")?
            .set_default("bind_port", 8080)?
            .set_default("database_host", "mailbridge.sqlite")?
            .set_default("database_name", "mailbridge")?
            .set_default("database_min_pool_size", 5)?
            .set_default("database_max_pool_size", 20)?
            .set_default("imap_timeout", 300)?
            .set_default("imap_poll_interval", 60)?
            .set_default("imap_poll_jitter", 30)?
            .set_default("imap_idle_timeout", 1740)?
            .set_default("imap_listener_mode", "single")?
            .set_default("workers_num", 2)?
            .set_default("worker_max_connections_per_provider", 50)?
            .set_default("webhook_max_retries", 3)?
            .set_default("webhook_timeout", 10)?
            .set_default("environment", "development")?
            .add_source(File::with_name("config/default.toml").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize().map_err(SettingsError::from)
    }
}
