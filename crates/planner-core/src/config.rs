use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_ROOM_LEAD_MINUTES: i64 = 15;
pub const DEFAULT_CLEANUP_DELAY_MINUTES: i64 = 30;
/// Upper bound for either schedule offset: one week.
pub const MAX_OFFSET_MINUTES: i64 = 7 * 24 * 60;

/// Top-level config (planner.toml + PLANNER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub conferencing: ConferencingConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
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

/// Offsets used to derive job fire times from meeting timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// How long before `start_time` the room is created.
    #[serde(default = "default_room_lead_minutes")]
    pub room_lead_minutes: i64,
    /// How long after a call stops its room is deleted.
    #[serde(default = "default_cleanup_delay_minutes")]
    pub cleanup_delay_minutes: i64,
}

impl ScheduleConfig {
    pub fn room_lead(&self) -> Duration {
        Duration::minutes(self.room_lead_minutes)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::minutes(self.cleanup_delay_minutes)
    }

    /// Both offsets must lie in `0..=MAX_OFFSET_MINUTES`.
    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, minutes) in [
            ("room_lead_minutes", self.room_lead_minutes),
            ("cleanup_delay_minutes", self.cleanup_delay_minutes),
        ] {
            if !(0..=MAX_OFFSET_MINUTES).contains(&minutes) {
                return Err(crate::error::CoreError::Config(format!(
                    "schedule.{name} must be between 0 and {MAX_OFFSET_MINUTES}, got {minutes}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            room_lead_minutes: DEFAULT_ROOM_LEAD_MINUTES,
            cleanup_delay_minutes: DEFAULT_CLEANUP_DELAY_MINUTES,
        }
    }
}

/// Conferencing provider account. Credentials are optional: without them the
/// gateway runs the dry-run provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferencingConfig {
    #[serde(default = "default_conferencing_host")]
    pub host: String,
    pub application_id: Option<String>,
    pub login: Option<String>,
}

impl Default for ConferencingConfig {
    fn default() -> Self {
        Self {
            host: default_conferencing_host(),
            application_id: None,
            login: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_from")]
    pub default_from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            default_from: default_mail_from(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_room_lead_minutes() -> i64 {
    DEFAULT_ROOM_LEAD_MINUTES
}
fn default_cleanup_delay_minutes() -> i64 {
    DEFAULT_CLEANUP_DELAY_MINUTES
}
fn default_conferencing_host() -> String {
    "sandbox".to_string()
}
fn default_mail_from() -> String {
    "\"No Reply\" <noreply@example.com>".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.planner/planner.db", home)
}

impl PlannerConfig {
    /// Load config from a TOML file with PLANNER_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `PLANNER_SCHEDULE__ROOM_LEAD_MINUTES=5`. A missing file is not an
    /// error; defaults fill every unset field.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PlannerConfig = Figment::from(Serialized::defaults(PlannerConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PLANNER_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        config.schedule.validate()?;
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.planner/planner.toml", home)
}
