use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub push: PushConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub timezone: String,
    /// Six-field cron (with seconds): expired-rentals sweep, hourly.
    pub expiry_sweep_cron: String,
    /// Expiring-soon notification check, every 30 minutes.
    pub expiry_notice_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            expiry_sweep_cron: "0 0 * * * *".to_string(),
            expiry_notice_cron: "0 0,30 * * * *".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("database.max_connections", 10)?
            .set_default("gateway.timeout_secs", 15)?
            .set_default("push.timeout_secs", 10)?
            .set_default("scheduler.timezone", "UTC")?
            .set_default("scheduler.expiry_sweep_cron", "0 0 * * * *")?
            .set_default("scheduler.expiry_notice_cron", "0 0,30 * * * *")?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with MARQUEE__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://marquee.db".to_string(),
                max_connections: 10,
            },
            gateway: GatewayConfig {
                base_url: "http://localhost:9470".to_string(),
                timeout_secs: 15,
            },
            push: PushConfig {
                base_url: "http://localhost:9471".to_string(),
                timeout_secs: 10,
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}
