use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub razorpay: RazorpayConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// `json` switches the subscriber to JSON lines
    pub log_format: String,
}

#[derive(Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub base_url: String,
}

// Secrets stay out of logs
impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Hour of day (IST) at which the daily charge run starts
    pub run_hour: u32,
    pub max_retries: u32,
    pub gateway_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_hour: 9,
            max_retries: 3,
            gateway_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Endpoint of the notification relay; log-only delivery when unset
    pub url: Option<String>,
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", name)))
}

fn require_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| AppError::Configuration(format!("{} not set", name)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            razorpay: RazorpayConfig {
                key_id: require_var("RAZORPAY_KEY_ID")?,
                key_secret: require_var("RAZORPAY_KEY_SECRET")?,
                webhook_secret: require_var("RAZORPAY_WEBHOOK_SECRET")?,
                base_url: env::var("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            },
            scheduler: SchedulerConfig {
                enabled: parse_var("SCHEDULER_ENABLED", "true")?,
                run_hour: parse_var("SCHEDULER_RUN_HOUR", "9")?,
                max_retries: parse_var("SCHEDULER_MAX_RETRIES", "3")?,
                gateway_timeout_secs: parse_var("GATEWAY_TIMEOUT_SECS", "15")?,
            },
            notifications: NotificationConfig {
                url: env::var("NOTIFICATION_URL").ok().filter(|url| !url.is_empty()),
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.razorpay.webhook_secret.trim().is_empty() {
            return Err(AppError::Configuration(
                "RAZORPAY_WEBHOOK_SECRET must not be empty".to_string(),
            ));
        }

        self.scheduler.validate()
    }

    pub fn is_json_logging(&self) -> bool {
        self.app.log_format.eq_ignore_ascii_case("json")
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(AppError::Configuration(
                "Scheduler max retries must be greater than 0".to_string(),
            ));
        }

        if self.gateway_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "Gateway timeout must be greater than 0".to_string(),
            ));
        }

        if self.run_hour > 23 {
            return Err(AppError::Configuration(format!(
                "Scheduler run hour must be within 0-23, got {}",
                self.run_hour
            )));
        }

        Ok(())
    }
}
