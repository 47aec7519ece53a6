use std::{env, fmt, net::SocketAddr, time::Duration};

use chrono_tz::Tz;

use super::{database_url, server_bind_address};

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    /// Inserts the demonstration catalogue on startup when set.
    pub seed_demo_data: bool,
    /// Timezone used to date invoices saved without an explicit date.
    pub timezone: Tz,
    /// Staged invoices untouched for this long are discarded.
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let seed_demo_data = match env::var("APP_SEED_DEMO") {
            Ok(value) => parse_flag(&value)
                .ok_or_else(|| ConfigError::InvalidFlag("APP_SEED_DEMO", value))?,
            Err(_) => true,
        };
        let timezone_value = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let timezone = timezone_value
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_value))?;
        let session_idle_timeout = match env::var("APP_SESSION_IDLE_SECS") {
            Ok(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidNumber("APP_SESSION_IDLE_SECS", value))?,
            Err(_) => DEFAULT_SESSION_IDLE_TIMEOUT,
        };

        Ok(Self {
            bind_addr,
            environment,
            database_url: database_url(),
            seed_demo_data,
            timezone,
            session_idle_timeout,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidFlag(&'static str, String),
    InvalidTimezone(String),
    InvalidNumber(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidFlag(name, value) => {
                write!(f, "{name} must be a boolean flag (got {value})")
            }
            Self::InvalidTimezone(value) => {
                write!(f, "APP_TIMEZONE must be an IANA timezone name (got {value})")
            }
            Self::InvalidNumber(name, value) => {
                write!(f, "{name} must be a whole number of seconds (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
