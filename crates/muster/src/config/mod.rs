use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::recruit::SelectionConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub recruit: RecruitSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            recruit: RecruitSettings::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the recruitment core: roster capacity, wizard-session TTL and sweep
/// period, and the lottery's content-mismatch penalty.
#[derive(Debug, Clone)]
pub struct RecruitSettings {
    pub capacity: usize,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub content_mismatch_weight: f64,
}

impl RecruitSettings {
    fn load() -> Result<Self, ConfigError> {
        let capacity = parse_env("MUSTER_CAPACITY", 6usize)?;
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MUSTER_CAPACITY",
                reason: "must be at least 1".to_string(),
            });
        }

        let ttl_secs = parse_env("MUSTER_SESSION_TTL_SECS", 600u64)?;
        let sweep_secs = parse_env("MUSTER_SWEEP_INTERVAL_SECS", 60u64)?;

        let weight = parse_env("MUSTER_CONTENT_MISMATCH_WEIGHT", 0.5f64)?;
        if !(0.0..=1.0).contains(&weight) {
            return Err(ConfigError::InvalidValue {
                var: "MUSTER_CONTENT_MISMATCH_WEIGHT",
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        Ok(Self {
            capacity,
            session_ttl: Duration::from_secs(ttl_secs),
            sweep_interval: Duration::from_secs(sweep_secs),
            content_mismatch_weight: weight,
        })
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            capacity: self.capacity,
            content_mismatch_weight: self.content_mismatch_weight,
        }
    }
}

impl Default for RecruitSettings {
    fn default() -> Self {
        Self {
            capacity: 6,
            session_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            content_mismatch_weight: 0.5,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            var,
            reason: format!("could not parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { var: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { var, reason } => write!(f, "{var}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
