use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::hazards::AlertLevel;

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
    pub escalation: EscalationConfig,
    pub forecast: ForecastConfig,
    pub matcher: MatcherConfig,
    pub catalogs: CatalogConfig,
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

        let escalation = EscalationConfig {
            radius_km: parse_var("ESCALATION_RADIUS_KM", 500.0)?,
            minimum_alert: parse_var("ESCALATION_MIN_ALERT", AlertLevel::Orange)?,
            score_delta: parse_var("ESCALATION_SCORE_DELTA", 0.5)?,
            store_path: env::var("ESCALATION_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("processed_events.json")),
            feed_url: env::var("HAZARD_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),
            poll_interval: Duration::from_secs(parse_var("HAZARD_POLL_SECS", 900)?),
        };

        let forecast = ForecastConfig {
            horizon_days: parse_var("FORECAST_HORIZON_DAYS", 60)?,
            minimum_history: parse_var("FORECAST_MIN_HISTORY", 14)?,
            alert_window_days: parse_var("FORECAST_ALERT_WINDOW_DAYS", 7)?,
            workers: parse_var("FORECAST_WORKERS", 4)?,
            fit_budget: Duration::from_secs(parse_var("FORECAST_FIT_BUDGET_SECS", 30)?),
            batch_interval: Duration::from_secs(parse_var("FORECAST_BATCH_SECS", 86_400)?),
        };

        let matcher = MatcherConfig {
            top_n: parse_var("MATCHER_TOP_N", 3)?,
        };

        let catalogs = CatalogConfig {
            sites: optional_path("SITES_PATH"),
            service_catalog: optional_path("SERVICE_CATALOG_PATH"),
            ngo_catalog: optional_path("NGO_CATALOG_PATH"),
            reference_profiles: optional_path("REFERENCE_PROFILES_PATH"),
            resource_history: optional_path("RESOURCE_HISTORY_PATH"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            escalation,
            forecast,
            matcher,
            catalogs,
        })
    }
}

const DEFAULT_FEED_URL: &str = "https://www.gdacs.org/gdacsapi/api/events/geteventlist/MAP";

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        _ => Ok(default),
    }
}

fn optional_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map(PathBuf::from)
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Hazard polling and escalation thresholds.
#[derive(Debug, Clone)]
pub struct EscalationConfig {
    pub radius_km: f64,
    pub minimum_alert: AlertLevel,
    pub score_delta: f64,
    pub store_path: PathBuf,
    pub feed_url: String,
    pub poll_interval: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            radius_km: 500.0,
            minimum_alert: AlertLevel::Orange,
            score_delta: 0.5,
            store_path: PathBuf::from("processed_events.json"),
            feed_url: DEFAULT_FEED_URL.to_string(),
            poll_interval: Duration::from_secs(900),
        }
    }
}

/// Depletion forecasting horizon, alerting window, and worker pool sizing.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub horizon_days: u32,
    pub minimum_history: usize,
    pub alert_window_days: i64,
    pub workers: usize,
    pub fit_budget: Duration,
    pub batch_interval: Duration,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 60,
            minimum_history: 14,
            alert_window_days: 7,
            workers: 4,
            fit_budget: Duration::from_secs(30),
            batch_interval: Duration::from_secs(86_400),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub top_n: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

/// Optional CSV sources; built-in tables are used for any that are unset.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub sites: Option<PathBuf>,
    pub service_catalog: Option<PathBuf>,
    pub ngo_catalog: Option<PathBuf>,
    pub reference_profiles: Option<PathBuf>,
    pub resource_history: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "{name} has an invalid value '{value}'")
            }
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
