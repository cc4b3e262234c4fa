use crate::error::{Result, TrackingError};
use crate::tracking::{ClientErrorPolicy, LoggingMethods, PersistFailurePolicy};
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Admin credentials
    pub admin: AdminConfig,
    /// Logging configuration
    pub log: LogConfig,
    /// Defaults applied to every tracked route
    pub tracking: TrackingDefaults,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 8001)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
    /// JWT secret for token generation
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Database name
    pub name: String,
    /// SSL mode (disable, require, prefer)
    pub ssl_mode: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections in pool
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Admin username for the log listing API
    pub username: String,
    /// Admin password for the log listing API
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

/// Tracking settings shared by all routes unless a route overrides them
#[derive(Debug, Clone)]
pub struct TrackingDefaults {
    /// Methods that are logged (empty = all)
    pub logging_methods: LoggingMethods,
    /// Extra field names to redact, on top of the built-in set
    pub sensitive_fields: Vec<String>,
    /// Largest request/response body that is buffered for capture
    pub max_body_bytes: usize,
    /// What to do when the log write fails
    pub persist_failure: PersistFailurePolicy,
    /// Where client validation errors are recorded
    pub client_errors: ClientErrorPolicy,
}

impl Default for TrackingDefaults {
    fn default() -> Self {
        Self {
            logging_methods: LoggingMethods::All,
            sensitive_fields: Vec::new(),
            max_body_bytes: 64 * 1024,
            persist_failure: PersistFailurePolicy::Drop,
            client_errors: ClientErrorPolicy::RecordResponse,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api: ApiServerConfig {
                port: get_env_or("API_PORT", "8001").parse().map_err(|_| {
                    TrackingError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                cors_origins: split_list(&get_env_or("CORS_ORIGINS", "")),
                jwt_secret: get_env_or("JWT_SECRET", ""),
            },
            database: DatabaseConfig {
                host: get_env_or("DB_HOST", "localhost"),
                port: get_env_or("DB_PORT", "5432").parse().map_err(|_| {
                    TrackingError::InvalidConfig("DB_PORT must be a valid port number".into())
                })?,
                user: get_env_or("DB_USER", "tracking"),
                password: get_env_or("DB_PASSWORD", "tracking_password"),
                name: get_env_or("DB_NAME", "tracking"),
                ssl_mode: get_env_or("DB_SSLMODE", "disable"),
                max_connections: get_env_or("DB_MAX_CONNECTIONS", "20")
                    .parse()
                    .map_err(|_| {
                        TrackingError::InvalidConfig(
                            "DB_MAX_CONNECTIONS must be a valid number".into(),
                        )
                    })?,
                min_connections: get_env_or("DB_MIN_CONNECTIONS", "2").parse().map_err(|_| {
                    TrackingError::InvalidConfig("DB_MIN_CONNECTIONS must be a valid number".into())
                })?,
            },
            admin: AdminConfig {
                username: get_env_or("TRACKING_ADMIN_USER", "admin"),
                password: get_env_or("TRACKING_ADMIN_PASSWORD", "admin"),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "json"),
            },
            tracking: parse_tracking_defaults()?,
        })
    }

    /// Get the database connection URL
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.database.user,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.name,
            self.database.ssl_mode
        )
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_tracking_defaults() -> Result<TrackingDefaults> {
    let logging_methods = LoggingMethods::parse(&get_env_or("TRACKING_LOGGING_METHODS", ""))
        .map_err(|e| TrackingError::InvalidConfig(format!("TRACKING_LOGGING_METHODS: {}", e)))?;

    let max_body_bytes = get_env_or("TRACKING_MAX_BODY_BYTES", "65536")
        .parse()
        .map_err(|_| {
            TrackingError::InvalidConfig("TRACKING_MAX_BODY_BYTES must be a valid number".into())
        })?;

    let persist_failure = match get_env_or("TRACKING_PERSIST_FAILURE", "drop")
        .to_lowercase()
        .as_str()
    {
        "drop" => PersistFailurePolicy::Drop,
        "propagate" => PersistFailurePolicy::Propagate,
        other => {
            return Err(TrackingError::InvalidConfig(format!(
                "TRACKING_PERSIST_FAILURE must be drop or propagate, got {}",
                other
            )))
        }
    };

    let client_errors = match get_env_or("TRACKING_CLIENT_ERRORS", "response")
        .to_lowercase()
        .as_str()
    {
        "response" => ClientErrorPolicy::RecordResponse,
        "errors" => ClientErrorPolicy::RecordError,
        other => {
            return Err(TrackingError::InvalidConfig(format!(
                "TRACKING_CLIENT_ERRORS must be response or errors, got {}",
                other
            )))
        }
    };

    Ok(TrackingDefaults {
        logging_methods,
        sensitive_fields: split_list(&get_env_or("TRACKING_SENSITIVE_FIELDS", "")),
        max_body_bytes,
        persist_failure,
        client_errors,
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
