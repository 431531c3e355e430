//! Server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database connection URL. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
    /// CORS allowed origins (comma-separated or "*" for all).
    pub cors_allowed_origins: String,
    /// HMAC secret used to validate owner session tokens.
    pub session_secret: String,
    /// Accept the `X-User-Id` header as an owner session (development only).
    pub allow_dev_identity: bool,
    /// Idle time after the last edit before the note is persisted.
    pub persist_quiescence: Duration,
    /// Upper bound on how long an edit may stay unpersisted under constant typing.
    pub persist_max_delay: Duration,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
    /// Upper bound on removing a closed connection from its room.
    pub leave_timeout: Duration,
    /// Interval between WebSocket pings.
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 5000,
            log_level: "info".to_string(),
            log_json: false,
            cors_allowed_origins: "*".to_string(),
            session_secret: String::new(),
            allow_dev_identity: false,
            persist_quiescence: Duration::from_millis(1500),
            persist_max_delay: Duration::from_millis(10_000),
            outbound_queue_capacity: 256,
            leave_timeout: Duration::from_millis(2000),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SESSION_SECRET`: Session token secret (unless `ALLOW_DEV_IDENTITY=true`)
    ///
    /// Optional:
    /// - `DATABASE_URL`: PostgreSQL connection string (default: in-memory store)
    /// - `PORT`: Server port (default: 5000)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    /// - `LOG_FORMAT`: "text" or "json" (default: "text")
    /// - `CORS_ALLOWED_ORIGINS`: Allowed CORS origins (default: "*")
    /// - `ALLOW_DEV_IDENTITY`: Accept `X-User-Id` as a session (default: false)
    /// - `PERSIST_QUIESCENCE_MS`: Quiet period before persisting (default: 1500)
    /// - `PERSIST_MAX_DELAY_MS`: Max age of an unpersisted edit (default: 10000)
    /// - `OUTBOUND_QUEUE_CAPACITY`: Per-connection queue size (default: 256)
    /// - `LEAVE_TIMEOUT_MS`: Room cleanup bound (default: 2000)
    /// - `HEARTBEAT_INTERVAL_SECS`: WebSocket ping interval (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let port = parse_var("PORT")?.unwrap_or(defaults.port);

        let log_level = env::var("LOG_LEVEL").unwrap_or(defaults.log_level);

        let log_json = match env::var("LOG_FORMAT") {
            Ok(format) => match format.to_lowercase().as_str() {
                "json" => true,
                "text" | "" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        name: "LOG_FORMAT".to_string(),
                        reason: format!("expected \"text\" or \"json\", got {:?}", other),
                    });
                }
            },
            Err(_) => false,
        };

        let cors_allowed_origins =
            env::var("CORS_ALLOWED_ORIGINS").unwrap_or(defaults.cors_allowed_origins);

        let allow_dev_identity = env::var("ALLOW_DEV_IDENTITY")
            .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
            .unwrap_or(false);

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if allow_dev_identity => String::new(),
            _ => return Err(ConfigError::MissingEnvVar("SESSION_SECRET".to_string())),
        };

        let persist_quiescence = parse_var("PERSIST_QUIESCENCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.persist_quiescence);

        let persist_max_delay = parse_var("PERSIST_MAX_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.persist_max_delay);

        let outbound_queue_capacity: usize =
            parse_var("OUTBOUND_QUEUE_CAPACITY")?.unwrap_or(defaults.outbound_queue_capacity);
        if outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "OUTBOUND_QUEUE_CAPACITY".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let leave_timeout = parse_var("LEAVE_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.leave_timeout);

        let heartbeat_interval = parse_var("HEARTBEAT_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval);
        if heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HEARTBEAT_INTERVAL_SECS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            port,
            log_level,
            log_json,
            cors_allowed_origins,
            session_secret,
            allow_dev_identity,
            persist_quiescence,
            persist_max_delay,
            outbound_queue_capacity,
            leave_timeout,
            heartbeat_interval,
        })
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Parse an optional environment variable, rejecting unparseable values.
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}
