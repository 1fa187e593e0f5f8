//! Feed Configuration Settings
//!
//! Configuration types for the stock feed, loaded from environment variables.

use std::time::Duration;

use axum::http::HeaderValue;

/// Quote origin API key.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key.
    #[must_use]
    pub const fn new(key: String) -> Self {
        Self(key)
    }

    /// Get the raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Quote origin settings.
#[derive(Debug, Clone)]
pub struct OriginSettings {
    /// Query endpoint.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: ApiKey,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl OriginSettings {
    /// Default query endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://www.alphavantage.co/query";

    /// Settings for `api_key` with every other field at its default.
    #[must_use]
    pub fn with_api_key(api_key: ApiKey) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Price store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// sqlx connection string.
    pub database_url: String,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://stock-feed.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Update scheduler settings.
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    /// Delay between ticks.
    pub interval: Duration,
    /// Maximum relative change applied per tick, in `[0, 1]`.
    pub max_percentage_change: f64,
}

impl UpdateSettings {
    /// Default delay between ticks in milliseconds.
    pub const DEFAULT_INTERVAL_MS: u64 = 1000;
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(Self::DEFAULT_INTERVAL_MS),
            max_percentage_change: 0.02,
        }
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Outbound queue capacity of each connection.
    pub connection_buffer: usize,
    /// Capacity of each ticker group's broadcast channel.
    pub group_capacity: usize,
    /// Groups a single connection may join.
    pub max_groups_per_connection: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            connection_buffer: 256,
            group_capacity: 64,
            max_groups_per_connection: 50,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP and WebSocket port.
    pub http_port: u16,
    /// Browser origin allowed to call the API with credentials. CORS is off
    /// when unset.
    pub cors_allowed_origin: Option<HeaderValue>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8080,
            cors_allowed_origin: None,
        }
    }
}

/// Complete feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Quote origin settings.
    pub origin: OriginSettings,
    /// Price store settings.
    pub store: StoreSettings,
    /// Update scheduler settings.
    pub updates: UpdateSettings,
    /// Broadcast channel settings.
    pub broadcast: BroadcastSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `STOCKS_API_KEY` is missing or a validated
    /// setting is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_key = lookup("STOCKS_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("STOCKS_API_KEY".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("STOCKS_API_KEY".to_string()));
        }

        let origin_defaults = OriginSettings::with_api_key(ApiKey::new(api_key));
        let origin = OriginSettings {
            base_url: env.string("STOCKS_API_URL", &origin_defaults.base_url),
            timeout: env.duration_secs("STOCKS_API_TIMEOUT_SECS", origin_defaults.timeout),
            ..origin_defaults
        };

        let store = StoreSettings {
            database_url: env.string("DATABASE_URL", &StoreSettings::default().database_url),
            max_connections: env.parse(
                "DATABASE_MAX_CONNECTIONS",
                StoreSettings::default().max_connections,
            ),
        };

        let max_percentage_change = env.parse_strict(
            "STOCK_UPDATE_MAX_PERCENTAGE_CHANGE",
            UpdateSettings::default().max_percentage_change,
        )?;
        if !(0.0..=1.0).contains(&max_percentage_change) {
            return Err(ConfigError::InvalidValue {
                key: "STOCK_UPDATE_MAX_PERCENTAGE_CHANGE".to_string(),
                message: format!("{max_percentage_change} is outside [0, 1]"),
            });
        }

        let interval = env
            .parse_strict("STOCK_UPDATE_INTERVAL_MS", UpdateSettings::DEFAULT_INTERVAL_MS)
            .map(Duration::from_millis)?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "STOCK_UPDATE_INTERVAL_MS".to_string(),
                message: "interval must be positive".to_string(),
            });
        }

        let updates = UpdateSettings {
            interval,
            max_percentage_change,
        };

        let broadcast = BroadcastSettings {
            connection_buffer: env
                .parse(
                    "STOCK_FEED_CONNECTION_BUFFER",
                    BroadcastSettings::default().connection_buffer,
                )
                .max(1),
            group_capacity: env
                .parse(
                    "STOCK_FEED_GROUP_CAPACITY",
                    BroadcastSettings::default().group_capacity,
                )
                .max(1),
            max_groups_per_connection: env
                .parse(
                    "STOCK_FEED_MAX_GROUPS_PER_CONNECTION",
                    BroadcastSettings::default().max_groups_per_connection,
                )
                .max(1),
        };

        let cors_allowed_origin = env.parse_optional("STOCK_FEED_CORS_ALLOWED_ORIGIN")?;
        let server = ServerSettings {
            http_port: env.parse("STOCK_FEED_HTTP_PORT", ServerSettings::default().http_port),
            cors_allowed_origin,
        };

        Ok(Self {
            origin,
            store,
            updates,
            broadcast,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is out of its allowed range.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Lookup wrapper with default-on-unparsable helpers.
struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.0)(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Like `parse`, but a present value that does not parse is an error.
    fn parse_strict<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_optional(key)?.unwrap_or(default))
    }

    /// Unset or blank is `None`; anything else must parse.
    fn parse_optional<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        (self.0)(key)
            .filter(|v| !v.trim().is_empty())
            .map(|raw| {
                raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{raw:?}: {e}"),
                })
            })
            .transpose()
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        (self.0)(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }
}
