//! Configuration management for simPodo.
//!
//! Loads configuration from environment variables (and `.env` when present)
//! with defaults for everything but the database URL.

use simpodo_core::environment::DisplayPreference;
use simpodo_postgres::PostgresConfig;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default tracing filter when `SIMPODO_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "simpodo=info,simpodo_runtime=info";

/// Invalid configuration value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value {value:?} for {var}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres settings; `None` selects the in-memory repository
    pub database: Option<PostgresConfig>,
    /// `EnvFilter` directives for tracing
    pub log_filter: String,
    /// Host asks for a dark color scheme
    pub prefers_dark: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            prefers_dark: false,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` if a numeric or boolean variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` if a numeric or boolean variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = match lookup("DATABASE_URL") {
            Some(url) => {
                let mut database = PostgresConfig::new(url);
                if let Some(max) = parse(&lookup, "DATABASE_MAX_CONNECTIONS")? {
                    database = database.with_max_connections(max);
                }
                if let Some(secs) = parse(&lookup, "DATABASE_CONNECT_TIMEOUT")? {
                    database = database.with_connect_timeout(Duration::from_secs(secs));
                }
                Some(database)
            },
            None => None,
        };

        Ok(Self {
            database,
            log_filter: lookup("SIMPODO_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            prefers_dark: parse(&lookup, "SIMPODO_PREFERS_DARK")?.unwrap_or(false),
        })
    }

    /// Set the Postgres settings
    #[must_use]
    pub fn with_database(mut self, database: PostgresConfig) -> Self {
        self.database = Some(database);
        self
    }

    /// Set the tracing filter
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Set the dark scheme preference
    #[must_use]
    pub const fn with_prefers_dark(mut self, prefers_dark: bool) -> Self {
        self.prefers_dark = prefers_dark;
        self
    }
}

impl DisplayPreference for Config {
    fn prefers_dark(&self) -> bool {
        self.prefers_dark
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }))
        .transpose()
}
