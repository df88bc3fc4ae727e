//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tourney::{
    ingestion::IngestionPolicy,
    observer::FetchPolicy,
    tournament::{FailurePolicy, TournamentConfig, recommended_rounds},
    validation::ResponseSchema,
};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API bind address
    pub bind: SocketAddr,
    /// Base URL of the game server
    pub game_server: String,
    /// Prometheus exporter bind address, disabled when `None`
    pub metrics_bind: Option<SocketAddr>,
    /// Player names in registration order
    pub players: Vec<String>,
    /// Tournament settings handed to the controller
    pub tournament: TournamentConfig,
}

/// Command-line overrides, applied on top of the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub game_server: Option<String>,
    pub rounds: Option<u32>,
    pub players: Option<String>,
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but malformed, or the schema
    /// file cannot be read
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_env_or("SERVER_BIND", default_bind())?,
        };

        let game_server = overrides
            .game_server
            .or_else(|| std::env::var("GAME_SERVER_URL").ok())
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

        let metrics_bind = match overrides.metrics_bind {
            Some(addr) => Some(addr),
            None => parse_env_opt("METRICS_BIND")?,
        };

        let players = overrides
            .players
            .or_else(|| std::env::var("TOURNAMENT_PLAYERS").ok())
            .map(|list| split_players(&list))
            .unwrap_or_default();

        let name = std::env::var("TOURNAMENT_NAME").unwrap_or_else(|_| "Swiss Open".to_string());
        let rounds = match overrides.rounds {
            Some(rounds) => rounds,
            None => parse_env_or("TOURNAMENT_ROUNDS", recommended_rounds(players.len()))?,
        };

        let defaults = FetchPolicy::default();
        let fetch = FetchPolicy {
            max_attempts: parse_env_or("FETCH_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay: parse_millis_or("FETCH_BASE_DELAY_MS", defaults.base_delay)?,
            max_delay: parse_millis_or("FETCH_MAX_DELAY_MS", defaults.max_delay)?,
            attempt_timeout: parse_millis_or("FETCH_TIMEOUT_MS", defaults.attempt_timeout)?,
            jitter_ratio: parse_env_or("FETCH_JITTER_RATIO", defaults.jitter_ratio)?,
            seed: parse_env_opt("FETCH_SEED")?,
        };

        let defaults = IngestionPolicy::default();
        let ingestion = IngestionPolicy {
            poll_interval: parse_millis_or("POLL_INTERVAL_MS", defaults.poll_interval)?,
            validation_allowance: parse_env_or(
                "VALIDATION_ALLOWANCE",
                defaults.validation_allowance,
            )?,
            fetch_failure_ceiling: parse_env_or(
                "FETCH_FAILURE_CEILING",
                defaults.fetch_failure_ceiling,
            )?,
        };

        let failure_policy = match std::env::var("FAILURE_POLICY").ok().as_deref() {
            None | Some("void") => FailurePolicy::VoidPairing,
            Some("leave") => FailurePolicy::LeavePending,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "FAILURE_POLICY".to_string(),
                    reason: format!("Unknown policy {other:?}, expected \"void\" or \"leave\""),
                });
            }
        };

        let schema = match std::env::var("RESPONSE_SCHEMA_FILE").ok() {
            Some(path) => load_schema(PathBuf::from(path))?,
            None => ResponseSchema::default(),
        };

        let mut tournament = TournamentConfig {
            require_after_bye: parse_env_or("REQUIRE_AFTER_BYE", true)?,
            failure_policy,
            fetch,
            ingestion,
            schema,
            ..TournamentConfig::swiss(name, rounds)
        };
        tournament.pairing.allow_repeat_pairings = parse_env_or("ALLOW_REPEAT_PAIRINGS", false)?;

        Ok(ServerConfig {
            bind,
            game_server,
            metrics_bind,
            players,
            tournament,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.game_server.starts_with("http://") || self.game_server.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "GAME_SERVER_URL".to_string(),
                reason: "Must be an http:// or https:// URL".to_string(),
            });
        }

        if self.tournament.rounds == 0 {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_ROUNDS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.players.len() < self.tournament.min_players {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_PLAYERS".to_string(),
                reason: format!(
                    "Need at least {} players, got {}",
                    self.tournament.min_players,
                    self.players.len()
                ),
            });
        }

        if self.tournament.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "FETCH_MAX_ATTEMPTS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.tournament.fetch.jitter_ratio) {
            return Err(ConfigError::Invalid {
                var: "FETCH_JITTER_RATIO".to_string(),
                reason: "Must be between 0 and 1".to_string(),
            });
        }

        if self.tournament.fetch.base_delay > self.tournament.fetch.max_delay {
            return Err(ConfigError::Invalid {
                var: "FETCH_BASE_DELAY_MS".to_string(),
                reason: "Must not exceed FETCH_MAX_DELAY_MS".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    SchemaFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid response schema in {path}: {source}")]
    Schema {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

/// Comma-separated player names, blanks dropped
fn split_players(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_schema(path: PathBuf) -> Result<ResponseSchema, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::SchemaFile {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Schema { path, source })
}

/// Helper to parse environment variable with default fallback.
/// A set but unparseable value is an error.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    Ok(parse_env_opt(key)?.unwrap_or(default))
}

fn parse_env_opt<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse {value:?}"),
        }),
        Err(_) => Ok(None),
    }
}

fn parse_millis_or(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(parse_env_opt::<u64>(key)?
        .map(Duration::from_millis)
        .unwrap_or(default))
}
