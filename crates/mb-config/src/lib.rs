//! # mb-config
//!
//! Layered settings for the msgboard binary. Later layers win:
//!
//! 1. built-in defaults
//! 2. `config/msgboard.{toml,yaml,json}` (optional)
//! 3. `MSGBOARD_*` environment variables, `__` between nested keys
//!    (e.g. `MSGBOARD_DATABASE__URL`)
//! 4. the legacy `DATABASE_URI` and `PORT` variables
//!
//! A `.env` file in the working directory is loaded first when present.

use std::path::PathBuf;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub board: BoardSettings,
    pub hashing: HashingSettings,
    pub log: LogSettings,

    /// The `.env` file read by [`Settings::load`], if any.
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// `sqlite://...` for a SQLite file, `memory:` for a process-local store.
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct BoardSettings {
    /// Threads returned by a board listing.
    pub page_size: usize,
}

/// Argon2id cost parameters for delete-password hashes.
#[derive(Debug, Deserialize)]
pub struct HashingSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub json: bool,
}

impl Settings {
    /// A builder pre-populated with every default.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000_i64)?
            .set_default("database.url", "sqlite://msgboard.db")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("board.page_size", 10_i64)?
            .set_default("hashing.memory_kib", 19_456_i64)?
            .set_default("hashing.iterations", 2_i64)?
            .set_default("hashing.parallelism", 1_i64)?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)?)
    }

    /// Loads settings from every layer.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = dotenvy::dotenv().ok();

        let legacy_port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<i64>().ok());

        let builder = Self::builder()?
            .add_source(File::with_name("config/msgboard").required(false))
            .add_source(
                Environment::with_prefix("MSGBOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URI").ok())?
            .set_override_option("server.port", legacy_port)?;

        let mut settings = Self::from_builder(builder)?;
        settings.env_file = env_file;
        Ok(settings)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid("database.url must not be empty".into()));
        }
        if self.board.page_size == 0 {
            return Err(ConfigError::Invalid("board.page_size must be at least 1".into()));
        }
        if self.hashing.iterations == 0 || self.hashing.parallelism == 0 {
            return Err(ConfigError::Invalid(
                "hashing.iterations and hashing.parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::from_builder(Settings::builder().unwrap()).unwrap();

        assert_eq!(settings.bind_address(), ("127.0.0.1".to_string(), 3000));
        assert_eq!(settings.database.url.expose_secret(), "sqlite://msgboard.db");
        assert_eq!(settings.board.page_size, 10);
        assert_eq!(settings.hashing.iterations, 2);
        assert!(!settings.log.json);
        assert!(settings.env_file.is_none());
    }

    #[test]
    fn overrides_replace_defaults() {
        let builder = Settings::builder()
            .unwrap()
            .set_override("database.url", "memory:")
            .unwrap()
            .set_override("board.page_size", 25_i64)
            .unwrap();
        let settings = Settings::from_builder(builder).unwrap();

        assert_eq!(settings.database.url.expose_secret(), "memory:");
        assert_eq!(settings.board.page_size, 25);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let builder = Settings::builder()
            .unwrap()
            .set_override("board.page_size", 0_i64)
            .unwrap();
        assert!(matches!(Settings::from_builder(builder), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn database_url_is_redacted_in_debug_output() {
        let builder = Settings::builder()
            .unwrap()
            .set_override("database.url", "sqlite://secret-path.db")
            .unwrap();
        let settings = Settings::from_builder(builder).unwrap();
        assert!(!format!("{settings:?}").contains("secret-path"));
    }
}
