//! Client configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. a TOML file (`costsmap.toml` in the working directory when present, or
//!    an explicit path)
//! 3. environment variables prefixed with `COSTSMAP_`, e.g. `COSTSMAP_BASE_URL`

use std::path::{Path, PathBuf};
use std::time::Duration;

use costsmap_application::auth::{SESSION_KEY, SessionSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{DEFAULT_USER_AGENT, parse_base_url};

/// Name of the optional configuration file, without extension.
pub const CONFIG_FILE_NAME: &str = "costsmap";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "COSTSMAP";

/// Errors raised while loading configuration or building clients from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// No base URL was provided.
    #[error("base_url is required")]
    MissingBaseUrl,

    /// The base URL is not an http(s) URL.
    #[error("invalid base_url {url}: {reason}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric setting is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Setting name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be created.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// No per-user configuration directory exists on this platform.
    #[error("no configuration directory available; set session_path")]
    NoConfigDir,
}

/// Settings of the CostsMap client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL of the REST API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Session file location; defaults to `<config dir>/costsmap/session.json`.
    pub session_path: Option<PathBuf>,
    /// Lifetime of the persisted session, in days.
    pub refresh_token_ttl_days: u64,
    /// Access token lifetime assumed when tokens carry no `exp` claim.
    pub access_token_ttl_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_path: None,
            refresh_token_ttl_days: 30,
            access_token_ttl_secs: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from defaults, the optional `costsmap.toml` file
    /// and `COSTSMAP_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(config::File::with_name(CONFIG_FILE_NAME).required(false))
    }

    /// Loads configuration from the given file (which must exist) and
    /// `COSTSMAP_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or a value is
    /// invalid.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::from_sources(config::File::from(path).required(true))
    }

    fn from_sources<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed base URL or a zero duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_base_url(&self.base_url)?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.refresh_token_ttl_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_token_ttl_days",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Lifetime of the persisted session.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_days.saturating_mul(24 * 60 * 60))
    }

    /// Session manager settings derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            storage_key: SESSION_KEY.to_string(),
            session_ttl: self.session_ttl(),
            access_token_lifetime: self.access_token_ttl_secs.map(Duration::from_secs),
        }
    }

    /// Resolves the session file location.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the platform has no
    /// configuration directory.
    pub fn session_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.session_path {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("costsmap").join("session.json"))
            .ok_or(ConfigError::NoConfigDir)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_ttl(), Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(config.session_settings().storage_key, "session");
        assert_eq!(config.session_settings().access_token_lifetime, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://costsmap.example.com"
timeout_secs = 5
access_token_ttl_secs = 1800
session_path = "/tmp/costsmap-session.json"
"#
        )
        .unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();

        assert_eq!(config.base_url, "https://costsmap.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.refresh_token_ttl_days, 30);
        assert_eq!(
            config.session_settings().access_token_lifetime,
            Some(Duration::from_secs(1800))
        );
        assert_eq!(
            config.session_path().unwrap(),
            PathBuf::from("/tmp/costsmap-session.json")
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, r#"base_url = "localhost:8000""#).unwrap();

        assert!(matches!(
            ClientConfig::load_from(file.path()),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = ClientConfig {
            timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            ClientConfig::load_from(Path::new("/nonexistent/costsmap.toml")),
            Err(ConfigError::Load(_))
        ));
    }
}
