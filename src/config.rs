//! # Configuration
//!
//! Settings for the query client, loadable from TOML, environment variables
//! or plain defaults.
//!
//! ```toml
//! [client]
//! address = "199.255.40.171:28902"
//! timeout = 10000            # milliseconds, 0 disables the deadline
//! credential_file = "keys.txt"
//! query_header = 256
//!
//! [logging]
//! app_name = "master-query"
//! log_level = "info"
//! json_format = false
//! ```
//!
//! A zero timeout waits forever on every read, which is only sensible
//! against a trusted server.

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Well-known master server address
pub const DEFAULT_MASTER_ADDRESS: &str = "199.255.40.171:28902";

/// Default credential file name
pub const DEFAULT_KEY_FILE: &str = "keys.txt";

/// Query header for a single filter term
pub const DEFAULT_QUERY_HEADER: u16 = 256;

const ENV_ADDRESS: &str = "MASTER_QUERY_ADDRESS";
const ENV_TIMEOUT_MS: &str = "MASTER_QUERY_TIMEOUT_MS";
const ENV_KEY_FILE: &str = "MASTER_QUERY_KEY_FILE";

/// Top-level configuration; missing sections fall back to defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MasterConfig {
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

impl MasterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid TOML: {e}")))
    }

    /// Defaults overridden by `MASTER_QUERY_ADDRESS`, `MASTER_QUERY_TIMEOUT_MS`
    /// and `MASTER_QUERY_KEY_FILE` when set
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        let client = &mut config.client;

        if let Ok(address) = std::env::var(ENV_ADDRESS) {
            client.address = address;
        }
        if let Ok(raw) = std::env::var(ENV_TIMEOUT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|e| {
                ProtocolError::ConfigError(format!("{ENV_TIMEOUT_MS}={raw:?}: {e}"))
            })?;
            client.timeout = Duration::from_millis(millis);
        }
        if let Some(path) = std::env::var_os(ENV_KEY_FILE) {
            client.credential_file = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Defaults with `edit` applied, handy in tests
    pub fn default_with_overrides(edit: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        edit(&mut config);
        config
    }

    /// Default configuration rendered as TOML
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("# unable to render defaults: {e}\n"))
    }

    /// Every problem found, empty when the configuration is usable
    pub fn validate(&self) -> Vec<String> {
        self.client
            .validate()
            .into_iter()
            .chain(self.logging.validate())
            .collect()
    }

    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            problems.join("\n  - ")
        )))
    }
}

/// Connection settings for one master server
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` of the master server
    pub address: String,

    /// Connect, read and write timeout in milliseconds; zero disables it
    #[serde(with = "millis")]
    pub timeout: Duration,

    /// File holding the credential on its first line
    pub credential_file: PathBuf,

    /// Header sent in front of single-term queries
    pub query_header: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_MASTER_ADDRESS.to_string(),
            timeout: timeout::DEFAULT_TIMEOUT,
            credential_file: PathBuf::from(DEFAULT_KEY_FILE),
            query_header: DEFAULT_QUERY_HEADER,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some((host, port)) = self.address.rsplit_once(':') {
            if host.is_empty() {
                problems.push("Master address host cannot be empty".to_string());
            }
            if !matches!(port.parse::<u16>(), Ok(p) if p != 0) {
                problems.push(format!("Invalid master address port: '{port}'"));
            }
        } else {
            problems.push(format!(
                "Invalid master address format: '{}' (expected 'host:port')",
                self.address
            ));
        }

        if self.timeout > timeout::MAX_TIMEOUT {
            problems.push(format!(
                "Timeout too long: {}ms (maximum {}ms, 0 disables)",
                self.timeout.as_millis(),
                timeout::MAX_TIMEOUT.as_millis()
            ));
        }

        if self.credential_file.as_os_str().is_empty() {
            problems.push("Credential file path cannot be empty".to_string());
        }

        problems
    }
}

/// Subscriber settings used by [`init_logging`](crate::utils::logging::init_logging)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub app_name: String,

    /// Level used when `RUST_LOG` is not set
    #[serde(with = "level")]
    pub log_level: Level,

    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        match self.app_name.len() {
            0 => vec!["Application name cannot be empty".to_string()],
            n if n > 64 => vec![format!(
                "Application name too long: {n} characters (maximum: 64)"
            )],
            _ => Vec::new(),
        }
    }
}

/// `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// `tracing::Level` as a lowercase name
mod level {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(value: &Level, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Level, D::Error> {
        let name = String::deserialize(d)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("Invalid log level: {name}")))
    }
}
