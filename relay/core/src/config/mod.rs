//! TOML Configuration File Support
//!
//! Configuration for the reader and the HTTP stream source, loaded from
//! `~/.config/relay/relay.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (when applicable)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/relay/relay.toml` (typically `~/.config/relay/relay.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [reader]
//! cancel_on_conversation_switch = false
//!
//! [endpoint]
//! base_url = "http://localhost:8000"
//! chat_path = "/api/chat/stream"
//! agent_path = "/api/agent-chat/stream"
//! stop_path = "/api/agent-chat/stop"
//! request_timeout_secs = 120
//!
//! [logging]
//! filter = "relay_core=debug"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Setting |
//! |---|---|
//! | `RELAY_BASE_URL` | `endpoint.base_url` |
//! | `RELAY_REQUEST_TIMEOUT` | `endpoint.request_timeout_secs` |
//! | `RELAY_CANCEL_ON_SWITCH` | `reader.cancel_on_conversation_switch` |
//! | `RELAY_LOG` | `logging.filter` |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Reader section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderToml {
    /// Cancel reads whose conversation is no longer the active one
    pub cancel_on_conversation_switch: Option<bool>,
}

/// Endpoint section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointToml {
    /// Server base URL
    pub base_url: Option<String>,

    /// Path of the chat streaming endpoint
    pub chat_path: Option<String>,

    /// Path of the agent streaming endpoint
    pub agent_path: Option<String>,

    /// Path prefix of the agent stop endpoint
    pub stop_path: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Logging section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingToml {
    /// `tracing` filter directives
    pub filter: Option<String>,
}

/// Root of the TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayToml {
    /// Reader settings
    pub reader: ReaderToml,

    /// Endpoint settings
    pub endpoint: EndpointToml,

    /// Logging settings
    pub logging: LoggingToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Stream reader behavior
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Treat a conversation switch as loss of liveness
    ///
    /// When false only the stream token gates a read, so streams for
    /// conversations in the background keep accumulating.
    pub cancel_on_conversation_switch: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cancel_on_conversation_switch: true,
        }
    }
}

/// Streaming server endpoints
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Server base URL
    pub base_url: String,

    /// Path of the chat streaming endpoint
    pub chat_path: String,

    /// Path of the agent streaming endpoint
    pub agent_path: String,

    /// Path prefix of the agent stop endpoint; the conversation id is appended
    pub stop_path: String,

    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            chat_path: "/api/chat/stream".to_string(),
            agent_path: "/api/agent-chat/stream".to_string(),
            stop_path: "/api/agent-chat/stop".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl EndpointConfig {
    /// Full URL of `path` on the configured server
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Complete configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Reader settings
    pub reader: ReaderConfig,

    /// Endpoint settings
    pub endpoint: EndpointConfig,

    /// `tracing` filter directives
    pub log_filter: String,

    /// Path to the config file (if loaded from file)
    pub config_file_path: Option<PathBuf>,

    /// Where the configuration was loaded from
    source: ConfigSource,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            endpoint: EndpointConfig::default(),
            log_filter: "relay_core=info".to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RelayConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the configuration source
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.endpoint.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint.base_url must not be empty".to_string(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint.base_url must be an http(s) URL, got {base_url}"
            )));
        }
        if self.endpoint.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "endpoint.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/relay/relay.toml` or `~/.config/relay/relay.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("relay").join("relay.toml"))
}

/// Load configuration from the default path
///
/// A missing file is not an error; defaults are used.
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then apply the environment
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn load_file_config(path: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: RelayToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

fn apply_toml_config(config: &mut RelayConfig, toml: &RelayToml) {
    if let Some(cancel) = toml.reader.cancel_on_conversation_switch {
        config.reader.cancel_on_conversation_switch = cancel;
    }

    if let Some(ref url) = toml.endpoint.base_url {
        config.endpoint.base_url = url.clone();
    }
    if let Some(ref path) = toml.endpoint.chat_path {
        config.endpoint.chat_path = path.clone();
    }
    if let Some(ref path) = toml.endpoint.agent_path {
        config.endpoint.agent_path = path.clone();
    }
    if let Some(ref path) = toml.endpoint.stop_path {
        config.endpoint.stop_path = path.clone();
    }
    if let Some(secs) = toml.endpoint.request_timeout_secs {
        config.endpoint.request_timeout = Duration::from_secs(secs);
    }

    if let Some(ref filter) = toml.logging.filter {
        config.log_filter = filter.clone();
    }
}

fn apply_env_config(config: &mut RelayConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("RELAY_BASE_URL") {
        config.endpoint.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = var("RELAY_REQUEST_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.endpoint.request_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(cancel) = var("RELAY_CANCEL_ON_SWITCH") {
        config.reader.cancel_on_conversation_switch =
            cancel != "0" && cancel.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(filter) = var("RELAY_LOG") {
        config.log_filter = filter;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// CLI overrides that can be applied on top of file/env config
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Override server base URL
    pub base_url: Option<String>,

    /// Override request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Override conversation-switch cancellation
    pub cancel_on_conversation_switch: Option<bool>,

    /// Override log filter
    pub log_filter: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Set conversation-switch cancellation override
    #[must_use]
    pub fn with_cancel_on_conversation_switch(mut self, cancel: bool) -> Self {
        self.cancel_on_conversation_switch = Some(cancel);
        self
    }

    /// Set log filter override
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut RelayConfig) {
        if self.base_url.is_some()
            || self.request_timeout_secs.is_some()
            || self.cancel_on_conversation_switch.is_some()
            || self.log_filter.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.endpoint.base_url = url.clone();
        }
        if let Some(secs) = self.request_timeout_secs {
            config.endpoint.request_timeout = Duration::from_secs(secs);
        }
        if let Some(cancel) = self.cancel_on_conversation_switch {
            config.reader.cancel_on_conversation_switch = cancel;
        }
        if let Some(ref filter) = self.log_filter {
            config.log_filter = filter.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert!(config.reader.cancel_on_conversation_switch);
        assert_eq!(config.endpoint.base_url, "http://localhost:8000");
        assert_eq!(config.endpoint.chat_path, "/api/chat/stream");
        assert_eq!(config.endpoint.agent_path, "/api/agent-chat/stream");
        assert_eq!(config.endpoint.stop_path, "/api/agent-chat/stop");
        assert_eq!(config.endpoint.request_timeout, Duration::from_secs(120));
        assert_eq!(config.log_filter, "relay_core=info");
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("relay/relay.toml"));
        }
    }

    #[test]
    fn test_endpoint_url_joins_slashes() {
        let mut endpoint = EndpointConfig::default();
        endpoint.base_url = "http://example.test/".to_string();
        assert_eq!(
            endpoint.url("/api/chat/stream"),
            "http://example.test/api/chat/stream"
        );
        assert_eq!(endpoint.url("x"), "http://example.test/x");
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let file = write_config(
            r#"
[reader]
cancel_on_conversation_switch = false

[endpoint]
base_url = "https://relay.example"
agent_path = "/v2/agent"
request_timeout_secs = 30

[logging]
filter = "relay_core=trace"
"#,
        );

        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        assert!(!config.reader.cancel_on_conversation_switch);
        assert_eq!(config.endpoint.base_url, "https://relay.example");
        assert_eq!(config.endpoint.agent_path, "/v2/agent");
        assert_eq!(config.endpoint.chat_path, "/api/chat/stream");
        assert_eq!(config.endpoint.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_filter, "relay_core=trace");
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path, Some(file.path().to_path_buf()));
    }

    #[test]
    fn test_parse_empty_toml() {
        let file = write_config("");
        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        assert!(config.reader.cancel_on_conversation_switch);
        assert_eq!(config.endpoint, EndpointConfig::default());
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_missing_file_graceful() {
        let path = PathBuf::from("/nonexistent/path/relay.toml");
        let config = load_file_config(Some(path)).unwrap();

        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = write_config(
            r#"
[endpoint
request_timeout_secs = "soon"
"#,
        );

        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let file = write_config("[endpoint]\nrequest_timeout_secs = \"soon\"\n");
        let result = load_file_config(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    // =========================================================================
    // Priority Ordering Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[endpoint]\nbase_url = \"http://from-file\"\n");
        let mut config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        apply_env_config(
            &mut config,
            env(&[
                ("RELAY_BASE_URL", "http://from-env"),
                ("RELAY_CANCEL_ON_SWITCH", "false"),
                ("RELAY_REQUEST_TIMEOUT", "not-a-number"),
            ]),
        );

        assert_eq!(config.endpoint.base_url, "http://from-env");
        assert!(!config.reader.cancel_on_conversation_switch);
        assert_eq!(config.endpoint.request_timeout, Duration::from_secs(120));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_empty_env_keeps_source() {
        let mut config = RelayConfig::default();
        apply_env_config(&mut config, env(&[]));
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = RelayConfig::default();
        apply_env_config(&mut config, env(&[("RELAY_LOG", "relay_core=warn")]));

        ConfigOverrides::new()
            .with_log_filter("relay_core=debug")
            .with_request_timeout_secs(5)
            .with_cancel_on_conversation_switch(false)
            .apply(&mut config);

        assert_eq!(config.log_filter, "relay_core=debug");
        assert_eq!(config.endpoint.request_timeout, Duration::from_secs(5));
        assert!(!config.reader.cancel_on_conversation_switch);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let mut config = RelayConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.endpoint.base_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = RelayConfig::default();
        config.endpoint.base_url = "localhost:8000".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        ConfigOverrides::new()
            .with_request_timeout_secs(0)
            .apply(&mut config);
        assert!(config.validate().is_err());
    }
}
