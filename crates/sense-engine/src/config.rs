//! Configuration for the engine client
//!
//! Provides:
//! - `EngineConfig` with serde defaults
//! - Config file discovery (explicit path, env var, user config dir)
//! - Environment variable overrides
//! - Validation of endpoint and timeouts

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default platform endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// Default header carrying the bound identity
pub const DEFAULT_IDENTITY_HEADER: &str = "X-User-Id";

/// How `delete_resource` treats a resource's streams and parsers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// One DELETE for the resource; the platform removes its children
    #[default]
    Cascade,
    /// Delete parsers, then streams, then the resource, one request each
    Explicit,
}

impl std::str::FromStr for DeletePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cascade" => Ok(DeletePolicy::Cascade),
            "explicit" => Ok(DeletePolicy::Explicit),
            other => Err(ConfigError::ValidationError(format!(
                "Invalid delete policy: {other}. Must be one of: [\"cascade\", \"explicit\"]"
            ))),
        }
    }
}

/// Engine client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base address of the platform API
    pub endpoint: String,

    /// Account identity bound at construction
    pub identity: String,

    /// Platform API key, sent as the `key` query parameter when set
    pub api_key: Option<String>,

    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// User-Agent header
    pub user_agent: String,

    /// Header that carries the identity
    pub identity_header: String,

    /// Child handling for resource deletion
    pub delete_policy: DeletePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            identity: String::new(),
            api_key: None,
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: format!("sense-engine/{}", env!("CARGO_PKG_VERSION")),
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            delete_policy: DeletePolicy::Cascade,
        }
    }
}

impl EngineConfig {
    /// Create a config for an endpoint and identity, other fields default
    pub fn new(endpoint: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config);
        config
    }

    /// Set the request timeout, rounded up to whole milliseconds
    ///
    /// `Duration::ZERO` stays zero and fails validation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Parse and check the endpoint
    pub fn endpoint_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(self.endpoint.trim()).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid endpoint {}: {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid endpoint scheme: {}. Must be http or https",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError(format!(
                "Endpoint cannot carry a path: {}",
                self.endpoint
            )));
        }
        Ok(url)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.endpoint_url()?;

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Request timeout cannot be 0".to_string(),
            ));
        }

        if self.identity_header.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Identity header name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut EngineConfig) {
    if let Ok(val) = std::env::var("SENSE_ENDPOINT") {
        config.endpoint = val;
    }
    if let Ok(val) = std::env::var("SENSE_IDENTITY") {
        config.identity = val;
    }
    if let Ok(val) = std::env::var("SENSE_API_KEY") {
        config.api_key = Some(val);
    }
    if let Ok(val) = std::env::var("SENSE_TIMEOUT_MS") {
        match val.parse() {
            Ok(ms) => config.timeout_ms = ms,
            Err(_) => warn!("Ignoring invalid SENSE_TIMEOUT_MS: {}", val),
        }
    }
    if let Ok(val) = std::env::var("SENSE_DELETE_POLICY") {
        match val.parse() {
            Ok(policy) => config.delete_policy = policy,
            Err(e) => warn!("Ignoring SENSE_DELETE_POLICY: {}", e),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if given explicitly)
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Set an explicit config path
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. Explicit path
    /// 2. SENSE_CONFIG environment variable
    /// 3. <user config dir>/sense-engine/config.toml
    /// 4. Default values
    ///
    /// Environment variable overrides are applied on top.
    pub fn load(&self) -> ConfigResult<EngineConfig> {
        let mut config = match self.find_config_file() {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                EngineConfig::default()
            }
        };

        apply_env_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("Config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("SENSE_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("SENSE_CONFIG path does not exist: {}", env_path);
        }

        Self::default_config_path().filter(|path| path.exists())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<EngineConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path for the current platform
    pub fn default_config_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("sense-engine").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.identity_header, "X-User-Id");
        assert_eq!(config.delete_policy, DeletePolicy::Cascade);
        assert!(config.api_key.is_none());
        assert!(config.user_agent.starts_with("sense-engine/"));
    }

    #[test]
    fn test_duration_helpers() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));

        let config = config.with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout_ms, 250);
    }

    #[test]
    fn test_sub_millisecond_timeout_rounds_up() {
        let config = EngineConfig::new("http://localhost:8080", "1")
            .with_timeout(Duration::from_micros(500));
        assert_eq!(config.timeout_ms, 1);
        assert!(config.validate().is_ok());

        let config = config.with_timeout(Duration::from_micros(1500));
        assert_eq!(config.timeout_ms, 2);

        let config = config.with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            endpoint = "https://sense.example.org/api"
            identity = "1"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "https://sense.example.org/api");
        assert_eq!(config.identity, "1");
        // Other fields should be default
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.delete_policy, DeletePolicy::Cascade);
    }

    #[test]
    fn test_parse_delete_policy() {
        let config: EngineConfig = toml::from_str(r#"delete_policy = "explicit""#).unwrap();
        assert_eq!(config.delete_policy, DeletePolicy::Explicit);
        assert_eq!("CASCADE".parse::<DeletePolicy>().unwrap(), DeletePolicy::Cascade);
        assert!("sometimes".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        assert!(EngineConfig::new("not a url", "1").validate().is_err());
        assert!(EngineConfig::new("ftp://sense.example.org", "1").validate().is_err());
        assert!(EngineConfig::new("mailto:ops@example.org", "1").validate().is_err());
        assert!(EngineConfig::new("http://127.0.0.1:9000", "1").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = EngineConfig {
            timeout_ms: 0,
            ..EngineConfig::new(DEFAULT_ENDPOINT, "1")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("timeout")
        ));
    }

    #[test]
    fn test_loader_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "endpoint = \"http://10.0.0.5:8080\"\nidentity = \"7\"\ntimeout_ms = 1500"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.endpoint, "http://10.0.0.5:8080");
        assert_eq!(config.identity, "7");
        assert_eq!(config.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_loader_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms = \"soon\"").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
