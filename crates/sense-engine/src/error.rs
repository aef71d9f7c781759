//! Error types for the sense-engine crate

use thiserror::Error;

/// Errors surfaced by [`Engine`](crate::Engine) operations
///
/// Every variant propagates to the caller unchanged. The engine never
/// retries and never rolls back earlier operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid construction arguments or locally rejected input
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP exchange could not complete (DNS, connect, timeout)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform answered with a non-success status
    #[error("Remote error: {status} - {body}")]
    Remote { status: u16, body: String },

    /// A success status whose body could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A typed payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a remote error from status and body
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        EngineError::Remote {
            status,
            body: body.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration(message.into())
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        EngineError::Protocol(message.into())
    }

    /// HTTP status carried by a remote error
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the platform reported the addressed entity as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Remote { status: 404 | 410, .. })
    }

    /// Check if this is a 4xx remote error
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    /// Check if this is a 5xx remote error
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Check if the exchange failed below HTTP
    pub fn is_transport(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
