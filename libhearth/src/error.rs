//! Error types for Hearth

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HearthError>;

#[derive(Error, Debug)]
pub enum HearthError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Live channel error: {0}")]
    Live(#[from] LiveError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HearthError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HearthError::InvalidInput(_) => 3,
            HearthError::Api(ApiError::NotAuthenticated(_)) => 2,
            HearthError::Api(_) => 1,
            HearthError::Live(_) => 1,
            HearthError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failures at the REST boundary
///
/// Cloneable so that mocks can replay the same failure more than once.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Validation failed ({code}): {message}")]
    Validation { code: String, message: String },

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Machine-readable validation code, if the server sent one
    pub fn validation_code(&self) -> Option<&str> {
        match self {
            ApiError::Validation { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for LiveError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Io(e) => LiveError::Connect(e.to_string()),
            WsError::Url(e) => LiveError::InvalidUrl(e.to_string()),
            other => LiveError::Protocol(other.to_string()),
        }
    }
}
