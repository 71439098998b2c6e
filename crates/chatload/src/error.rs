//! Error types for the chatload harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while configuring or driving a load test
///
/// None of these are raised for behaviour of the system under test. Rate limiting,
/// unexpected statuses and malformed bodies are reported as checks and outcomes instead.
#[derive(Error, Debug)]
pub enum HarnessError {
    // === Configuration ===
    /// Configuration sources could not be read or merged
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Transport ===
    /// HTTP request produced no status (connect failure, timeout, client build)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest `JobApi`
    #[error("Transport error: {0}")]
    Transport(String),

    // === Reporting ===
    /// Metric registration, histogram creation or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for HarnessError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}

impl From<hdrhistogram::CreationError> for HarnessError {
    fn from(err: hdrhistogram::CreationError) -> Self {
        Self::Metrics(err.to_string())
    }
}

impl HarnessError {
    /// Whether the error came from the transport rather than the harness itself
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Transport(_))
    }
}
