//! Error types for the command line client.

use std::error::Error as StdError;
use std::fmt;
use txf_core::CoreError;
use txf_network::NetworkError;

/// Errors that can occur in the command line client.
#[derive(Debug)]
pub enum CliError {
    /// Error when a file operation fails.
    FileError(std::io::Error),

    /// Error when JSON serialization or deserialization fails.
    JsonError(serde_json::Error),

    /// Error when a token, commitment or proof fails verification.
    Verification(CoreError),

    /// Error when talking to the aggregator fails.
    Network(NetworkError),

    /// Error when no secret was supplied.
    MissingSecret,

    /// Error when an argument cannot be used.
    InvalidArgument(String),

    /// Error when the configuration is incomplete.
    Config(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::FileError(e) => write!(f, "File error: {}", e),
            CliError::JsonError(e) => write!(f, "JSON error: {}", e),
            CliError::Verification(e) => write!(f, "{}", e),
            CliError::Network(e) => write!(f, "{}", e),
            CliError::MissingSecret => write!(f, "No secret given; pass --secret or set SECRET"),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl StdError for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        CliError::FileError(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        CliError::JsonError(error)
    }
}

impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        CliError::Verification(error)
    }
}

impl From<NetworkError> for CliError {
    fn from(error: NetworkError) -> Self {
        match error {
            NetworkError::Core(e) => CliError::Verification(e),
            other => CliError::Network(other),
        }
    }
}
