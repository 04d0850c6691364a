/// Error types for the network crate.
use crate::types::SubmitStatus;
use std::error::Error as StdError;
use std::fmt;
use txf_core::CoreError;

/// Errors that can occur at the aggregator boundary.
#[derive(Debug)]
pub enum NetworkError {
    /// Error when the aggregator does not answer in time.
    Timeout(String),

    /// Error when the aggregator cannot be reached.
    Transport(String),

    /// Error returned by the aggregator in a JSON-RPC error object.
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the aggregator
        message: String,
    },

    /// Error when a request or response cannot be (de)serialized.
    Serialization(String),

    /// Error when the aggregator refuses a commitment.
    Rejected(SubmitStatus),

    /// Error when a returned artifact fails verification.
    Core(CoreError),
}

impl NetworkError {
    /// Whether the same request may be sent again.
    ///
    /// Only transport-level failures qualify; anything the aggregator or the verifier
    /// decided is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NetworkError::Timeout(_) | NetworkError::Transport(_))
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Timeout(msg) => write!(f, "Timeout waiting for {}", msg),
            NetworkError::Transport(msg) => write!(f, "Transport error: {}", msg),
            NetworkError::Rpc { code, message } => {
                write!(f, "Aggregator error {}: {}", code, message)
            }
            NetworkError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            NetworkError::Rejected(status) => write!(f, "Commitment rejected: {}", status),
            NetworkError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for NetworkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            NetworkError::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for NetworkError {
    fn from(error: CoreError) -> Self {
        NetworkError::Core(error)
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(error: serde_json::Error) -> Self {
        NetworkError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            NetworkError::Timeout(error.to_string())
        } else if error.is_decode() {
            NetworkError::Serialization(error.to_string())
        } else {
            NetworkError::Transport(error.to_string())
        }
    }
}
