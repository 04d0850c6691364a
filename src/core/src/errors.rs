//! Error types for the core crate.

use std::fmt;
use thiserror::Error;

/// The individual check of a proof verification that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofCheck {
    /// The proof has the wrong shape for the requested statement.
    Shape,
    /// The authenticator signature does not verify over the transaction hash.
    Authenticator,
    /// The authenticator does not hash to the expected request id.
    RequestId,
    /// The Merkle path does not follow the request id bits.
    Path,
    /// The path does not hash to its declared root.
    Root,
    /// The root is not the one committed by the unicity certificate.
    Certificate,
    /// The certificate signatures do not reach the quorum threshold.
    Quorum,
}

impl fmt::Display for ProofCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProofCheck::Shape => "proof shape",
            ProofCheck::Authenticator => "authenticator signature",
            ProofCheck::RequestId => "request id",
            ProofCheck::Path => "merkle path",
            ProofCheck::Root => "merkle root",
            ProofCheck::Certificate => "unicity certificate",
            ProofCheck::Quorum => "certificate quorum",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the core crate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Error when an address string is malformed or fails its checksum.
    #[error("Invalid address: {0}")]
    AddressFormat(String),

    /// Error when a derived address differs from the expected one.
    #[error("Predicate mismatch: expected address {expected}, derived {actual}")]
    PredicateMismatch {
        /// The address the caller expected
        expected: String,
        /// The address derived from the predicate
        actual: String,
    },

    /// Error when an authenticator does not verify or uses the wrong key.
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// Error when a recomputed hash differs from the committed hash.
    #[error("Data integrity violation at {hop}: {reason}")]
    DataIntegrity {
        /// The hop of the chain where the violation was found
        hop: String,
        /// What did not match
        reason: String,
    },

    /// Error when an inclusion or exclusion proof does not verify.
    #[error("Proof verification failed ({check}): {reason}")]
    ProofVerification {
        /// The check that failed
        check: ProofCheck,
        /// Details of the failure
        reason: String,
    },

    /// Error when a state expected to be unspent has an inclusion proof.
    #[error("State already spent: request {0}")]
    AlreadySpent(String),

    /// Error when a lifecycle transition is not allowed from the current state.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The current state
        from: String,
        /// The requested state
        to: String,
    },

    /// Error when serialization or deserialization fails.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    pub(crate) fn proof(check: ProofCheck, reason: impl Into<String>) -> Self {
        CoreError::ProofVerification {
            check,
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(hop: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::DataIntegrity {
            hop: hop.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::Serialization(error.to_string())
    }
}
