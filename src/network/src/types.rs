//! Aggregator protocol messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use txf_core::types::{hex_array, Hash};
use txf_core::{Authenticator, Commitment, RequestId, TransactionData};

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outcome of a commitment submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitStatus {
    Success,
    /// The authenticator does not sign the transaction hash.
    AuthenticatorVerificationFailed,
    /// The request id is not the one the authenticator derives.
    RequestIdMismatch,
    /// A different commitment was already recorded under the request id.
    RequestIdExists,
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SubmitStatus::Success => "SUCCESS",
            SubmitStatus::AuthenticatorVerificationFailed => "AUTHENTICATOR_VERIFICATION_FAILED",
            SubmitStatus::RequestIdMismatch => "REQUEST_ID_MISMATCH",
            SubmitStatus::RequestIdExists => "REQUEST_ID_EXISTS",
        };
        f.write_str(text)
    }
}

/// Parameters of `submit_commitment`.
///
/// Only the request id, transaction hash and authenticator leave the client; the
/// transaction data itself stays offchain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommitmentRequest {
    pub request_id: RequestId,
    #[serde(with = "hex_array")]
    pub transaction_hash: Hash,
    pub authenticator: Authenticator,
    #[serde(default)]
    pub receipt: bool,
}

impl SubmitCommitmentRequest {
    pub fn from_commitment<T: TransactionData>(commitment: &Commitment<T>) -> Self {
        Self {
            request_id: commitment.request_id,
            transaction_hash: commitment.transaction_hash(),
            authenticator: commitment.authenticator.clone(),
            receipt: false,
        }
    }
}

/// Result of `submit_commitment`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCommitmentResponse {
    pub status: SubmitStatus,
}

/// Parameters of `get_inclusion_proof`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInclusionProofRequest {
    pub request_id: RequestId,
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: P,
}

impl<P> JsonRpcRequest<P> {
    pub fn new(id: u64, method: &str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct JsonRpcResponse<R> {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<R>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}
