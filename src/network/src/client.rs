//! The narrow interface to an aggregator.

use crate::errors::NetworkError;
use crate::types::SubmitCommitmentRequest;
use async_trait::async_trait;
use txf_core::{InclusionProof, RequestId};

/// An aggregator that records commitments and issues proofs for request ids.
///
/// `get_inclusion_proof` always returns a proof: an inclusion proof once the request
/// is certified, an exclusion proof before that. A missing answer is an error, never
/// an exclusion.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Submits a signed commitment and returns the request id it was recorded under.
    async fn submit_commitment(
        &self,
        request: &SubmitCommitmentRequest,
    ) -> Result<RequestId, NetworkError>;

    /// Fetches the current proof for `request_id`.
    async fn get_inclusion_proof(&self, request_id: &RequestId) -> Result<InclusionProof, NetworkError>;
}
