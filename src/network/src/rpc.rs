//! JSON-RPC client for a remote aggregator.

use crate::client::AggregatorClient;
use crate::errors::NetworkError;
use crate::types::{
    GetInclusionProofRequest, JsonRpcRequest, JsonRpcResponse, SubmitCommitmentRequest,
    SubmitCommitmentResponse, SubmitStatus,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use txf_core::{InclusionProof, RequestId};

/// Talks to an aggregator over HTTP JSON-RPC 2.0.
pub struct JsonRpcAggregatorClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

/// Makes sure the endpoint ends in `/rpc`.
fn rpc_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/rpc") {
        base.to_string()
    } else {
        format!("{}/rpc", base)
    }
}

impl JsonRpcAggregatorClient {
    /// Creates a client whose individual requests time out after `request_timeout`.
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NetworkError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: rpc_url(url),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, NetworkError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        debug!("calling {} on {} (id {})", method, self.url, id);

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if text.is_empty() {
            return Err(NetworkError::Transport(format!(
                "Empty response from aggregator (HTTP {})",
                status
            )));
        }

        let response: JsonRpcResponse<R> = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                NetworkError::Serialization(format!("Failed to parse response: {}", e))
            } else {
                NetworkError::Transport(format!("HTTP {}: {}", status, text))
            }
        })?;

        if let Some(error) = response.error {
            warn!("{} failed with code {}: {}", method, error.code, error.message);
            return Err(NetworkError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or_else(|| {
            NetworkError::Serialization(format!("{} response has neither result nor error", method))
        })
    }
}

#[async_trait]
impl AggregatorClient for JsonRpcAggregatorClient {
    async fn submit_commitment(
        &self,
        request: &SubmitCommitmentRequest,
    ) -> Result<RequestId, NetworkError> {
        let response: SubmitCommitmentResponse = self.call("submit_commitment", request).await?;
        match response.status {
            SubmitStatus::Success => Ok(request.request_id),
            status => Err(NetworkError::Rejected(status)),
        }
    }

    async fn get_inclusion_proof(&self, request_id: &RequestId) -> Result<InclusionProof, NetworkError> {
        let params = GetInclusionProofRequest {
            request_id: *request_id,
        };
        self.call("get_inclusion_proof", params).await
    }
}
