//! An in-process aggregator.
//!
//! Records commitments in a sparse Merkle tree, closes rounds on demand and certifies
//! each round root with its own root node keys. It speaks the same
//! [`AggregatorClient`] interface as the remote client, so the whole protocol runs
//! without a network.

use crate::client::AggregatorClient;
use crate::errors::NetworkError;
use crate::types::{SubmitCommitmentRequest, SubmitStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use txf_core::proof::leaf_value;
use txf_core::types::Hash;
use txf_core::{
    Authenticator, InclusionProof, RequestId, RootNode, SigningService, SparseMerkleTree,
    TrustBase, UnicityCertificate,
};

/// A commitment accepted by the aggregator.
#[derive(Clone, Debug)]
struct Record {
    authenticator: Authenticator,
    transaction_hash: Hash,
}

struct State {
    tree: SparseMerkleTree,
    records: BTreeMap<RequestId, Record>,
    pending: BTreeMap<RequestId, Record>,
    certificate: UnicityCertificate,
    received: Vec<SubmitCommitmentRequest>,
    transport_failures: u32,
}

/// In-process aggregator shared between clones.
#[derive(Clone)]
pub struct LocalAggregator {
    state: Arc<Mutex<State>>,
    signers: Arc<Vec<(String, SigningService)>>,
    trust_base: Arc<TrustBase>,
    auto_certify: bool,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl LocalAggregator {
    /// Creates an aggregator with `node_count` equally staked root nodes and a
    /// two-thirds quorum.
    pub fn new(network_id: u16, node_count: usize) -> Result<Self, NetworkError> {
        let mut signers = Vec::with_capacity(node_count);
        let mut nodes = Vec::with_capacity(node_count);
        for i in 0..node_count {
            let node_id = format!("root-{}", i);
            let secret = format!("txf-local-root/{}/{}", network_id, i);
            let signer = SigningService::from_secret(secret.as_bytes())?;
            nodes.push(RootNode {
                node_id: node_id.clone(),
                public_key: signer.public_key(),
                stake: 1,
            });
            signers.push((node_id, signer));
        }

        let quorum = (node_count as u64) * 2 / 3 + 1;
        let mut trust_base = TrustBase::new(network_id, 1, quorum, nodes);
        for (node_id, signer) in &signers {
            trust_base.sign(node_id, signer);
        }

        let tree = SparseMerkleTree::new();
        let mut certificate =
            UnicityCertificate::new(network_id, 0, trust_base.epoch, tree.root(), now_secs());
        for (node_id, signer) in &signers {
            certificate.sign(node_id, signer);
        }

        info!(
            "local aggregator for network {} with {} root nodes, quorum {}",
            network_id, node_count, quorum
        );
        Ok(Self {
            state: Arc::new(Mutex::new(State {
                tree,
                records: BTreeMap::new(),
                pending: BTreeMap::new(),
                certificate,
                received: Vec::new(),
                transport_failures: 0,
            })),
            signers: Arc::new(signers),
            trust_base: Arc::new(trust_base),
            auto_certify: false,
        })
    }

    /// Certify a new round after every accepted submission.
    pub fn with_auto_certify(mut self, auto_certify: bool) -> Self {
        self.auto_certify = auto_certify;
        self
    }

    pub fn trust_base(&self) -> &TrustBase {
        &self.trust_base
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates and records a commitment for the next round.
    ///
    /// Resubmitting an identical commitment succeeds again; a different commitment
    /// under a known request id is refused.
    pub fn submit(&self, request: &SubmitCommitmentRequest) -> SubmitStatus {
        let authenticator = &request.authenticator;
        if !authenticator.verify(&request.transaction_hash) {
            warn!("authenticator for {} does not verify", request.request_id);
            return SubmitStatus::AuthenticatorVerificationFailed;
        }
        if authenticator.request_id() != request.request_id {
            warn!("request id {} does not match its authenticator", request.request_id);
            return SubmitStatus::RequestIdMismatch;
        }

        let record = Record {
            authenticator: authenticator.clone(),
            transaction_hash: request.transaction_hash,
        };
        let value = leaf_value(&record.authenticator, &record.transaction_hash);

        let mut state = self.lock();
        let known = state
            .records
            .get(&request.request_id)
            .or_else(|| state.pending.get(&request.request_id));
        if let Some(existing) = known {
            if leaf_value(&existing.authenticator, &existing.transaction_hash) == value {
                debug!("request {} resubmitted", request.request_id);
                return SubmitStatus::Success;
            }
            warn!("request {} already holds another commitment", request.request_id);
            return SubmitStatus::RequestIdExists;
        }

        state.pending.insert(request.request_id, record);
        debug!("request {} queued for the next round", request.request_id);
        drop(state);

        if self.auto_certify {
            self.certify_round();
        }
        SubmitStatus::Success
    }

    /// Moves pending commitments into the tree and certifies the new root.
    pub fn certify_round(&self) -> UnicityCertificate {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        for (request_id, record) in pending {
            let value = leaf_value(&record.authenticator, &record.transaction_hash);
            if let Err(e) = state.tree.add_leaf(request_id, value) {
                warn!("dropping {}: {}", request_id, e);
                continue;
            }
            state.records.insert(request_id, record);
        }

        let round = state.certificate.round + 1;
        let mut certificate = UnicityCertificate::new(
            self.trust_base.network_id,
            round,
            self.trust_base.epoch,
            state.tree.root(),
            now_secs(),
        );
        for (node_id, signer) in self.signers.iter() {
            certificate.sign(node_id, signer);
        }
        info!(
            "certified round {} with {} leaves, root {}",
            round,
            state.tree.len(),
            hex::encode(certificate.root_hash)
        );
        state.certificate = certificate.clone();
        certificate
    }

    /// Proof for `request_id` against the last certified round.
    pub fn proof(&self, request_id: &RequestId) -> InclusionProof {
        let state = self.lock();
        let record = state.records.get(request_id);
        InclusionProof {
            merkle_tree_path: state.tree.path(request_id),
            authenticator: record.map(|r| r.authenticator.clone()),
            transaction_hash: record.map(|r| r.transaction_hash),
            unicity_certificate: state.certificate.clone(),
        }
    }

    /// Makes the next `count` calls fail as if the aggregator were unreachable.
    pub fn fail_next_calls(&self, count: u32) {
        self.lock().transport_failures = count;
    }

    /// Every submission received, in order, including failed ones.
    pub fn received(&self) -> Vec<SubmitCommitmentRequest> {
        self.lock().received.clone()
    }

    fn take_transport_failure(&self) -> bool {
        let mut state = self.lock();
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl AggregatorClient for LocalAggregator {
    async fn submit_commitment(
        &self,
        request: &SubmitCommitmentRequest,
    ) -> Result<RequestId, NetworkError> {
        self.lock().received.push(request.clone());
        if self.take_transport_failure() {
            return Err(NetworkError::Transport("connection reset".to_string()));
        }
        match self.submit(request) {
            SubmitStatus::Success => Ok(request.request_id),
            status => Err(NetworkError::Rejected(status)),
        }
    }

    async fn get_inclusion_proof(&self, request_id: &RequestId) -> Result<InclusionProof, NetworkError> {
        if self.take_transport_failure() {
            return Err(NetworkError::Transport("connection reset".to_string()));
        }
        Ok(self.proof(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txf_core::proof::{verify_exclusion, verify_inclusion};
    use txf_core::types::sha256;

    fn request(signer: &SigningService, tx: &[u8]) -> SubmitCommitmentRequest {
        let transaction_hash = sha256(tx);
        let authenticator = Authenticator::create(signer, &transaction_hash, sha256(b"state"));
        SubmitCommitmentRequest {
            request_id: authenticator.request_id(),
            transaction_hash,
            authenticator,
            receipt: false,
        }
    }

    #[test]
    fn test_trust_base_is_self_signed() {
        let aggregator = LocalAggregator::new(7, 4).unwrap();
        assert_eq!(aggregator.trust_base().quorum_threshold, 3);
        aggregator.trust_base().verify_self_signed().unwrap();
    }

    #[test]
    fn test_pending_until_certified() {
        let aggregator = LocalAggregator::new(7, 3).unwrap();
        let alice = SigningService::from_secret(b"alice").unwrap();
        let req = request(&alice, b"tx");
        assert_eq!(aggregator.submit(&req), SubmitStatus::Success);

        let before = aggregator.proof(&req.request_id);
        verify_exclusion(&before, aggregator.trust_base(), &req.request_id).unwrap();

        aggregator.certify_round();
        let after = aggregator.proof(&req.request_id);
        verify_inclusion(&after, aggregator.trust_base(), &req.request_id).unwrap();
        assert_eq!(after.unicity_certificate.round, 1);
    }

    #[test]
    fn test_submission_checks() {
        let aggregator = LocalAggregator::new(7, 3).unwrap();
        let alice = SigningService::from_secret(b"alice").unwrap();
        let bob = SigningService::from_secret(b"bob").unwrap();

        let mut wrong_key = request(&alice, b"tx");
        wrong_key.authenticator.signature = bob.sign(&wrong_key.transaction_hash);
        assert_eq!(
            aggregator.submit(&wrong_key),
            SubmitStatus::AuthenticatorVerificationFailed
        );

        let mut mismatched = request(&alice, b"tx");
        mismatched.request_id = RequestId([1; 32]);
        assert_eq!(aggregator.submit(&mismatched), SubmitStatus::RequestIdMismatch);

        let first = request(&alice, b"tx");
        assert_eq!(aggregator.submit(&first), SubmitStatus::Success);
        assert_eq!(aggregator.submit(&first), SubmitStatus::Success);
        aggregator.certify_round();
        assert_eq!(aggregator.submit(&first), SubmitStatus::Success);

        let double_spend = request(&alice, b"other tx");
        assert_eq!(double_spend.request_id, first.request_id);
        assert_eq!(aggregator.submit(&double_spend), SubmitStatus::RequestIdExists);
    }

    #[tokio::test]
    async fn test_client_interface_and_failures() {
        let aggregator = LocalAggregator::new(7, 3).unwrap().with_auto_certify(true);
        let alice = SigningService::from_secret(b"alice").unwrap();
        let req = request(&alice, b"tx");

        aggregator.fail_next_calls(1);
        let err = aggregator.submit_commitment(&req).await.unwrap_err();
        assert!(err.is_retryable());

        let id = aggregator.submit_commitment(&req).await.unwrap();
        assert_eq!(id, req.request_id);
        assert_eq!(aggregator.received().len(), 2);

        let proof = aggregator.get_inclusion_proof(&id).await.unwrap();
        verify_inclusion(&proof, aggregator.trust_base(), &id).unwrap();
    }
}
