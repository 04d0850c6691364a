//! Unicity certificates and the trust base they are checked against.

use crate::encoding::CanonicalEncoder;
use crate::errors::{CoreError, ProofCheck};
use crate::signing::{self, SigningService};
use crate::types::{hex_array, Hash, PublicKeyBytes, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A BFT root node and its voting stake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNode {
    pub node_id: String,
    #[serde(with = "hex_array")]
    pub public_key: PublicKeyBytes,
    pub stake: u64,
}

/// The root node set for one network epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustBase {
    pub network_id: u16,
    pub epoch: u64,
    pub quorum_threshold: u64,
    pub root_nodes: Vec<RootNode>,
    #[serde(default)]
    pub signatures: BTreeMap<String, Signature>,
}

impl TrustBase {
    pub fn new(network_id: u16, epoch: u64, quorum_threshold: u64, root_nodes: Vec<RootNode>) -> Self {
        Self {
            network_id,
            epoch,
            quorum_threshold,
            root_nodes,
            signatures: BTreeMap::new(),
        }
    }

    pub fn total_stake(&self) -> u64 {
        self.root_nodes
            .iter()
            .fold(0u64, |total, n| total.saturating_add(n.stake))
    }

    /// Hash of everything but the signatures.
    pub fn signing_hash(&self) -> Hash {
        let mut enc = CanonicalEncoder::new("TrustBase");
        enc.uint(self.network_id as u128)
            .uint(self.epoch as u128)
            .uint(self.quorum_threshold as u128)
            .list(self.root_nodes.len());
        for node in &self.root_nodes {
            enc.text(&node.node_id)
                .bytes(&node.public_key)
                .uint(node.stake as u128);
        }
        enc.hash()
    }

    /// Adds the signature of one root node over this trust base.
    pub fn sign(&mut self, node_id: &str, signer: &SigningService) {
        let signature = signer.sign(&self.signing_hash());
        self.signatures.insert(node_id.to_string(), signature);
    }

    /// Checks that the root nodes themselves reached quorum on this trust base.
    pub fn verify_self_signed(&self) -> Result<(), CoreError> {
        self.check_quorum(&self.signing_hash(), &self.signatures)
    }

    /// Sums the stake of root nodes with a valid signature over `message` and checks it
    /// against the quorum threshold.
    pub fn check_quorum(
        &self,
        message: &Hash,
        signatures: &BTreeMap<String, Signature>,
    ) -> Result<(), CoreError> {
        if self.quorum_threshold == 0 || self.quorum_threshold > self.total_stake() {
            return Err(CoreError::proof(
                ProofCheck::Quorum,
                format!(
                    "quorum threshold {} is not reachable with total stake {}",
                    self.quorum_threshold,
                    self.total_stake()
                ),
            ));
        }

        let mut signed_stake: u64 = 0;
        for (node_id, signature) in signatures {
            let node = match self.root_nodes.iter().find(|n| &n.node_id == node_id) {
                Some(node) => node,
                None => {
                    warn!("signature from unknown root node {}", node_id);
                    continue;
                }
            };
            if signing::verify(&node.public_key, message, signature) {
                signed_stake = signed_stake.saturating_add(node.stake);
            } else {
                warn!("invalid signature from root node {}", node_id);
            }
        }

        debug!(
            "signed stake {} of threshold {}",
            signed_stake, self.quorum_threshold
        );
        if signed_stake < self.quorum_threshold {
            return Err(CoreError::proof(
                ProofCheck::Quorum,
                format!(
                    "signed stake {} is below the quorum threshold {}",
                    signed_stake, self.quorum_threshold
                ),
            ));
        }
        Ok(())
    }
}

/// A BFT statement that `root_hash` is the aggregator tree root for one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnicityCertificate {
    pub network_id: u16,
    pub round: u64,
    pub epoch: u64,
    #[serde(with = "hex_array")]
    pub root_hash: Hash,
    pub timestamp: u64,
    #[serde(default)]
    pub signatures: BTreeMap<String, Signature>,
}

impl UnicityCertificate {
    /// Creates an unsigned certificate.
    pub fn new(network_id: u16, round: u64, epoch: u64, root_hash: Hash, timestamp: u64) -> Self {
        Self {
            network_id,
            round,
            epoch,
            root_hash,
            timestamp,
            signatures: BTreeMap::new(),
        }
    }

    pub fn signing_hash(&self) -> Hash {
        let mut enc = CanonicalEncoder::new("UnicityCertificate");
        enc.uint(self.network_id as u128)
            .uint(self.round as u128)
            .uint(self.epoch as u128)
            .bytes(&self.root_hash)
            .uint(self.timestamp as u128);
        enc.hash()
    }

    /// Adds the signature of one root node.
    pub fn sign(&mut self, node_id: &str, signer: &SigningService) {
        let signature = signer.sign(&self.signing_hash());
        self.signatures.insert(node_id.to_string(), signature);
    }

    /// Checks network, epoch and signer quorum against `trust_base`.
    pub fn verify(&self, trust_base: &TrustBase) -> Result<(), CoreError> {
        if self.network_id != trust_base.network_id {
            return Err(CoreError::proof(
                ProofCheck::Certificate,
                format!(
                    "certificate is for network {}, trust base for {}",
                    self.network_id, trust_base.network_id
                ),
            ));
        }
        if self.epoch != trust_base.epoch {
            return Err(CoreError::proof(
                ProofCheck::Certificate,
                format!(
                    "certificate is for epoch {}, trust base for {}",
                    self.epoch, trust_base.epoch
                ),
            ));
        }
        trust_base.check_quorum(&self.signing_hash(), &self.signatures)
    }
}
