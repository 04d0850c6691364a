//! Inclusion and exclusion proofs issued by the aggregator.
//!
//! A proof is a Merkle path from the request id position to the root, plus the
//! unicity certificate that anchors the root. Inclusion proofs carry the
//! authenticator and transaction hash of the leaf; exclusion proofs carry neither and
//! start from an empty branch.

use crate::certificate::{TrustBase, UnicityCertificate};
use crate::commitment::Authenticator;
use crate::errors::{CoreError, ProofCheck};
use crate::smt::{key_bit, leaf_hash, node_hash, EMPTY_HASH, TREE_DEPTH};
use crate::types::{hex_array, hex_array_opt, sha256, Hash, RequestId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Which child the current node is when combining with its sibling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Current node is the left child: `H(current || sibling)`.
    Left,
    /// Current node is the right child: `H(sibling || current)`.
    Right,
}

/// One level of a Merkle path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTreePathStep {
    /// Sibling subtree hash; `None` for an empty subtree.
    #[serde(with = "hex_array_opt")]
    pub sibling: Option<Hash>,
    pub direction: Direction,
}

/// Path from a leaf position to the root, ordered leaf first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTreePath {
    #[serde(with = "hex_array")]
    pub root: Hash,
    pub steps: Vec<MerkleTreePathStep>,
}

impl MerkleTreePath {
    /// Folds `start` up the path and returns the resulting root.
    pub fn compute_root(&self, start: Hash) -> Hash {
        self.steps.iter().fold(start, |current, step| {
            let sibling = step.sibling.unwrap_or(EMPTY_HASH);
            match step.direction {
                Direction::Left => node_hash(&current, &sibling),
                Direction::Right => node_hash(&sibling, &current),
            }
        })
    }

    /// Checks that the path descends to the position of `request_id`.
    fn check_position(&self, request_id: &RequestId) -> Result<(), CoreError> {
        if self.steps.len() != TREE_DEPTH {
            return Err(CoreError::proof(
                ProofCheck::Path,
                format!("path has {} steps, expected {}", self.steps.len(), TREE_DEPTH),
            ));
        }
        for (i, step) in self.steps.iter().enumerate() {
            let depth = TREE_DEPTH - 1 - i;
            let expected = if key_bit(request_id, depth) {
                Direction::Right
            } else {
                Direction::Left
            };
            if step.direction != expected {
                return Err(CoreError::proof(
                    ProofCheck::Path,
                    format!("direction at depth {} does not follow the request id", depth),
                ));
            }
        }
        Ok(())
    }
}

/// What a proof states about a request id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
    Inclusion,
    Exclusion,
}

/// A proof as returned by the aggregator for one request id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub merkle_tree_path: MerkleTreePath,
    #[serde(default)]
    pub authenticator: Option<Authenticator>,
    #[serde(default, with = "hex_array_opt")]
    pub transaction_hash: Option<Hash>,
    pub unicity_certificate: UnicityCertificate,
}

/// Leaf value committed for an authenticated transaction.
pub fn leaf_value(authenticator: &Authenticator, transaction_hash: &Hash) -> Hash {
    let mut bytes = authenticator.canonical_bytes();
    bytes.extend_from_slice(transaction_hash);
    sha256(&bytes)
}

impl InclusionProof {
    /// Classifies the proof; a half-filled proof is malformed.
    pub fn status(&self) -> Result<ProofStatus, CoreError> {
        match (&self.authenticator, &self.transaction_hash) {
            (Some(_), Some(_)) => Ok(ProofStatus::Inclusion),
            (None, None) => Ok(ProofStatus::Exclusion),
            _ => Err(CoreError::proof(
                ProofCheck::Shape,
                "authenticator and transaction hash must be both present or both absent",
            )),
        }
    }

    fn check_anchor(&self, start: Hash, trust_base: &TrustBase) -> Result<(), CoreError> {
        let path = &self.merkle_tree_path;
        let computed = path.compute_root(start);
        if computed != path.root {
            debug!(
                "computed root {} differs from path root {}",
                hex::encode(computed),
                hex::encode(path.root)
            );
            return Err(CoreError::proof(
                ProofCheck::Root,
                "path does not hash to its declared root",
            ));
        }
        if self.unicity_certificate.root_hash != path.root {
            return Err(CoreError::proof(
                ProofCheck::Certificate,
                "certificate commits to a different root",
            ));
        }
        self.unicity_certificate.verify(trust_base)
    }
}

/// Verifies that `proof` includes an authenticated transaction under `request_id`.
pub fn verify_inclusion(
    proof: &InclusionProof,
    trust_base: &TrustBase,
    request_id: &RequestId,
) -> Result<(), CoreError> {
    let (authenticator, transaction_hash) = match (&proof.authenticator, &proof.transaction_hash) {
        (Some(a), Some(t)) => (a, t),
        _ => {
            return Err(CoreError::proof(
                ProofCheck::Shape,
                "inclusion proof lacks an authenticator or transaction hash",
            ))
        }
    };

    if !authenticator.verify(transaction_hash) {
        return Err(CoreError::proof(
            ProofCheck::Authenticator,
            "authenticator does not sign the transaction hash",
        ));
    }
    if &authenticator.request_id() != request_id {
        return Err(CoreError::proof(
            ProofCheck::RequestId,
            format!("authenticator belongs to request {}", authenticator.request_id()),
        ));
    }

    proof.merkle_tree_path.check_position(request_id)?;
    let leaf = leaf_hash(request_id, &leaf_value(authenticator, transaction_hash));
    proof.check_anchor(leaf, trust_base)?;

    debug!("inclusion of {} verified", request_id);
    Ok(())
}

/// Verifies that `proof` shows no leaf under `request_id`.
pub fn verify_exclusion(
    proof: &InclusionProof,
    trust_base: &TrustBase,
    request_id: &RequestId,
) -> Result<(), CoreError> {
    if proof.authenticator.is_some() || proof.transaction_hash.is_some() {
        return Err(CoreError::proof(
            ProofCheck::Shape,
            "exclusion proof must not carry an authenticator or transaction hash",
        ));
    }

    proof.merkle_tree_path.check_position(request_id)?;
    proof.check_anchor(EMPTY_HASH, trust_base)?;

    debug!("exclusion of {} verified", request_id);
    Ok(())
}

/// Verifies a proof for a state that must not have been spent yet.
pub fn verify_unspent(
    proof: &InclusionProof,
    trust_base: &TrustBase,
    request_id: &RequestId,
) -> Result<(), CoreError> {
    match proof.status()? {
        ProofStatus::Exclusion => verify_exclusion(proof, trust_base, request_id),
        ProofStatus::Inclusion => {
            verify_inclusion(proof, trust_base, request_id)?;
            warn!("request {} is already included", request_id);
            Err(CoreError::AlreadySpent(request_id.to_string()))
        }
    }
}

impl fmt::Display for InclusionProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status() {
            Ok(ProofStatus::Inclusion) => "inclusion",
            Ok(ProofStatus::Exclusion) => "exclusion",
            Err(_) => "malformed",
        };
        write!(
            f,
            "Proof {{ status: {}, root: {}, round: {} }}",
            status,
            hex::encode(self.merkle_tree_path.root),
            self.unicity_certificate.round
        )
    }
}
