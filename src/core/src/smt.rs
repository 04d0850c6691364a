//! In-memory sparse Merkle tree keyed by request id.
//!
//! The tree has a fixed depth of 256, one level per request id bit (most significant
//! first). Empty subtrees hash to [`EMPTY_HASH`], an inner node is
//! `SHA256(0x01 || left || right)` and a leaf is `SHA256(0x00 || key || value)`.
//! Clients only need the hash primitives; the tree itself backs the in-process
//! aggregator.

use crate::errors::CoreError;
use crate::proof::{Direction, MerkleTreePath, MerkleTreePathStep};
use crate::types::{Hash, RequestId};
use bitvec::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

/// Depth of the tree; one level per key bit.
pub const TREE_DEPTH: usize = 256;

/// Hash of an empty subtree at any level.
pub const EMPTY_HASH: Hash = [0u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Hash of the leaf node holding `value` under `key`.
pub fn leaf_hash(key: &RequestId, value: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(key.0);
    hasher.update(value);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hash of an inner node. Two empty children make an empty node.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    if left == &EMPTY_HASH && right == &EMPTY_HASH {
        return EMPTY_HASH;
    }
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// The branch taken at `depth` (0 = just below the root): true goes right.
pub fn key_bit(key: &RequestId, depth: usize) -> bool {
    key.0.view_bits::<Msb0>()[depth]
}

/// A sparse Merkle tree of committed request ids.
#[derive(Clone, Debug, Default)]
pub struct SparseMerkleTree {
    leaves: BTreeMap<RequestId, Hash>,
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a leaf. A key can be written once; rewriting it with the same value is a
    /// no-op.
    pub fn add_leaf(&mut self, key: RequestId, value: Hash) -> Result<(), CoreError> {
        match self.leaves.get(&key) {
            Some(existing) if existing == &value => Ok(()),
            Some(_) => Err(CoreError::AlreadySpent(key.to_string())),
            None => {
                debug!("adding leaf {}", key);
                self.leaves.insert(key, value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &RequestId) -> Option<&Hash> {
        self.leaves.get(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    fn sorted(&self) -> Vec<(RequestId, Hash)> {
        self.leaves.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Root hash of the tree.
    pub fn root(&self) -> Hash {
        subtree_hash(&self.sorted(), 0)
    }

    /// Path from the position of `key` up to the root.
    ///
    /// When `key` is present the path proves inclusion of its leaf; otherwise the
    /// position is empty and the path proves exclusion.
    pub fn path(&self, key: &RequestId) -> MerkleTreePath {
        let leaves = self.sorted();
        let mut slice = &leaves[..];
        let mut siblings = Vec::with_capacity(TREE_DEPTH);

        for depth in 0..TREE_DEPTH {
            let split = slice.partition_point(|(k, _)| !key_bit(k, depth));
            let (left, right) = slice.split_at(split);
            let (ours, theirs, direction) = if key_bit(key, depth) {
                (right, left, Direction::Right)
            } else {
                (left, right, Direction::Left)
            };
            siblings.push((subtree_hash(theirs, depth + 1), direction));
            slice = ours;
        }

        let steps = siblings
            .into_iter()
            .rev()
            .map(|(sibling, direction)| MerkleTreePathStep {
                sibling: (sibling != EMPTY_HASH).then_some(sibling),
                direction,
            })
            .collect();

        MerkleTreePath {
            root: self.root(),
            steps,
        }
    }
}

/// Hash of the subtree at `depth` holding `leaves`, which share the key prefix above
/// `depth` and are sorted by key.
fn subtree_hash(leaves: &[(RequestId, Hash)], depth: usize) -> Hash {
    match leaves {
        [] => EMPTY_HASH,
        [(key, value)] if depth == TREE_DEPTH => leaf_hash(key, value),
        _ => {
            let split = leaves.partition_point(|(k, _)| !key_bit(k, depth));
            let (left, right) = leaves.split_at(split);
            node_hash(&subtree_hash(left, depth + 1), &subtree_hash(right, depth + 1))
        }
    }
}
