//! Core engine for offchain token transfers.
//!
//! This crate provides address and predicate derivation, canonical transaction
//! commitments, data integrity checks over a token's history, and verification of
//! sparse Merkle inclusion and exclusion proofs against BFT unicity certificates.
//! Everything here is synchronous; the aggregator boundary lives in `txf-network`.

pub mod address;
pub mod certificate;
pub mod commitment;
pub mod encoding;
pub mod errors;
pub mod integrity;
pub mod predicate;
pub mod proof;
pub mod signing;
pub mod smt;
pub mod token;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use address::{Address, AddressScheme};
pub use certificate::{RootNode, TrustBase, UnicityCertificate};
pub use commitment::{
    commit_mint, commit_transfer, Authenticator, Commitment, CommitmentStatus,
    MintTransactionData, TransactionData, TransferTransactionData,
};
pub use errors::{CoreError, ProofCheck};
pub use predicate::Predicate;
pub use proof::{InclusionProof, ProofStatus};
pub use signing::SigningService;
pub use smt::SparseMerkleTree;
pub use token::{Token, TokenState, TokenStatus};
pub use transfer::{OfflineTransfer, TransferPackage, TransferState};
pub use types::{Hash, RequestId, TokenId, TokenType};
