//! Tokens and their persisted form (TXF).

use crate::certificate::TrustBase;
use crate::commitment::{
    mint_source_state_hash, Commitment, MintTransactionData, TransactionData,
    TransferTransactionData,
};
use crate::encoding::CanonicalEncoder;
use crate::errors::CoreError;
use crate::integrity;
use crate::predicate::{self, Predicate};
use crate::proof::{self, InclusionProof};
use crate::signing::SigningService;
use crate::transfer::OfflineTransfer;
use crate::types::{hex_bytes_opt, Hash, RequestId, TokenId, TokenType};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Version written into every TXF document.
pub const TXF_VERSION: &str = "2.0";

/// Current owner and mutable payload of a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub predicate: Predicate,
    #[serde(default, with = "hex_bytes_opt")]
    pub data: Option<Vec<u8>>,
}

impl TokenState {
    pub fn new(predicate: Predicate, data: Option<Vec<u8>>) -> Self {
        Self { predicate, data }
    }

    pub fn hash(&self, token_id: &TokenId, token_type: &TokenType) -> Hash {
        let mut enc = CanonicalEncoder::new("TokenState");
        enc.bytes(&self.predicate.hash(token_id, token_type))
            .optional(self.data.as_deref());
        enc.hash()
    }

    /// Request id under which spending this state is recorded.
    pub fn request_id(&self, token_id: &TokenId, token_type: &TokenType) -> RequestId {
        RequestId::new(self.predicate.public_key(), &self.hash(token_id, token_type))
    }
}

/// Transaction data with the proof that it was included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction<T> {
    pub data: T,
    pub inclusion_proof: InclusionProof,
}

/// Where a token document stands from its holder's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    /// A transfer has been packaged and is not yet confirmed.
    Pending,
    /// Held and verified by the current owner.
    Confirmed,
    /// The holder has sent the token away; kept as a record.
    Transferred,
    /// A transfer was rejected.
    Failed,
}

/// A token and its full history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub version: String,
    pub state: TokenState,
    pub genesis: Transaction<MintTransactionData>,
    #[serde(default)]
    pub transactions: Vec<Transaction<TransferTransactionData>>,
    pub status: TokenStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_transfer: Option<OfflineTransfer>,
}

impl Token {
    /// Creates a token from an included genesis commitment.
    ///
    /// `state` is the recipient's initial state; it must belong to the minted address and
    /// carry the data committed by the genesis.
    pub fn from_genesis(
        commitment: Commitment<MintTransactionData>,
        inclusion_proof: InclusionProof,
        state: TokenState,
        trust_base: &TrustBase,
    ) -> Result<Self, CoreError> {
        if inclusion_proof.authenticator.as_ref() != Some(&commitment.authenticator) {
            return Err(CoreError::SignatureVerification(
                "inclusion proof carries a different authenticator".to_string(),
            ));
        }
        let token = Token {
            version: TXF_VERSION.to_string(),
            state,
            genesis: Transaction {
                data: commitment.transaction_data,
                inclusion_proof,
            },
            transactions: Vec::new(),
            status: TokenStatus::Confirmed,
            offline_transfer: None,
        };
        token.verify(trust_base)?;
        info!("minted token {}", token.id());
        Ok(token)
    }

    pub fn id(&self) -> &TokenId {
        &self.genesis.data.token_id
    }

    pub fn token_type(&self) -> &TokenType {
        &self.genesis.data.token_type
    }

    /// Request id under which the current state will be spent.
    pub fn current_request_id(&self) -> RequestId {
        self.state.request_id(self.id(), self.token_type())
    }

    /// Checks data integrity, every inclusion proof and the ownership chain.
    pub fn verify(&self, trust_base: &TrustBase) -> Result<(), CoreError> {
        integrity::verify_chain_integrity(self)?;

        let (id, token_type) = (self.id(), self.token_type());

        let minter = SigningService::minter(id)?;
        let genesis_request = RequestId::new(&minter.public_key(), &mint_source_state_hash(id));
        proof::verify_inclusion(&self.genesis.inclusion_proof, trust_base, &genesis_request)?;
        debug!("genesis of {} verified", id);

        let mut recipient = &self.genesis.data.recipient;
        for (index, tx) in self.transactions.iter().enumerate() {
            let data = &tx.data;
            if &data.token_id != id || &data.token_type != token_type {
                return Err(CoreError::integrity(
                    format!("transaction {}", index),
                    "transaction belongs to another token",
                ));
            }
            predicate::expect_address(&data.source_state.predicate, id, token_type, recipient)?;

            let request_id = data.source_state.request_id(id, token_type);
            proof::verify_inclusion(&tx.inclusion_proof, trust_base, &request_id)?;

            if let Some(authenticator) = &tx.inclusion_proof.authenticator {
                predicate::verify_ownership(
                    &data.source_state.predicate,
                    &authenticator.signature,
                    &data.transaction_hash(),
                    &authenticator.public_key,
                )?;
            }
            debug!("transaction {} of {} verified", index, id);
            recipient = &data.recipient;
        }

        predicate::expect_address(&self.state.predicate, id, token_type, recipient)
    }

    /// Whether an offline transfer package is embedded in this document.
    pub fn is_transfer_pending(&self) -> bool {
        self.offline_transfer.is_some()
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token {{ id: {}, type: {}, transactions: {}, status: {:?} }}",
            self.id(),
            self.token_type(),
            self.transactions.len(),
            self.status
        )
    }
}
