//! Mint and transfer transaction data, their hashes, and signed commitments.

use crate::address::Address;
use crate::encoding::CanonicalEncoder;
use crate::errors::CoreError;
use crate::predicate;
use crate::signing::{self, SigningService, ALGORITHM};
use crate::token::TokenState;
use crate::types::{
    hex_array, hex_array_opt, hex_bytes_opt, sha256, CoinData, Hash, PublicKeyBytes, RequestId,
    Signature, TokenId, TokenType,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Commits a mutable state payload into a transaction.
///
/// Non-empty data hashes to `Some(SHA256(data))`; absent or empty data commits to
/// nothing.
pub fn recipient_data_hash(data: Option<&[u8]>) -> Option<Hash> {
    match data {
        Some(d) if !d.is_empty() => Some(sha256(d)),
        _ => None,
    }
}

/// Hash of the pseudo-state that a genesis commitment spends.
pub fn mint_source_state_hash(token_id: &TokenId) -> Hash {
    let mut enc = CanonicalEncoder::new("MintSource");
    enc.bytes(&token_id.0);
    enc.hash()
}

/// Proof that the owner of a source state authorized a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub algorithm: String,
    #[serde(with = "hex_array")]
    pub public_key: PublicKeyBytes,
    pub signature: Signature,
    #[serde(with = "hex_array")]
    pub state_hash: Hash,
}

impl Authenticator {
    /// Signs `transaction_hash` on behalf of the state `state_hash`.
    pub fn create(signer: &SigningService, transaction_hash: &Hash, state_hash: Hash) -> Self {
        Self {
            algorithm: ALGORITHM.to_string(),
            public_key: signer.public_key(),
            signature: signer.sign(transaction_hash),
            state_hash,
        }
    }

    pub fn verify(&self, transaction_hash: &Hash) -> bool {
        self.algorithm == ALGORITHM
            && signing::verify(&self.public_key, transaction_hash, &self.signature)
    }

    pub fn request_id(&self) -> RequestId {
        RequestId::new(&self.public_key, &self.state_hash)
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut enc = CanonicalEncoder::new("Authenticator");
        enc.text(&self.algorithm)
            .bytes(&self.public_key)
            .bytes(&self.signature.0)
            .bytes(&self.state_hash);
        enc.finish()
    }
}

/// The hashing and authorization contract shared by mint and transfer data.
pub trait TransactionData {
    /// Hash over the canonical encoding of every field.
    fn transaction_hash(&self) -> Hash;

    /// Hash of the state this transaction spends.
    fn source_state_hash(&self) -> Hash;

    /// Checks that `public_key` may author this transaction.
    fn check_signer(&self, public_key: &PublicKeyBytes) -> Result<(), CoreError>;

    fn recipient(&self) -> &Address;

    fn recipient_data_hash(&self) -> Option<&Hash>;
}

/// Genesis transaction of a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransactionData {
    pub token_id: TokenId,
    pub token_type: TokenType,
    #[serde(with = "hex::serde")]
    pub token_data: Vec<u8>,
    #[serde(default)]
    pub coin_data: Option<CoinData>,
    pub recipient: Address,
    #[serde(with = "hex_array")]
    pub salt: [u8; 32],
    #[serde(default, with = "hex_array_opt")]
    pub recipient_data_hash: Option<Hash>,
    #[serde(default, with = "hex_bytes_opt")]
    pub reason: Option<Vec<u8>>,
}

impl MintTransactionData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_id: TokenId,
        token_type: TokenType,
        token_data: Vec<u8>,
        coin_data: Option<CoinData>,
        recipient: Address,
        salt: [u8; 32],
        recipient_data_hash: Option<Hash>,
        reason: Option<Vec<u8>>,
    ) -> Self {
        Self {
            token_id,
            token_type,
            token_data,
            coin_data,
            recipient,
            salt,
            recipient_data_hash,
            reason,
        }
    }
}

impl TransactionData for MintTransactionData {
    fn transaction_hash(&self) -> Hash {
        let mut enc = CanonicalEncoder::new("MintTransactionData");
        enc.bytes(&self.token_id.0)
            .bytes(&self.token_type.0)
            .bytes(&self.token_data);
        match &self.coin_data {
            Some(coins) => {
                enc.list(coins.0.len());
                for (coin, amount) in &coins.0 {
                    enc.bytes(&coin.0).text(amount);
                }
            }
            None => {
                enc.optional(None);
            }
        }
        enc.text(&self.recipient.to_string())
            .bytes(&self.salt)
            .optional(self.recipient_data_hash.as_ref().map(|h| &h[..]))
            .optional(self.reason.as_deref());
        enc.hash()
    }

    fn source_state_hash(&self) -> Hash {
        mint_source_state_hash(&self.token_id)
    }

    fn check_signer(&self, public_key: &PublicKeyBytes) -> Result<(), CoreError> {
        let minter = SigningService::minter(&self.token_id)?;
        if &minter.public_key() != public_key {
            return Err(CoreError::SignatureVerification(
                "genesis is not signed by the token's minter key".to_string(),
            ));
        }
        Ok(())
    }

    fn recipient(&self) -> &Address {
        &self.recipient
    }

    fn recipient_data_hash(&self) -> Option<&Hash> {
        self.recipient_data_hash.as_ref()
    }
}

/// Transfer of a token from its current state to a new owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransactionData {
    pub token_id: TokenId,
    pub token_type: TokenType,
    pub source_state: TokenState,
    pub recipient: Address,
    #[serde(with = "hex_array")]
    pub salt: [u8; 32],
    #[serde(default, with = "hex_array_opt")]
    pub recipient_data_hash: Option<Hash>,
    #[serde(default, with = "hex_bytes_opt")]
    pub message: Option<Vec<u8>>,
}

impl TransferTransactionData {
    pub fn new(
        token_id: TokenId,
        token_type: TokenType,
        source_state: TokenState,
        recipient: Address,
        salt: [u8; 32],
        recipient_data_hash: Option<Hash>,
        message: Option<Vec<u8>>,
    ) -> Self {
        Self {
            token_id,
            token_type,
            source_state,
            recipient,
            salt,
            recipient_data_hash,
            message,
        }
    }
}

impl TransactionData for TransferTransactionData {
    fn transaction_hash(&self) -> Hash {
        let mut enc = CanonicalEncoder::new("TransferTransactionData");
        enc.bytes(&self.source_state_hash())
            .text(&self.recipient.to_string())
            .bytes(&self.salt)
            .optional(self.recipient_data_hash.as_ref().map(|h| &h[..]))
            .optional(self.message.as_deref());
        enc.hash()
    }

    fn source_state_hash(&self) -> Hash {
        self.source_state.hash(&self.token_id, &self.token_type)
    }

    fn check_signer(&self, public_key: &PublicKeyBytes) -> Result<(), CoreError> {
        let expected = self.source_state.predicate.public_key();
        if expected != public_key {
            return Err(CoreError::SignatureVerification(format!(
                "authenticator key {} does not match source predicate key {}",
                hex::encode(public_key),
                hex::encode(expected)
            )));
        }
        Ok(())
    }

    fn recipient(&self) -> &Address {
        &self.recipient
    }

    fn recipient_data_hash(&self) -> Option<&Hash> {
        self.recipient_data_hash.as_ref()
    }
}

/// Transaction data together with the authenticator that signs it.
///
/// A commitment can only be produced by consuming its data, so it is signed exactly
/// once; retries and recipients reuse the value as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment<T> {
    pub request_id: RequestId,
    pub transaction_data: T,
    pub authenticator: Authenticator,
}

impl<T: TransactionData> Commitment<T> {
    fn sign(data: T, signer: &SigningService) -> Result<Self, CoreError> {
        data.check_signer(&signer.public_key())?;
        let transaction_hash = data.transaction_hash();
        let authenticator = Authenticator::create(signer, &transaction_hash, data.source_state_hash());
        debug!(
            "signed transaction {} for request {}",
            hex::encode(transaction_hash),
            authenticator.request_id()
        );
        Ok(Self {
            request_id: authenticator.request_id(),
            transaction_data: data,
            authenticator,
        })
    }

    pub fn transaction_hash(&self) -> Hash {
        self.transaction_data.transaction_hash()
    }

    /// Re-checks the authenticator against the data it claims to sign.
    pub fn verify(&self) -> Result<(), CoreError> {
        let data = &self.transaction_data;
        data.check_signer(&self.authenticator.public_key)?;
        if self.authenticator.state_hash != data.source_state_hash() {
            return Err(CoreError::SignatureVerification(
                "authenticator signs for a different source state".to_string(),
            ));
        }
        if !self.authenticator.verify(&data.transaction_hash()) {
            return Err(CoreError::SignatureVerification(
                "authenticator does not sign the transaction hash".to_string(),
            ));
        }
        if self.authenticator.request_id() != self.request_id {
            return Err(CoreError::SignatureVerification(
                "request id does not match the authenticator".to_string(),
            ));
        }
        Ok(())
    }
}

/// Signs a genesis commitment with the token's minter key.
pub fn commit_mint(data: MintTransactionData) -> Result<Commitment<MintTransactionData>, CoreError> {
    let minter = SigningService::minter(&data.token_id)?;
    Commitment::sign(data, &minter)
}

/// Signs a transfer with the current owner's key.
///
/// `owner` must hold the key embedded in the source predicate; any other key, the
/// recipient's included, is refused.
pub fn commit_transfer(
    data: TransferTransactionData,
    owner: &SigningService,
) -> Result<Commitment<TransferTransactionData>, CoreError> {
    let commitment = Commitment::sign(data, owner)?;
    predicate::verify_ownership(
        &commitment.transaction_data.source_state.predicate,
        &commitment.authenticator.signature,
        &commitment.transaction_hash(),
        &commitment.authenticator.public_key,
    )?;
    Ok(commitment)
}

/// Lifecycle of a single commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitmentStatus {
    Built,
    Signed,
    Submitted,
    Included,
    Excluded,
    Confirmed,
    Rejected,
}

impl CommitmentStatus {
    /// Moves to `next`, refusing transitions the lifecycle does not allow.
    ///
    /// An exclusion before inclusion means the round has not closed yet; the same
    /// signed commitment is then polled or resubmitted. Nothing leads back to
    /// `Signed`.
    pub fn advance(self, next: CommitmentStatus) -> Result<CommitmentStatus, CoreError> {
        use CommitmentStatus::*;
        let allowed = matches!(
            (self, next),
            (Built, Signed)
                | (Signed, Submitted)
                | (Submitted, Submitted)
                | (Submitted, Included)
                | (Submitted, Excluded)
                | (Excluded, Submitted)
                | (Included, Confirmed)
                | (Built | Signed | Submitted | Excluded | Included, Rejected)
        );
        if !allowed {
            return Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CommitmentStatus::Confirmed | CommitmentStatus::Rejected)
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
