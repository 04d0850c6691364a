//! The two-phase offline transfer protocol.
//!
//! The sender signs a transfer commitment locally and packages it into the TXF document.
//! Whoever holds the document later submits that commitment verbatim; the recipient
//! never rebuilds or re-signs it. Once an inclusion proof verifies, the recipient derives
//! its own state and appends the transaction to the chain.

use crate::address::Address;
use crate::certificate::TrustBase;
use crate::commitment::{
    commit_transfer, recipient_data_hash, Commitment, TransferTransactionData,
};
use crate::errors::CoreError;
use crate::predicate::{self, Predicate};
use crate::proof::{self, InclusionProof};
use crate::signing::SigningService;
use crate::token::{Token, TokenState, TokenStatus, Transaction};
use crate::types::{hex_bytes_opt, RequestId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Position of a token in the offline transfer protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Held by its owner, no transfer in progress.
    Created,
    /// Commitment signed by the sender, not yet packaged.
    TransferPrepared,
    /// Written into a TXF document for out-of-band transport.
    TransferPackaged,
    /// The packaged commitment was handed to the aggregator.
    TransferSubmitted,
    TransferConfirmed,
    TransferRejected,
}

impl TransferState {
    pub fn advance(self, next: TransferState) -> Result<TransferState, CoreError> {
        use TransferState::*;
        let allowed = matches!(
            (self, next),
            (Created, TransferPrepared)
                | (TransferPrepared, TransferPackaged)
                | (TransferPackaged, TransferSubmitted)
                | (TransferSubmitted, TransferSubmitted)
                | (TransferSubmitted, TransferConfirmed)
                | (TransferPrepared | TransferPackaged | TransferSubmitted, TransferRejected)
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
        matches!(self, TransferState::TransferConfirmed | TransferState::TransferRejected)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The `offlineTransfer` section of a TXF document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTransfer {
    pub sender: Address,
    pub recipient: Address,
    pub commitment: Commitment<TransferTransactionData>,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload the recipient state is expected to carry.
    #[serde(default, with = "hex_bytes_opt")]
    pub recipient_data: Option<Vec<u8>>,
    pub state: TransferState,
}

/// A token together with an in-flight transfer of it.
///
/// The package owns the pre-transfer token; it is never shared mutably between sender
/// and recipient, only moved as a TXF document.
#[derive(Clone, Debug)]
pub struct TransferPackage {
    token: Token,
    transfer: OfflineTransfer,
}

impl TransferPackage {
    /// Verifies `token` and signs a transfer of its current state to `recipient`.
    ///
    /// `owner` must hold the key of the current state's predicate.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        token: &Token,
        trust_base: &TrustBase,
        owner: &SigningService,
        recipient: Address,
        recipient_data: Option<Vec<u8>>,
        salt: [u8; 32],
        message: Option<String>,
        network: &str,
    ) -> Result<Self, CoreError> {
        if token.status != TokenStatus::Confirmed || token.is_transfer_pending() {
            return Err(CoreError::InvalidTransition {
                from: format!("{:?} token", token.status),
                to: TransferState::TransferPrepared.to_string(),
            });
        }
        token.verify(trust_base)?;

        let data = TransferTransactionData::new(
            *token.id(),
            *token.token_type(),
            token.state.clone(),
            recipient,
            salt,
            recipient_data_hash(recipient_data.as_deref()),
            message.as_ref().map(|m| m.as_bytes().to_vec()),
        );
        let commitment = commit_transfer(data, owner)?;

        let sender = predicate::address_of(&token.state.predicate, token.id(), token.token_type());
        info!(
            "prepared transfer of {} from {} to {}",
            token.id(),
            sender,
            recipient
        );

        let mut pre_transfer = token.clone();
        pre_transfer.offline_transfer = None;
        Ok(Self {
            token: pre_transfer,
            transfer: OfflineTransfer {
                sender,
                recipient,
                commitment,
                network: network.to_string(),
                message,
                recipient_data,
                state: TransferState::Created.advance(TransferState::TransferPrepared)?,
            },
        })
    }

    /// Marks the transfer as packaged and returns the TXF document to hand over.
    pub fn package(&mut self) -> Result<Token, CoreError> {
        self.transfer.state = self.transfer.state.advance(TransferState::TransferPackaged)?;
        Ok(self.to_txf())
    }

    /// The document as it should be persisted in the current state.
    pub fn to_txf(&self) -> Token {
        let mut token = self.token.clone();
        token.status = match self.transfer.state {
            TransferState::TransferRejected => TokenStatus::Failed,
            _ => TokenStatus::Pending,
        };
        token.offline_transfer = Some(self.transfer.clone());
        token
    }

    /// Record of a sent token as kept by the sender, once `proof` shows the packaged
    /// commitment spent the token. Until then the sender keeps the pending document.
    pub fn sender_record(&self, proof: &InclusionProof, trust_base: &TrustBase) -> Result<Token, CoreError> {
        self.check_inclusion(proof, trust_base)?;
        let mut token = self.to_txf();
        token.status = TokenStatus::Transferred;
        Ok(token)
    }

    /// Verifies the pre-transfer history against `trust_base`.
    pub fn verify_history(&self, trust_base: &TrustBase) -> Result<(), CoreError> {
        self.token.verify(trust_base)
    }

    fn check_inclusion(&self, proof: &InclusionProof, trust_base: &TrustBase) -> Result<(), CoreError> {
        let commitment = &self.transfer.commitment;
        proof::verify_inclusion(proof, trust_base, &commitment.request_id)?;
        if proof.authenticator.as_ref() != Some(&commitment.authenticator)
            || proof.transaction_hash != Some(commitment.transaction_hash())
        {
            return Err(CoreError::SignatureVerification(
                "inclusion proof is for a different commitment".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens a TXF document that carries an offline transfer.
    ///
    /// The embedded commitment must still verify and must spend the document's current
    /// state; an edited package is refused before anything is submitted.
    pub fn from_txf(mut token: Token) -> Result<Self, CoreError> {
        let transfer = token.offline_transfer.take().ok_or_else(|| {
            CoreError::Serialization("token carries no offline transfer".to_string())
        })?;
        transfer.commitment.verify()?;

        let data = &transfer.commitment.transaction_data;
        if &data.token_id != token.id() || &data.token_type != token.token_type() {
            return Err(CoreError::integrity(
                "offline transfer",
                "commitment belongs to another token",
            ));
        }
        if data.source_state != token.state {
            return Err(CoreError::integrity(
                "offline transfer",
                "commitment does not spend the current token state",
            ));
        }
        if data.recipient != transfer.recipient {
            return Err(CoreError::integrity(
                "offline transfer",
                "recipient differs from the committed recipient",
            ));
        }
        if recipient_data_hash(transfer.recipient_data.as_deref()).as_ref()
            != data.recipient_data_hash.as_ref()
        {
            return Err(CoreError::integrity(
                "offline transfer",
                "recipient data does not match the committed hash",
            ));
        }

        token.status = TokenStatus::Confirmed;
        Ok(Self { token, transfer })
    }

    pub fn commitment(&self) -> &Commitment<TransferTransactionData> {
        &self.transfer.commitment
    }

    pub fn transfer(&self) -> &OfflineTransfer {
        &self.transfer
    }

    pub fn state(&self) -> TransferState {
        self.transfer.state
    }

    /// Records that the packaged commitment was submitted under `request_id`.
    pub fn mark_submitted(&mut self, request_id: &RequestId) -> Result<(), CoreError> {
        if request_id != &self.transfer.commitment.request_id {
            return Err(CoreError::SignatureVerification(format!(
                "aggregator accepted request {}, commitment is {}",
                request_id, self.transfer.commitment.request_id
            )));
        }
        self.transfer.state = self.transfer.state.advance(TransferState::TransferSubmitted)?;
        Ok(())
    }

    /// Accepts the transfer once `proof` includes the packaged commitment.
    ///
    /// The whole history is verified against `trust_base`, before and after the new
    /// hop is appended. `recipient_predicate` must receive at the committed recipient
    /// address and `new_data` must match the committed data hash. Nothing changes on
    /// failure.
    pub fn confirm(
        &mut self,
        proof: &InclusionProof,
        trust_base: &TrustBase,
        recipient_predicate: &Predicate,
        new_data: Option<Vec<u8>>,
    ) -> Result<Token, CoreError> {
        let next = self.transfer.state.advance(TransferState::TransferConfirmed)?;
        self.verify_history(trust_base)?;
        self.check_inclusion(proof, trust_base)?;

        let data = &self.transfer.commitment.transaction_data;
        predicate::expect_address(recipient_predicate, &data.token_id, &data.token_type, &data.recipient)?;

        let mut token = self.token.clone();
        token.transactions.push(Transaction {
            data: data.clone(),
            inclusion_proof: proof.clone(),
        });
        token.state = TokenState::new(recipient_predicate.clone(), new_data);
        token.offline_transfer = None;
        token.status = TokenStatus::Confirmed;
        token.verify(trust_base)?;

        info!("transfer of {} to {} confirmed", token.id(), data.recipient);
        self.transfer.state = next;
        Ok(token)
    }

    /// Moves to the terminal rejected state.
    pub fn reject(&mut self, reason: &str) -> Result<(), CoreError> {
        self.transfer.state = self.transfer.state.advance(TransferState::TransferRejected)?;
        warn!("transfer of {} rejected: {}", self.token.id(), reason);
        Ok(())
    }
}

impl Token {
    /// Offline transfer protocol state of this document.
    pub fn transfer_state(&self) -> TransferState {
        self.offline_transfer
            .as_ref()
            .map(|t| t.state)
            .unwrap_or(TransferState::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Authenticator;
    use crate::errors::ProofCheck;
    use crate::predicate::{address_of, derive_masked_predicate, derive_unmasked_predicate};
    use crate::token::tests::{mint_to, TestAggregator, TOKEN_ID, TOKEN_TYPE};

    const NETWORK: &str = "test";

    struct Scene {
        aggregator: TestAggregator,
        alice: SigningService,
        bob: SigningService,
        token: Token,
    }

    fn scene() -> Scene {
        let mut aggregator = TestAggregator::new();
        let alice = SigningService::from_secret(b"alice").unwrap();
        let bob = SigningService::from_secret(b"bob").unwrap();
        let token = mint_to(&mut aggregator, &alice, Some(br#"{"name":"gift"}"#.to_vec()));
        Scene {
            aggregator,
            alice,
            bob,
            token,
        }
    }

    fn bob_masked(bob: &SigningService) -> Predicate {
        derive_masked_predicate(bob.public_key(), "gift-2024")
    }

    fn packaged(s: &Scene, data: Option<Vec<u8>>) -> Token {
        let recipient = address_of(&bob_masked(&s.bob), &TOKEN_ID, &TOKEN_TYPE);
        let mut package = TransferPackage::prepare(
            &s.token,
            &s.aggregator.trust_base,
            &s.alice,
            recipient,
            data,
            [6; 32],
            Some("for bob".to_string()),
            NETWORK,
        )
        .unwrap();
        assert_eq!(package.state(), TransferState::TransferPrepared);
        package.package().unwrap()
    }

    #[test]
    fn test_offline_transfer_end_to_end() {
        let mut s = scene();
        let data = Some(br#"{"name":"gift","to":"bob"}"#.to_vec());
        let txf = packaged(&s, data.clone());
        assert_eq!(txf.status, TokenStatus::Pending);
        assert_eq!(txf.transfer_state(), TransferState::TransferPackaged);

        let json = txf.to_json().unwrap();
        let mut package = TransferPackage::from_txf(Token::from_json(&json).unwrap()).unwrap();

        let proof = s.aggregator.include(package.commitment());
        let request_id = package.commitment().request_id;
        package.mark_submitted(&request_id).unwrap();

        let predicate = bob_masked(&s.bob);
        let received = package
            .confirm(&proof, &s.aggregator.trust_base, &predicate, data)
            .unwrap();

        assert_eq!(package.state(), TransferState::TransferConfirmed);
        assert_eq!(received.status, TokenStatus::Confirmed);
        assert!(received.offline_transfer.is_none());
        assert_eq!(received.transactions.len(), 1);
        assert_eq!(
            address_of(&received.state.predicate, &TOKEN_ID, &TOKEN_TYPE),
            received.transactions[0].data.recipient
        );
        received.verify(&s.aggregator.trust_base).unwrap();
    }

    #[test]
    fn test_unquorate_genesis_is_not_accepted() {
        let mut s = scene();
        let mut txf = packaged(&s, None);
        txf.genesis.inclusion_proof.unicity_certificate.signatures.clear();

        let mut package = TransferPackage::from_txf(txf).unwrap();
        assert!(matches!(
            package.verify_history(&s.aggregator.trust_base),
            Err(CoreError::ProofVerification { check: ProofCheck::Quorum, .. })
        ));

        let proof = s.aggregator.include(package.commitment());
        let request_id = package.commitment().request_id;
        package.mark_submitted(&request_id).unwrap();
        let err = package
            .confirm(&proof, &s.aggregator.trust_base, &bob_masked(&s.bob), None)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ProofVerification { check: ProofCheck::Quorum, .. }
        ));
        assert_eq!(package.state(), TransferState::TransferSubmitted);
    }

    #[test]
    fn test_sender_record_needs_inclusion() {
        let mut s = scene();
        let package = TransferPackage::from_txf(packaged(&s, None)).unwrap();

        let request_id = package.commitment().request_id;
        let excluded = s.aggregator.proof(&request_id);
        assert!(package
            .sender_record(&excluded, &s.aggregator.trust_base)
            .is_err());

        let proof = s.aggregator.include(package.commitment());
        let record = package
            .sender_record(&proof, &s.aggregator.trust_base)
            .unwrap();
        assert_eq!(record.status, TokenStatus::Transferred);
        assert!(record.offline_transfer.is_some());
    }

    #[test]
    fn test_confirm_requires_submission() {
        let mut s = scene();
        let mut package = TransferPackage::from_txf(packaged(&s, None)).unwrap();
        let proof = s.aggregator.include(package.commitment());
        let err = package
            .confirm(&proof, &s.aggregator.trust_base, &bob_masked(&s.bob), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(package.state(), TransferState::TransferPackaged);
    }

    #[test]
    fn test_wrong_nonce_is_predicate_mismatch() {
        let mut s = scene();
        let mut package = TransferPackage::from_txf(packaged(&s, None)).unwrap();
        let proof = s.aggregator.include(package.commitment());
        let request_id = package.commitment().request_id;
        package.mark_submitted(&request_id).unwrap();

        let wrong = derive_masked_predicate(s.bob.public_key(), "gift-2025");
        let err = package
            .confirm(&proof, &s.aggregator.trust_base, &wrong, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::PredicateMismatch { .. }));
        assert_eq!(package.state(), TransferState::TransferSubmitted);

        let unmasked = derive_unmasked_predicate(s.bob.public_key());
        assert!(package
            .confirm(&proof, &s.aggregator.trust_base, &unmasked, None)
            .is_err());
        package
            .confirm(&proof, &s.aggregator.trust_base, &bob_masked(&s.bob), None)
            .unwrap();
    }

    #[test]
    fn test_recipient_resigned_package_is_refused() {
        let s = scene();
        let mut txf = packaged(&s, None);
        let transfer = txf.offline_transfer.as_mut().unwrap();
        let hash = transfer.commitment.transaction_hash();
        let state_hash = transfer.commitment.authenticator.state_hash;
        transfer.commitment.authenticator = Authenticator::create(&s.bob, &hash, state_hash);
        transfer.commitment.request_id = transfer.commitment.authenticator.request_id();

        assert!(matches!(
            TransferPackage::from_txf(txf),
            Err(CoreError::SignatureVerification(_))
        ));
    }

    #[test]
    fn test_only_owner_can_prepare() {
        let s = scene();
        let recipient = address_of(&bob_masked(&s.bob), &TOKEN_ID, &TOKEN_TYPE);
        let err = TransferPackage::prepare(
            &s.token,
            &s.aggregator.trust_base,
            &s.bob,
            recipient,
            None,
            [6; 32],
            None,
            NETWORK,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SignatureVerification(_)));
    }

    #[test]
    fn test_tampered_recipient_data_is_refused() {
        let s = scene();
        let mut txf = packaged(&s, Some(b"one".to_vec()));
        txf.offline_transfer.as_mut().unwrap().recipient_data = Some(b"two".to_vec());
        assert!(matches!(
            TransferPackage::from_txf(txf),
            Err(CoreError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn test_new_data_must_match_commitment() {
        let mut s = scene();
        let mut package = TransferPackage::from_txf(packaged(&s, Some(b"one".to_vec()))).unwrap();
        let proof = s.aggregator.include(package.commitment());
        let request_id = package.commitment().request_id;
        package.mark_submitted(&request_id).unwrap();

        let err = package
            .confirm(&proof, &s.aggregator.trust_base, &bob_masked(&s.bob), Some(b"two".to_vec()))
            .unwrap_err();
        assert!(matches!(err, CoreError::DataIntegrity { .. }));
    }

    #[test]
    fn test_rejected_is_terminal() {
        let s = scene();
        let mut package = TransferPackage::from_txf(packaged(&s, None)).unwrap();
        package.reject("aggregator refused").unwrap();
        assert_eq!(package.to_txf().status, TokenStatus::Failed);

        let request_id = package.commitment().request_id;
        assert!(package.mark_submitted(&request_id).is_err());
        assert!(package.reject("again").is_err());
        assert_eq!(package.state(), TransferState::TransferRejected);
    }

    #[test]
    fn test_pending_token_cannot_be_sent_again() {
        let s = scene();
        let txf = packaged(&s, None);
        let recipient = address_of(&bob_masked(&s.bob), &TOKEN_ID, &TOKEN_TYPE);
        let err = TransferPackage::prepare(
            &txf,
            &s.aggregator.trust_base,
            &s.alice,
            recipient,
            None,
            [7; 32],
            None,
            NETWORK,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }
}
