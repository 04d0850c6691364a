//! Binding of mutable state data to the committed transaction hashes.
//!
//! The aggregator only ever sees hashes. Each hop of a token commits to the hash of the
//! data its recipient state carries, so tampering with a payload in a TXF document is
//! caught here even when every signature and proof is valid.

use crate::commitment::{recipient_data_hash, TransactionData};
use crate::errors::CoreError;
use crate::proof::InclusionProof;
use crate::token::{Token, TokenState};
use tracing::debug;

/// Checks one hop: the proof binds the recomputed transaction hash and the produced
/// state carries exactly the data the transaction committed to.
fn check_hop<T: TransactionData>(
    hop: &str,
    data: &T,
    proof: &InclusionProof,
    produced: &TokenState,
) -> Result<(), CoreError> {
    let transaction_hash = data.transaction_hash();
    match proof.transaction_hash {
        Some(bound) if bound == transaction_hash => {}
        Some(bound) => {
            return Err(CoreError::integrity(
                hop,
                format!(
                    "transaction hash {} differs from the proof's {}",
                    hex::encode(transaction_hash),
                    hex::encode(bound)
                ),
            ))
        }
        None => {
            return Err(CoreError::integrity(
                hop,
                "inclusion proof binds no transaction hash",
            ))
        }
    }

    let actual = recipient_data_hash(produced.data.as_deref());
    if actual.as_ref() != data.recipient_data_hash() {
        let reason = match (data.recipient_data_hash(), actual) {
            (None, _) => "state carries data but none was committed".to_string(),
            (Some(_), None) => "committed data is missing from the state".to_string(),
            (Some(expected), Some(actual)) => format!(
                "state data hashes to {}, committed {}",
                hex::encode(actual),
                hex::encode(expected)
            ),
        };
        return Err(CoreError::integrity(hop, reason));
    }
    Ok(())
}

/// The state produced by hop `index`, where hop 0 is the genesis.
fn produced_state(token: &Token, index: usize) -> &TokenState {
    token
        .transactions
        .get(index)
        .map(|tx| &tx.data.source_state)
        .unwrap_or(&token.state)
}

/// Checks the mint hop only.
pub fn verify_genesis_data_integrity(token: &Token) -> Result<(), CoreError> {
    check_hop(
        "genesis",
        &token.genesis.data,
        &token.genesis.inclusion_proof,
        produced_state(token, 0),
    )
}

/// Walks genesis and every transaction in order; the first mismatch rejects the token.
pub fn verify_chain_integrity(token: &Token) -> Result<(), CoreError> {
    verify_genesis_data_integrity(token)?;
    for (index, tx) in token.transactions.iter().enumerate() {
        check_hop(
            &format!("transaction {}", index),
            &tx.data,
            &tx.inclusion_proof,
            produced_state(token, index + 1),
        )?;
    }
    debug!(
        "data integrity of {} holds over {} hops",
        token.id(),
        token.transactions.len() + 1
    );
    Ok(())
}
