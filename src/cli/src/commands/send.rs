//! Send command.

use crate::config::CliConfig;
use crate::errors::CliError;
use crate::txf::{load_token, save_token};
use crate::wallet::Wallet;
use std::path::Path;
use tracing::{info, warn};
use txf_core::{address, Token, TransferPackage, TrustBase};
use txf_network::{submit_with_retry, wait_for_inclusion, AggregatorClient, NetworkError};

/// What to send.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// Recipient address as published by the recipient
    pub recipient: String,
    /// State data for the recipient; the current data is carried over when absent
    pub data: Option<Vec<u8>>,
    /// Free text message committed with the transfer
    pub message: Option<String>,
    /// Package only, leaving submission to whoever holds the document
    pub offline: bool,
}

/// Signs a transfer of the token at `token_path` and writes the transfer document to
/// `output`.
///
/// The sender's own file keeps the pending document until an inclusion proof of the
/// commitment verifies; only then is it replaced by a `TRANSFERRED` record. With
/// `offline` nothing is submitted and the sender's copy stays pending. Otherwise the
/// signed commitment is submitted right away and awaited; a timeout leaves the copy
/// pending and the recipient still finishes the transfer from the document.
pub async fn run<P: AsRef<Path>, Q: AsRef<Path>>(
    config: &CliConfig,
    client: &dyn AggregatorClient,
    trust_base: &TrustBase,
    wallet: &Wallet,
    token_path: P,
    request: SendRequest,
    output: Q,
) -> Result<Token, CliError> {
    let token = load_token(&token_path)?;
    let recipient = address::decode(&request.recipient)?;
    let data = request.data.or_else(|| token.state.data.clone());

    let mut package = TransferPackage::prepare(
        &token,
        trust_base,
        wallet.signer(),
        recipient,
        data,
        rand::random(),
        request.message,
        &config.network,
    )?;
    package.package()?;

    if request.offline {
        let document = package.to_txf();
        save_token(&output, &document)?;
        save_token(&token_path, &document)?;
        info!("Transfer of {} packaged for offline delivery", token.id());
        return Ok(document);
    }

    let request_id = submit_with_retry(client, package.commitment(), &config.retry_policy()).await?;
    package.mark_submitted(&request_id)?;
    info!("Transfer of {} submitted as {}", token.id(), request_id);

    let document = package.to_txf();
    save_token(&output, &document)?;
    save_token(&token_path, &document)?;

    match wait_for_inclusion(client, &request_id, trust_base, &config.poll_policy()).await {
        Ok(proof) => {
            save_token(&token_path, &package.sender_record(&proof, trust_base)?)?;
            info!("Transfer of {} included", token.id());
        }
        Err(NetworkError::Timeout(reason)) => {
            warn!("no inclusion proof yet ({}); {} stays pending", reason, token.id());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(document)
}
