//! Receive command.

use crate::config::CliConfig;
use crate::errors::CliError;
use crate::txf::{load_token, save_token};
use crate::wallet::Wallet;
use std::path::Path;
use tracing::{info, warn};
use txf_core::predicate::expect_address;
use txf_core::{Token, TransferPackage, TrustBase};
use txf_network::{submit_with_retry, wait_for_inclusion, AggregatorClient, NetworkError};

/// Completes the transfer in the document at `transfer_path` and writes the received
/// token to `output`.
///
/// The history the sender hands over is verified before anything is submitted, and
/// the sender's signed commitment is submitted as-is. A refusal by the aggregator
/// marks the document `FAILED`; a timeout leaves it untouched so the command can be
/// run again.
pub async fn run<P: AsRef<Path>, Q: AsRef<Path>>(
    config: &CliConfig,
    client: &dyn AggregatorClient,
    trust_base: &TrustBase,
    wallet: &Wallet,
    transfer_path: P,
    nonce: Option<&str>,
    output: Q,
) -> Result<Token, CliError> {
    let mut package = TransferPackage::from_txf(load_token(&transfer_path)?)?;
    package.verify_history(trust_base)?;
    if package.transfer().network != config.network {
        return Err(CliError::InvalidArgument(format!(
            "transfer is for network {}, configured network is {}",
            package.transfer().network,
            config.network
        )));
    }

    let predicate = wallet.predicate(nonce);
    let data = &package.commitment().transaction_data;
    expect_address(&predicate, &data.token_id, &data.token_type, &data.recipient)?;

    let submitted = submit_with_retry(client, package.commitment(), &config.retry_policy()).await;
    let request_id = match submitted {
        Ok(request_id) => request_id,
        Err(NetworkError::Rejected(status)) => {
            package.reject(&status.to_string())?;
            save_token(&transfer_path, &package.to_txf())?;
            return Err(NetworkError::Rejected(status).into());
        }
        Err(e) => return Err(e.into()),
    };
    package.mark_submitted(&request_id)?;

    let proof = wait_for_inclusion(client, &request_id, trust_base, &config.poll_policy()).await?;
    let recipient_data = package.transfer().recipient_data.clone();
    let token = match package.confirm(&proof, trust_base, &predicate, recipient_data) {
        Ok(token) => token,
        Err(e) => {
            warn!("received transfer does not verify: {}", e);
            return Err(e.into());
        }
    };

    save_token(&output, &token)?;
    info!("Received token {}", token.id());
    Ok(token)
}
