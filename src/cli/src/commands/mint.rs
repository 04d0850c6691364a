//! Mint command.

use crate::config::CliConfig;
use crate::errors::CliError;
use crate::txf::{id_from_text, save_token};
use crate::wallet::Wallet;
use std::path::Path;
use tracing::{debug, info};
use txf_core::commitment::recipient_data_hash;
use txf_core::predicate::address_of;
use txf_core::{
    commit_mint, MintTransactionData, Token, TokenId, TokenState, TokenType, TrustBase,
};
use txf_network::{AggregatorClient, Submission};

/// What to mint.
#[derive(Debug, Clone, Default)]
pub struct MintRequest {
    /// Token id as hex or text; random when absent
    pub token_id: Option<String>,
    /// Token type as hex or text
    pub token_type: String,
    /// Immutable token data
    pub token_data: Vec<u8>,
    /// Mutable state data
    pub data: Option<Vec<u8>>,
    /// Nonce for a masked owner predicate
    pub nonce: Option<String>,
}

/// Mints a token to `wallet` and writes it to `output`.
pub async fn run<P: AsRef<Path>>(
    config: &CliConfig,
    client: &dyn AggregatorClient,
    trust_base: &TrustBase,
    wallet: &Wallet,
    request: MintRequest,
    output: P,
) -> Result<Token, CliError> {
    let token_id = TokenId(match &request.token_id {
        Some(text) => id_from_text(text),
        None => rand::random(),
    });
    let token_type = TokenType(id_from_text(&request.token_type));
    let predicate = wallet.predicate(request.nonce.as_deref());
    let recipient = address_of(&predicate, &token_id, &token_type);
    info!("Minting token {} to {}", token_id, recipient);

    let data = MintTransactionData::new(
        token_id,
        token_type,
        request.token_data,
        None,
        recipient,
        rand::random(),
        recipient_data_hash(request.data.as_deref()),
        None,
    );
    let mut submission = Submission::new(commit_mint(data)?)?;
    let request_id = submission.submit(client, &config.retry_policy()).await?;
    debug!("genesis submitted as {}", request_id);

    let proof = submission
        .await_inclusion(client, trust_base, &config.poll_policy())
        .await?;
    let token = Token::from_genesis(
        submission.commitment().clone(),
        proof,
        TokenState::new(predicate, request.data),
        trust_base,
    )?;
    submission.confirm()?;

    save_token(output, &token)?;
    Ok(token)
}
