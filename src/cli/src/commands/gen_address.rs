//! Gen-address command.

use crate::errors::CliError;
use crate::txf::id_from_text;
use crate::wallet::Wallet;
use tracing::info;
use txf_core::TokenType;

/// Derives the address at which `wallet` receives tokens of `token_type`.
///
/// With a nonce the address is masked; the same nonce must be given to `receive`.
pub fn run(wallet: &Wallet, token_type: &str, nonce: Option<&str>) -> Result<String, CliError> {
    let token_type = TokenType(id_from_text(token_type));
    let address = wallet.address(nonce, &token_type);
    info!(
        "derived {} address for token type {}",
        if nonce.is_some() { "masked" } else { "unmasked" },
        token_type
    );
    Ok(address.to_string())
}
