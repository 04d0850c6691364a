//! Verify command.

use crate::errors::CliError;
use crate::txf::load_token;
use std::path::Path;
use txf_core::{Token, TransferPackage, TrustBase};

/// Fully verifies the document at `token_path`.
///
/// Any violation is an error. A document carrying an offline transfer must also hold
/// an intact, correctly signed commitment.
pub fn run<P: AsRef<Path>>(trust_base: &TrustBase, token_path: P) -> Result<Token, CliError> {
    let token = load_token(token_path)?;
    token.verify(trust_base)?;
    if token.is_transfer_pending() {
        TransferPackage::from_txf(token.clone())?;
    }
    Ok(token)
}
