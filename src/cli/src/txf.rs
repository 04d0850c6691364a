//! Reading and writing TXF token documents.

use crate::errors::CliError;
use std::fs;
use std::path::Path;
use tracing::debug;
use txf_core::types::sha256;
use txf_core::Token;

/// Loads a token document.
pub fn load_token<P: AsRef<Path>>(path: P) -> Result<Token, CliError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let token = Token::from_json(&text)?;
    debug!("loaded {} from {}", token, path.display());
    Ok(token)
}

/// Writes a token document, creating parent directories as needed.
pub fn save_token<P: AsRef<Path>>(path: P, token: &Token) -> Result<(), CliError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, token.to_json()?)?;
    debug!("saved {} to {}", token, path.display());
    Ok(())
}

/// Turns a user supplied identifier into 32 bytes: 64 hex characters are taken as-is,
/// any other text is hashed.
pub fn id_from_text(text: &str) -> [u8; 32] {
    let mut id = [0u8; 32];
    if text.len() == 64 && hex::decode_to_slice(text, &mut id).is_ok() {
        return id;
    }
    sha256(text.as_bytes())
}

/// Optional UTF-8 payload; empty text means no data.
pub fn data_from_text(text: Option<&str>) -> Option<Vec<u8>> {
    text.filter(|t| !t.is_empty()).map(|t| t.as_bytes().to_vec())
}
