//! Keys derived from a user secret for the duration of one command.

use crate::errors::CliError;
use txf_core::predicate::{derive_masked_predicate, derive_unmasked_predicate, receiving_address};
use txf_core::types::PublicKeyBytes;
use txf_core::{Address, Predicate, SigningService, TokenType};

/// Signing key and predicates of one party.
///
/// Nothing is persisted; the key lives as long as the value.
pub struct Wallet {
    signer: SigningService,
}

impl Wallet {
    pub fn from_secret(secret: &str) -> Result<Self, CliError> {
        if secret.is_empty() {
            return Err(CliError::MissingSecret);
        }
        Ok(Self {
            signer: SigningService::from_secret(secret.as_bytes())?,
        })
    }

    pub fn signer(&self) -> &SigningService {
        &self.signer
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        self.signer.public_key()
    }

    /// Masked predicate when a nonce is given, unmasked otherwise.
    pub fn predicate(&self, nonce: Option<&str>) -> Predicate {
        match nonce {
            Some(nonce) => derive_masked_predicate(self.public_key(), nonce),
            None => derive_unmasked_predicate(self.public_key()),
        }
    }

    pub fn address(&self, nonce: Option<&str>, token_type: &TokenType) -> Address {
        receiving_address(&self.predicate(nonce), token_type)
    }
}
