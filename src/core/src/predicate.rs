//! Ownership predicates and the addresses they receive at.
//!
//! A predicate names the key that may spend a token. The unmasked variant yields one
//! reusable address per key and token type; the masked variant mixes in a nonce, so
//! only someone who knows the nonce can link the address to the key.

use crate::address::Address;
use crate::encoding::CanonicalEncoder;
use crate::errors::CoreError;
use crate::signing::{self, ALGORITHM};
use crate::types::{hex_array, sha256, Hash, PublicKeyBytes, Signature, TokenId, TokenType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A 32-byte predicate nonce.
pub type Nonce = [u8; 32];

/// Normalizes textual nonce input to 32 bytes.
///
/// Exactly 64 hex characters are decoded as-is; any other text is hashed with
/// SHA-256. Every caller that derives or checks a masked address goes through here.
pub fn canonical_nonce(input: &str) -> Nonce {
    if input.len() == 64 && input.bytes().all(|b| b.is_ascii_hexdigit()) {
        let mut nonce = [0u8; 32];
        if hex::decode_to_slice(input, &mut nonce).is_ok() {
            return nonce;
        }
    }
    sha256(input.as_bytes())
}

/// Who may spend a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Predicate {
    /// Address derived directly from the public key.
    #[serde(rename = "UNMASKED")]
    Unmasked {
        #[serde(rename = "publicKey", with = "hex_array")]
        public_key: PublicKeyBytes,
    },
    /// Address derived from the public key and a secret nonce.
    #[serde(rename = "MASKED")]
    Masked {
        #[serde(rename = "publicKey", with = "hex_array")]
        public_key: PublicKeyBytes,
        #[serde(with = "hex_array")]
        nonce: Nonce,
    },
}

/// Builds an unmasked predicate for `public_key`.
pub fn derive_unmasked_predicate(public_key: PublicKeyBytes) -> Predicate {
    Predicate::Unmasked { public_key }
}

/// Builds a masked predicate, canonicalizing `nonce_input` first.
pub fn derive_masked_predicate(public_key: PublicKeyBytes, nonce_input: &str) -> Predicate {
    Predicate::Masked {
        public_key,
        nonce: canonical_nonce(nonce_input),
    }
}

/// Derives the address at which `predicate` receives tokens of `token_type`.
///
/// The token id does not enter the address, so a recipient can publish an address
/// before they learn which token will be sent. It is bound through
/// [`Predicate::hash`] instead.
pub fn address_of(predicate: &Predicate, _token_id: &TokenId, token_type: &TokenType) -> Address {
    receiving_address(predicate, token_type)
}

/// The address a recipient publishes before any token exists; equal to [`address_of`]
/// for every token id of `token_type`.
pub fn receiving_address(predicate: &Predicate, token_type: &TokenType) -> Address {
    Address::direct(predicate.reference(token_type))
}

/// Fails with `PredicateMismatch` unless `predicate` receives at `expected`.
pub fn expect_address(
    predicate: &Predicate,
    token_id: &TokenId,
    token_type: &TokenType,
    expected: &Address,
) -> Result<(), CoreError> {
    let actual = address_of(predicate, token_id, token_type);
    if &actual != expected {
        debug!("derived {} but expected {}", actual, expected);
        return Err(CoreError::PredicateMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Checks that `public_key` is the predicate's key and that `signature` verifies.
pub fn verify_ownership(
    predicate: &Predicate,
    signature: &Signature,
    message: &[u8],
    public_key: &PublicKeyBytes,
) -> Result<(), CoreError> {
    if predicate.public_key() != public_key {
        return Err(CoreError::SignatureVerification(format!(
            "authenticator key {} does not match source predicate key {}",
            hex::encode(public_key),
            hex::encode(predicate.public_key())
        )));
    }
    if !signing::verify(public_key, message, signature) {
        return Err(CoreError::SignatureVerification(
            "signature does not verify".to_string(),
        ));
    }
    Ok(())
}

impl Predicate {
    pub fn public_key(&self) -> &PublicKeyBytes {
        match self {
            Predicate::Unmasked { public_key } => public_key,
            Predicate::Masked { public_key, .. } => public_key,
        }
    }

    /// Hash identifying the predicate within a token type; the direct address payload.
    pub fn reference(&self, token_type: &TokenType) -> Hash {
        match self {
            Predicate::Unmasked { public_key } => {
                let mut enc = CanonicalEncoder::new("UNMASKED");
                enc.bytes(&token_type.0).text(ALGORITHM).bytes(public_key);
                enc.hash()
            }
            Predicate::Masked { public_key, nonce } => {
                let mut enc = CanonicalEncoder::new("MASKED");
                enc.bytes(&token_type.0)
                    .text(ALGORITHM)
                    .bytes(public_key)
                    .bytes(nonce);
                enc.hash()
            }
        }
    }

    /// Hash of the predicate bound to one token.
    pub fn hash(&self, token_id: &TokenId, token_type: &TokenType) -> Hash {
        let mut enc = CanonicalEncoder::new("Predicate");
        enc.bytes(&self.reference(token_type)).bytes(&token_id.0);
        enc.hash()
    }
}
