//! Ed25519 signing keys derived from user secrets.

use crate::encoding::CanonicalEncoder;
use crate::errors::CoreError;
use crate::types::{sha256, Hash, PublicKeyBytes, Signature, TokenId};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer, Verifier};

/// Name of the signature algorithm recorded in predicates and authenticators.
pub const ALGORITHM: &str = "ed25519";

/// Domain of the key that signs every genesis commitment.
const MINTER_DOMAIN: &str = "UniversalMinter";

/// Holds a private key for the duration of one operation.
///
/// The secret key is zeroized by `ed25519_dalek` when the service is dropped.
pub struct SigningService {
    keypair: Keypair,
}

impl SigningService {
    /// Derives a signing key from an arbitrary secret: the seed is `SHA256(secret)`.
    pub fn from_secret(secret: &[u8]) -> Result<Self, CoreError> {
        Self::from_seed(&sha256(secret))
    }

    /// Derives the universal minter key for `token_id`.
    ///
    /// Anyone can derive this key; it only proves that the genesis commitment was made
    /// for this token id.
    pub fn minter(token_id: &TokenId) -> Result<Self, CoreError> {
        let mut enc = CanonicalEncoder::new(MINTER_DOMAIN);
        enc.bytes(&token_id.0);
        Self::from_seed(&enc.hash())
    }

    fn from_seed(seed: &Hash) -> Result<Self, CoreError> {
        let secret = SecretKey::from_bytes(seed)
            .map_err(|e| CoreError::SignatureVerification(format!("invalid secret key: {}", e)))?;
        let public = PublicKey::from(&secret);
        Ok(Self {
            keypair: Keypair { secret, public },
        })
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        self.keypair.public.to_bytes()
    }

    /// Signs a 32-byte hash.
    pub fn sign(&self, hash: &Hash) -> Signature {
        Signature(self.keypair.sign(hash).to_bytes())
    }
}

/// Verifies `signature` over `message` with `public_key`.
pub fn verify(public_key: &PublicKeyBytes, message: &[u8], signature: &Signature) -> bool {
    let public = match PublicKey::from_bytes(public_key) {
        Ok(public) => public,
        Err(_) => return false,
    };
    let signature = match ed25519_dalek::Signature::try_from(&signature.0[..]) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    public.verify(message, &signature).is_ok()
}
