//! Core types for offchain token transfers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// A 32-byte ed25519 public key.
pub type PublicKeyBytes = [u8; 32];

/// Computes the SHA-256 hash of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Serde helpers that write fixed-size byte arrays as lowercase hex strings.
pub mod hex_array {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let raw = hex::decode(&text).map_err(D::Error::custom)?;
        if raw.len() != N {
            return Err(D::Error::custom(format!(
                "invalid length: {} (expected {})",
                raw.len(),
                N
            )));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&raw);
        Ok(out)
    }
}

/// Serde helpers for optional fixed-size byte arrays.
pub mod hex_array_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(
        bytes: &Option<[u8; N]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, const N: usize>(
        deserializer: D,
    ) -> Result<Option<[u8; N]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            None => Ok(None),
            Some(text) => {
                let raw = hex::decode(&text).map_err(D::Error::custom)?;
                let out: [u8; N] = raw.try_into().map_err(|v: Vec<u8>| {
                    D::Error::custom(format!("invalid length: {} (expected {})", v.len(), N))
                })?;
                Ok(Some(out))
            }
        }
    }
}

/// Serde helpers for optional variable-length byte payloads.
pub mod hex_bytes_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| hex::decode(t).map_err(D::Error::custom))
            .transpose()
    }
}

/// Identifier of a single token, fixed at mint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(#[serde(with = "hex_array")] pub [u8; 32]);

/// Identifier of the class a token belongs to, fixed at mint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenType(#[serde(with = "hex_array")] pub [u8; 32]);

/// Identifier of a coin class inside a token's coin data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoinId(#[serde(with = "hex_array")] pub [u8; 32]);

/// Key of a commitment in the aggregator tree: `SHA256(publicKey || stateHash)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(#[serde(with = "hex_array")] pub [u8; 32]);

impl RequestId {
    /// Derives the request id for a state owned by `public_key`.
    pub fn new(public_key: &PublicKeyBytes, state_hash: &Hash) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(public_key);
        hasher.update(state_hash);
        let mut id = [0u8; 32];
        id.copy_from_slice(&hasher.finalize());
        RequestId(id)
    }

    /// Parses a request id from 64 hex characters.
    pub fn from_hex(text: &str) -> Option<Self> {
        let raw = hex::decode(text).ok()?;
        let id: [u8; 32] = raw.try_into().ok()?;
        Some(RequestId(id))
    }
}

/// A 64-byte ed25519 signature, carried as hex in JSON.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl serde::Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SignatureVisitor;

        impl<'de> serde::de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 64-byte signature as 128 hex characters")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let raw = hex::decode(v).map_err(E::custom)?;
                if raw.len() != 64 {
                    return Err(E::custom(format!(
                        "invalid signature length: {} (expected 64)",
                        raw.len()
                    )));
                }

                let mut signature = [0u8; 64];
                signature.copy_from_slice(&raw);
                Ok(Signature(signature))
            }
        }

        deserializer.deserialize_str(SignatureVisitor)
    }
}

/// Ordered coin balances carried by a token at mint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoinData(pub Vec<(CoinId, String)>);

impl CoinData {
    /// Adds a coin balance; amounts are kept as decimal strings on the wire.
    pub fn push(&mut self, coin: CoinId, amount: u128) {
        self.0.push((coin, amount.to_string()));
    }

    /// Iterates the balances, parsing the amounts.
    pub fn balances(&self) -> impl Iterator<Item = (CoinId, Option<u128>)> + '_ {
        self.0.iter().map(|(coin, amount)| (*coin, amount.parse().ok()))
    }
}

macro_rules! impl_hex_display {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&hex::encode(self.0))
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({})", stringify!($name), hex::encode(self.0))
                }
            }
        )*
    };
}

impl_hex_display!(TokenId, TokenType, CoinId, RequestId, Signature);
