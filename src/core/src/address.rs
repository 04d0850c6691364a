//! Checksummed token addresses.
//!
//! The wire form is `SCHEME://` followed by 64 hex characters of payload and 8 hex
//! characters of checksum, where the checksum is the first four bytes of
//! `SHA256(payload)`.

use crate::errors::CoreError;
use crate::types::sha256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: &str = "://";
const PAYLOAD_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;
const HEX_LEN: usize = (PAYLOAD_LEN + CHECKSUM_LEN) * 2;

/// How the payload of an address is resolved to an owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressScheme {
    /// Payload is a predicate reference.
    Direct,
    /// Payload is the id of a name tag token that points at the owner.
    Proxy,
}

impl AddressScheme {
    /// The scheme prefix as written on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressScheme::Direct => "DIRECT",
            AddressScheme::Proxy => "PROXY",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "DIRECT" => Some(AddressScheme::Direct),
            "PROXY" => Some(AddressScheme::Proxy),
            _ => None,
        }
    }
}

/// A decoded address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    scheme: AddressScheme,
    payload: [u8; PAYLOAD_LEN],
}

fn checksum(payload: &[u8; PAYLOAD_LEN]) -> [u8; CHECKSUM_LEN] {
    let digest = sha256(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Encodes `payload` under `scheme`, appending its checksum.
pub fn encode(scheme: AddressScheme, payload: &[u8; PAYLOAD_LEN]) -> String {
    format!(
        "{}{}{}{}",
        scheme.as_str(),
        SEPARATOR,
        hex::encode(payload),
        hex::encode(checksum(payload))
    )
}

/// Decodes and validates an address string.
pub fn decode(text: &str) -> Result<Address, CoreError> {
    let (scheme, body) = text
        .split_once(SEPARATOR)
        .ok_or_else(|| CoreError::AddressFormat(format!("missing scheme separator in {:?}", text)))?;

    let scheme = AddressScheme::parse(scheme)
        .ok_or_else(|| CoreError::AddressFormat(format!("unknown scheme {:?}", scheme)))?;

    if body.len() != HEX_LEN {
        return Err(CoreError::AddressFormat(format!(
            "expected {} hex characters after the scheme, got {}",
            HEX_LEN,
            body.len()
        )));
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CoreError::AddressFormat(
            "address contains non-hex characters".to_string(),
        ));
    }

    let raw = hex::decode(body).map_err(|e| CoreError::AddressFormat(e.to_string()))?;
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&raw[..PAYLOAD_LEN]);

    if raw[PAYLOAD_LEN..] != checksum(&payload) {
        return Err(CoreError::AddressFormat("checksum mismatch".to_string()));
    }

    Ok(Address { scheme, payload })
}

impl Address {
    /// Creates a direct address from a predicate reference.
    pub fn direct(payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            scheme: AddressScheme::Direct,
            payload,
        }
    }

    /// Creates a proxy address pointing at a name tag token.
    pub fn proxy(payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            scheme: AddressScheme::Proxy,
            payload,
        }
    }

    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    pub fn payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.payload
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self.scheme, &self.payload))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map_err(serde::de::Error::custom)
    }
}
