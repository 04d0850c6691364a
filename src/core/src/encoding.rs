//! Canonical binary encoding used for every hashed structure.
//!
//! Each item is written as a one-byte type tag, a big-endian `u32` length and the
//! payload. Structures begin with a domain string so that two structures with the
//! same field values never share an encoding.

use crate::types::{sha256, Hash};
use byteorder::{BigEndian, WriteBytesExt};

const TAG_BYTES: u8 = 0x01;
const TAG_NULL: u8 = 0x02;
const TAG_UINT: u8 = 0x03;
const TAG_LIST: u8 = 0x04;
const TAG_TEXT: u8 = 0x05;

/// Builds the canonical encoding of an ordered list of fields.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buf: Vec<u8>,
}

impl CanonicalEncoder {
    /// Starts a structure tagged with `domain`.
    pub fn new(domain: &str) -> Self {
        let mut encoder = Self { buf: Vec::new() };
        encoder.text(domain);
        encoder
    }

    fn header(&mut self, tag: u8, len: usize) {
        self.buf.push(tag);
        // Writing into a Vec cannot fail.
        let _ = self.buf.write_u32::<BigEndian>(len as u32);
    }

    /// Appends a byte string.
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.header(TAG_BYTES, value.len());
        self.buf.extend_from_slice(value);
        self
    }

    /// Appends a UTF-8 string.
    pub fn text(&mut self, value: &str) -> &mut Self {
        self.header(TAG_TEXT, value.len());
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Appends a byte string or an explicit null marker.
    pub fn optional(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            Some(v) => self.bytes(v),
            None => {
                self.header(TAG_NULL, 0);
                self
            }
        }
    }

    /// Appends an unsigned integer as 16 big-endian bytes.
    pub fn uint(&mut self, value: u128) -> &mut Self {
        self.header(TAG_UINT, 16);
        let _ = self.buf.write_u128::<BigEndian>(value);
        self
    }

    /// Appends a list header; the caller then writes `len` items.
    pub fn list(&mut self, len: usize) -> &mut Self {
        self.header(TAG_LIST, len);
        self
    }

    /// Returns the encoded bytes.
    pub fn finish(&self) -> Vec<u8> {
        self.buf.clone()
    }

    /// Returns the SHA-256 hash of the encoded bytes.
    pub fn hash(&self) -> Hash {
        sha256(&self.buf)
    }
}
