//! Object digests.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The length of a digest in bytes.
pub const OID_BYTES: usize = 20;

/// The length of a digest as a hexadecimal string.
pub const OID_HEX_LEN: usize = 40;

/// A 20-byte SHA-1 object digest.
///
/// Ordering compares the raw bytes, which is also the ordering of the
/// lowercase hex form; pack indexes rely on this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid([u8; OID_BYTES]);

impl Oid {
    /// The all-zero digest, written in reflogs for "no previous value".
    pub const ZERO: Oid = Oid([0; OID_BYTES]);

    /// Parses a 40-character hexadecimal digest, in either case.
    ///
    /// ```
    /// use treesync::objects::Oid;
    ///
    /// let oid = Oid::from_hex("DA39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
    /// assert_eq!(oid.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        let invalid = || Error::InvalidOid(hex.to_string());
        if hex.len() != OID_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; OID_BYTES];
        for (byte, i) in bytes.iter_mut().zip((0..OID_HEX_LEN).step_by(2)) {
            *byte = u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Oid(bytes))
    }

    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; OID_BYTES]) -> Self {
        Oid(bytes)
    }

    /// Copies a digest out of a slice, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Oid)
    }

    /// Returns the lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Returns the first seven hex digits.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; OID_BYTES] {
        &self.0
    }

    /// Returns true for [`Oid::ZERO`].
    pub fn is_zero(&self) -> bool {
        *self == Oid::ZERO
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::from_hex(s)
    }
}
