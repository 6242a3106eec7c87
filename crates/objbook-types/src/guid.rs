use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Number of bytes in a [`Guid`].
pub const GUID_LEN: usize = 16;

/// Number of characters in the canonical text form of a [`Guid`].
pub const GUID_HEX_LEN: usize = GUID_LEN * 2;

/// 128-bit identifier of an entity.
///
/// Identifiers are unique within a (book, type) pair and are never reused
/// while the owning book lives. The canonical text form is 32 lower-case hex
/// characters with no separators, so it is always the same width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(Uuid);

impl Guid {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero identifier. Never assigned to a live entity.
    pub const fn null() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this is the all-zero identifier.
    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; GUID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; GUID_LEN] {
        self.0.as_bytes()
    }

    /// Canonical 32-character hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short identifier (first 8 hex characters), for log output.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }

    /// Parse the 32-character hex encoding. Upper-case digits are accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != GUID_LEN {
            return Err(TypeError::InvalidLength {
                expected: GUID_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; GUID_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(arr))
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for Guid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.short_hex())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
