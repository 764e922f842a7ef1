//! Transaction hashes.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

type Blake2b256 = Blake2b<U32>;

/// A 32-byte transaction hash, written as `0x` + 64 hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash multiple byte slices in sequence.
    pub fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Blake2b256::new();
        for part in parts {
            hasher.update(part);
        }
        let mut output = [0u8; 32];
        output.copy_from_slice(&hasher.finalize());
        Self(output)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl FromStr for TxHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix("0x")
            .ok_or_else(|| TypesError::InvalidHash(format!("missing 0x prefix: {s}")))?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| TypesError::InvalidHash(format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for TxHash {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TxHash> for String {
    fn from(h: TxHash) -> Self {
        h.to_string()
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
