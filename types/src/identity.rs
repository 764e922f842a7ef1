//! Account identity: a 20-byte address written as `0x` + 40 hex digits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// An account address on the bounty ledger.
///
/// Parsing accepts upper- or lower-case hex; the text form is always lowercase,
/// so two spellings of the same address compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; 20]);

impl Identity {
    /// The standard prefix for the text form.
    pub const PREFIX: &'static str = "0x";

    /// The all-zero address. Never a valid sender.
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Identity {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix(Self::PREFIX)
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| TypesError::InvalidIdentity(format!("missing 0x prefix: {s}")))?;
        if digits.len() != 40 {
            return Err(TypesError::InvalidIdentity(format!(
                "expected 40 hex digits, got {}",
                digits.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| TypesError::InvalidIdentity(format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Identity {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mixed_case_normalises() {
        let id: Identity = "0x782396570dcc0Cb520b5E1661D4a359E3dc00f9e".parse().unwrap();
        assert_eq!(id.to_string(), "0x782396570dcc0cb520b5e1661d4a359e3dc00f9e");
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        assert!("782396570dcc0cb520b5e1661d4a359e3dc00f9e".parse::<Identity>().is_err());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("0x1234".parse::<Identity>().is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!("0xzz2396570dcc0cb520b5e1661d4a359e3dc00f9e".parse::<Identity>().is_err());
    }

    #[test]
    fn serde_uses_text_form() {
        let id = Identity::new([0xab; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
