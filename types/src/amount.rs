//! Currency amounts.
//!
//! Amounts are fixed-point integers in the smallest unit (wei, u128) to avoid
//! floating-point errors. The display denomination (ether) sits at a fixed
//! exponent of 18; conversion in both directions is exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::TypesError;

/// Number of decimal places between wei and ether.
pub const ETHER_DECIMALS: u32 = 18;

/// 1 ether expressed in wei.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// An amount in wei.
///
/// Serialized as a decimal string, since u128 values do not survive a
/// round trip through JSON numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Wei(u128);

impl Wei {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whole ether, e.g. `Wei::from_ether(2)` is 2 * 10^18 wei.
    pub fn from_ether(units: u128) -> Option<Self> {
        units.checked_mul(WEI_PER_ETHER).map(Self)
    }

    /// Parse a decimal ether amount such as `"0.01"` or `"12"`.
    ///
    /// At most 18 fractional digits are accepted; anything finer than one
    /// wei is rejected rather than rounded.
    pub fn parse_ether(text: &str) -> Result<Self, TypesError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TypesError::InvalidAmount("empty amount".into()));
        }
        let (whole, frac) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(TypesError::InvalidAmount(text.to_string()));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(TypesError::InvalidAmount(text.to_string()));
        }
        if frac.len() > ETHER_DECIMALS as usize {
            return Err(TypesError::InvalidAmount(format!(
                "{text}: more than {ETHER_DECIMALS} decimal places"
            )));
        }

        let overflow = || TypesError::InvalidAmount(format!("{text}: amount too large"));
        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut frac_wei: u128 = 0;
        if !frac.is_empty() {
            let scale = 10u128.pow(ETHER_DECIMALS - frac.len() as u32);
            frac_wei = frac.parse::<u128>().map_err(|_| overflow())? * scale;
        }
        whole_units
            .checked_mul(WEI_PER_ETHER)
            .and_then(|w| w.checked_add(frac_wei))
            .map(Self)
            .ok_or_else(overflow)
    }

    /// Render in ether with trailing fractional zeros trimmed: `"0.01"`, `"1"`.
    pub fn to_ether_string(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return whole.to_string();
        }
        let digits = format!("{:0width$}", frac, width = ETHER_DECIMALS as usize);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Wei {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Wei {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl FromStr for Wei {
    type Err = TypesError;

    /// Parse a raw wei integer. Use [`Wei::parse_ether`] for ether text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Self)
            .map_err(|e| TypesError::InvalidAmount(format!("{s}: {e}")))
    }
}

impl TryFrom<String> for Wei {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Wei> for String {
    fn from(w: Wei) -> Self {
        w.0.to_string()
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundredth_of_an_ether() {
        let w = Wei::new(10_000_000_000_000_000);
        assert_eq!(w.to_ether_string(), "0.01");
        assert_eq!(Wei::parse_ether("0.01").unwrap(), w);
    }

    #[test]
    fn tenth_of_an_ether() {
        let w = Wei::parse_ether("0.1").unwrap();
        assert_eq!(w.raw(), 100_000_000_000_000_000);
        assert_eq!(w.to_ether_string(), "0.1");
    }

    #[test]
    fn whole_ether_has_no_point() {
        assert_eq!(Wei::from_ether(3).unwrap().to_ether_string(), "3");
        assert_eq!(Wei::ZERO.to_ether_string(), "0");
    }

    #[test]
    fn one_wei() {
        assert_eq!(Wei::new(1).to_ether_string(), "0.000000000000000001");
        assert_eq!(Wei::parse_ether("0.000000000000000001").unwrap(), Wei::new(1));
    }

    #[test]
    fn parse_accepts_leading_point() {
        assert_eq!(Wei::parse_ether(".5").unwrap(), Wei::parse_ether("0.5").unwrap());
    }

    #[test]
    fn parse_rejects_sub_wei_precision() {
        assert!(Wei::parse_ether("0.0000000000000000001").is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", ".", "-1", "1e18", "1.2.3", "abc", "1,5"] {
            assert!(Wei::parse_ether(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(Wei::parse_ether("340282366920938463464").is_err());
    }

    #[test]
    fn display_includes_unit() {
        assert_eq!(Wei::parse_ether("1.5").unwrap().to_string(), "1.5 ETH");
    }

    #[test]
    fn serde_as_decimal_string() {
        let w = Wei::new(u128::MAX);
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));
        assert_eq!(serde_json::from_str::<Wei>(&json).unwrap(), w);
    }
}
