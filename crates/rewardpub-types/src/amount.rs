use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Payout amount in base token units
/// Serialized as a decimal string so consumers without 128-bit integers keep full precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    /// Zero amount
    pub const ZERO: Amount = Amount(0);

    /// Width of the canonical big-endian encoding
    pub const ENCODED_LEN: usize = 16;

    pub const fn new(raw: u128) -> Self {
        Amount(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| PipelineError::InvalidRewardSet("amount overflow in addition".to_string()))
    }

    /// Fixed-width encoding used for hashing
    pub fn to_be_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        self.0.to_be_bytes()
    }

    /// Parse a decimal string (no sign, no fraction)
    pub fn from_dec_str(s: &str) -> Result<Self> {
        s.parse::<u128>()
            .map(Amount)
            .map_err(|e| PipelineError::InvalidRewardSet(format!("invalid amount {:?}: {}", s, e)))
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Amount(raw)
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Amount(raw as u128)
    }
}

impl FromStr for Amount {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Amount::from_dec_str(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value
            .parse::<u128>()
            .map(Amount)
            .map_err(|err| serde::de::Error::custom(format!("invalid u128 dec string: {err}")))
    }
}
