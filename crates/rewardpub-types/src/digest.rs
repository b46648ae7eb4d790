use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{PipelineError, Result};

/// 32-byte commitment digest (SHA-256 output or Merkle root)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub const LEN: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from hex, with or without a `0x` prefix
    pub fn from_hex(value: &str) -> Result<Self> {
        let raw = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| PipelineError::InvalidRewardSet(format!("invalid digest hex: {}", e)))?;
        if raw.len() != Self::LEN {
            return Err(PipelineError::InvalidRewardSet(format!(
                "invalid digest length: {}",
                raw.len()
            )));
        }
        let mut buffer = [0u8; 32];
        buffer.copy_from_slice(&raw);
        Ok(Digest(buffer))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Digest::from_hex(&value).map_err(serde::de::Error::custom)
    }
}
