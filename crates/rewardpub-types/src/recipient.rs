use serde::{Deserialize, Serialize};
use std::fmt;

/// Reward recipient identifier (e.g. a checksummed address)
/// Ordering is byte-wise, which is the canonical order for hashing
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        RecipientId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecipientId {
    fn from(s: String) -> Self {
        RecipientId(s)
    }
}

impl From<&str> for RecipientId {
    fn from(s: &str) -> Self {
        RecipientId(s.to_string())
    }
}
