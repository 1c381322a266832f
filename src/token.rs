//! API token type with automatic memory zeroization.
//!
//! Hoxhunt API keys are long-lived static credentials; wrapping them in
//! `ApiToken` keeps them out of logs and clears the backing memory on drop.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

/// A Hoxhunt API key, zeroized when dropped and redacted in all formatting.
#[derive(Clone)]
pub struct ApiToken(Zeroizing<String>);

impl ApiToken {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Zeroizing::new(key.into()))
    }

    /// Exposes the raw key for building the `Authorization` header.
    ///
    /// Avoid copying the returned slice; copies are not zeroized.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ApiToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for ApiToken {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison to avoid leaking key prefixes via timing.
        use subtle::ConstantTimeEq;
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for ApiToken {}

impl Serialize for ApiToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ApiToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::new(String::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_returns_original_key() {
        let token = ApiToken::new("hox-key-123");
        assert_eq!(token.expose(), "hox-key-123");
        assert!(!token.is_empty());
    }

    #[test]
    fn debug_and_display_are_redacted() {
        let token = ApiToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
        assert!(!format!("{}", token).contains("super-secret"));
    }

    #[test]
    fn equality_compares_contents() {
        assert_eq!(ApiToken::new("same"), ApiToken::new("same"));
        assert_ne!(ApiToken::new("one"), ApiToken::new("two"));
    }

    #[test]
    fn serde_round_trip() {
        let token = ApiToken::new("serializable");
        let json = serde_json::to_string(&token).unwrap();
        let back: ApiToken = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);
    }
}
