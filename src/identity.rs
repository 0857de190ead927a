//! Canonical document identities.
//!
//! A [`DocumentId`] is produced exactly once at each ingress boundary and then passed around
//! unchanged. Path parameters arrive percent-encoded and are decoded once by the HTTP
//! extractor; JSON body fields arrive in plain form. Neither path decodes again after parsing.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Longest identity accepted at ingress, in bytes.
pub const MAX_IDENTITY_LEN: usize = 2048;

/// Reasons a raw identity is rejected as client input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Identity was missing or only whitespace.
    #[error("document identity is required")]
    Empty,
    /// Identity contained an ASCII control character.
    #[error("document identity contains control characters")]
    ControlCharacter,
    /// Identity exceeded [`MAX_IDENTITY_LEN`].
    #[error("document identity exceeds {MAX_IDENTITY_LEN} bytes")]
    TooLong,
}

/// Opaque key identifying a source document across the cache and the result store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Validate and canonicalize an already-decoded identity.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        if trimmed.len() > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong);
        }
        if trimmed.chars().any(|c| c.is_ascii_control()) {
            return Err(IdentityError::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the canonical identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a vector-store collection name that is safe for any identity.
    ///
    /// URLs contain characters Qdrant rejects in collection names, so the name is a truncated
    /// SHA-256 of the canonical identity.
    pub fn collection_name(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("doc-{}", &hex::encode(digest)[..32])
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_without_decoding() {
        let id = DocumentId::parse("  https://example.com/a%20b  ").expect("valid");
        assert_eq!(id.as_str(), "https://example.com/a%20b");
    }

    #[test]
    fn parse_rejects_blank_and_control_characters() {
        assert_eq!(DocumentId::parse("   "), Err(IdentityError::Empty));
        assert_eq!(
            DocumentId::parse("https://example.com/\nx"),
            Err(IdentityError::ControlCharacter)
        );
    }

    #[test]
    fn parse_rejects_oversized_identity() {
        let raw = "a".repeat(MAX_IDENTITY_LEN + 1);
        assert_eq!(DocumentId::parse(&raw), Err(IdentityError::TooLong));
    }

    #[test]
    fn collection_name_is_stable_and_safe() {
        let id = DocumentId::parse("https://example.com/tos?lang=en").expect("valid");
        let name = id.collection_name();
        assert_eq!(name, id.collection_name());
        assert_eq!(name.len(), "doc-".len() + 32);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }
}
