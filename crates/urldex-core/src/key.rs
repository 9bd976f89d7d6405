//! # Key Authority
//!
//! Composite-key formatting and parsing.
//!
//! A composite key is the stable external handle for a catalog entity:
//!
//! - Node: `namespace:domain:id`
//! - Attribute definition: `namespace:domain:attr-<id>`
//!
//! Parsing is the strict inverse of formatting: a parsed key re-formats to
//! the exact input string, so non-canonical spellings (leading zeros, sign
//! prefixes) are rejected rather than silently normalized. Keys are issued
//! once and never recomputed; domain names are immutable, so an issued key
//! can never dangle because of a rename.

use crate::types::CatalogError;
use serde::{Deserialize, Serialize};

/// Separator between composite key segments.
pub const KEY_SEPARATOR: char = ':';

/// Prefix marking the id segment of an attribute-definition key.
pub const ATTRIBUTE_ID_PREFIX: &str = "attr-";

/// Entity discriminator carried by a composite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// A plain URL node.
    Node,
    /// A domain attribute definition.
    Attribute,
}

/// A parsed composite key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub namespace: String,
    pub domain: String,
    pub kind: KeyKind,
    pub id: u64,
}

impl CompositeKey {
    /// Build a node key, validating the segments.
    pub fn node(
        namespace: impl Into<String>,
        domain: impl Into<String>,
        id: u64,
    ) -> Result<Self, CatalogError> {
        Self::build(namespace.into(), domain.into(), KeyKind::Node, id)
    }

    /// Build an attribute-definition key, validating the segments.
    pub fn attribute(
        namespace: impl Into<String>,
        domain: impl Into<String>,
        id: u64,
    ) -> Result<Self, CatalogError> {
        Self::build(namespace.into(), domain.into(), KeyKind::Attribute, id)
    }

    fn build(
        namespace: String,
        domain: String,
        kind: KeyKind,
        id: u64,
    ) -> Result<Self, CatalogError> {
        validate_segment(&namespace, "namespace")?;
        validate_segment(&domain, "domain")?;
        if id == 0 {
            return Err(CatalogError::InvalidKey(
                "id must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            namespace,
            domain,
            kind,
            id,
        })
    }

    /// Format the key as its canonical string form.
    #[must_use]
    pub fn format(&self) -> String {
        match self.kind {
            KeyKind::Node => format!(
                "{}{sep}{}{sep}{}",
                self.namespace,
                self.domain,
                self.id,
                sep = KEY_SEPARATOR
            ),
            KeyKind::Attribute => format!(
                "{}{sep}{}{sep}{}{}",
                self.namespace,
                self.domain,
                ATTRIBUTE_ID_PREFIX,
                self.id,
                sep = KEY_SEPARATOR
            ),
        }
    }

    /// Parse a composite key string. Strict inverse of [`Self::format`].
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let parts: Vec<&str> = raw.split(KEY_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(CatalogError::InvalidKey(format!(
                "expected exactly 3 segments, got {}: {raw}",
                parts.len()
            )));
        }

        let (id_part, kind) = match parts[2].strip_prefix(ATTRIBUTE_ID_PREFIX) {
            Some(rest) => (rest, KeyKind::Attribute),
            None => (parts[2], KeyKind::Node),
        };

        let id: u64 = id_part
            .parse()
            .map_err(|_| CatalogError::InvalidKey(format!("id is not an integer: {raw}")))?;

        let key = Self::build(parts[0].to_string(), parts[1].to_string(), kind, id)?;

        // Canonical-form check: reject spellings like "ns:d:007" or "ns:d:+7"
        // that would parse but not re-format to the input.
        if key.format() != raw {
            return Err(CatalogError::InvalidKey(format!(
                "non-canonical key: {raw}"
            )));
        }

        Ok(key)
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

/// A key segment must be non-empty and must not contain the separator.
fn validate_segment(segment: &str, what: &str) -> Result<(), CatalogError> {
    if segment.is_empty() {
        return Err(CatalogError::InvalidKey(format!("{what} is empty")));
    }
    if segment.contains(KEY_SEPARATOR) {
        return Err(CatalogError::InvalidKey(format!(
            "{what} contains the separator: {segment}"
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_key_roundtrip() {
        let key = CompositeKey::node("urldex", "bookmarks", 42).expect("key");
        assert_eq!(key.format(), "urldex:bookmarks:42");
        assert_eq!(CompositeKey::parse("urldex:bookmarks:42").expect("parse"), key);
    }

    #[test]
    fn attribute_key_roundtrip() {
        let key = CompositeKey::attribute("urldex", "bookmarks", 7).expect("key");
        assert_eq!(key.format(), "urldex:bookmarks:attr-7");
        let parsed = CompositeKey::parse("urldex:bookmarks:attr-7").expect("parse");
        assert_eq!(parsed.kind, KeyKind::Attribute);
        assert_eq!(parsed, key);
    }

    #[test]
    fn wrong_segment_count_rejected() {
        assert!(CompositeKey::parse("urldex:bookmarks").is_err());
        assert!(CompositeKey::parse("urldex:bookmarks:1:extra").is_err());
        assert!(CompositeKey::parse("").is_err());
    }

    #[test]
    fn empty_segments_rejected() {
        assert!(CompositeKey::parse(":bookmarks:1").is_err());
        assert!(CompositeKey::parse("urldex::1").is_err());
    }

    #[test]
    fn non_numeric_id_rejected() {
        assert!(CompositeKey::parse("urldex:bookmarks:abc").is_err());
        assert!(CompositeKey::parse("urldex:bookmarks:attr-abc").is_err());
    }

    #[test]
    fn zero_id_rejected() {
        assert!(CompositeKey::parse("urldex:bookmarks:0").is_err());
        assert!(CompositeKey::node("urldex", "bookmarks", 0).is_err());
    }

    #[test]
    fn non_canonical_spellings_rejected() {
        assert!(CompositeKey::parse("urldex:bookmarks:007").is_err());
        assert!(CompositeKey::parse("urldex:bookmarks:+7").is_err());
    }

    #[test]
    fn separator_in_segment_rejected() {
        assert!(CompositeKey::node("url:dex", "bookmarks", 1).is_err());
    }
}
