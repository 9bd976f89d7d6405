//! # Schema Registry
//!
//! Per-domain attribute-type definitions and value validation.
//!
//! Each domain owns a closed set of named attributes; every node attribute
//! value must validate against its domain's definition before it is
//! written (schema closure). The registry is a pure table; the catalog
//! facade orchestrates mutations and the removal of orphaned values when a
//! definition is deleted.

use crate::primitives::{
    MAX_IMAGE_VALUE_LENGTH, MAX_MARKDOWN_VALUE_LENGTH, MAX_STRING_VALUE_LENGTH,
    MAX_TAG_VALUE_LENGTH,
};
use crate::types::{AttributeDef, AttributeKind, AttributeValue, CatalogError};
use std::collections::BTreeMap;

// =============================================================================
// REGISTRY
// =============================================================================

/// The per-domain attribute schema table.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// domain name -> attribute name -> definition
    defs: BTreeMap<String, BTreeMap<String, AttributeDef>>,
    /// attribute id -> (domain, name), for composite-key addressing
    by_id: BTreeMap<u64, (String, String)>,
    /// Next attribute id to issue. Ids are never reused after deletion.
    next_id: u64,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            defs: BTreeMap::new(),
            by_id: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The id the next defined attribute will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Look up a definition by `(domain, name)`.
    #[must_use]
    pub fn get(&self, domain: &str, name: &str) -> Option<&AttributeDef> {
        self.defs.get(domain)?.get(name)
    }

    /// Look up a definition by its issued id.
    #[must_use]
    pub fn get_by_id(&self, id: u64) -> Option<&AttributeDef> {
        let (domain, name) = self.by_id.get(&id)?;
        self.get(domain, name)
    }

    /// Whether `(domain, name)` is defined.
    #[must_use]
    pub fn contains(&self, domain: &str, name: &str) -> bool {
        self.get(domain, name).is_some()
    }

    /// All definitions for a domain, sorted by name.
    #[must_use]
    pub fn list(&self, domain: &str) -> Vec<AttributeDef> {
        self.defs
            .get(domain)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of definitions across all domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.values().map(BTreeMap::len).sum()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.values().all(BTreeMap::is_empty)
    }

    /// All definitions across all domains, for snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDef> {
        self.defs.values().flat_map(BTreeMap::values)
    }

    // =========================================================================
    // APPLY (crate-internal: called when committing a ChangeSet)
    // =========================================================================

    pub(crate) fn apply_put(&mut self, def: AttributeDef) {
        if def.id >= self.next_id {
            self.next_id = def.id.saturating_add(1);
        }
        self.by_id
            .insert(def.id, (def.domain.clone(), def.name.clone()));
        self.defs
            .entry(def.domain.clone())
            .or_default()
            .insert(def.name.clone(), def);
    }

    pub(crate) fn apply_delete(&mut self, domain: &str, name: &str) {
        if let Some(per_domain) = self.defs.get_mut(domain)
            && let Some(def) = per_domain.remove(name)
        {
            self.by_id.remove(&def.id);
        }
    }

    pub(crate) fn apply_set_counter(&mut self, value: u64) {
        self.next_id = value;
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Validate a single value entry against the domain schema.
    ///
    /// Checks existence of the attribute, the order-index contract for
    /// ordered tags, and the per-kind value constraints. Returns
    /// `SchemaViolation` on any failure; the caller must not have written
    /// anything yet.
    pub fn validate_entry(&self, domain: &str, entry: &AttributeValue) -> Result<(), CatalogError> {
        let def = self.get(domain, &entry.name).ok_or_else(|| {
            CatalogError::SchemaViolation(format!(
                "attribute not defined in domain {domain}: {}",
                entry.name
            ))
        })?;
        validate_value(def.kind, entry)
    }
}

/// Validate one value against an attribute kind.
fn validate_value(kind: AttributeKind, entry: &AttributeValue) -> Result<(), CatalogError> {
    let name = &entry.name;
    let value = &entry.value;

    if value.is_empty() {
        return Err(CatalogError::SchemaViolation(format!(
            "{name}: value is required"
        )));
    }

    if kind.requires_order_index() && entry.order_index.is_none() {
        return Err(CatalogError::SchemaViolation(format!(
            "{name}: ordered_tag requires an order_index"
        )));
    }
    // A zero order_index on a plain kind is treated as "unset"; clients
    // that always send the field get the same result as omitting it.
    if !kind.requires_order_index() && entry.order_index.is_some_and(|idx| idx != 0) {
        return Err(CatalogError::SchemaViolation(format!(
            "{name}: order_index is only valid for ordered_tag"
        )));
    }

    match kind {
        AttributeKind::Tag | AttributeKind::OrderedTag => {
            if value.len() > MAX_TAG_VALUE_LENGTH {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: tag value exceeds {MAX_TAG_VALUE_LENGTH} characters"
                )));
            }
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: tag values may only contain alphanumerics, underscores, and hyphens"
                )));
            }
        }
        AttributeKind::Number => {
            if value.parse::<f64>().is_err() {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: number value must parse as numeric: {value}"
                )));
            }
        }
        AttributeKind::String => {
            if value.len() > MAX_STRING_VALUE_LENGTH {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: string value exceeds {MAX_STRING_VALUE_LENGTH} characters"
                )));
            }
        }
        AttributeKind::Markdown => {
            if value.len() > MAX_MARKDOWN_VALUE_LENGTH {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: markdown value exceeds {MAX_MARKDOWN_VALUE_LENGTH} characters"
                )));
            }
        }
        AttributeKind::Image => {
            if value.len() > MAX_IMAGE_VALUE_LENGTH {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: image URL exceeds {MAX_IMAGE_VALUE_LENGTH} characters"
                )));
            }
            if !is_http_url(value) {
                return Err(CatalogError::SchemaViolation(format!(
                    "{name}: image value must be an http(s) URL"
                )));
            }
        }
    }

    Ok(())
}

/// Minimal URL shape check: http(s) scheme, a non-empty host part, and no
/// embedded whitespace.
pub(crate) fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(host) => !host.is_empty() && !value.chars().any(char::is_whitespace),
        None => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn def(domain: &str, name: &str, kind: AttributeKind) -> AttributeDef {
        AttributeDef {
            id: 0,
            domain: domain.to_string(),
            name: name.to_string(),
            kind,
            description: String::new(),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
        }
    }

    fn registry_with(kind: AttributeKind) -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        let mut d = def("shop", "attr", kind);
        d.id = registry.next_id();
        registry.apply_put(d);
        registry
    }

    #[test]
    fn ids_issued_monotonically_and_never_reused() {
        let mut registry = SchemaRegistry::new();
        let mut first = def("shop", "a", AttributeKind::Tag);
        first.id = registry.next_id();
        registry.apply_put(first);
        assert_eq!(registry.next_id(), 2);

        registry.apply_delete("shop", "a");
        assert_eq!(registry.next_id(), 2);
        assert!(registry.get_by_id(1).is_none());
    }

    #[test]
    fn unknown_attribute_is_schema_violation() {
        let registry = SchemaRegistry::new();
        let err = registry
            .validate_entry("shop", &AttributeValue::new("missing", "x"))
            .expect_err("must fail");
        assert!(matches!(err, CatalogError::SchemaViolation(_)));
    }

    #[test]
    fn number_values_must_parse() {
        let registry = registry_with(AttributeKind::Number);
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "3.25"))
            .is_ok());
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "-17"))
            .is_ok());
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "three"))
            .is_err());
    }

    #[test]
    fn ordered_tag_requires_order_index() {
        let registry = registry_with(AttributeKind::OrderedTag);
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "step-one"))
            .is_err());
        assert!(registry
            .validate_entry("shop", &AttributeValue::ordered("attr", "step-one", 0))
            .is_ok());
    }

    #[test]
    fn order_index_rejected_for_plain_kinds() {
        let registry = registry_with(AttributeKind::String);
        assert!(registry
            .validate_entry("shop", &AttributeValue::ordered("attr", "hello", 1))
            .is_err());
        // Zero means unset, so it passes on plain kinds.
        assert!(registry
            .validate_entry("shop", &AttributeValue::ordered("attr", "hello", 0))
            .is_ok());
    }

    #[test]
    fn tag_charset_enforced() {
        let registry = registry_with(AttributeKind::Tag);
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "rust_lang-2024"))
            .is_ok());
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "has spaces"))
            .is_err());
    }

    #[test]
    fn image_must_be_http_url() {
        let registry = registry_with(AttributeKind::Image);
        assert!(registry
            .validate_entry(
                "shop",
                &AttributeValue::new("attr", "https://cdn.example.com/a.png")
            )
            .is_ok());
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "ftp://example.com/a"))
            .is_err());
        assert!(registry
            .validate_entry("shop", &AttributeValue::new("attr", "https:// bad host"))
            .is_err());
    }

    #[test]
    fn empty_value_rejected_for_all_kinds() {
        for kind in AttributeKind::ALL {
            let registry = registry_with(kind);
            let mut entry = AttributeValue::new("attr", "");
            if kind.requires_order_index() {
                entry.order_index = Some(0);
            }
            assert!(registry.validate_entry("shop", &entry).is_err());
        }
    }

    #[test]
    fn list_is_sorted_by_name() {
        let mut registry = SchemaRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            let mut d = def("shop", name, AttributeKind::Tag);
            d.id = registry.next_id();
            registry.apply_put(d);
        }
        let names: Vec<_> = registry.list("shop").into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
