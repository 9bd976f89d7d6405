//! # Catalog Primitives
//!
//! Hardcoded runtime constants for the urldex catalog engine.
//!
//! The catalog starts with zero data but fixed limits. These values are
//! compiled into the binary and are immutable at runtime. Field limits
//! mirror what the external tool surface advertises to clients.

/// Default namespace token used as the first segment of composite keys.
///
/// Every key the catalog issues starts with its namespace, so keys from
/// different deployments never collide.
pub const DEFAULT_NAMESPACE: &str = "urldex";

/// Magic bytes for the urldex snapshot format header.
///
/// File Header = Magic Bytes ("UDEX") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"UDEX";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed payload size for the snapshot format (500 MB).
///
/// Validated BEFORE deserialization to prevent allocation-based DoS.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

// =============================================================================
// FIELD LIMITS
// =============================================================================

/// Maximum length for a domain name (namespace token).
pub const MAX_DOMAIN_NAME_LENGTH: usize = 50;

/// Maximum length for a node or domain description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Maximum length for a node URL.
pub const MAX_URL_LENGTH: usize = 2048;

/// Maximum length for a node title.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum length for an attribute name.
pub const MAX_ATTRIBUTE_NAME_LENGTH: usize = 255;

/// Maximum length for a `tag` / `ordered_tag` value.
pub const MAX_TAG_VALUE_LENGTH: usize = 100;

/// Maximum length for a `string` attribute value.
pub const MAX_STRING_VALUE_LENGTH: usize = 1000;

/// Maximum length for a `markdown` attribute value.
pub const MAX_MARKDOWN_VALUE_LENGTH: usize = 10000;

/// Maximum length for an `image` attribute value (a URL).
pub const MAX_IMAGE_VALUE_LENGTH: usize = 500;

// =============================================================================
// PAGINATION & BATCH LIMITS
// =============================================================================

/// Maximum page size for node listings and filter queries.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Maximum number of entries accepted by a single set-attributes call.
pub const MAX_ATTRIBUTE_BATCH: usize = 100;

/// Maximum number of conjunctive filters in a single filter query.
pub const MAX_FILTERS: usize = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"UDEX");
    }

    #[test]
    fn default_page_size_within_max() {
        assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
    }
}
