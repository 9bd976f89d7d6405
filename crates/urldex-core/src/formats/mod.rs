//! # Interchange Formats
//!
//! Serialization of whole catalogs for export, import, and backup.

pub mod persistence;

pub use persistence::{catalog_from_bytes, catalog_to_bytes};
