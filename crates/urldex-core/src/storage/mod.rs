//! # Storage Backends
//!
//! Durable persistence for the catalog. The only backend is redb: every
//! committed change set becomes one ACID write transaction, and the whole
//! database is replayed into memory on open.

pub mod redb_catalog;

pub use redb_catalog::RedbCatalog;
