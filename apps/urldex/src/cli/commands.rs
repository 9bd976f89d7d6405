//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use std::path::{Path, PathBuf};
use urldex_core::{Catalog, CatalogError, catalog_from_bytes, catalog_to_bytes};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for snapshot import (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CatalogError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CatalogError::Storage(format!("Cannot read file metadata: {e}")))?;

    if metadata.len() > max_size {
        return Err(CatalogError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path: canonicalize (resolving symlinks and "..")
/// and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CatalogError> {
    let canonical = path.canonicalize().map_err(|e| {
        CatalogError::Storage(format!("Invalid file path '{}': {e}", path.display()))
    })?;

    if !canonical.is_file() {
        return Err(CatalogError::Storage(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, CatalogError> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CatalogError::Storage(format!(
            "Invalid output directory '{}': {e}",
            parent.display()
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CatalogError::Storage(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CatalogError::Storage("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// CATALOG LOADING
// =============================================================================

/// Open the catalog for the selected backend.
fn load_catalog(db_path: &Path, backend: &str) -> Result<Catalog, CatalogError> {
    match backend {
        "redb" => Catalog::with_redb(db_path),
        "memory" => Ok(Catalog::new()),
        other => Err(CatalogError::Validation {
            field: "backend",
            message: format!("unknown backend '{other}', expected 'redb' or 'memory'"),
        }),
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    host: &str,
    port: u16,
) -> Result<(), CatalogError> {
    let catalog = load_catalog(db_path, backend)?;

    println!("urldex Catalog Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {host}");
    println!("  Port:      {port}");
    println!("  Backend:   {backend}");
    println!("  Database:  {}", db_path.display());
    println!("  Namespace: {}", catalog.namespace());
    println!();
    println!("Endpoints:");
    println!("  GET  /info                    - Server info");
    println!("  POST /domains                 - Create a domain");
    println!("  POST /domains/{{d}}/nodes       - Catalog a URL");
    println!("  POST /domains/{{d}}/filter      - Filter by attributes");
    println!("  GET  /nodes/{{key}}             - Node by composite key");
    println!("  GET  /events/pending          - Event pipeline");
    println!("  GET  /health                  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{host}:{port}");
    api::run_server(&addr, catalog).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show catalog status.
pub fn cmd_status(db_path: &Path, backend: &str, json_mode: bool) -> Result<(), CatalogError> {
    let catalog = load_catalog(db_path, backend)?;
    let stats = catalog.stats();

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "namespace": catalog.namespace(),
            "domains": stats.domains,
            "nodes": stats.nodes,
            "attributes": stats.attribute_defs,
            "dependencies": stats.dependencies,
            "subscriptions": stats.subscriptions,
            "events": {
                "total": stats.events.total,
                "pending": stats.events.pending,
                "processed": stats.events.processed
            }
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("urldex Catalog Status");
    println!("=====================");
    println!("Database:  {}", db_path.display());
    println!("Backend:   {backend}");
    println!("Namespace: {}", catalog.namespace());
    println!();
    println!("Domains:       {}", stats.domains);
    println!("Nodes:         {}", stats.nodes);
    println!("Attributes:    {}", stats.attribute_defs);
    println!("Dependencies:  {}", stats.dependencies);
    println!("Subscriptions: {}", stats.subscriptions);
    println!(
        "Events:        {} total ({} pending, {} processed)",
        stats.events.total, stats.events.pending, stats.events.processed
    );

    Ok(())
}

// =============================================================================
// ADD COMMAND
// =============================================================================

/// Catalog a URL from the command line.
pub fn cmd_add(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    domain: &str,
    url: &str,
    title: &str,
    description: &str,
) -> Result<(), CatalogError> {
    let mut catalog = load_catalog(db_path, backend)?;
    let node = catalog.create_node(domain, url, title, description)?;
    let key = catalog.compose_node_key(&node);

    if json_mode {
        let output = serde_json::json!({
            "key": key,
            "domain": node.domain,
            "url": node.url,
            "title": node.title
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Cataloged: {key}");
    println!("  URL:   {}", node.url);
    if !node.title.is_empty() {
        println!("  Title: {}", node.title);
    }
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List a domain's nodes.
pub fn cmd_list(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    domain: &str,
    search: Option<&str>,
    page: Option<usize>,
    size: Option<usize>,
) -> Result<(), CatalogError> {
    let catalog = load_catalog(db_path, backend)?;
    let result = catalog.list_nodes(domain, search, page, size)?;

    if json_mode {
        let nodes: Vec<serde_json::Value> = result
            .nodes
            .iter()
            .map(|n| {
                serde_json::json!({
                    "key": catalog.compose_node_key(n),
                    "url": n.url,
                    "title": n.title
                })
            })
            .collect();
        let output = serde_json::json!({
            "domain": domain,
            "total_count": result.total_count,
            "total_pages": result.total_pages,
            "page": result.page,
            "nodes": nodes
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Domain '{domain}': {} nodes (page {}/{})",
        result.total_count,
        result.page,
        result.total_pages.max(1)
    );
    for node in &result.nodes {
        let key = catalog.compose_node_key(node);
        if node.title.is_empty() {
            println!("  {key}  {}", node.url);
        } else {
            println!("  {key}  {}  ({})", node.url, node.title);
        }
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the catalog snapshot to a file.
pub fn cmd_export(db_path: &Path, backend: &str, output: &Path) -> Result<(), CatalogError> {
    let catalog = load_catalog(db_path, backend)?;
    let bytes = catalog_to_bytes(&catalog)?;

    let validated = validate_output_path(output)?;
    std::fs::write(&validated, &bytes)
        .map_err(|e| CatalogError::Storage(format!("Write snapshot: {e}")))?;

    println!(
        "Exported {} bytes to {}",
        bytes.len(),
        validated.display()
    );
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a snapshot into a fresh database.
pub fn cmd_import(db_path: &Path, input: &Path) -> Result<(), CatalogError> {
    let validated = validate_file_path(input)?;
    validate_file_size(&validated, MAX_IMPORT_FILE_SIZE)?;

    let bytes = std::fs::read(&validated)
        .map_err(|e| CatalogError::Storage(format!("Read snapshot: {e}")))?;
    let mut catalog = catalog_from_bytes(&bytes)?;

    catalog.attach_redb(db_path)?;
    let stats = catalog.stats();
    println!(
        "Imported {} domains, {} nodes, {} events into {}",
        stats.domains,
        stats.nodes,
        stats.events.total,
        db_path.display()
    );
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), CatalogError> {
    if db_path.exists() {
        if !force {
            return Err(CatalogError::Storage(format!(
                "Database '{}' already exists (use --force to overwrite)",
                db_path.display()
            )));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| CatalogError::Storage(format!("Remove existing database: {e}")))?;
    }

    let catalog = Catalog::with_redb(db_path)?;
    println!(
        "Initialized empty catalog at {} (namespace '{}')",
        db_path.display(),
        catalog.namespace()
    );
    Ok(())
}
