//! # CLI Command Implementations

use crate::api;
use crate::config::{AgoraConfig, Backend};
use agora_core::formats::MAX_SNAPSHOT_SIZE;
use agora_core::{AgoraError, Snapshot, Stats};
use std::path::{Path, PathBuf};

// =============================================================================
// PATH VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), AgoraError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| AgoraError::InvalidArgument(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(AgoraError::InvalidArgument(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AgoraError> {
    let canonical = path.canonicalize().map_err(|e| {
        AgoraError::InvalidArgument(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(AgoraError::InvalidArgument(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path, keeping the file name.
fn validate_output_path(path: &Path) -> Result<PathBuf, AgoraError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        AgoraError::InvalidArgument(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(AgoraError::InvalidArgument(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| AgoraError::InvalidArgument("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn stats_json(stats: &Stats) -> serde_json::Value {
    serde_json::json!({
        "users": stats.users,
        "posts": stats.posts,
        "comments": stats.comments,
        "notifications": stats.notifications,
        "graph_entries": stats.graph_entries,
    })
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AgoraConfig) -> Result<(), AgoraError> {
    let coordinator = config.open_coordinator()?;
    let stats = coordinator.stats()?;

    println!("Agora Social Feed Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", config.storage.backend);
    println!("  Data:     {}", config.storage.data_dir.display());
    println!("  Media:    {}", config.media.dir.display());
    println!();
    println!("Loaded {} users, {} posts", stats.users, stats.posts);
    println!();
    println!("Endpoints:");
    println!("  GET  /health         - Health check");
    println!("  GET  /posts          - Feed");
    println!("  POST /posts          - Create a post");
    println!("  POST /posts/:id/:op  - like, comment, vote, ...");
    println!("  GET  /notifications  - Inbox");
    println!("  GET  /friends        - Social graph");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config.bind_addr(), coordinator).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show collection sizes of the configured store.
pub fn cmd_status(config: &AgoraConfig, json_mode: bool) -> Result<(), AgoraError> {
    let store = config.open_store()?;
    let stats = Snapshot::capture(store.as_ref())?.validate()?;

    if json_mode {
        let mut output = stats_json(&stats);
        output["backend"] = serde_json::json!(config.storage.backend.as_str());
        output["data_dir"] = serde_json::json!(config.storage.data_dir.to_string_lossy());
        print_json(&output);
        return Ok(());
    }

    println!("Agora Status");
    println!("============");
    println!("Data dir: {}", config.storage.data_dir.display());
    println!("Backend:  {}", config.storage.backend);
    println!();
    println!("Users:         {}", stats.users);
    println!("Posts:         {}", stats.posts);
    println!("Comments:      {}", stats.comments);
    println!("Notifications: {}", stats.notifications);
    println!("Graph entries: {}", stats.graph_entries);

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write a snapshot of every collection to `output`.
pub fn cmd_export(config: &AgoraConfig, output: &Path, json_mode: bool) -> Result<(), AgoraError> {
    let validated_output = validate_output_path(output)?;

    let store = config.open_store()?;
    let snapshot = Snapshot::capture(store.as_ref())?;
    let stats = snapshot.validate()?;
    let data = snapshot.to_bytes()?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| AgoraError::Internal(format!("Write file: {}", e)))?;

    tracing::info!(path = %validated_output.display(), bytes = data.len(), "snapshot exported");

    if json_mode {
        let mut out = stats_json(&stats);
        out["bytes"] = serde_json::json!(data.len());
        out["path"] = serde_json::json!(validated_output.to_string_lossy());
        print_json(&out);
    } else {
        println!("Exported {} bytes to {:?}", data.len(), validated_output);
        println!("  {} users, {} posts", stats.users, stats.posts);
    }
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Replace every collection of the configured store with a snapshot.
///
/// A store that already holds records is left alone unless `force` is set.
pub fn cmd_import(
    config: &AgoraConfig,
    input: &Path,
    force: bool,
    json_mode: bool,
) -> Result<(), AgoraError> {
    if config.storage.backend == Backend::Memory {
        return Err(AgoraError::InvalidArgument(
            "Import into the memory backend would be lost on exit. Use json or redb.".to_string(),
        ));
    }

    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_SNAPSHOT_SIZE as u64)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| AgoraError::InvalidArgument(format!("Read file: {}", e)))?;
    let snapshot = Snapshot::from_bytes(&data)?;

    let stats = match config.storage.backend {
        Backend::Redb => {
            let mut store = config.open_redb()?;
            ensure_replaceable(&Snapshot::capture(&store)?.validate()?, force)?;
            let stats = snapshot.restore(&store)?;
            store.compact()?;
            stats
        }
        _ => {
            let store = config.open_store()?;
            ensure_replaceable(&Snapshot::capture(store.as_ref())?.validate()?, force)?;
            snapshot.restore(store.as_ref())?
        }
    };

    tracing::info!(path = %validated_path.display(), "snapshot imported");

    if json_mode {
        print_json(&stats_json(&stats));
    } else {
        println!(
            "Imported {} users, {} posts, {} notifications, {} graph entries",
            stats.users, stats.posts, stats.notifications, stats.graph_entries
        );
    }
    Ok(())
}

fn ensure_replaceable(current: &Stats, force: bool) -> Result<(), AgoraError> {
    let records = current.users + current.posts + current.notifications + current.graph_entries;
    if records > 0 && !force {
        return Err(AgoraError::Conflict(format!(
            "Store already holds {} records; pass --force to replace them",
            records
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
