//! Scope snapshot persistence.
//!
//! A snapshot holds every row of one scope table plus the collection
//! records stored in it, postcard-encoded and zstd-compressed. Writes go to
//! a temp file first and are renamed into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::Path;
use std::thread::available_parallelism;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};
use crate::types::{Collection, ItemRow, ScopeTable};

/// Snapshot format version - increment when changing the format.
pub const SCOPE_SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_COMPRESSION_LEVEL: i32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub version: u32,
    pub table: ScopeTable,
    /// Unix timestamp when the snapshot was taken.
    pub saved_at: u64,
    pub collections: Vec<Collection>,
    pub rows: Vec<ItemRow>,
}

impl ScopeSnapshot {
    pub fn new(table: ScopeTable, collections: Vec<Collection>, rows: Vec<ItemRow>) -> Self {
        Self {
            version: SCOPE_SNAPSHOT_VERSION,
            table,
            saved_at: unix_now_secs(),
            collections,
            rows,
        }
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

pub fn write_scope_snapshot(path: &Path, snapshot: &ScopeSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| {
            TreeError::Internal(format!(
                "failed to create snapshot directory {}: {error}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let output = File::create(&tmp_path).map_err(|error| {
            TreeError::Internal(format!(
                "failed to create snapshot file {}: {error}",
                tmp_path.display()
            ))
        })?;

        let mut encoder =
            zstd::Encoder::new(output, SNAPSHOT_COMPRESSION_LEVEL).map_err(|error| {
                TreeError::Internal(format!("failed to create zstd encoder: {error}"))
            })?;
        let threads = available_parallelism()
            .map(|count| count.get() as u32)
            .unwrap_or(4);
        encoder.multithread(threads).map_err(|error| {
            TreeError::Internal(format!("failed to enable multi-threaded zstd: {error}"))
        })?;
        let mut output = BufWriter::new(encoder);

        postcard::to_io(snapshot, &mut output).map_err(|error| {
            TreeError::Serialization(format!("failed to encode snapshot with postcard: {error}"))
        })?;

        // The rename must only see a fully flushed and finished frame.
        let encoder = output.into_inner().map_err(|error| {
            TreeError::Internal(format!(
                "failed to flush snapshot file {}: {}",
                tmp_path.display(),
                error.error()
            ))
        })?;
        encoder.finish().map_err(|error| {
            TreeError::Internal(format!(
                "failed to finish snapshot file {}: {error}",
                tmp_path.display()
            ))
        })?;
    }

    fs::rename(&tmp_path, path).map_err(|error| {
        TreeError::Internal(format!(
            "failed to finalize snapshot file {}: {error}",
            path.display()
        ))
    })?;

    log::debug!(
        "wrote scope snapshot for {} to {} ({} rows)",
        snapshot.table,
        path.display(),
        snapshot.rows.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Read operations
// ---------------------------------------------------------------------------

pub fn load_scope_snapshot(path: &Path) -> Result<ScopeSnapshot> {
    let input = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(TreeError::InvalidInput(format!(
                "snapshot file {} does not exist",
                path.display()
            )));
        }
        Err(error) => return Err(error.into()),
    };

    let decoder = zstd::Decoder::new(input).map_err(|error| {
        log::warn!("scope snapshot decompress failed for {}: {error}", path.display());
        TreeError::Serialization(format!("failed to decompress snapshot: {error}"))
    })?;
    let mut input = BufReader::new(decoder);
    let mut scratch = vec![0u8; 4 * 1024];

    let (snapshot, _): (ScopeSnapshot, _) = postcard::from_io((&mut input, &mut scratch))
        .map_err(|error| {
            log::warn!("scope snapshot decode failed for {}: {error}", path.display());
            TreeError::Serialization(format!("failed to decode snapshot: {error}"))
        })?;

    if snapshot.version != SCOPE_SNAPSHOT_VERSION {
        log::warn!(
            "scope snapshot version mismatch for {}: {} != {}",
            path.display(),
            snapshot.version,
            SCOPE_SNAPSHOT_VERSION
        );
        return Err(TreeError::Serialization(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    Ok(snapshot)
}
