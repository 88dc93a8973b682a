//! Book snapshots with integrity hashing and compression
//!
//! One snapshot file per book: the pair definition, the flattened
//! price tree, and every resting order, serialized with bincode and
//! hashed with SHA-256. Loads verify version, hash, and header
//! agreement before handing the state out; the stored heights and
//! weights are then re-audited by the tree rebuild, so a corrupted
//! file is caught before any live book is replaced.
//!
//! Features:
//! - Atomic writes (tmp file, fsync, rename)
//! - Optional zstd compression
//! - Filenames keyed by book id and capture sequence
//! - Latest-per-book lookup for boot recovery
//! - Interval and cleanup policies

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use book_engine::events::BookExport;
use types::ids::BookId;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Snapshot header names book {header} but the state belongs to book {state}")]
    BookMismatch { header: BookId, state: BookId },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No snapshots found for book {0}")]
    NoSnapshots(BookId),
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A complete snapshot of one book at a capture sequence.
///
/// The state is the book's export: pair definition, pre-order tree
/// records, and resting orders sorted by id. The same book always
/// serializes to the same bytes, so the checksum is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Snapshot format version for forward compatibility.
    pub version: u32,
    /// Book this snapshot belongs to, repeated from the state.
    pub book_id: BookId,
    /// Caller-supplied capture sequence; recovery picks the highest.
    pub sequence: u64,
    /// Unix nanosecond timestamp when the snapshot was taken.
    pub taken_at: i64,
    /// Full book state.
    pub state: BookExport,
    /// SHA-256 hash of the serialized state.
    pub checksum: String,
    /// Whether the data on disk is zstd-compressed.
    pub compressed: bool,
}

impl TreeSnapshot {
    /// Create a new snapshot with computed integrity hash.
    pub fn new(sequence: u64, taken_at: i64, state: BookExport, compressed: bool) -> Self {
        let checksum = state_hash(&state);
        Self {
            version: SNAPSHOT_VERSION,
            book_id: state.book_id,
            sequence,
            taken_at,
            state,
            checksum,
            compressed,
        }
    }

    /// Verify the integrity hash and the header against the state.
    pub fn verify_integrity(&self) -> bool {
        self.book_id == self.state.book_id && self.checksum == state_hash(&self.state)
    }
}

/// Deterministic SHA-256 hash of a book state.
pub fn state_hash(state: &BookExport) -> String {
    let bytes = bincode::serialize(state).expect("book state serialization should never fail");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

// ── Snapshot Writer ─────────────────────────────────────────────────

/// Writes snapshots to disk with optional zstd compression.
pub struct SnapshotWriter {
    dir: PathBuf,
    compress: bool,
}

impl SnapshotWriter {
    /// Create a new writer. `compress` enables zstd compression.
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compress,
        }
    }

    /// Write a snapshot atomically: serialize, compress, write, rename.
    pub fn write(&self, snapshot: &TreeSnapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let data = bincode::serialize(snapshot)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        let (final_data, ext) = if self.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| SnapshotError::Compression(e.to_string()))?;
            (compressed, "snap.zst")
        } else {
            (data, "snap")
        };

        let filename = snapshot_filename(snapshot.book_id, snapshot.sequence, ext);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{}.tmp", filename));

        // Atomic write: write to tmp, fsync, rename
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&final_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        info!(
            book_id = snapshot.book_id.as_i32(),
            sequence = snapshot.sequence,
            bytes = final_data.len(),
            compressed = self.compress,
            "Snapshot written"
        );
        Ok(path)
    }
}

fn snapshot_filename(book_id: BookId, sequence: u64, ext: &str) -> String {
    format!("book{}-{:012}.{}", book_id.as_i32(), sequence, ext)
}

/// Parse a snapshot filename back into its book id and sequence.
///
/// Raw book ids are signed, so the stem is split on its last dash.
fn parse_filename(name: &str) -> Option<(BookId, u64)> {
    let stem = name.strip_prefix("book")?;
    let stem = stem
        .strip_suffix(".snap.zst")
        .or_else(|| stem.strip_suffix(".snap"))?;
    let (book_part, seq_part) = stem.rsplit_once('-')?;
    let book_id = BookId::try_from_raw(book_part.parse().ok()?)?;
    let sequence = seq_part.parse().ok()?;
    Some((book_id, sequence))
}

// ── Snapshot Loader ─────────────────────────────────────────────────

/// One snapshot file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub book_id: BookId,
    pub sequence: u64,
    pub path: PathBuf,
}

/// Loads snapshots from disk, verifying integrity.
pub struct SnapshotLoader {
    dir: PathBuf,
}

impl SnapshotLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a specific snapshot file.
    pub fn load(&self, path: &Path) -> Result<TreeSnapshot, SnapshotError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let is_compressed = path.extension().map(|e| e == "zst").unwrap_or(false);

        let decompressed = if is_compressed {
            zstd::decode_all(data.as_slice())
                .map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            data
        };

        let snapshot: TreeSnapshot = bincode::deserialize(&decompressed)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        if snapshot.book_id != snapshot.state.book_id {
            warn!(path = %path.display(), "Snapshot header and state disagree");
            return Err(SnapshotError::BookMismatch {
                header: snapshot.book_id,
                state: snapshot.state.book_id,
            });
        }
        let actual = state_hash(&snapshot.state);
        if snapshot.checksum != actual {
            warn!(
                book_id = snapshot.book_id.as_i32(),
                path = %path.display(),
                "Snapshot failed integrity check"
            );
            return Err(SnapshotError::IntegrityFailure {
                expected: snapshot.checksum.clone(),
                actual,
            });
        }

        Ok(snapshot)
    }

    /// Load a book's latest snapshot (highest sequence).
    pub fn load_latest(&self, book_id: BookId) -> Result<TreeSnapshot, SnapshotError> {
        let path = self.find_latest(book_id)?;
        self.load(&path)
    }

    /// Find the path to a book's latest snapshot.
    pub fn find_latest(&self, book_id: BookId) -> Result<PathBuf, SnapshotError> {
        self.list_snapshots()?
            .into_iter()
            .filter(|entry| entry.book_id == book_id)
            .max_by_key(|entry| entry.sequence)
            .map(|entry| entry.path)
            .ok_or(SnapshotError::NoSnapshots(book_id))
    }

    /// Every book's latest snapshot, ordered by raw book id.
    pub fn latest_per_book(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        let mut latest: BTreeMap<i32, SnapshotEntry> = BTreeMap::new();
        for entry in self.list_snapshots()? {
            match latest.get(&entry.book_id.as_i32()) {
                Some(kept) if kept.sequence >= entry.sequence => {}
                _ => {
                    latest.insert(entry.book_id.as_i32(), entry);
                }
            }
        }
        Ok(latest.into_values().collect())
    }

    /// List all snapshots, ordered by raw book id then sequence.
    ///
    /// Files that do not parse as snapshot names are skipped.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some((book_id, sequence)) = parse_filename(&name) {
                results.push(SnapshotEntry {
                    book_id,
                    sequence,
                    path: entry.path(),
                });
            }
        }
        results.sort_by_key(|entry| (entry.book_id.as_i32(), entry.sequence));
        Ok(results)
    }
}

// ── Snapshot Interval Policy ────────────────────────────────────────

/// Policy that determines when to capture a new snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotIntervalPolicy {
    /// Capture a snapshot every N engine mutations.
    pub op_interval: u64,
    /// Mutation count at which the last snapshot was taken.
    pub last_snapshot_ops: u64,
}

impl SnapshotIntervalPolicy {
    /// Create with the default interval of 100,000 mutations.
    pub fn default_policy() -> Self {
        Self {
            op_interval: 100_000,
            last_snapshot_ops: 0,
        }
    }

    /// Create with a custom interval.
    pub fn with_interval(interval: u64) -> Self {
        Self {
            op_interval: interval,
            last_snapshot_ops: 0,
        }
    }

    /// Check if a snapshot is due at the given mutation count.
    pub fn should_snapshot(&self, current_ops: u64) -> bool {
        current_ops >= self.last_snapshot_ops + self.op_interval
    }

    /// Record that a snapshot was taken at the given mutation count.
    pub fn record_snapshot(&mut self, ops: u64) {
        self.last_snapshot_ops = ops;
    }
}

// ── Snapshot Cleanup Policy ─────────────────────────────────────────

/// Policy for cleaning up old snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotCleanupPolicy {
    /// Snapshots to retain per book.
    pub keep_per_book: usize,
}

impl SnapshotCleanupPolicy {
    pub fn new(keep_per_book: usize) -> Self {
        Self { keep_per_book }
    }

    /// Remove old snapshots, keeping each book's most recent
    /// `keep_per_book`. Returns the removed paths.
    pub fn cleanup(&self, dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
        let loader = SnapshotLoader::new(dir);
        let mut by_book: BTreeMap<i32, Vec<SnapshotEntry>> = BTreeMap::new();
        for entry in loader.list_snapshots()? {
            by_book.entry(entry.book_id.as_i32()).or_default().push(entry);
        }

        let mut removed = Vec::new();
        for entries in by_book.into_values() {
            // list_snapshots sorts ascending, so the tail is the newest.
            if entries.len() > self.keep_per_book {
                let to_remove = entries.len() - self.keep_per_book;
                for entry in entries.into_iter().take(to_remove) {
                    fs::remove_file(&entry.path)?;
                    removed.push(entry.path);
                }
            }
        }
        Ok(removed)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
