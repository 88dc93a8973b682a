//! Boot-time restore of order books from snapshots
//!
//! Recovery process, per book:
//! 1. Find the book's latest snapshot (highest capture sequence)
//! 2. Load it, verifying version and SHA-256 integrity
//! 3. Install it into the engine, which rebuilds the tree from the
//!    stored records, re-audits every height and weight, rebuilds the
//!    level queues and the participant index, and advances the order
//!    id counter past every restored id
//! 4. Abort on the first corrupt book; the engine keeps whatever was
//!    installed before it, each book being its own failure domain
//!
//! Capture runs the other way: book state is copied out under the
//! book's read lock and encoded after the lock is released.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

use book_engine::Engine;
use types::errors::EngineError;
use types::ids::BookId;

use crate::snapshot::{SnapshotError, SnapshotLoader, SnapshotWriter, TreeSnapshot};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Restore rejected: {0}")]
    Restore(#[from] EngineError),
}

// ── Recovery Report ─────────────────────────────────────────────────

/// Metrics for one restored book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecovery {
    pub book_id: BookId,
    /// Capture sequence of the snapshot that was restored.
    pub sequence: u64,
    /// When that snapshot was taken, unix nanoseconds.
    pub taken_at: i64,
    /// Occupied price levels restored.
    pub levels: usize,
    /// Resting orders restored.
    pub orders: usize,
}

/// Metrics collected during recovery.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// One entry per restored book, ordered by raw book id.
    pub books: Vec<BookRecovery>,
    /// Total recovery time.
    pub elapsed_ms: u64,
}

impl RecoveryReport {
    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn order_count(&self) -> usize {
        self.books.iter().map(|book| book.orders).sum()
    }
}

// ── Recovery ────────────────────────────────────────────────────────

/// Restore every book found in `snapshot_dir` into the engine.
///
/// Each book's latest snapshot is loaded, verified, and installed;
/// pairs are registered from the snapshots as needed. An empty
/// directory is a cold start and yields an empty report. Any load or
/// install failure aborts recovery with the offending book's error.
pub fn recover_books(
    engine: &Engine,
    snapshot_dir: impl AsRef<Path>,
) -> Result<RecoveryReport, RecoveryError> {
    let started = Instant::now();
    let loader = SnapshotLoader::new(snapshot_dir.as_ref());
    let mut report = RecoveryReport::default();

    for entry in loader.latest_per_book()? {
        let snapshot = loader.load(&entry.path)?;
        if let Err(err) = engine.install_book(&snapshot.state) {
            warn!(
                book_id = entry.book_id.as_i32(),
                sequence = snapshot.sequence,
                %err,
                "Snapshot restore rejected"
            );
            return Err(err.into());
        }
        info!(
            book_id = entry.book_id.as_i32(),
            sequence = snapshot.sequence,
            levels = snapshot.state.nodes.len(),
            orders = snapshot.state.orders.len(),
            "Book recovered"
        );
        report.books.push(BookRecovery {
            book_id: entry.book_id,
            sequence: snapshot.sequence,
            taken_at: snapshot.taken_at,
            levels: snapshot.state.nodes.len(),
            orders: snapshot.state.orders.len(),
        });
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        books = report.book_count(),
        orders = report.order_count(),
        elapsed_ms = report.elapsed_ms,
        "Recovery complete"
    );
    Ok(report)
}

/// Capture one live book into a snapshot file.
///
/// The state is copied out under the book's read lock; serialization,
/// hashing, and the disk write all happen after the lock is released.
pub fn snapshot_book(
    engine: &Engine,
    book_id: BookId,
    sequence: u64,
    snapshot_dir: impl Into<PathBuf>,
    compress: bool,
) -> Result<PathBuf, RecoveryError> {
    let state = engine.export_book(book_id)?;
    let snapshot = TreeSnapshot::new(sequence, unix_now_nanos(), state, compress);
    let writer = SnapshotWriter::new(snapshot_dir, compress);
    Ok(writer.write(&snapshot)?)
}

/// Capture every registered book at the same sequence.
pub fn snapshot_all(
    engine: &Engine,
    sequence: u64,
    snapshot_dir: impl Into<PathBuf>,
    compress: bool,
) -> Result<Vec<PathBuf>, RecoveryError> {
    let dir = snapshot_dir.into();
    let mut paths = Vec::new();
    for book_id in engine.book_ids()? {
        paths.push(snapshot_book(engine, book_id, sequence, &dir, compress)?);
    }
    Ok(paths)
}

fn unix_now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or(0)
}

// ── Tests ───────────────────────────────────────────────────────────
