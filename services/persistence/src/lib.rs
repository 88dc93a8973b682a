//! Book Persistence Service
//!
//! Snapshots order books to disk and restores them on boot. Each book
//! is serialized with a SHA-256 integrity hash and optional zstd
//! compression; restores rebuild the tree and re-audit every stored
//! height and weight before any live state is replaced.

pub mod recovery;
pub mod snapshot;
