//! Pair registration and book lookup
//!
//! The registry owns every listed pair and the two books behind it,
//! one per direction. Pair ids are assigned sequentially starting at 1
//! so the id can carry the direction sign. Each book sits behind its
//! own lock; the registry hands out handles and never holds a book
//! locked itself.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use types::errors::EngineError;
use types::ids::{AssetId, BookId, Direction, PairId};
use types::pair::{Pair, PairListing};

use crate::book::PriceBook;

/// Source of pair definitions
///
/// The engine only ever reads pair metadata. The in-memory registry
/// implements this; a deployment backed by an external pair directory
/// can supply its own source.
pub trait PairLookup {
    fn lookup_pair(&self, pair_id: PairId) -> Option<Pair>;
}

/// Registry of listed pairs and their order books
#[derive(Debug, Default)]
pub struct BookRegistry {
    pairs: HashMap<PairId, Pair>,
    by_assets: HashMap<(AssetId, AssetId), PairId>,
    books: HashMap<BookId, Arc<RwLock<PriceBook>>>,
    next_pair_id: u32,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a new pair, creating one empty book per direction
    ///
    /// Rejects listings whose asset set is already registered, in
    /// either asset order.
    pub fn register(&mut self, listing: &PairListing) -> Result<Pair, EngineError> {
        listing.validate()?;
        if self.by_assets.contains_key(&listing.asset_key()) {
            return Err(EngineError::DuplicatePair {
                asset0: listing.asset0,
                asset1: listing.asset1,
            });
        }
        self.next_pair_id += 1;
        let pair = Pair::from_listing(PairId::new(self.next_pair_id), listing);
        self.insert_pair(pair);
        Ok(pair)
    }

    /// Install a previously registered pair, as found in a snapshot
    ///
    /// Installing the same pair twice is a no-op. A pair id that is
    /// already bound to a different definition, or an asset set already
    /// bound to a different pair id, means the snapshot disagrees with
    /// live state and is fatal.
    pub fn install_pair(&mut self, pair: Pair) -> Result<(), EngineError> {
        if let Some(existing) = self.pairs.get(&pair.pair_id) {
            if *existing == pair {
                return Ok(());
            }
            return Err(EngineError::invariant(format!(
                "pair {} installed with a conflicting definition",
                pair.pair_id
            )));
        }
        if let Some(holder) = self.by_assets.get(&pair.asset_key()) {
            return Err(EngineError::invariant(format!(
                "assets {}/{} already belong to pair {}",
                pair.asset0, pair.asset1, holder
            )));
        }
        self.next_pair_id = self.next_pair_id.max(pair.pair_id.as_u32());
        self.insert_pair(pair);
        Ok(())
    }

    fn insert_pair(&mut self, pair: Pair) {
        self.pairs.insert(pair.pair_id, pair);
        self.by_assets.insert(pair.asset_key(), pair.pair_id);
        for direction in [Direction::ZeroForOne, Direction::OneForZero] {
            let book_id = BookId::compose(pair.pair_id, direction);
            self.books
                .insert(book_id, Arc::new(RwLock::new(PriceBook::new(book_id))));
        }
    }

    /// Handle to one book; the caller locks it for as long as needed
    pub fn book(&self, book_id: BookId) -> Result<Arc<RwLock<PriceBook>>, EngineError> {
        self.books
            .get(&book_id)
            .cloned()
            .ok_or(EngineError::UnknownPair {
                pair_id: book_id.pair_id(),
            })
    }

    /// Definition of a registered pair
    pub fn pair(&self, pair_id: PairId) -> Result<Pair, EngineError> {
        self.lookup_pair(pair_id)
            .ok_or(EngineError::UnknownPair { pair_id })
    }

    /// Find a pair by its assets, independent of asset order
    pub fn pair_by_assets(&self, asset0: AssetId, asset1: AssetId) -> Option<Pair> {
        let key = if asset0 <= asset1 {
            (asset0, asset1)
        } else {
            (asset1, asset0)
        };
        let pair_id = self.by_assets.get(&key)?;
        self.pairs.get(pair_id).copied()
    }

    /// All registered pairs, ordered by pair id
    pub fn pairs(&self) -> Vec<Pair> {
        let mut pairs: Vec<Pair> = self.pairs.values().copied().collect();
        pairs.sort_by_key(|pair| pair.pair_id);
        pairs
    }

    /// All book ids, ordered by raw id
    pub fn book_ids(&self) -> Vec<BookId> {
        let mut ids: Vec<BookId> = self.books.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of registered pairs
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

impl PairLookup for BookRegistry {
    fn lookup_pair(&self, pair_id: PairId) -> Option<Pair> {
        self.pairs.get(&pair_id).copied()
    }
}
