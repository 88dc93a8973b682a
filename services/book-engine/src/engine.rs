//! Book engine core
//!
//! Main coordinator: routes requests to books, keeps the participant
//! index in lockstep with book contents, and assigns order ids. Every
//! public operation takes `&self`; the registry, each book, and the
//! index sit behind their own locks, always acquired in that order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use types::errors::{AmountError, EngineError};
use types::ids::{BookId, OrderId, PairId, ParticipantId};
use types::numeric::{Amount, Price};
use types::order::{Order, OrderRequest};
use types::pair::{Pair, PairListing};

use crate::book::PriceBook;
use crate::events::{BookExport, DepthLevel, FillOutcome};
use crate::index::OrderIndex;
use crate::registry::BookRegistry;

/// Configuration for the book engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum resting orders one book will hold
    pub max_open_orders_per_book: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_open_orders_per_book: 1024,
        }
    }
}

/// Running operation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub orders_submitted: u64,
    pub orders_cancelled: u64,
    pub fills_executed: u64,
}

fn read_guard<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>, EngineError> {
    lock.read()
        .map_err(|_| EngineError::invariant(format!("{} lock poisoned", what)))
}

fn write_guard<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> Result<RwLockWriteGuard<'a, T>, EngineError> {
    lock.write()
        .map_err(|_| EngineError::invariant(format!("{} lock poisoned", what)))
}

fn unix_now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as i64)
}

/// Price-indexed order book engine
///
/// Owns the pair registry, one book per (pair, direction), and the
/// participant order index. Mutations hold the affected book's write
/// lock and the index write lock together, so the two views can never
/// be observed out of step.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    registry: RwLock<BookRegistry>,
    index: RwLock<OrderIndex>,
    next_order_id: AtomicU64,
    orders_submitted: AtomicU64,
    orders_cancelled: AtomicU64,
    fills_executed: AtomicU64,
}

impl Engine {
    /// Create a new engine with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        info!(
            max_open_orders_per_book = config.max_open_orders_per_book,
            "Engine initialized"
        );
        Self {
            config,
            registry: RwLock::new(BookRegistry::new()),
            index: RwLock::new(OrderIndex::new()),
            next_order_id: AtomicU64::new(1),
            orders_submitted: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            fills_executed: AtomicU64::new(0),
        }
    }

    /// Create a new engine with default configuration
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn book_handle(&self, book_id: BookId) -> Result<Arc<RwLock<PriceBook>>, EngineError> {
        read_guard(&self.registry, "registry")?.book(book_id)
    }

    /// List a new pair, creating both of its books
    pub fn register_pair(&self, listing: &PairListing) -> Result<Pair, EngineError> {
        let pair = write_guard(&self.registry, "registry")?.register(listing)?;
        info!(
            pair_id = pair.pair_id.as_u32(),
            asset0 = pair.asset0.as_u32(),
            asset1 = pair.asset1.as_u32(),
            tick_spacing = pair.tick_spacing,
            "Pair registered"
        );
        Ok(pair)
    }

    /// Definition of a registered pair
    pub fn lookup_pair(&self, pair_id: PairId) -> Result<Pair, EngineError> {
        read_guard(&self.registry, "registry")?.pair(pair_id)
    }

    /// Validate a request and rest the order in its book
    ///
    /// The price must sit on the pair's tick grid and the amount must
    /// be nonzero. The order id is assigned only after every check has
    /// passed, so rejected requests never consume ids.
    pub fn submit_order(&self, request: &OrderRequest) -> Result<OrderId, EngineError> {
        if request.amount.is_zero() {
            return Err(AmountError::Zero.into());
        }
        let (pair, book_lock) = {
            let registry = read_guard(&self.registry, "registry")?;
            (
                registry.pair(request.book_id.pair_id())?,
                registry.book(request.book_id)?,
            )
        };
        pair.validate_price(request.price)?;

        let mut book = write_guard(&book_lock, "book")?;
        if book.order_count() >= self.config.max_open_orders_per_book {
            return Err(EngineError::OrderLimitExceeded {
                limit: self.config.max_open_orders_per_book,
            });
        }
        if book.weight().checked_add(request.amount).is_none() {
            return Err(AmountError::WeightOverflow.into());
        }
        let mut index = write_guard(&self.index, "index")?;
        let order_id = OrderId::new(self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let order = Order::new(order_id, request, unix_now_nanos());
        index.append(order);
        book.insert_order(&order);
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            order_id = order_id.as_u64(),
            book_id = request.book_id.as_i32(),
            price = request.price.as_u32(),
            amount = %request.amount,
            "Order resting"
        );
        Ok(order_id)
    }

    /// Remove a participant's resting order, returning its remaining amount
    ///
    /// Only the order's owner can cancel it; anyone else sees the same
    /// error as for a nonexistent order.
    pub fn cancel_order(
        &self,
        participant: ParticipantId,
        book_id: BookId,
        order_id: OrderId,
    ) -> Result<Amount, EngineError> {
        let book_lock = self.book_handle(book_id)?;
        let mut book = write_guard(&book_lock, "book")?;
        let mut index = write_guard(&self.index, "index")?;
        let order = index
            .find(participant, book_id, order_id)
            .copied()
            .ok_or(EngineError::OrderNotFound { order_id })?;
        let removed = book.cancel_order(order_id, order.price)?;
        if removed != order.amount {
            return Err(EngineError::invariant(format!(
                "order {} rested {} in the book but {} in the index",
                order_id, removed, order.amount
            )));
        }
        index.remove(participant, book_id, order_id);
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(
            order_id = order_id.as_u64(),
            book_id = book_id.as_i32(),
            amount = %removed,
            "Order cancelled"
        );
        Ok(removed)
    }

    /// Consume up to `amount` of a book's liquidity, best prices first
    ///
    /// Finding less liquidity than requested is not an error; the
    /// outcome reports how much was filled. Requesting zero is a no-op
    /// that returns an empty outcome.
    pub fn fill_liquidity(&self, book_id: BookId, amount: Amount) -> Result<FillOutcome, EngineError> {
        self.fill_liquidity_bounded(book_id, amount, None)
    }

    /// [`Engine::fill_liquidity`] restricted to prices at or better
    /// than `limit`. The limit is a plain bound and does not have to
    /// sit on the tick grid.
    pub fn fill_liquidity_bounded(
        &self,
        book_id: BookId,
        amount: Amount,
        limit: Option<Price>,
    ) -> Result<FillOutcome, EngineError> {
        let book_lock = self.book_handle(book_id)?;
        if amount.is_zero() {
            return Ok(FillOutcome {
                requested: Amount::ZERO,
                filled: Amount::ZERO,
                fills: Vec::new(),
            });
        }
        let mut book = write_guard(&book_lock, "book")?;
        let mut index = write_guard(&self.index, "index")?;
        let outcome = book.fill_bounded(amount, limit)?;
        for fill in &outcome.fills {
            index.apply_fill(book_id, fill)?;
        }
        self.fills_executed.fetch_add(1, Ordering::Relaxed);
        debug!(
            book_id = book_id.as_i32(),
            requested = %outcome.requested,
            filled = %outcome.filled,
            orders_touched = outcome.fills.len(),
            "Liquidity filled"
        );
        Ok(outcome)
    }

    /// A participant's resting orders in one book
    ///
    /// An unknown book or a participant with no orders yields an empty
    /// list rather than an error.
    pub fn list_orders(
        &self,
        participant: ParticipantId,
        book_id: BookId,
    ) -> Result<Vec<Order>, EngineError> {
        Ok(read_guard(&self.index, "index")?.list(participant, book_id))
    }

    /// The best occupied price of a book
    pub fn best_price(&self, book_id: BookId) -> Result<Option<Price>, EngineError> {
        let book_lock = self.book_handle(book_id)?;
        let book = read_guard(&book_lock, "book")?;
        Ok(book.best_price())
    }

    /// Total liquidity resting in a book
    pub fn book_weight(&self, book_id: BookId) -> Result<Amount, EngineError> {
        let book_lock = self.book_handle(book_id)?;
        let book = read_guard(&book_lock, "book")?;
        Ok(book.weight())
    }

    /// Resting amount at an exact price of a book
    pub fn amount_at_price(
        &self,
        book_id: BookId,
        price: Price,
    ) -> Result<Option<Amount>, EngineError> {
        let book_lock = self.book_handle(book_id)?;
        let book = read_guard(&book_lock, "book")?;
        Ok(book.amount_at(price))
    }

    /// Up to `max_levels` of a book's depth, best prices first
    pub fn depth(&self, book_id: BookId, max_levels: usize) -> Result<Vec<DepthLevel>, EngineError> {
        let book_lock = self.book_handle(book_id)?;
        let book = read_guard(&book_lock, "book")?;
        Ok(book.depth(max_levels))
    }

    /// All registered pairs, ordered by pair id
    pub fn pairs(&self) -> Result<Vec<Pair>, EngineError> {
        Ok(read_guard(&self.registry, "registry")?.pairs())
    }

    /// All book ids, ordered by raw id
    pub fn book_ids(&self) -> Result<Vec<BookId>, EngineError> {
        Ok(read_guard(&self.registry, "registry")?.book_ids())
    }

    /// Audit one book and its index entries against each other
    ///
    /// Verifies the tree structure, the level queues, and that the
    /// index holds exactly the orders the book queues, order by order.
    pub fn verify_book(&self, book_id: BookId) -> Result<(), EngineError> {
        let book_lock = self.book_handle(book_id)?;
        let book = read_guard(&book_lock, "book")?;
        let index = read_guard(&self.index, "index")?;
        book.check_invariants()?;
        let indexed_amount = index.resting_amount(book_id);
        if indexed_amount != book.weight() {
            return Err(EngineError::invariant(format!(
                "book {}: index sums {} but the tree weighs {}",
                book_id,
                indexed_amount,
                book.weight()
            )));
        }
        let indexed_orders = index.book_order_count(book_id);
        if indexed_orders != book.order_count() {
            return Err(EngineError::invariant(format!(
                "book {}: index holds {} orders but the book queues {}",
                book_id,
                indexed_orders,
                book.order_count()
            )));
        }
        for order in index.orders_for_book(book_id) {
            let queued = book.queued_amount(order.price, order.order_id);
            if queued != Some(order.amount) {
                return Err(EngineError::invariant(format!(
                    "book {}: order {} queues {:?} but the index holds {}",
                    book_id, order.order_id, queued, order.amount
                )));
            }
        }
        Ok(())
    }

    /// Copy one book's full state for snapshotting
    ///
    /// The book and index read locks are held only while the state is
    /// copied out; serialization and disk writes happen on the caller's
    /// time with no locks held.
    pub fn export_book(&self, book_id: BookId) -> Result<BookExport, EngineError> {
        let (pair, book_lock) = {
            let registry = read_guard(&self.registry, "registry")?;
            (
                registry.pair(book_id.pair_id())?,
                registry.book(book_id)?,
            )
        };
        let book = read_guard(&book_lock, "book")?;
        let index = read_guard(&self.index, "index")?;
        let nodes = book.export_nodes();
        let orders = index.orders_for_book(book_id);
        Ok(BookExport {
            book_id,
            pair,
            nodes,
            orders,
        })
    }

    /// Replace one book's state from an export
    ///
    /// The export is rebuilt and audited before any live state is
    /// touched, so a rejected export leaves the engine unchanged. The
    /// order id sequence advances past every restored id. The
    /// submission cap does not apply here; a snapshot is restored in
    /// full.
    pub fn install_book(&self, export: &BookExport) -> Result<(), EngineError> {
        if export.book_id.pair_id() != export.pair.pair_id {
            return Err(EngineError::invariant(format!(
                "export for book {} carries pair {}",
                export.book_id, export.pair.pair_id
            )));
        }
        let mut orders = export.orders.clone();
        orders.sort_by_key(|order| order.order_id);
        let restored = PriceBook::restore(export.book_id, &export.nodes, &orders)?;

        let book_lock = {
            let mut registry = write_guard(&self.registry, "registry")?;
            registry.install_pair(export.pair)?;
            registry.book(export.book_id)?
        };
        let mut book = write_guard(&book_lock, "book")?;
        let mut index = write_guard(&self.index, "index")?;
        index.clear_book(export.book_id);
        for order in &orders {
            index.append(*order);
        }
        *book = restored;

        let max_id = orders.last().map_or(0, |order| order.order_id.as_u64());
        self.next_order_id.fetch_max(max_id + 1, Ordering::Relaxed);
        info!(
            book_id = export.book_id.as_i32(),
            levels = export.nodes.len(),
            orders = orders.len(),
            "Book installed from export"
        );
        Ok(())
    }

    /// Snapshot of the running operation counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            orders_submitted: self.orders_submitted.load(Ordering::Relaxed),
            orders_cancelled: self.orders_cancelled.load(Ordering::Relaxed),
            fills_executed: self.fills_executed.load(Ordering::Relaxed),
        }
    }
}
