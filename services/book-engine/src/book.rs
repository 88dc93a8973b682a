//! One side of a pair's order book
//!
//! A book combines the weight-augmented price tree with a FIFO queue
//! per occupied level. The tree answers aggregate questions (best
//! price, total liquidity, which levels a fill consumes); the queues
//! attribute those consumptions to individual orders. Both structures
//! must always agree, and [`PriceBook::check_invariants`] verifies that
//! they do.

use std::collections::HashMap;
use types::errors::EngineError;
use types::ids::{BookId, Direction, OrderId};
use types::numeric::{Amount, Price};
use types::order::Order;

use crate::events::{DepthLevel, FillOutcome, OrderFill};
use crate::level::PriceLevel;
use crate::tree::{NodeRecord, PriceTree};

/// Price-indexed order book for one direction of one pair
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBook {
    book_id: BookId,
    tree: PriceTree,
    levels: HashMap<Price, PriceLevel>,
}

impl PriceBook {
    /// Create an empty book
    pub fn new(book_id: BookId) -> Self {
        Self {
            book_id,
            tree: PriceTree::new(),
            levels: HashMap::new(),
        }
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    /// The direction whose liquidity this book holds
    pub fn direction(&self) -> Direction {
        self.book_id.direction()
    }

    /// Rest an order in the book
    ///
    /// The caller has already validated the price and amount and routed
    /// the order here.
    ///
    /// # Panics
    /// Panics if the order names a different book
    pub fn insert_order(&mut self, order: &Order) {
        assert_eq!(
            order.book_id, self.book_id,
            "Order routed to the wrong book"
        );
        self.tree.insert(order.price, order.amount);
        self.levels
            .entry(order.price)
            .or_default()
            .push(order.order_id, order.participant, order.amount);
    }

    /// Remove a resting order, returning its remaining amount
    ///
    /// The order is expected to rest at `price`; the engine resolves the
    /// price from its index before calling. A miss here means the book
    /// and the index diverged, which is fatal.
    pub fn cancel_order(&mut self, order_id: OrderId, price: Price) -> Result<Amount, EngineError> {
        let level = self.levels.get_mut(&price).ok_or_else(|| {
            EngineError::invariant(format!(
                "book {}: cancel of order {} found no level at {}",
                self.book_id, order_id, price
            ))
        })?;
        let removed = level.remove(order_id).ok_or_else(|| {
            EngineError::invariant(format!(
                "book {}: order {} is not queued at {}",
                self.book_id, order_id, price
            ))
        })?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        let released = self.tree.remove_amount(price, removed);
        if released != removed {
            return Err(EngineError::invariant(format!(
                "book {}: tree released {} of the {} queued at {}",
                self.book_id, released, removed, price
            )));
        }
        Ok(removed)
    }

    /// Consume up to `amount` of liquidity, best prices first
    pub fn fill(&mut self, amount: Amount) -> Result<FillOutcome, EngineError> {
        self.fill_bounded(amount, None)
    }

    /// [`PriceBook::fill`] restricted to prices at or better than `limit`
    pub fn fill_bounded(
        &mut self,
        amount: Amount,
        limit: Option<Price>,
    ) -> Result<FillOutcome, EngineError> {
        let direction = self.direction();
        let (level_fills, unfilled) = self.tree.fill_bounded(direction, amount, limit);
        let mut fills = Vec::new();
        for level_fill in &level_fills {
            let level = self.levels.get_mut(&level_fill.price).ok_or_else(|| {
                EngineError::invariant(format!(
                    "book {}: fill touched unoccupied level {}",
                    self.book_id, level_fill.price
                ))
            })?;
            let entry_fills = level.consume(level_fill.consumed).ok_or_else(|| {
                EngineError::invariant(format!(
                    "book {}: level {} holds less than the tree recorded",
                    self.book_id, level_fill.price
                ))
            })?;
            if level.is_empty() {
                self.levels.remove(&level_fill.price);
            }
            fills.extend(entry_fills.into_iter().map(|entry| OrderFill {
                order_id: entry.order_id,
                participant: entry.participant,
                price: level_fill.price,
                consumed: entry.consumed,
                remaining: entry.remaining,
            }));
        }
        Ok(FillOutcome {
            requested: amount,
            filled: amount - unfilled,
            fills,
        })
    }

    /// The best occupied price, if any liquidity rests here
    pub fn best_price(&self) -> Option<Price> {
        self.tree.find_best(self.direction())
    }

    /// Total liquidity resting in the book
    pub fn weight(&self) -> Amount {
        self.tree.weight()
    }

    /// Resting amount at an exact price
    pub fn amount_at(&self, price: Price) -> Option<Amount> {
        self.tree.amount_at(price)
    }

    /// Up to `max_levels` occupied levels, best prices first
    pub fn depth(&self, max_levels: usize) -> Vec<DepthLevel> {
        self.tree
            .levels_best_first(self.direction(), max_levels)
            .into_iter()
            .map(|(price, amount)| DepthLevel { price, amount })
            .collect()
    }

    /// Number of occupied price levels
    pub fn level_count(&self) -> usize {
        self.tree.len()
    }

    /// Number of resting orders across all levels
    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }

    /// Remaining amount of one queued order, if it rests at `price`
    pub fn queued_amount(&self, price: Price, order_id: OrderId) -> Option<Amount> {
        self.levels.get(&price)?.amount_of(order_id)
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Verify the tree structurally and check that the level queues
    /// mirror it exactly: same set of prices, same amount per price.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        self.tree.check_invariants().map_err(|defect| {
            EngineError::invariant(format!("book {}: {}", self.book_id, defect))
        })?;
        if self.levels.len() != self.tree.len() {
            return Err(EngineError::invariant(format!(
                "book {}: {} level queues against {} tree nodes",
                self.book_id,
                self.levels.len(),
                self.tree.len()
            )));
        }
        for (price, level) in &self.levels {
            if level.is_empty() {
                return Err(EngineError::invariant(format!(
                    "book {}: empty level queue kept at {}",
                    self.book_id, price
                )));
            }
            let tree_amount = self.tree.amount_at(*price);
            if tree_amount != Some(level.total_amount()) {
                return Err(EngineError::invariant(format!(
                    "book {}: level {} queues {} but the tree holds {:?}",
                    self.book_id,
                    price,
                    level.total_amount(),
                    tree_amount
                )));
            }
        }
        Ok(())
    }

    /// Flatten the price tree for a snapshot
    pub fn export_nodes(&self) -> Vec<NodeRecord> {
        self.tree.export_records()
    }

    /// Rebuild a book from snapshot records and its resting orders
    ///
    /// `orders` must be sorted by ascending order id so each level's
    /// queue recovers its arrival order. The rebuilt book is audited
    /// before being returned, so tampered records are rejected.
    pub fn restore(
        book_id: BookId,
        nodes: &[NodeRecord],
        orders: &[Order],
    ) -> Result<Self, EngineError> {
        let tree = PriceTree::from_records(nodes).map_err(|defect| {
            EngineError::invariant(format!("book {}: {}", book_id, defect))
        })?;
        let mut levels: HashMap<Price, PriceLevel> = HashMap::new();
        for order in orders {
            if order.book_id != book_id {
                return Err(EngineError::invariant(format!(
                    "book {}: restored order {} belongs to book {}",
                    book_id, order.order_id, order.book_id
                )));
            }
            if order.amount.is_zero() {
                return Err(EngineError::invariant(format!(
                    "book {}: restored order {} has zero remaining amount",
                    book_id, order.order_id
                )));
            }
            levels
                .entry(order.price)
                .or_default()
                .push(order.order_id, order.participant, order.amount);
        }
        let book = Self {
            book_id,
            tree,
            levels,
        };
        book.check_invariants()?;
        Ok(book)
    }
}
