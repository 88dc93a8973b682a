//! Participant order index
//!
//! Tracks every resting order per participant per book so ownership
//! checks, cancellations, and order listings never scan a book. The
//! index mirrors the books exactly: an order is present here if and
//! only if it rests in its book, with the same remaining amount.

use std::collections::HashMap;
use types::errors::EngineError;
use types::ids::{BookId, OrderId, ParticipantId};
use types::numeric::Amount;
use types::order::Order;

use crate::events::OrderFill;

fn missing_fill_target(order_id: OrderId) -> EngineError {
    EngineError::invariant(format!("fill for order {} missing from the index", order_id))
}

/// Index of resting orders by participant and book
#[derive(Debug, Default)]
pub struct OrderIndex {
    by_participant: HashMap<ParticipantId, HashMap<BookId, Vec<Order>>>,
}

impl OrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly rested order
    pub fn append(&mut self, order: Order) {
        self.by_participant
            .entry(order.participant)
            .or_default()
            .entry(order.book_id)
            .or_default()
            .push(order);
    }

    /// Look up one resting order
    pub fn find(
        &self,
        participant: ParticipantId,
        book_id: BookId,
        order_id: OrderId,
    ) -> Option<&Order> {
        self.by_participant
            .get(&participant)?
            .get(&book_id)?
            .iter()
            .find(|order| order.order_id == order_id)
    }

    fn find_mut(
        &mut self,
        participant: ParticipantId,
        book_id: BookId,
        order_id: OrderId,
    ) -> Option<&mut Order> {
        self.by_participant
            .get_mut(&participant)?
            .get_mut(&book_id)?
            .iter_mut()
            .find(|order| order.order_id == order_id)
    }

    /// Drop one resting order, pruning emptied groupings
    pub fn remove(
        &mut self,
        participant: ParticipantId,
        book_id: BookId,
        order_id: OrderId,
    ) -> Option<Order> {
        let (removed, participant_empty) = {
            let books = self.by_participant.get_mut(&participant)?;
            let orders = books.get_mut(&book_id)?;
            let position = orders.iter().position(|order| order.order_id == order_id)?;
            let removed = orders.remove(position);
            if orders.is_empty() {
                books.remove(&book_id);
            }
            (removed, books.is_empty())
        };
        if participant_empty {
            self.by_participant.remove(&participant);
        }
        Some(removed)
    }

    /// Mirror a book fill onto the indexed order
    ///
    /// A fully consumed order leaves the index; a partial fill shrinks
    /// the stored remaining amount. Any disagreement between the fill
    /// and the indexed order is fatal.
    pub fn apply_fill(&mut self, book_id: BookId, fill: &OrderFill) -> Result<(), EngineError> {
        if fill.remaining.is_zero() {
            let removed = self
                .remove(fill.participant, book_id, fill.order_id)
                .ok_or_else(|| missing_fill_target(fill.order_id))?;
            if removed.amount != fill.consumed {
                return Err(EngineError::invariant(format!(
                    "order {} held {} but the fill consumed {}",
                    fill.order_id, removed.amount, fill.consumed
                )));
            }
            return Ok(());
        }
        let order = self
            .find_mut(fill.participant, book_id, fill.order_id)
            .ok_or_else(|| missing_fill_target(fill.order_id))?;
        let expected = fill.consumed.checked_add(fill.remaining).ok_or_else(|| {
            EngineError::invariant(format!("fill amounts for order {} overflow", fill.order_id))
        })?;
        if order.amount != expected {
            return Err(EngineError::invariant(format!(
                "order {} held {} but the fill reports {} consumed and {} remaining",
                fill.order_id, order.amount, fill.consumed, fill.remaining
            )));
        }
        order.apply_fill(fill.consumed);
        Ok(())
    }

    /// A participant's resting orders in one book, in arrival order
    pub fn list(&self, participant: ParticipantId, book_id: BookId) -> Vec<Order> {
        self.by_participant
            .get(&participant)
            .and_then(|books| books.get(&book_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of one participant's resting orders in one book
    pub fn count(&self, participant: ParticipantId, book_id: BookId) -> usize {
        self.by_participant
            .get(&participant)
            .and_then(|books| books.get(&book_id))
            .map_or(0, Vec::len)
    }

    /// Every resting order in one book, sorted by ascending order id
    pub fn orders_for_book(&self, book_id: BookId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .by_participant
            .values()
            .filter_map(|books| books.get(&book_id))
            .flat_map(|orders| orders.iter().copied())
            .collect();
        orders.sort_by_key(|order| order.order_id);
        orders
    }

    /// Total resting orders in one book across all participants
    pub fn book_order_count(&self, book_id: BookId) -> usize {
        self.by_participant
            .values()
            .filter_map(|books| books.get(&book_id))
            .map(Vec::len)
            .sum()
    }

    /// Total resting amount in one book across all participants
    pub fn resting_amount(&self, book_id: BookId) -> Amount {
        self.by_participant
            .values()
            .filter_map(|books| books.get(&book_id))
            .flat_map(|orders| orders.iter().map(|order| order.amount))
            .sum()
    }

    /// Drop every order of one book, pruning emptied participants
    pub fn clear_book(&mut self, book_id: BookId) {
        for books in self.by_participant.values_mut() {
            books.remove(&book_id);
        }
        self.by_participant.retain(|_, books| !books.is_empty());
    }

    /// Total resting orders across all books
    pub fn len(&self) -> usize {
        self.by_participant
            .values()
            .flat_map(|books| books.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
