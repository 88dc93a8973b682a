//! Price level implementation with FIFO queue
//!
//! A price level holds every resting order at one price. The queue keeps
//! strict arrival order, so when a fill consumes part of a level the
//! earliest orders are consumed first. The level's total always equals
//! the tree node's own amount for the same price.

use std::collections::VecDeque;
use types::ids::{OrderId, ParticipantId};
use types::numeric::Amount;

/// Entry in the price level queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelEntry {
    order_id: OrderId,
    participant: ParticipantId,
    remaining: Amount,
}

/// One order's share of a level consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFill {
    pub order_id: OrderId,
    pub participant: ParticipantId,
    pub consumed: Amount,
    /// Amount still resting after this fill; zero means the order left
    /// the queue.
    pub remaining: Amount,
}

/// A price level containing orders at a specific price
///
/// Maintains strict FIFO ordering: fills consume from the front, new
/// orders join at the back.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
    /// Queue of orders at this price level (arrival order)
    entries: VecDeque<LevelEntry>,
    /// Total amount resting at this level
    total: Amount,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            total: Amount::ZERO,
        }
    }

    /// Append an order at the back of the queue
    pub fn push(&mut self, order_id: OrderId, participant: ParticipantId, amount: Amount) {
        self.entries.push_back(LevelEntry {
            order_id,
            participant,
            remaining: amount,
        });
        self.total += amount;
    }

    /// Remove an order from the queue by id
    ///
    /// Returns the remaining amount of the removed order, or None if the
    /// order is not queued here.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Amount> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.order_id == order_id)?;
        let entry = self.entries.remove(position)?;
        self.total -= entry.remaining;
        Some(entry.remaining)
    }

    /// Consume `amount` from the front of the queue
    ///
    /// Earlier orders are consumed in full before later ones are
    /// touched; at most one order ends up partially consumed and stays
    /// at the front. Returns None when the level holds less than
    /// `amount`, leaving the queue untouched.
    pub fn consume(&mut self, amount: Amount) -> Option<Vec<EntryFill>> {
        if amount > self.total {
            return None;
        }
        let mut fills = Vec::new();
        let mut remaining = amount;
        while !remaining.is_zero() {
            let mut entry = self.entries.pop_front()?;
            if entry.remaining <= remaining {
                remaining -= entry.remaining;
                self.total -= entry.remaining;
                fills.push(EntryFill {
                    order_id: entry.order_id,
                    participant: entry.participant,
                    consumed: entry.remaining,
                    remaining: Amount::ZERO,
                });
            } else {
                let consumed = remaining;
                entry.remaining -= consumed;
                self.total -= consumed;
                remaining = Amount::ZERO;
                fills.push(EntryFill {
                    order_id: entry.order_id,
                    participant: entry.participant,
                    consumed,
                    remaining: entry.remaining,
                });
                self.entries.push_front(entry);
            }
        }
        Some(fills)
    }

    /// Remaining amount of one queued order
    pub fn amount_of(&self, order_id: OrderId) -> Option<Amount> {
        self.entries
            .iter()
            .find(|entry| entry.order_id == order_id)
            .map(|entry| entry.remaining)
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the total amount at this price level
    pub fn total_amount(&self) -> Amount {
        self.total
    }

    /// Get the number of orders at this level
    pub fn order_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(tag: u8) -> ParticipantId {
        ParticipantId::from_bytes([tag; 20])
    }

    fn amt(value: u64) -> Amount {
        Amount::from_u64(value)
    }

    #[test]
    fn test_price_level_push() {
        let mut level = PriceLevel::new();
        level.push(OrderId::new(1), participant(1), amt(15));

        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_amount(), amt(15));
        assert!(!level.is_empty());
    }

    #[test]
    fn test_price_level_remove() {
        let mut level = PriceLevel::new();
        level.push(OrderId::new(1), participant(1), amt(10));
        level.push(OrderId::new(2), participant(2), amt(20));

        assert_eq!(level.remove(OrderId::new(1)), Some(amt(10)));
        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_amount(), amt(20));
        assert_eq!(level.remove(OrderId::new(1)), None);
    }

    #[test]
    fn test_consume_respects_arrival_order() {
        let mut level = PriceLevel::new();
        level.push(OrderId::new(1), participant(1), amt(10));
        level.push(OrderId::new(2), participant(2), amt(20));
        level.push(OrderId::new(3), participant(3), amt(30));

        let fills = level.consume(amt(30)).unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].order_id, OrderId::new(1));
        assert_eq!(fills[0].consumed, amt(10));
        assert_eq!(fills[0].remaining, Amount::ZERO);
        assert_eq!(fills[1].order_id, OrderId::new(2));
        assert_eq!(fills[1].consumed, amt(20));
        assert_eq!(fills[1].remaining, Amount::ZERO);

        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_amount(), amt(30));
    }

    #[test]
    fn test_consume_leaves_partial_front_order() {
        let mut level = PriceLevel::new();
        level.push(OrderId::new(1), participant(1), amt(10));
        level.push(OrderId::new(2), participant(2), amt(20));

        let fills = level.consume(amt(15)).unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[1].order_id, OrderId::new(2));
        assert_eq!(fills[1].consumed, amt(5));
        assert_eq!(fills[1].remaining, amt(15));

        assert_eq!(level.total_amount(), amt(15));
        assert_eq!(level.amount_of(OrderId::new(2)), Some(amt(15)));

        // The partially consumed order keeps its queue position.
        let next = level.consume(amt(15)).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].order_id, OrderId::new(2));
        assert!(level.is_empty());
    }

    #[test]
    fn test_consume_more_than_total_is_rejected() {
        let mut level = PriceLevel::new();
        level.push(OrderId::new(1), participant(1), amt(10));

        assert_eq!(level.consume(amt(11)), None);
        assert_eq!(level.total_amount(), amt(10));
        assert_eq!(level.order_count(), 1);
    }

    #[test]
    fn test_total_tracks_sum_of_entries() {
        let mut level = PriceLevel::new();
        level.push(OrderId::new(1), participant(1), amt(15));
        level.push(OrderId::new(2), participant(1), amt(25));
        level.push(OrderId::new(3), participant(2), amt(30));

        assert_eq!(level.total_amount(), amt(70));
    }
}
