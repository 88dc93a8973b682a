//! Resting order types
//!
//! An order rests in exactly one book at one price. Its amount field is
//! the remaining unfilled amount; fills shrink it and an exhausted order
//! is removed rather than kept in a terminal state.

use crate::ids::{BookId, OrderId, ParticipantId};
use crate::numeric::{Amount, Price};
use serde::{Deserialize, Serialize};

/// Parameters for submitting a new order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub book_id: BookId,
    pub price: Price,
    pub amount: Amount,
    pub participant: ParticipantId,
}

/// A resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub book_id: BookId,
    pub price: Price,
    /// Remaining unfilled amount
    pub amount: Amount,
    pub participant: ParticipantId,
    pub created_at: i64, // Unix nanos
}

impl Order {
    /// Create a new resting order from an accepted request
    pub fn new(order_id: OrderId, request: &OrderRequest, created_at: i64) -> Self {
        Self {
            order_id,
            book_id: request.book_id,
            price: request.price,
            amount: request.amount,
            participant: request.participant,
            created_at,
        }
    }

    /// Reduce the remaining amount by a fill
    ///
    /// # Panics
    /// Panics if the fill exceeds the remaining amount
    pub fn apply_fill(&mut self, fill: Amount) {
        assert!(
            fill <= self.amount,
            "Fill would exceed remaining order amount"
        );
        self.amount -= fill;
    }

    /// Check if the order has no remaining amount
    pub fn is_exhausted(&self) -> bool {
        self.amount.is_zero()
    }
}
