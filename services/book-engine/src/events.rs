//! Outcome and export payloads produced by the engine

use serde::{Deserialize, Serialize};
use types::ids::{BookId, OrderId, ParticipantId};
use types::numeric::{Amount, Price};
use types::order::Order;
use types::pair::Pair;

use crate::tree::NodeRecord;

/// One resting order's share of a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: OrderId,
    pub participant: ParticipantId,
    pub price: Price,
    pub consumed: Amount,
    /// Amount still resting after this fill; zero means the order left
    /// the book.
    pub remaining: Amount,
}

/// Result of a fill request against one book
///
/// A fill that finds less liquidity than requested is still a success;
/// `filled` reports how much was actually consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub requested: Amount,
    pub filled: Amount,
    /// Per-order fills, best prices first, arrival order within a price
    pub fills: Vec<OrderFill>,
}

impl FillOutcome {
    /// Whether the full requested amount was consumed
    pub fn is_complete(&self) -> bool {
        self.filled == self.requested
    }

    /// The portion of the request that found no liquidity
    pub fn unfilled(&self) -> Amount {
        self.requested - self.filled
    }
}

/// One occupied price level in a depth view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub amount: Amount,
}

/// Complete exportable state of one book
///
/// Carries the pair definition, the flattened price tree, and every
/// resting order, which is everything needed to rebuild the book and
/// its index entries elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookExport {
    pub book_id: BookId,
    pub pair: Pair,
    pub nodes: Vec<NodeRecord>,
    /// Resting orders sorted by ascending order id
    pub orders: Vec<Order>,
}
