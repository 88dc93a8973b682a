//! Error types for the book engine
//!
//! Comprehensive error taxonomy using thiserror

use crate::ids::{AssetId, OrderId, PairId};
use crate::numeric::Price;
use thiserror::Error;

/// Top-level engine error
///
/// Every variant except [`EngineError::InvariantViolation`] describes a
/// rejected request and leaves engine state untouched. An invariant
/// violation means internal state no longer holds and the affected book
/// cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Listing error: {0}")]
    InvalidListing(#[from] ListingError),

    #[error("Assets already listed as pair: {asset0}/{asset1}")]
    DuplicatePair { asset0: AssetId, asset1: AssetId },

    #[error("Unknown pair: {pair_id}")]
    UnknownPair { pair_id: PairId },

    #[error("Price error: {0}")]
    InvalidPrice(#[from] PriceError),

    #[error("Amount error: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("Open order limit exceeded: {limit} orders per book")]
    OrderLimitExceeded { limit: usize },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: OrderId },

    #[error("Invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

impl EngineError {
    /// Build an invariant violation from a detail message
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            detail: detail.into(),
        }
    }

    /// Whether this error signals corrupted engine state
    ///
    /// Fatal errors must not be retried; every other variant is a clean
    /// rejection and the engine remains fully usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

/// Pair listing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListingError {
    #[error("Asset {asset} cannot be paired with itself")]
    IdenticalAssets { asset: AssetId },

    #[error("Tick spacing must be nonzero")]
    ZeroTickSpacing,

    #[error("Lower bound {lower} exceeds upper bound {upper}")]
    InvertedBounds { lower: Price, upper: Price },
}

/// Price validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("Price {price} below lower bound {bound}")]
    BelowLowerBound { price: Price, bound: Price },

    #[error("Price {price} above upper bound {bound}")]
    AboveUpperBound { price: Price, bound: Price },

    #[error("Price {price} not aligned to tick spacing {spacing}")]
    TickMisaligned { price: Price, spacing: u16 },
}

/// Amount validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmountError {
    #[error("Amount must be nonzero")]
    Zero,

    #[error("Book weight would overflow")]
    WeightOverflow,
}
