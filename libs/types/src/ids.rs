//! Unique identifier types for exchange entities
//!
//! Books are keyed by a signed id whose magnitude names the trading pair
//! and whose sign names the direction of flow, so the two sides of a pair
//! live in two independent books.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a listed asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(u32);

impl AssetId {
    /// Create from a raw asset number
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw asset number
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trading pair
///
/// Assigned sequentially at registration, starting from 1. Zero is never
/// a valid pair id because the sign of the derived [`BookId`] would be lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(u32);

impl PairId {
    /// Create from a raw pair number
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw pair number
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of flow through a pair's order book
///
/// `ZeroForOne` sells asset0 for asset1; `OneForZero` sells asset1 for
/// asset0. Each direction has its own book and its own notion of which
/// price is best: the lowest tick for `ZeroForOne`, the highest for
/// `OneForZero`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    ZeroForOne,
    OneForZero,
}

impl Direction {
    /// The opposite direction of flow
    pub const fn opposite(&self) -> Self {
        match self {
            Direction::ZeroForOne => Direction::OneForZero,
            Direction::OneForZero => Direction::ZeroForOne,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ZeroForOne => write!(f, "ZERO_FOR_ONE"),
            Direction::OneForZero => write!(f, "ONE_FOR_ZERO"),
        }
    }
}

/// Identifier of one side of a trading pair's order book
///
/// The magnitude is the pair id and the sign is the direction: positive
/// for asset0 -> asset1 flow, negative for asset1 -> asset0. Zero is not
/// a valid book id and is rejected on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct BookId(i32);

impl BookId {
    /// Compose a book id from a pair and a direction
    ///
    /// # Panics
    /// Panics if the pair id is zero or exceeds `i32::MAX`
    pub fn compose(pair_id: PairId, direction: Direction) -> Self {
        let raw = pair_id.as_u32();
        assert!(raw != 0, "pair id zero cannot carry a direction sign");
        assert!(raw <= i32::MAX as u32, "pair id exceeds book id range");
        let signed = raw as i32;
        match direction {
            Direction::ZeroForOne => Self(signed),
            Direction::OneForZero => Self(-signed),
        }
    }

    /// Try to create from a raw signed id, returning None if zero
    pub fn try_from_raw(raw: i32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// The trading pair this book belongs to
    pub const fn pair_id(&self) -> PairId {
        PairId::new(self.0.unsigned_abs())
    }

    /// The direction of flow this book holds
    pub const fn direction(&self) -> Direction {
        if self.0 > 0 {
            Direction::ZeroForOne
        } else {
            Direction::OneForZero
        }
    }

    /// The book on the other side of the same pair
    pub const fn opposite(&self) -> Self {
        Self(-self.0)
    }

    /// Get the raw signed id
    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for BookId {
    type Error = &'static str;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::try_from_raw(raw).ok_or("book id zero names no book")
    }
}

impl From<BookId> for i32 {
    fn from(book_id: BookId) -> i32 {
        book_id.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order
///
/// Assigned sequentially by the engine, so ids double as submission
/// order within a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Create from a raw sequence number
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw sequence number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the participant who placed an order
///
/// A 20-byte account address, the settlement-layer notion of identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Address);

impl ParticipantId {
    /// Create from an address
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// Create from raw address bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(Address::from(bytes))
    }

    /// Get the inner address
    pub const fn as_address(&self) -> &Address {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
