//! Price ticks and 256-bit liquidity amounts
//!
//! Prices are integer ticks so ordering and tick-spacing checks are exact.
//! Amounts are 256-bit unsigned integers, wide enough to aggregate every
//! order in a book without overflow in practice; the tree still checks
//! additions so a corrupted amount cannot wrap silently.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Price tick of an order
///
/// A dimensionless integer tick; the pair listing defines the valid range
/// and spacing. Ordering is plain integer ordering, and which end is
/// "best" depends on the book's direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u32);

impl Price {
    /// Create from a raw tick
    pub const fn new(tick: u32) -> Self {
        Self(tick)
    }

    /// Get the raw tick
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Liquidity amount, in the book's base asset units
///
/// Backed by a 256-bit unsigned integer. The arithmetic operators panic
/// on overflow and underflow; callers that need to surface overflow as an
/// error use [`Amount::checked_add`] and [`Amount::checked_sub`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(U256);

impl Amount {
    /// The zero amount
    pub const ZERO: Self = Self(U256::ZERO);

    /// Create from a 256-bit value
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Create from a small integer
    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Whether this amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Get the inner 256-bit value
    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    /// Add, returning None on overflow
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Subtract, returning None on underflow
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Subtract, clamping at zero
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Amount {
    type Output = Self;

    /// # Panics
    /// Panics on overflow
    fn add(self, rhs: Self) -> Self {
        Self(
            self.0
                .checked_add(rhs.0)
                .expect("amount addition overflow"),
        )
    }
}

impl Sub for Amount {
    type Output = Self;

    /// # Panics
    /// Panics on underflow
    fn sub(self, rhs: Self) -> Self {
        Self(
            self.0
                .checked_sub(rhs.0)
                .expect("amount subtraction underflow"),
        )
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_ordering() {
        assert!(Price::new(10) < Price::new(20));
        assert_eq!(Price::new(15), Price::new(15));
    }

    #[test]
    fn test_amount_arithmetic() {
        let a = Amount::from_u64(5);
        let b = Amount::from_u64(7);
        assert_eq!(a + b, Amount::from_u64(12));
        assert_eq!(b - a, Amount::from_u64(2));
    }

    #[test]
    fn test_amount_sum() {
        let total: Amount = (1..=4u64).map(Amount::from_u64).sum();
        assert_eq!(total, Amount::from_u64(10));
    }

    #[test]
    fn test_amount_checked_overflow() {
        let max = Amount::new(U256::MAX);
        assert!(max.checked_add(Amount::from_u64(1)).is_none());
        assert_eq!(max.checked_add(Amount::ZERO), Some(max));
    }

    #[test]
    fn test_amount_checked_underflow() {
        let small = Amount::from_u64(3);
        assert!(small.checked_sub(Amount::from_u64(4)).is_none());
        assert_eq!(
            small.saturating_sub(Amount::from_u64(4)),
            Amount::ZERO
        );
    }

    #[test]
    #[should_panic(expected = "amount subtraction underflow")]
    fn test_amount_sub_underflow_panics() {
        let _ = Amount::from_u64(1) - Amount::from_u64(2);
    }

    #[test]
    fn test_amount_serialization() {
        let amount = Amount::from_u64(1_000_000);
        let json = serde_json::to_string(&amount).unwrap();
        let deserialized: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, deserialized);
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_u64(42).to_string(), "42");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }
}
