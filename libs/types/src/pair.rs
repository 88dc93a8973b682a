//! Trading pair listings and price validation
//!
//! A pair fixes the tick grid for both of its books: every resting order
//! must land on a tick between the listing bounds, aligned to the listing
//! spacing. Validation happens once at submission so the books themselves
//! never hold an out-of-grid price.

use crate::errors::{ListingError, PriceError};
use crate::ids::{AssetId, PairId};
use crate::numeric::Price;
use serde::{Deserialize, Serialize};

/// Parameters for listing a new trading pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairListing {
    pub asset0: AssetId,
    pub asset1: AssetId,
    pub tick_spacing: u16,
    pub tick_lower_bound: Price,
    pub tick_upper_bound: Price,
}

impl PairListing {
    /// Check the listing parameters for internal consistency
    pub fn validate(&self) -> Result<(), ListingError> {
        if self.asset0 == self.asset1 {
            return Err(ListingError::IdenticalAssets { asset: self.asset0 });
        }
        if self.tick_spacing == 0 {
            return Err(ListingError::ZeroTickSpacing);
        }
        if self.tick_lower_bound > self.tick_upper_bound {
            return Err(ListingError::InvertedBounds {
                lower: self.tick_lower_bound,
                upper: self.tick_upper_bound,
            });
        }
        Ok(())
    }

    /// Canonical asset pair key, independent of listing order
    pub fn asset_key(&self) -> (AssetId, AssetId) {
        if self.asset0 <= self.asset1 {
            (self.asset0, self.asset1)
        } else {
            (self.asset1, self.asset0)
        }
    }
}

/// A registered trading pair
///
/// Immutable once registered; the tick grid cannot change while orders
/// rest on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub pair_id: PairId,
    pub asset0: AssetId,
    pub asset1: AssetId,
    pub tick_spacing: u16,
    pub tick_lower_bound: Price,
    pub tick_upper_bound: Price,
}

impl Pair {
    /// Build a registered pair from a validated listing
    pub fn from_listing(pair_id: PairId, listing: &PairListing) -> Self {
        Self {
            pair_id,
            asset0: listing.asset0,
            asset1: listing.asset1,
            tick_spacing: listing.tick_spacing,
            tick_lower_bound: listing.tick_lower_bound,
            tick_upper_bound: listing.tick_upper_bound,
        }
    }

    /// Check a price against this pair's tick grid
    ///
    /// Valid prices lie in `[tick_lower_bound, tick_upper_bound]` and are
    /// multiples of `tick_spacing`.
    pub fn validate_price(&self, price: Price) -> Result<(), PriceError> {
        if price < self.tick_lower_bound {
            return Err(PriceError::BelowLowerBound {
                price,
                bound: self.tick_lower_bound,
            });
        }
        if price > self.tick_upper_bound {
            return Err(PriceError::AboveUpperBound {
                price,
                bound: self.tick_upper_bound,
            });
        }
        if price.as_u32() % u32::from(self.tick_spacing) != 0 {
            return Err(PriceError::TickMisaligned {
                price,
                spacing: self.tick_spacing,
            });
        }
        Ok(())
    }

    /// Canonical asset pair key, independent of listing order
    pub fn asset_key(&self) -> (AssetId, AssetId) {
        if self.asset0 <= self.asset1 {
            (self.asset0, self.asset1)
        } else {
            (self.asset1, self.asset0)
        }
    }
}
