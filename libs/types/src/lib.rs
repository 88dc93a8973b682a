//! Types library for the order book exchange
//!
//! This library provides all core type definitions used across the engine
//! services, ensuring type safety and deterministic behavior.
//!
//! # Version
//! v1.0.0
//!
//! # Modules
//! - `ids`: Unique identifiers (AssetId, PairId, BookId, OrderId, ParticipantId)
//! - `numeric`: Price ticks and 256-bit amounts
//! - `pair`: Trading pair listings and price validation
//! - `order`: Resting order types
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod pair;
pub mod order;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::pair::*;
    pub use crate::order::*;
    pub use crate::errors::*;
}
