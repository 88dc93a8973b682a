//! Book Engine Service
//!
//! Price-indexed order book engine for the exchange. Keeps one book per
//! (pair, direction), each backed by a weight-augmented AVL tree over
//! occupied prices with a FIFO order queue at every level.
//!
//! **Key Invariants:**
//! - Fills consume liquidity strictly best price first, FIFO within a level
//! - Every subtree weight equals the sum of the amounts below it
//! - Book contents and the participant order index never diverge
//!
//! Running out of liquidity mid fill is a normal outcome, not an error.

pub mod book;
pub mod engine;
pub mod events;
pub mod index;
pub mod level;
pub mod registry;
pub mod tree;

pub use engine::{Engine, EngineConfig, EngineStats};
