//! Evaluates indicators for a record.
pub mod engine;
pub mod ledger;
pub mod strategy;

pub use engine::Engine;
pub use ledger::{ComputationError, Ledger};
