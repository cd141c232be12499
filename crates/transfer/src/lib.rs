//! Stock transfers between warehouses.
//!
//! A transfer moves a quantity of one product from a source warehouse to a
//! destination warehouse in two steps: `begin` takes the quantity out of the
//! source row, `complete` lands it in the destination row. An in-progress
//! transfer can instead be reverted (quantity returns to the source) or
//! marked failed (quantity stays out).

pub mod orchestrator;
pub mod state;

pub use orchestrator::TransferOrchestrator;
pub use state::{TransferEvent, transition};
