//! Ironfront - Non-Combat Move Planner
//!
//! Decision engine for the redeployment phase of a turn-based territorial
//! wargame: decides which units move where so contested territories are
//! defended without wasting strategic value.

pub mod combat;
pub mod core;
pub mod executor;
pub mod map;
pub mod planner;
