//! Data models for the proposal board.
//!
//! Field names serialize as camelCase to match the client contract.

mod proposal;
mod topic;
mod vote;

pub use proposal::*;
pub use topic::*;
pub use vote::*;
