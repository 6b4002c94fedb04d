//! User-facing write workflows.
//!
//! Both workflows force a refresh of the affected topic view right after a
//! successful write so the acting user sees the result without waiting for a
//! change notification.

mod submission;
mod voting;

pub use submission::*;
pub use voting::*;
