//! Date windows and cap-aware partitioning
//!
//! This module contains:
//! - [`DateWindow`], the inclusive date interval scoping one search query
//! - [`TopLevelWindows`], fixed-size steps across the harvested range
//! - [`partition`], which splits a window until every piece fits the result cap

mod date_window;
mod partition;

pub use date_window::{DateWindow, TopLevelWindows};
pub use partition::{partition, CountOracle, LeafWindow};
