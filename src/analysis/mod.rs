//! Analysis modules.
//!
//! `aggregator` works on participant records; `stats` holds the plain
//! numeric helpers it is built on.

pub mod aggregator;
pub mod stats;

pub use aggregator::*;
pub use stats::*;
