//! Concurrency primitives for InfraGraph
//!
//! - `throttle`: bounded concurrency plus a per-interval call budget shared by
//!   every loader and poller of a region

pub mod throttle;

pub use throttle::{Submission, Throttle};
