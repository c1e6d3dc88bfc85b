//! One generation of the region graph.
//!
//! - `entities`: the resource kinds and their association fields
//! - `arena`: typed handles into per-kind arenas
//! - `linker`: foreign-key joins and canonical ordering
//! - `registry`: identity string to entity
//! - `views`: connection table and load balancer tree
//! - `pricing`: on-demand cost lookup

pub mod arena;
pub mod entities;
pub mod generation;
pub mod linker;
pub mod loader;
pub mod pricing;
pub mod registry;
pub mod views;

pub use arena::{Arena, Ix};
pub use entities::*;
pub use generation::{Classic, Discovered, EntityRef, Generation};
pub use linker::link;
pub use loader::{keyed, Discovery, Loaded};
pub use pricing::{PriceRow, PriceTable};
pub use registry::Registry;
pub use views::{ConnectionRow, ConnectionTable, LoadBalancerTree};
