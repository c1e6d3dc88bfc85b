//! A region: its published graph, the refresh cycle that replaces it, and
//! the pollers that enrich it afterwards.

pub mod capabilities;
pub mod host;
pub mod metrics;
pub mod region;
pub mod snapshot;
pub mod tracker;

pub use capabilities::Capabilities;
pub use host::{HostOutcome, HostReport};
pub use metrics::{Measured, MetricDescriptor, MetricsReport, Stamped};
pub use region::{Region, RefreshReport};
pub use snapshot::SnapshotDiscovery;
pub use tracker::Tracker;

pub use infragraph_concurrent::Throttle;
pub use infragraph_core::*;
pub use infragraph_graph::*;
