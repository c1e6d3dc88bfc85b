use std::fmt;
use std::sync::Arc;

use infragraph_core::{HostConnector, MetricsSource, NullMetrics};
use infragraph_graph::Discovery;

/// External services a region talks to. Passed in explicitly so tests and
/// offline runs can substitute their own.
#[derive(Clone)]
pub struct Capabilities {
    pub discovery: Arc<dyn Discovery>,
    pub metrics: Arc<dyn MetricsSource>,
    /// Absent when remote host access is not configured.
    pub hosts: Option<Arc<dyn HostConnector>>,
}

impl Capabilities {
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self {
            discovery,
            metrics: Arc::new(NullMetrics),
            hosts: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_hosts(mut self, hosts: Arc<dyn HostConnector>) -> Self {
        self.hosts = Some(hosts);
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("hosts", &self.hosts.is_some())
            .finish_non_exhaustive()
    }
}
