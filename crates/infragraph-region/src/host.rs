//! Instance host poll path.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use infragraph_concurrent::Throttle;
use infragraph_core::{HostConnector, InfraGraphError, Result};
use infragraph_graph::{Entity, Generation, Instance, Ix};

use crate::tracker::Tracker;

pub const NOT_RUNNING: &str = "Instance not running";
pub const NO_KEY: &str = "Key not specified";
pub const NO_REMOTE_ACCESS: &str = "Remote access not configured";
pub const NO_LOGIN: &str = "No usable login";

/// What one instance poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOutcome {
    /// An attached collector was polled.
    Polled,
    /// A new collector was attached.
    Connected,
    /// Already unreachable, or not running.
    Skipped,
    /// Marked unreachable by this poll.
    MarkedUnreachable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostReport {
    pub polled: usize,
    pub connected: usize,
    pub skipped: usize,
    pub unreachable: usize,
    pub failed: usize,
}

impl HostReport {
    fn record(&mut self, outcome: Result<HostOutcome>) {
        match outcome {
            Ok(HostOutcome::Polled) => self.polled += 1,
            Ok(HostOutcome::Connected) => self.connected += 1,
            Ok(HostOutcome::Skipped) => self.skipped += 1,
            Ok(HostOutcome::MarkedUnreachable) => self.unreachable += 1,
            Err(e) => {
                self.failed += 1;
                warn!("{e}");
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct HostContext {
    pub generation: Arc<Generation>,
    pub throttle: Arc<Throttle>,
    pub connector: Option<Arc<dyn HostConnector>>,
    pub tracker: Arc<Tracker>,
}

async fn poll_instance(ctx: HostContext, ix: Ix<Instance>) -> Result<HostOutcome> {
    let instance = &ctx.generation.instances[ix];
    let host = instance.host.clone();

    let collector = host.read().collector.clone();
    if let Some(collector) = collector {
        collector.poll().await.map_err(|e| match e {
            e @ InfraGraphError::Host(_) => e,
            other => InfraGraphError::Host(other.to_string()),
        })?;
        host.write().summary = collector.summary();
        return Ok(HostOutcome::Polled);
    }

    if host.read().unreachable {
        return Ok(HostOutcome::Skipped);
    }
    if !instance.is_running() {
        host.write().reason = Some(NOT_RUNNING.to_string());
        return Ok(HostOutcome::Skipped);
    }
    if instance.key_name.is_empty() {
        host.write().mark_unreachable(NO_KEY);
        return Ok(HostOutcome::MarkedUnreachable);
    }
    let Some(connector) = ctx.connector.as_ref() else {
        host.write().mark_unreachable(NO_REMOTE_ACCESS);
        return Ok(HostOutcome::MarkedUnreachable);
    };

    ctx.tracker.record("hosts.connect");
    match connector.connect(&instance.host_target()).await {
        Ok(Some(collector)) => {
            let mut observation = host.write();
            observation.collector = Some(collector);
            observation.reason = None;
            Ok(HostOutcome::Connected)
        }
        Ok(None) => {
            host.write().mark_unreachable(NO_LOGIN);
            Ok(HostOutcome::MarkedUnreachable)
        }
        Err(e) => {
            host.write().mark_unreachable(e.to_string());
            Ok(HostOutcome::MarkedUnreachable)
        }
    }
}

/// Polls every instance of the generation once, each through the throttle.
#[instrument(skip_all, fields(generation = ctx.generation.number))]
pub(crate) async fn poll_instances(ctx: HostContext) -> HostReport {
    let submissions: Vec<_> = ctx
        .generation
        .instances
        .iter()
        .map(|(ix, instance)| {
            let label = format!("{} POLL", instance.name());
            ctx.throttle.submit(label, poll_instance(ctx.clone(), ix))
        })
        .collect();

    let mut report = HostReport::default();
    for outcome in join_all(submissions).await {
        report.record(outcome);
    }
    debug!(?report, "host poll finished");
    report
}
