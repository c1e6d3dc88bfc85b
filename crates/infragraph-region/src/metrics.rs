//! Post-publish metrics pass.
//!
//! Each metrics-capable kind declares a static table of descriptors. Polling
//! an entity submits one throttled statistics call per descriptor; a
//! descriptor's processor writes its datapoint into the entity's stats cell.
//! Failures are logged and leave the cell as it was.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use infragraph_concurrent::{Submission, Throttle};
use infragraph_core::{Datapoint, Dimension, MetricQuery, MetricsSource, Statistic};
use infragraph_graph::*;

use crate::tracker::Tracker;

const AVERAGE: &[Statistic] = &[Statistic::Average];
const SUM: &[Statistic] = &[Statistic::Sum];
const SPREAD: &[Statistic] = &[Statistic::Minimum, Statistic::Average, Statistic::Maximum];

/// One metric of one kind.
pub struct MetricDescriptor<S> {
    pub name: &'static str,
    pub statistics: &'static [Statistic],
    pub unit: &'static str,
    /// Receives the datapoint and the period length in seconds.
    pub process: fn(&mut S, &Datapoint, f64),
}

/// Stats records stamped with their last successful poll.
pub trait Stamped: Clone + Default + Send + Sync + 'static {
    fn stamp(&mut self, at: chrono::DateTime<Utc>);
}

macro_rules! stamped {
    ($($ty:ty),*) => {
        $(impl Stamped for $ty {
            fn stamp(&mut self, at: chrono::DateTime<Utc>) {
                self.polled_at = Some(at);
            }
        })*
    };
}

stamped!(
    LoadBalancerStats,
    DatabaseStats,
    CacheStats,
    QueueStats,
    TopicStats,
    FunctionStats
);

/// A kind with monitoring statistics.
pub trait Measured: Entity + Send + Sync + 'static {
    type Stats: Stamped;

    const NAMESPACE: &'static str;
    const DIMENSION: &'static str;

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>];
    fn arena(g: &Generation) -> &Arena<Self>
    where
        Self: Sized;
    fn stats(&self) -> &StatsCell<Self::Stats>;

    fn dimension_value(&self) -> &str {
        self.key()
    }
}

fn per_second(point: &Datapoint, period: f64) -> Option<f64> {
    point.sum.map(|sum| sum / period)
}

fn seconds_to_ms(value: Option<f64>) -> f64 {
    value.map_or(0.0, |s| s * 1000.0)
}

fn spread(point: &Datapoint, scale: f64) -> Latency {
    Latency {
        min_ms: point.minimum.map_or(0.0, |v| v * scale),
        avg_ms: point.average.map_or(0.0, |v| v * scale),
        max_ms: point.maximum.map_or(0.0, |v| v * scale),
    }
}

static LOAD_BALANCER_METRICS: &[MetricDescriptor<LoadBalancerStats>] = &[
    MetricDescriptor {
        name: "UnHealthyHostCount",
        statistics: AVERAGE,
        unit: "",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.unhealthy_hosts_avg = v;
            }
        },
    },
    MetricDescriptor {
        name: "RequestCount",
        statistics: SUM,
        unit: "",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.requests_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "Latency",
        statistics: SPREAD,
        unit: "Seconds",
        process: |s, p, _| {
            s.latency = Latency {
                min_ms: seconds_to_ms(p.minimum),
                avg_ms: seconds_to_ms(p.average),
                max_ms: seconds_to_ms(p.maximum),
            };
        },
    },
    MetricDescriptor {
        name: "HTTPCode_Backend_2XX",
        statistics: SUM,
        unit: "",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.http_2xx_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "HTTPCode_Backend_3XX",
        statistics: SUM,
        unit: "",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.http_3xx_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "HTTPCode_Backend_4XX",
        statistics: SUM,
        unit: "",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.http_4xx_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "HTTPCode_Backend_5XX",
        statistics: SUM,
        unit: "",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.http_5xx_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "BackendConnectionErrors",
        statistics: AVERAGE,
        unit: "",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.backend_connection_errors_avg = v;
            }
        },
    },
    MetricDescriptor {
        name: "SurgeQueueLength",
        statistics: AVERAGE,
        unit: "",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.surge_queue_length_avg = v;
            }
        },
    },
    MetricDescriptor {
        name: "SpilloverCount",
        statistics: AVERAGE,
        unit: "",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.spillover_count_avg = v;
            }
        },
    },
];

static DATABASE_METRICS: &[MetricDescriptor<DatabaseStats>] = &[
    MetricDescriptor {
        name: "CPUUtilization",
        statistics: AVERAGE,
        unit: "Percent",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.cpu_utilization = v;
            }
        },
    },
    MetricDescriptor {
        name: "DatabaseConnections",
        statistics: AVERAGE,
        unit: "Count",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.database_connections = v.round() as i64;
            }
        },
    },
    MetricDescriptor {
        name: "FreeableMemory",
        statistics: AVERAGE,
        unit: "Bytes",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.freeable_memory = v as i64;
            }
        },
    },
    MetricDescriptor {
        name: "FreeStorageSpace",
        statistics: AVERAGE,
        unit: "Bytes",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.free_storage_space = v as i64;
            }
        },
    },
    MetricDescriptor {
        name: "ReadIOPS",
        statistics: AVERAGE,
        unit: "Count/Second",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.read_iops = v;
            }
        },
    },
    MetricDescriptor {
        name: "WriteIOPS",
        statistics: AVERAGE,
        unit: "Count/Second",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.write_iops = v;
            }
        },
    },
    MetricDescriptor {
        name: "ReadLatency",
        statistics: SPREAD,
        unit: "Seconds",
        process: |s, p, _| s.read_latency = spread(p, 1000.0),
    },
    MetricDescriptor {
        name: "WriteLatency",
        statistics: SPREAD,
        unit: "Seconds",
        process: |s, p, _| s.write_latency = spread(p, 1000.0),
    },
];

static CACHE_METRICS: &[MetricDescriptor<CacheStats>] = &[
    MetricDescriptor {
        name: "CPUUtilization",
        statistics: AVERAGE,
        unit: "Percent",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.cpu_utilization = v;
            }
        },
    },
    MetricDescriptor {
        name: "FreeableMemory",
        statistics: AVERAGE,
        unit: "Bytes",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.freeable_memory = v as i64;
            }
        },
    },
    MetricDescriptor {
        name: "CurrConnections",
        statistics: AVERAGE,
        unit: "Count",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.curr_connections = v.round() as i64;
            }
        },
    },
    MetricDescriptor {
        name: "Evictions",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.evictions_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "CacheHits",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.hits_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "CacheMisses",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.misses_per_second = v;
            }
        },
    },
];

static QUEUE_METRICS: &[MetricDescriptor<QueueStats>] = &[
    MetricDescriptor {
        name: "NumberOfMessagesSent",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.sent_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "SentMessageSize",
        statistics: AVERAGE,
        unit: "Bytes",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.message_size_avg_bytes = v as i64;
            }
        },
    },
    MetricDescriptor {
        name: "NumberOfMessagesReceived",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.received_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "NumberOfEmptyReceives",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.empty_receives_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "NumberOfMessagesDeleted",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.deleted_per_second = v;
            }
        },
    },
];

static TOPIC_METRICS: &[MetricDescriptor<TopicStats>] = &[
    MetricDescriptor {
        name: "NumberOfMessagesPublished",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.published_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "PublishSize",
        statistics: AVERAGE,
        unit: "Bytes",
        process: |s, p, _| {
            if let Some(v) = p.average {
                s.publish_size_avg_bytes = v as i64;
            }
        },
    },
    MetricDescriptor {
        name: "NumberOfNotificationsDelivered",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.delivered_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "NumberOfNotificationsFailed",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.failed_per_second = v;
            }
        },
    },
];

static FUNCTION_METRICS: &[MetricDescriptor<FunctionStats>] = &[
    MetricDescriptor {
        name: "Invocations",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.invocations_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "Errors",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.errors_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "Throttles",
        statistics: SUM,
        unit: "Count",
        process: |s, p, period| {
            if let Some(v) = per_second(p, period) {
                s.throttles_per_second = v;
            }
        },
    },
    MetricDescriptor {
        name: "Duration",
        statistics: SPREAD,
        unit: "Milliseconds",
        process: |s, p, _| s.duration = spread(p, 1.0),
    },
];

impl Measured for LoadBalancer {
    type Stats = LoadBalancerStats;
    const NAMESPACE: &'static str = "AWS/ELB";
    const DIMENSION: &'static str = "LoadBalancerName";

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>] {
        LOAD_BALANCER_METRICS
    }

    fn arena(g: &Generation) -> &Arena<Self> {
        &g.load_balancers
    }

    fn stats(&self) -> &StatsCell<Self::Stats> {
        &self.stats
    }
}

impl Measured for DatabaseInstance {
    type Stats = DatabaseStats;
    const NAMESPACE: &'static str = "AWS/RDS";
    const DIMENSION: &'static str = "DBInstanceIdentifier";

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>] {
        DATABASE_METRICS
    }

    fn arena(g: &Generation) -> &Arena<Self> {
        &g.database_instances
    }

    fn stats(&self) -> &StatsCell<Self::Stats> {
        &self.stats
    }
}

impl Measured for CacheCluster {
    type Stats = CacheStats;
    const NAMESPACE: &'static str = "AWS/ElastiCache";
    const DIMENSION: &'static str = "CacheClusterId";

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>] {
        CACHE_METRICS
    }

    fn arena(g: &Generation) -> &Arena<Self> {
        &g.cache_clusters
    }

    fn stats(&self) -> &StatsCell<Self::Stats> {
        &self.stats
    }
}

impl Measured for Queue {
    type Stats = QueueStats;
    const NAMESPACE: &'static str = "AWS/SQS";
    const DIMENSION: &'static str = "QueueName";

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>] {
        QUEUE_METRICS
    }

    fn arena(g: &Generation) -> &Arena<Self> {
        &g.queues
    }

    fn stats(&self) -> &StatsCell<Self::Stats> {
        &self.stats
    }

    fn dimension_value(&self) -> &str {
        self.name()
    }
}

impl Measured for Topic {
    type Stats = TopicStats;
    const NAMESPACE: &'static str = "AWS/SNS";
    const DIMENSION: &'static str = "TopicName";

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>] {
        TOPIC_METRICS
    }

    fn arena(g: &Generation) -> &Arena<Self> {
        &g.topics
    }

    fn stats(&self) -> &StatsCell<Self::Stats> {
        &self.stats
    }

    fn dimension_value(&self) -> &str {
        self.topic_name()
    }
}

impl Measured for Function {
    type Stats = FunctionStats;
    const NAMESPACE: &'static str = "AWS/Lambda";
    const DIMENSION: &'static str = "FunctionName";

    fn descriptors() -> &'static [MetricDescriptor<Self::Stats>] {
        FUNCTION_METRICS
    }

    fn arena(g: &Generation) -> &Arena<Self> {
        &g.functions
    }

    fn stats(&self) -> &StatsCell<Self::Stats> {
        &self.stats
    }
}

/// Copies the last stats of every entity whose key survived into `next`.
pub(crate) fn carry_stats<T: Measured>(previous: &Generation, next: &Generation) -> usize {
    let prior: HashMap<&str, &T> = T::arena(previous)
        .values()
        .map(|e| (e.key(), e))
        .collect();

    let mut carried = 0;
    for entity in T::arena(next).values() {
        let Some(old) = prior.get(entity.key()) else {
            continue;
        };
        let stats = old.stats().read().clone();
        if stats.is_some() {
            *entity.stats().write() = stats;
            carried += 1;
        }
    }
    carried
}

pub(crate) fn carry_all_stats(previous: &Generation, next: &Generation) -> usize {
    carry_stats::<LoadBalancer>(previous, next)
        + carry_stats::<DatabaseInstance>(previous, next)
        + carry_stats::<CacheCluster>(previous, next)
        + carry_stats::<Queue>(previous, next)
        + carry_stats::<Topic>(previous, next)
        + carry_stats::<Function>(previous, next)
}

/// Outcome of one metrics pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsReport {
    pub submitted: usize,
    pub failed: usize,
}

/// Shared handles every metric task needs.
#[derive(Clone)]
pub(crate) struct MetricsContext {
    pub generation: Arc<Generation>,
    pub throttle: Arc<Throttle>,
    pub source: Arc<dyn MetricsSource>,
    pub tracker: Arc<Tracker>,
    pub period_minutes: u32,
}

/// Submits one task per descriptor of `entity`.
fn poll_entity<T: Measured>(ctx: &MetricsContext, entity: Ix<T>) -> Vec<Submission<()>> {
    let label = format!("{} METRICS POLL", T::arena(&ctx.generation)[entity].name());
    let service = format!("metrics.{}", T::NAMESPACE);

    T::descriptors()
        .iter()
        .map(|descriptor| {
            let ctx = ctx.clone();
            let service = service.clone();
            ctx.throttle.clone().submit(label.clone(), async move {
                let target = &T::arena(&ctx.generation)[entity];
                let query = MetricQuery::trailing(
                    T::NAMESPACE,
                    descriptor.name,
                    Dimension::new(T::DIMENSION, target.dimension_value()),
                    descriptor.statistics,
                    descriptor.unit,
                    ctx.period_minutes,
                );
                ctx.tracker.record(&service);
                let Some(point) = ctx.source.statistics(&query).await? else {
                    return Ok(());
                };

                let period = f64::from(query.period_secs.max(1));
                let mut cell = target.stats().write();
                let stats = cell.get_or_insert_with(Default::default);
                (descriptor.process)(stats, &point, period);
                stats.stamp(Utc::now());
                Ok(())
            })
        })
        .collect()
}

fn poll_kind<T: Measured>(ctx: &MetricsContext, submissions: &mut Vec<Submission<()>>) {
    for entity in T::arena(&ctx.generation).ids() {
        submissions.extend(poll_entity::<T>(ctx, entity));
    }
}

/// Polls every metrics-capable entity of the generation and waits for all
/// calls to settle.
#[instrument(skip_all, fields(generation = ctx.generation.number))]
pub(crate) async fn poll_generation(ctx: MetricsContext) -> MetricsReport {
    let mut submissions = Vec::new();
    poll_kind::<LoadBalancer>(&ctx, &mut submissions);
    poll_kind::<DatabaseInstance>(&ctx, &mut submissions);
    poll_kind::<CacheCluster>(&ctx, &mut submissions);
    poll_kind::<Queue>(&ctx, &mut submissions);
    poll_kind::<Topic>(&ctx, &mut submissions);
    poll_kind::<Function>(&ctx, &mut submissions);

    let mut report = MetricsReport {
        submitted: submissions.len(),
        failed: 0,
    };
    for result in join_all(submissions).await {
        if let Err(e) = result {
            report.failed += 1;
            warn!("{e}");
        }
    }
    debug!(
        submitted = report.submitted,
        failed = report.failed,
        "metrics pass finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Datapoint {
        Datapoint {
            average: Some(2.5),
            sum: Some(1200.0),
            minimum: Some(0.125),
            maximum: Some(0.5),
            sample_count: None,
        }
    }

    fn apply<S: Stamped>(table: &[MetricDescriptor<S>], name: &str, stats: &mut S) {
        let descriptor = table.iter().find(|d| d.name == name).unwrap();
        (descriptor.process)(stats, &point(), 600.0);
    }

    #[test]
    fn load_balancer_processors_convert_units() {
        let mut stats = LoadBalancerStats::default();
        apply(LOAD_BALANCER_METRICS, "RequestCount", &mut stats);
        apply(LOAD_BALANCER_METRICS, "Latency", &mut stats);
        apply(LOAD_BALANCER_METRICS, "UnHealthyHostCount", &mut stats);

        assert_eq!(stats.requests_per_second, 2.0);
        assert_eq!(stats.latency.min_ms, 125.0);
        assert_eq!(stats.latency.avg_ms, 2500.0);
        assert_eq!(stats.latency.max_ms, 500.0);
        assert_eq!(stats.unhealthy_hosts_avg, 2.5);
    }

    #[test]
    fn sums_become_rates_over_the_period() {
        let mut queue = QueueStats::default();
        apply(QUEUE_METRICS, "NumberOfMessagesSent", &mut queue);
        apply(QUEUE_METRICS, "SentMessageSize", &mut queue);
        assert_eq!(queue.sent_per_second, 2.0);
        assert_eq!(queue.message_size_avg_bytes, 2);

        let mut function = FunctionStats::default();
        apply(FUNCTION_METRICS, "Duration", &mut function);
        assert_eq!(function.duration.max_ms, 0.5);

        let mut db = DatabaseStats::default();
        apply(DATABASE_METRICS, "DatabaseConnections", &mut db);
        apply(DATABASE_METRICS, "ReadLatency", &mut db);
        assert_eq!(db.database_connections, 3);
        assert_eq!(db.read_latency.avg_ms, 2500.0);
    }

    #[test]
    fn descriptor_tables_cover_every_kind() {
        assert_eq!(LoadBalancer::descriptors().len(), 10);
        assert_eq!(DatabaseInstance::descriptors().len(), 8);
        assert_eq!(CacheCluster::descriptors().len(), 6);
        assert_eq!(Queue::descriptors().len(), 5);
        assert_eq!(Topic::descriptors().len(), 4);
        assert_eq!(Function::descriptors().len(), 4);

        let topic = Topic {
            topic_arn: "arn:aws:sns:us-east-1:1:alerts".into(),
            display_name: "Pager".into(),
            ..Default::default()
        };
        assert_eq!(topic.dimension_value(), "alerts");
    }
}
