use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use infragraph_region::*;

fn write(dir: &Path, kind: ResourceKind, value: Value) {
    std::fs::write(dir.join(format!("{}.json", kind.slug())), value.to_string()).unwrap();
}

/// VPC1 with one subnet, one instance in one group, one database and one
/// load balancer.
fn fixtures() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    write(
        path,
        ResourceKind::Vpc,
        json!([{ "vpc_id": "vpc-1", "cidr_block": "10.0.0.0/16",
                 "tags": [{ "key": "Name", "value": "VPC1" }] }]),
    );
    write(
        path,
        ResourceKind::Subnet,
        json!([{ "subnet_id": "subnet-1", "vpc_id": "vpc-1",
                 "availability_zone": "us-east-1a", "cidr_block": "10.0.1.0/24" }]),
    );
    write(
        path,
        ResourceKind::AvailabilityZone,
        json!([{ "zone_name": "us-east-1a" }]),
    );
    write(
        path,
        ResourceKind::Instance,
        json!([
            { "instance_id": "i-1", "image_id": "ami-1", "state": "running",
              "vpc_id": "vpc-1", "subnet_id": "subnet-1", "key_name": "ops",
              "placement": { "availability_zone": "us-east-1a", "tenancy": "default" },
              "security_group_ids": ["sg-1"],
              "tags": [{ "key": "Name", "value": "Instance1" }] }
        ]),
    );
    write(
        path,
        ResourceKind::SecurityGroup,
        json!([{ "group_id": "sg-1", "group_name": "SecurityGroup1", "vpc_id": "vpc-1" }]),
    );
    write(
        path,
        ResourceKind::Image,
        json!([{ "image_id": "ami-1" }, { "image_id": "ami-unused" }]),
    );
    write(
        path,
        ResourceKind::DatabaseInstance,
        json!([{ "db_instance_identifier": "orders", "engine": "postgres",
                 "subnet_group_vpc_id": "vpc-1" }]),
    );
    write(
        path,
        ResourceKind::LoadBalancer,
        json!([{ "load_balancer_name": "web", "vpc_id": "vpc-1",
                 "instance_ids": ["i-1"], "subnet_ids": ["subnet-1"] }]),
    );
    dir
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.refresh.poll_metrics = false;
    settings
}

fn region(dir: &TempDir) -> (Region, Arc<SnapshotDiscovery>) {
    let discovery = Arc::new(SnapshotDiscovery::new(dir.path()));
    let region = Region::new(&settings(), Capabilities::new(discovery.clone()));
    (region, discovery)
}

fn instance(g: &Generation, id: &str) -> Ix<Instance> {
    g.instance_by_id(id).unwrap()
}

#[tokio::test]
async fn refresh_links_and_publishes_the_scenario() {
    let dir = fixtures();
    let (region, _) = region(&dir);
    assert_eq!(region.generation().number, 0);

    let report = region.refresh().await.unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(report.carried, 0);

    let g = region.generation();
    let vpc = g.vpcs.ids().next().unwrap();
    let subnet = g.subnets.ids().next().unwrap();
    let group = g.security_groups.ids().next().unwrap();
    let i1 = instance(&g, "i-1");

    assert_eq!(g.vpcs[vpc].links.subnets, [subnet]);
    assert_eq!(g.subnets[subnet].links.instances, [i1]);
    assert_eq!(g.instances[i1].links.vpc, Some(vpc));
    assert_eq!(g.instances[i1].links.security_groups, [group]);
    assert_eq!(g.security_groups[group].links.instances, [i1]);

    // only the image in use is loaded
    assert_eq!(g.images.len(), 1);
    assert_eq!(g.images.values().next().unwrap().image_id, "ami-1");
    assert_eq!(region.tracker().count("discovery.images"), 1);
    assert_eq!(region.tracker().count("discovery.database_instances"), 1);
}

#[tokio::test]
async fn every_entity_resolves_through_the_registry() {
    let dir = fixtures();
    let (region, _) = region(&dir);
    region.refresh().await.unwrap();

    region.read(|g| {
        assert_eq!(g.registry.len(), g.entity_count());
        for (ix, e) in g.instances.iter() {
            assert_eq!(g.lookup(&e.identity()), Some(EntityRef::Instance(ix)));
        }
        for (ix, e) in g.database_instances.iter() {
            assert_eq!(g.lookup(&e.identity()), Some(EntityRef::DatabaseInstance(ix)));
        }
        for (ix, e) in g.load_balancers.iter() {
            assert_eq!(g.lookup(&e.identity()), Some(EntityRef::LoadBalancer(ix)));
        }
        assert_eq!(g.name_of(g.require("vpc:vpc-1").unwrap()), "VPC1");
        assert!(g.lookup("rds:missing").is_none());
    });
}

#[tokio::test]
async fn loader_failure_keeps_the_published_generation() {
    let dir = fixtures();
    let (region, discovery) = region(&dir);
    region.refresh().await.unwrap();
    let before = region.generation();

    discovery.fail_on(ResourceKind::DatabaseInstance);
    let err = region.refresh().await.unwrap_err();

    assert!(err.to_string().starts_with("DatabaseInstance error:"));
    assert!(matches!(
        err.root(),
        InfraGraphError::Discovery {
            kind: ResourceKind::DatabaseInstance,
            ..
        }
    ));
    let after = region.generation();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.database_instances.len(), 1);

    discovery.recover(ResourceKind::DatabaseInstance);
    let report = region.refresh().await.unwrap();
    assert_eq!(report.generation, 2);
    assert!(!Arc::ptr_eq(&before, &region.generation()));
}

#[tokio::test]
async fn failure_on_the_first_cycle_publishes_nothing() {
    let dir = fixtures();
    let (region, discovery) = region(&dir);
    discovery.fail_on(ResourceKind::Vpc);

    assert!(region.refresh().await.is_err());
    let g = region.generation();
    assert_eq!(g.number, 0);
    assert_eq!(g.entity_count(), 0);
}

#[tokio::test]
async fn live_observations_survive_a_refresh() {
    let dir = fixtures();
    let (region, _) = region(&dir);
    region.refresh().await.unwrap();

    let summary = HostSummary {
        cpu_percent_used: 42.0,
        memory_total: 8 << 30,
        ..Default::default()
    };
    {
        let g = region.generation();
        let mut host = g.instances[instance(&g, "i-1")].host.write();
        host.mark_unreachable("connection refused");
        host.summary = Some(summary.clone());

        let db = g.database_instances.values().next().unwrap();
        *db.stats.write() = Some(DatabaseStats {
            cpu_utilization: 12.5,
            ..Default::default()
        });
    }

    let before = region.generation();
    let report = region.refresh().await.unwrap();
    assert_eq!(report.carried, 2);

    let g = region.generation();
    let host = g.instances[instance(&g, "i-1")].host.read().clone();
    assert!(host.unreachable);
    assert_eq!(host.reason.as_deref(), Some("connection refused"));
    assert_eq!(host.summary, Some(summary.clone()));

    let db = g.database_instances.values().next().unwrap();
    assert_eq!(db.stats.read().as_ref().unwrap().cpu_utilization, 12.5);
    assert!(g.load_balancers.values().next().unwrap().stats.read().is_none());

    // the new generation owns its copy; the replaced one is left untouched
    g.instances[instance(&g, "i-1")].host.write().summary = None;
    let old = before.instances[instance(&before, "i-1")].host.read().clone();
    assert_eq!(old.summary, Some(summary));
}

struct FixedMetrics {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn statistics(&self, query: &MetricQuery) -> Result<Option<Datapoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(InfraGraphError::Metrics(format!("{} throttled", query.metric_name)));
        }
        assert_eq!(query.dimension.name, "LoadBalancerName");
        assert_eq!(query.dimension.value, "web");
        Ok(Some(Datapoint {
            sum: Some(1200.0),
            average: Some(1.5),
            minimum: Some(0.125),
            maximum: Some(0.25),
            sample_count: None,
        }))
    }
}

fn metrics_region(dir: &TempDir, fail: bool) -> (Region, Arc<FixedMetrics>) {
    std::fs::remove_file(dir.path().join("database_instances.json")).unwrap();
    let metrics = Arc::new(FixedMetrics {
        fail,
        calls: AtomicUsize::new(0),
    });
    let caps = Capabilities::new(Arc::new(SnapshotDiscovery::new(dir.path())))
        .with_metrics(metrics.clone());
    (Region::new(&settings(), caps), metrics)
}

#[tokio::test]
async fn metrics_pass_fills_stats_cells() {
    let dir = fixtures();
    let (region, metrics) = metrics_region(&dir, false);
    region.refresh().await.unwrap();

    let report = region.poll_metrics().await;
    assert_eq!(report, MetricsReport { submitted: 10, failed: 0 });
    assert_eq!(metrics.calls.load(Ordering::SeqCst), 10);
    assert_eq!(region.tracker().count("metrics.AWS/ELB"), 10);

    let g = region.generation();
    let stats = g.load_balancers.values().next().unwrap().stats.read().clone().unwrap();
    assert_eq!(stats.requests_per_second, 2.0);
    assert_eq!(stats.latency.min_ms, 125.0);
    assert_eq!(stats.latency.max_ms, 250.0);
    assert_eq!(stats.unhealthy_hosts_avg, 1.5);
    assert!(stats.polled_at.is_some());
}

#[tokio::test]
async fn metrics_failures_are_logged_and_leave_the_generation_alone() {
    let dir = fixtures();
    let (region, _) = metrics_region(&dir, true);
    region.refresh().await.unwrap();
    let before = region.generation();

    let report = region.poll_metrics().await;
    assert_eq!(report.failed, report.submitted);
    assert!(Arc::ptr_eq(&before, &region.generation()));
    assert!(before.load_balancers.values().next().unwrap().stats.read().is_none());
}

#[tokio::test]
async fn refresh_runs_the_metrics_pass_when_enabled() {
    let dir = fixtures();
    std::fs::remove_file(dir.path().join("database_instances.json")).unwrap();
    let mut settings = settings();
    settings.refresh.poll_metrics = true;
    let caps = Capabilities::new(Arc::new(SnapshotDiscovery::new(dir.path()))).with_metrics(
        Arc::new(FixedMetrics {
            fail: false,
            calls: AtomicUsize::new(0),
        }),
    );
    let region = Region::new(&settings, caps);

    let report = region.refresh().await.unwrap();
    assert_eq!(report.metrics, Some(MetricsReport { submitted: 10, failed: 0 }));
}

#[derive(Default)]
struct CountingCollector {
    polls: AtomicUsize,
}

#[async_trait]
impl HostCollector for CountingCollector {
    async fn poll(&self) -> Result<()> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn summary(&self) -> Option<HostSummary> {
        Some(HostSummary {
            processes: self.polls.load(Ordering::SeqCst) as u64,
            ..Default::default()
        })
    }
}

struct Connector;

#[async_trait]
impl HostConnector for Connector {
    async fn connect(&self, target: &HostTarget) -> Result<Option<Arc<dyn HostCollector>>> {
        if target.key_name == "lost" {
            return Ok(None);
        }
        Ok(Some(Arc::new(CountingCollector::default())))
    }
}

fn host_fixtures() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ResourceKind::Instance,
        json!([
            { "instance_id": "i-ok", "state": "running", "key_name": "ops" },
            { "instance_id": "i-nokey", "state": "running" },
            { "instance_id": "i-stopped", "state": "stopped", "key_name": "ops" },
            { "instance_id": "i-lost", "state": "running", "key_name": "lost" }
        ]),
    );
    dir
}

fn observation(region: &Region, id: &str) -> HostObservation {
    region.read(|g| g.instances[instance(g, id)].host.read().clone())
}

#[tokio::test]
async fn host_poll_attaches_collectors_and_records_reasons() {
    let dir = host_fixtures();
    let caps = Capabilities::new(Arc::new(SnapshotDiscovery::new(dir.path())))
        .with_hosts(Arc::new(Connector));
    let region = Region::new(&settings(), caps);
    region.refresh().await.unwrap();

    let report = region.poll_instances().await;
    assert_eq!(report.connected, 1);
    assert_eq!(report.unreachable, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(region.tracker().count("hosts.connect"), 2);

    let stopped = observation(&region, "i-stopped");
    assert!(!stopped.unreachable);
    assert_eq!(stopped.reason.as_deref(), Some(host::NOT_RUNNING));
    assert_eq!(observation(&region, "i-nokey").reason.as_deref(), Some(host::NO_KEY));
    assert_eq!(observation(&region, "i-lost").reason.as_deref(), Some(host::NO_LOGIN));

    // second pass polls the attached collector; unreachable hosts are skipped
    let report = region.poll_instances().await;
    assert_eq!(report.polled, 1);
    assert_eq!(report.skipped, 3);
    let ok = observation(&region, "i-ok");
    assert!(ok.collector.is_some());
    assert_eq!(ok.summary.map(|s| s.processes), Some(1));

    // the collector carries over into the next generation
    region.refresh().await.unwrap();
    assert_eq!(region.poll_instances().await.polled, 1);
    assert_eq!(observation(&region, "i-ok").summary.map(|s| s.processes), Some(2));
}

#[tokio::test]
async fn host_poll_without_remote_access() {
    let dir = host_fixtures();
    let (region, _) = region(&dir);
    region.refresh().await.unwrap();

    let report = region.poll_instances().await;
    assert_eq!(report.unreachable, 3);
    assert_eq!(
        observation(&region, "i-ok").reason.as_deref(),
        Some(host::NO_REMOTE_ACCESS)
    );
    assert_eq!(region.tracker().count("hosts.connect"), 0);
}
