use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument};

use infragraph_concurrent::{Submission, Throttle};
use infragraph_core::{Filter, RefreshConfig, ResourceKind, Result, Settings};
use infragraph_graph::{link, Discovered, Generation, PriceTable};

use crate::capabilities::Capabilities;
use crate::host::{poll_instances, HostContext, HostReport};
use crate::metrics::{carry_all_stats, poll_generation, MetricsContext, MetricsReport};
use crate::tracker::Tracker;

/// Writes one loader's output into the cycle's `Discovered`.
type Apply = Box<dyn FnOnce(&mut Discovered) + Send>;

/// What one successful refresh produced.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub generation: u64,
    pub counts: Vec<(ResourceKind, usize)>,
    #[serde(with = "millis")]
    pub load: Duration,
    #[serde(with = "millis")]
    pub link: Duration,
    /// Entities whose live observations came over from the previous generation.
    pub carried: usize,
    #[serde(skip)]
    pub metrics: Option<MetricsReport>,
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

/// Root of one region's discovered state.
///
/// The published generation sits behind a single lock. Only publish takes
/// the write side; the lock, the throttle and the price table are kept for
/// the region's whole life.
pub struct Region {
    name: String,
    current: RwLock<Arc<Generation>>,
    throttle: Arc<Throttle>,
    prices: Arc<PriceTable>,
    caps: Capabilities,
    refresh: RefreshConfig,
    tracker: Arc<Tracker>,
    generations: AtomicU64,
}

impl Region {
    /// Must be called inside a tokio runtime (the throttle spawns its ticker).
    pub fn new(settings: &Settings, caps: Capabilities) -> Self {
        Self::with_throttle(settings, caps, Throttle::from_config(&settings.throttle))
    }

    pub fn with_throttle(settings: &Settings, caps: Capabilities, throttle: Arc<Throttle>) -> Self {
        Self {
            name: settings.region.name.clone(),
            current: RwLock::new(Arc::new(Generation::default())),
            throttle,
            prices: Arc::new(PriceTable::default()),
            caps,
            refresh: settings.refresh.clone(),
            tracker: Arc::new(Tracker::new()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = Arc::new(prices);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The currently published generation.
    pub fn generation(&self) -> Arc<Generation> {
        self.current.read().clone()
    }

    /// Runs `f` while holding the read side of the region lock.
    pub fn read<R>(&self, f: impl FnOnce(&Generation) -> R) -> R {
        let current = self.current.read();
        f(&current)
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Loads every kind, links them and publishes the result.
    ///
    /// The first loader error aborts the cycle and is returned; the published
    /// generation is then left exactly as it was. Concurrent calls are not
    /// serialized: the last one to publish wins.
    #[instrument(skip(self), fields(region = %self.name))]
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let started = Instant::now();
        let applies = try_join_all(self.submit_loaders()).await?;
        let load = started.elapsed();

        let mut discovered = Discovered::default();
        for apply in applies {
            apply(&mut discovered);
        }

        let number = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let next = link(discovered, number)?;
        let link_time = started.elapsed();

        let (next, carried) = self.publish(next);
        let report = RefreshReport {
            generation: number,
            counts: next.counts(),
            load,
            link: link_time,
            carried,
            metrics: None,
        };
        info!(
            generation = number,
            entities = next.entity_count(),
            load_ms = load.as_millis() as u64,
            link_ms = link_time.as_millis() as u64,
            carried,
            "published generation"
        );
        for (kind, count) in &report.counts {
            debug!(%kind, count, "loaded");
        }
        debug!(calls = ?self.tracker.snapshot(), "api calls");

        let metrics = if self.refresh.poll_metrics {
            Some(self.poll_metrics_of(next).await)
        } else {
            None
        };
        Ok(RefreshReport { metrics, ..report })
    }

    /// One metrics pass over the published generation.
    pub async fn poll_metrics(&self) -> MetricsReport {
        self.poll_metrics_of(self.generation()).await
    }

    /// One host poll over the published generation's instances.
    pub async fn poll_instances(&self) -> HostReport {
        poll_instances(HostContext {
            generation: self.generation(),
            throttle: self.throttle.clone(),
            connector: self.caps.hosts.clone(),
            tracker: self.tracker.clone(),
        })
        .await
    }

    async fn poll_metrics_of(&self, generation: Arc<Generation>) -> MetricsReport {
        poll_generation(MetricsContext {
            generation,
            throttle: self.throttle.clone(),
            source: self.caps.metrics.clone(),
            tracker: self.tracker.clone(),
            period_minutes: self.refresh.metrics_period_minutes,
        })
        .await
    }

    /// Swaps in `next` under the write lock after carrying live observations
    /// over from the generation it replaces.
    fn publish(&self, mut next: Generation) -> (Arc<Generation>, usize) {
        let mut current = self.current.write();
        let mut carried = 0;
        for instance in next.instances.values_mut() {
            if let Some(old) = current.instance_by_id(&instance.instance_id) {
                let observation = current.instances[old].host.read().clone();
                *instance.host.write() = observation;
                carried += 1;
            }
        }
        carried += carry_all_stats(&current, &next);

        let next = Arc::new(next);
        *current = next.clone();
        (next, carried)
    }

    fn submit_loaders(&self) -> Vec<Submission<Apply>> {
        let mut submissions = Vec::with_capacity(ResourceKind::ALL.len());
        let (caps, throttle, tracker) = (&self.caps, &self.throttle, &self.tracker);

        macro_rules! load {
            ($method:ident => $field:ident, $kind:ident) => {{
                let discovery = caps.discovery.clone();
                let tracker = tracker.clone();
                let kind = ResourceKind::$kind;
                submissions.push(throttle.submit(kind.to_string(), async move {
                    tracker.record(&format!("discovery.{}", kind.slug()));
                    let loaded = discovery.$method(None).await?;
                    Ok(Box::new(move |d: &mut Discovered| d.$field = loaded) as Apply)
                }));
            }};
        }

        load!(load_vpcs => vpcs, Vpc);
        load!(load_subnets => subnets, Subnet);
        load!(load_security_groups => security_groups, SecurityGroup);
        load!(load_network_acls => network_acls, NetworkAcl);
        load!(load_route_tables => route_tables, RouteTable);
        load!(load_load_balancers => load_balancers, LoadBalancer);
        load!(load_availability_zones => availability_zones, AvailabilityZone);
        load!(load_internet_gateways => internet_gateways, InternetGateway);
        load!(load_customer_gateways => customer_gateways, CustomerGateway);
        load!(load_vpn_gateways => vpn_gateways, VpnGateway);
        load!(load_vpn_connections => vpn_connections, VpnConnection);
        load!(load_vpc_endpoints => vpc_endpoints, VpcEndpoint);
        load!(load_peering_connections => peering_connections, PeeringConnection);
        load!(load_auto_scaling_groups => auto_scaling_groups, AutoScalingGroup);
        load!(load_database_instances => database_instances, DatabaseInstance);
        load!(load_cache_clusters => cache_clusters, CacheCluster);
        load!(load_queues => queues, Queue);
        load!(load_topics => topics, Topic);
        load!(load_subscriptions => subscriptions, Subscription);
        load!(load_alarms => alarms, Alarm);
        load!(load_functions => functions, Function);
        load!(load_network_interfaces => network_interfaces, NetworkInterface);
        load!(load_nat_gateways => nat_gateways, NatGateway);

        // Images are narrowed to the ones running instances were launched from.
        let discovery = caps.discovery.clone();
        let tracker = tracker.clone();
        submissions.push(throttle.submit(
            ResourceKind::Instance.to_string(),
            async move {
                tracker.record("discovery.instances");
                let instances = discovery.load_instances(None).await?;
                let image_ids: BTreeSet<&str> = instances
                    .values()
                    .map(|i| i.image_id.as_str())
                    .filter(|id| !id.is_empty())
                    .collect();
                let images = if image_ids.is_empty() {
                    Default::default()
                } else {
                    tracker.record("discovery.images");
                    let filter = Filter::by_ids(image_ids);
                    discovery.load_images(Some(&filter)).await?
                };
                Ok(Box::new(move |d: &mut Discovered| {
                    d.instances = instances;
                    d.images = images;
                }) as Apply)
            },
        ));

        submissions
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("generation", &self.current.read().number)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}
