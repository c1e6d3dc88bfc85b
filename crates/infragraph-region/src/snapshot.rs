use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::debug;

use infragraph_core::{Filter, InfraGraphError, ResourceKind};
use infragraph_graph::*;

/// Discovery backed by JSON fixture files, one array per kind named
/// `<kind>.json` (e.g. `security_groups.json`). A missing file is an empty
/// kind.
///
/// Individual kinds can be made to fail, which is how refresh failure paths
/// are exercised.
#[derive(Debug)]
pub struct SnapshotDiscovery {
    dir: PathBuf,
    failing: Mutex<HashSet<ResourceKind>>,
}

impl SnapshotDiscovery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: ResourceKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.slug()))
    }

    /// Every later load of `kind` fails until `recover` is called.
    pub fn fail_on(&self, kind: ResourceKind) {
        self.failing.lock().insert(kind);
    }

    pub fn recover(&self, kind: ResourceKind) {
        self.failing.lock().remove(&kind);
    }

    async fn read<T>(&self, kind: ResourceKind, filter: Option<&Filter>) -> Loaded<T>
    where
        T: Entity + DeserializeOwned,
    {
        if self.failing.lock().contains(&kind) {
            return Err(InfraGraphError::discovery(kind, "network error"));
        }

        let path = self.path_for(kind);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%kind, path = %path.display(), "no snapshot file");
                return Ok(Default::default());
            }
            Err(e) => return Err(InfraGraphError::discovery(kind, e)),
        };
        let entities: Vec<T> = serde_json::from_str(&raw)
            .map_err(|e| InfraGraphError::discovery(kind, format!("{}: {e}", path.display())))?;

        Ok(keyed(entities, filter))
    }
}

macro_rules! snapshot_loaders {
    ($($method:ident => $ty:ty, $kind:ident;)*) => {
        #[async_trait]
        impl Discovery for SnapshotDiscovery {
            $(
                async fn $method(&self, filter: Option<&Filter>) -> Loaded<$ty> {
                    self.read(ResourceKind::$kind, filter).await
                }
            )*
        }
    };
}

snapshot_loaders! {
    load_vpcs => Vpc, Vpc;
    load_subnets => Subnet, Subnet;
    load_instances => Instance, Instance;
    load_security_groups => SecurityGroup, SecurityGroup;
    load_network_acls => NetworkAcl, NetworkAcl;
    load_route_tables => RouteTable, RouteTable;
    load_load_balancers => LoadBalancer, LoadBalancer;
    load_availability_zones => AvailabilityZone, AvailabilityZone;
    load_internet_gateways => InternetGateway, InternetGateway;
    load_customer_gateways => CustomerGateway, CustomerGateway;
    load_vpn_gateways => VpnGateway, VpnGateway;
    load_vpn_connections => VpnConnection, VpnConnection;
    load_vpc_endpoints => VpcEndpoint, VpcEndpoint;
    load_peering_connections => PeeringConnection, PeeringConnection;
    load_auto_scaling_groups => AutoScalingGroup, AutoScalingGroup;
    load_images => Image, Image;
    load_database_instances => DatabaseInstance, DatabaseInstance;
    load_cache_clusters => CacheCluster, CacheCluster;
    load_queues => Queue, Queue;
    load_topics => Topic, Topic;
    load_subscriptions => Subscription, Subscription;
    load_alarms => Alarm, Alarm;
    load_functions => Function, Function;
    load_network_interfaces => NetworkInterface, NetworkInterface;
    load_nat_gateways => NatGateway, NatGateway;
}
