//! Discovery capability: one loader per resource kind.
//!
//! A loader returns freshly built entities keyed by provider id, paginating
//! to exhaustion internally. Loaders never see or mutate a previous
//! generation and may run concurrently with one another.

use std::collections::HashMap;

use async_trait::async_trait;

use infragraph_core::{Filter, Result};

use crate::entities::*;

pub type Loaded<T> = Result<HashMap<String, T>>;

#[async_trait]
pub trait Discovery: Send + Sync {
    async fn load_vpcs(&self, filter: Option<&Filter>) -> Loaded<Vpc>;
    async fn load_subnets(&self, filter: Option<&Filter>) -> Loaded<Subnet>;
    async fn load_instances(&self, filter: Option<&Filter>) -> Loaded<Instance>;
    async fn load_security_groups(&self, filter: Option<&Filter>) -> Loaded<SecurityGroup>;
    async fn load_network_acls(&self, filter: Option<&Filter>) -> Loaded<NetworkAcl>;
    async fn load_route_tables(&self, filter: Option<&Filter>) -> Loaded<RouteTable>;
    async fn load_load_balancers(&self, filter: Option<&Filter>) -> Loaded<LoadBalancer>;
    async fn load_availability_zones(&self, filter: Option<&Filter>)
        -> Loaded<AvailabilityZone>;
    async fn load_internet_gateways(&self, filter: Option<&Filter>) -> Loaded<InternetGateway>;
    async fn load_customer_gateways(&self, filter: Option<&Filter>) -> Loaded<CustomerGateway>;
    async fn load_vpn_gateways(&self, filter: Option<&Filter>) -> Loaded<VpnGateway>;
    async fn load_vpn_connections(&self, filter: Option<&Filter>) -> Loaded<VpnConnection>;
    async fn load_vpc_endpoints(&self, filter: Option<&Filter>) -> Loaded<VpcEndpoint>;
    async fn load_peering_connections(&self, filter: Option<&Filter>)
        -> Loaded<PeeringConnection>;
    async fn load_auto_scaling_groups(&self, filter: Option<&Filter>)
        -> Loaded<AutoScalingGroup>;
    /// Called with the image ids referenced by the cycle's instances.
    async fn load_images(&self, filter: Option<&Filter>) -> Loaded<Image>;
    async fn load_database_instances(&self, filter: Option<&Filter>)
        -> Loaded<DatabaseInstance>;
    async fn load_cache_clusters(&self, filter: Option<&Filter>) -> Loaded<CacheCluster>;
    async fn load_queues(&self, filter: Option<&Filter>) -> Loaded<Queue>;
    async fn load_topics(&self, filter: Option<&Filter>) -> Loaded<Topic>;
    async fn load_subscriptions(&self, filter: Option<&Filter>) -> Loaded<Subscription>;
    async fn load_alarms(&self, filter: Option<&Filter>) -> Loaded<Alarm>;
    async fn load_functions(&self, filter: Option<&Filter>) -> Loaded<Function>;
    async fn load_network_interfaces(&self, filter: Option<&Filter>)
        -> Loaded<NetworkInterface>;
    async fn load_nat_gateways(&self, filter: Option<&Filter>) -> Loaded<NatGateway>;
}

/// Keys entities by their provider key, keeping only those the filter admits.
pub fn keyed<T, I>(entities: I, filter: Option<&Filter>) -> HashMap<String, T>
where
    T: Entity,
    I: IntoIterator<Item = T>,
{
    entities
        .into_iter()
        .filter(|e| filter.map_or(true, |f| f.matches(e.key(), e.tags())))
        .map(|e| (e.key().to_string(), e))
        .collect()
}
