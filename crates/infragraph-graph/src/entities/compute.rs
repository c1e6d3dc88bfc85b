use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use infragraph_core::{name_tag, HostTarget, ResourceKind, Tag};

use super::{
    Alarm, AvailabilityZone, CacheCluster, DatabaseInstance, Entity,
    FunctionStats, HostObservation, LoadBalancerStats, NetworkInterface, Shared, StatsCell,
    Subnet, Vpc, ZoneView,
};
use crate::arena::{canonicalize, Ix};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub availability_zone: String,
    /// `default`, `dedicated` or `host`
    pub tenancy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub instance_id: String,
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub placement: Placement,
    pub platform: Option<String>,
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
    pub security_group_ids: Vec<String>,
    #[serde(default = "source_dest_check_default")]
    pub source_dest_check: bool,
    pub state: String,
    pub subnet_id: Option<String>,
    pub vpc_id: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
    /// Reachability and host metrics; carried across generations.
    #[serde(skip)]
    pub host: Shared<HostObservation>,
    #[serde(skip)]
    pub links: InstanceLinks,
}

fn source_dest_check_default() -> bool {
    true
}

tagged_entity!(Instance, ResourceKind::Instance, instance_id);

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    pub fn is_windows(&self) -> bool {
        self.platform
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("windows"))
    }

    pub fn unreachable(&self) -> bool {
        self.host.read().unreachable
    }

    pub fn host_target(&self) -> HostTarget {
        HostTarget {
            instance_id: self.instance_id.clone(),
            key_name: self.key_name.clone(),
            private_ip: self.private_ip_address.clone(),
            public_ip: self.public_ip_address.clone(),
            platform: self.platform.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceLinks {
    pub vpc: Option<Ix<Vpc>>,
    /// Set when the instance has no VPC and lives in the Classic bucket
    pub classic: bool,
    pub zone: Option<Ix<AvailabilityZone>>,
    pub zone_view: Option<Ix<ZoneView>>,
    pub subnet: Option<Ix<Subnet>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub image: Option<Ix<Image>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    pub auto_scaling_group: Option<Ix<AutoScalingGroup>>,
    pub network_interfaces: Vec<Ix<NetworkInterface>>,
    /// Subnets whose routes send traffic through this instance
    pub nat_for_subnets: Vec<Ix<Subnet>>,
    pub alarms: Vec<Ix<Alarm>>,
}

impl InstanceLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.network_interfaces);
        canonicalize(&mut self.nat_for_subnets);
        canonicalize(&mut self.alarms);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub image_id: String,
    pub image_name: Option<String>,
    pub description: String,
    pub platform: Option<String>,
    pub architecture: String,
    pub state: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: ImageLinks,
}

impl Entity for Image {
    const KIND: ResourceKind = ResourceKind::Image;

    fn key(&self) -> &str {
        &self.image_id
    }

    fn name(&self) -> &str {
        name_tag(&self.tags)
            .or(self.image_name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or(&self.image_id)
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageLinks {
    pub instances: Vec<Ix<Instance>>,
    pub vpcs: Vec<Ix<Vpc>>,
    pub classic: bool,
}

impl ImageLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.instances);
        canonicalize(&mut self.vpcs);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoScalingGroup {
    pub auto_scaling_group_name: String,
    pub auto_scaling_group_arn: String,
    pub instance_ids: Vec<String>,
    pub desired_capacity: i64,
    pub min_size: i64,
    pub max_size: i64,
    pub status: Option<String>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: AutoScalingGroupLinks,
}

impl Entity for AutoScalingGroup {
    const KIND: ResourceKind = ResourceKind::AutoScalingGroup;

    fn key(&self) -> &str {
        &self.auto_scaling_group_name
    }

    fn name(&self) -> &str {
        name_tag(&self.tags).unwrap_or(&self.auto_scaling_group_name)
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn identity_key(&self) -> &str {
        &self.auto_scaling_group_arn
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoScalingGroupLinks {
    pub instances: Vec<Ix<Instance>>,
    pub zones: Vec<Ix<AvailabilityZone>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    pub vpcs: Vec<Ix<Vpc>>,
    pub classic: bool,
    /// Alarms whose dimension names this group
    pub alarms: Vec<Ix<Alarm>>,
    /// Alarms that trigger scaling actions on this group
    pub action_alarms: Vec<Ix<Alarm>>,
}

impl AutoScalingGroupLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.instances);
        canonicalize(&mut self.zones);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.vpcs);
        canonicalize(&mut self.alarms);
        canonicalize(&mut self.action_alarms);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancer {
    pub load_balancer_name: String,
    pub dns_name: String,
    pub scheme: String,
    pub vpc_id: Option<String>,
    pub availability_zones: Vec<String>,
    pub subnet_ids: Vec<String>,
    pub instance_ids: Vec<String>,
    /// Group ids for VPC balancers, group names for Classic ones
    pub security_groups: Vec<String>,
    pub source_security_group: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub stats: StatsCell<LoadBalancerStats>,
    #[serde(skip)]
    pub links: LoadBalancerLinks,
}

tagged_entity!(LoadBalancer, ResourceKind::LoadBalancer, load_balancer_name);

impl LoadBalancer {
    /// No registered instances, or no traffic in the last polled window.
    pub fn inactive(&self) -> bool {
        self.links.instances.is_empty()
            || self
                .stats
                .read()
                .as_ref()
                .is_some_and(|s| s.requests_per_second == 0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadBalancerLinks {
    pub vpc: Option<Ix<Vpc>>,
    pub classic: bool,
    pub zones: Vec<Ix<AvailabilityZone>>,
    pub subnets: Vec<Ix<Subnet>>,
    pub instances: Vec<Ix<Instance>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub source_security_group: Option<Ix<SecurityGroup>>,
    pub auto_scaling_groups: Vec<Ix<AutoScalingGroup>>,
    pub alarms: Vec<Ix<Alarm>>,
}

impl LoadBalancerLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.zones);
        canonicalize(&mut self.subnets);
        canonicalize(&mut self.instances);
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.auto_scaling_groups);
        canonicalize(&mut self.alarms);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpPermission {
    pub ip_protocol: String,
    pub from_port: Option<i64>,
    pub to_port: Option<i64>,
    pub cidr_ranges: Vec<String>,
    pub source_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub description: String,
    pub vpc_id: Option<String>,
    pub ingress: Vec<IpPermission>,
    pub egress: Vec<IpPermission>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: SecurityGroupLinks,
}

impl Entity for SecurityGroup {
    const KIND: ResourceKind = ResourceKind::SecurityGroup;

    fn key(&self) -> &str {
        &self.group_id
    }

    fn name(&self) -> &str {
        name_tag(&self.tags)
            .or(Some(self.group_name.as_str()).filter(|n| !n.is_empty()))
            .unwrap_or(&self.group_id)
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl SecurityGroup {
    /// Not referenced by any instance, balancer, database or cache. A
    /// balancer's source group counts as referenced.
    pub fn inactive(&self) -> bool {
        self.links.instances.is_empty()
            && self.links.load_balancers.is_empty()
            && self.links.sourced_load_balancers.is_empty()
            && self.links.database_instances.is_empty()
            && self.links.cache_clusters.is_empty()
    }

    /// Distinct ports opened by the ingress rules, ascending.
    pub fn ingress_ports(&self) -> Vec<i64> {
        let mut ports: Vec<i64> = self
            .ingress
            .iter()
            .filter_map(|p| p.from_port)
            .filter(|p| *p >= 0)
            .collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    pub(crate) fn sort_permissions(&mut self) {
        let by_port = |a: &IpPermission, b: &IpPermission| {
            a.from_port
                .cmp(&b.from_port)
                .then(a.to_port.cmp(&b.to_port))
                .then_with(|| a.ip_protocol.cmp(&b.ip_protocol))
        };
        self.ingress.sort_by(by_port);
        self.egress.sort_by(by_port);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityGroupLinks {
    pub instances: Vec<Ix<Instance>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    /// Balancers using this group as their source group
    pub sourced_load_balancers: Vec<Ix<LoadBalancer>>,
    pub database_instances: Vec<Ix<DatabaseInstance>>,
    pub cache_clusters: Vec<Ix<CacheCluster>>,
    pub functions: Vec<Ix<Function>>,
    pub vpcs: Vec<Ix<Vpc>>,
    pub classic: bool,
}

impl SecurityGroupLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.instances);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.sourced_load_balancers);
        canonicalize(&mut self.database_instances);
        canonicalize(&mut self.cache_clusters);
        canonicalize(&mut self.functions);
        canonicalize(&mut self.vpcs);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcConfig {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Function {
    pub function_name: String,
    pub function_arn: String,
    pub runtime: String,
    pub handler: String,
    pub memory_size: i64,
    pub timeout_secs: i64,
    pub vpc_config: Option<VpcConfig>,
    #[serde(skip)]
    pub stats: StatsCell<FunctionStats>,
    #[serde(skip)]
    pub links: FunctionLinks,
}

impl Entity for Function {
    const KIND: ResourceKind = ResourceKind::Function;

    fn key(&self) -> &str {
        &self.function_name
    }

    fn name(&self) -> &str {
        &self.function_name
    }

    fn identity_key(&self) -> &str {
        &self.function_arn
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionLinks {
    pub vpc: Option<Ix<Vpc>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub subnets: Vec<Ix<Subnet>>,
    pub alarms: Vec<Ix<Alarm>>,
}

impl FunctionLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.subnets);
        canonicalize(&mut self.alarms);
    }
}
