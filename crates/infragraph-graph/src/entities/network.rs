use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use infragraph_core::{compare_cidrs, compare_names, name_tag, Cidr, ResourceKind, Tag};

use super::{
    AutoScalingGroup, CacheCluster, DatabaseInstance, Entity, Function, Image,
    Instance, LoadBalancer, SecurityGroup,
};
use crate::arena::{canonicalize, Ix};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vpc {
    pub vpc_id: String,
    pub cidr_block: String,
    pub is_default: bool,
    pub state: String,
    pub instance_tenancy: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: VpcLinks,
}

tagged_entity!(Vpc, ResourceKind::Vpc, vpc_id);

#[derive(Debug, Clone, Default)]
pub struct VpcLinks {
    pub subnets: Vec<Ix<Subnet>>,
    /// This VPC's own view of each zone it spans
    pub zones: Vec<Ix<ZoneView>>,
    pub instances: Vec<Ix<Instance>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub route_tables: Vec<Ix<RouteTable>>,
    pub network_acls: Vec<Ix<NetworkAcl>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    pub auto_scaling_groups: Vec<Ix<AutoScalingGroup>>,
    pub images: Vec<Ix<Image>>,
    pub database_instances: Vec<Ix<DatabaseInstance>>,
    pub cache_clusters: Vec<Ix<CacheCluster>>,
    pub functions: Vec<Ix<Function>>,
    pub network_interfaces: Vec<Ix<NetworkInterface>>,
    pub nat_gateways: Vec<Ix<NatGateway>>,
    pub vpc_endpoints: Vec<Ix<VpcEndpoint>>,
    pub peering_connections: Vec<Ix<PeeringConnection>>,
    pub internet_gateways: Vec<Ix<InternetGateway>>,
    pub vpn_gateways: Vec<Ix<VpnGateway>>,
    pub vpn_connections: Vec<Ix<VpnConnection>>,
    pub customer_gateways: Vec<Ix<CustomerGateway>>,
}

impl VpcLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subnets);
        canonicalize(&mut self.zones);
        canonicalize(&mut self.instances);
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.route_tables);
        canonicalize(&mut self.network_acls);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.auto_scaling_groups);
        canonicalize(&mut self.images);
        canonicalize(&mut self.database_instances);
        canonicalize(&mut self.cache_clusters);
        canonicalize(&mut self.functions);
        canonicalize(&mut self.network_interfaces);
        canonicalize(&mut self.nat_gateways);
        canonicalize(&mut self.vpc_endpoints);
        canonicalize(&mut self.peering_connections);
        canonicalize(&mut self.internet_gateways);
        canonicalize(&mut self.vpn_gateways);
        canonicalize(&mut self.vpn_connections);
        canonicalize(&mut self.customer_gateways);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Subnet {
    pub subnet_id: String,
    pub vpc_id: String,
    pub availability_zone: String,
    pub cidr_block: String,
    pub available_ip_address_count: i64,
    pub default_for_az: bool,
    pub map_public_ip_on_launch: bool,
    pub state: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: SubnetLinks,
}

impl Subnet {
    pub fn cidr(&self) -> Option<Cidr> {
        self.cidr_block.parse().ok()
    }
}

impl Entity for Subnet {
    const KIND: ResourceKind = ResourceKind::Subnet;

    fn key(&self) -> &str {
        &self.subnet_id
    }

    fn name(&self) -> &str {
        name_tag(&self.tags).unwrap_or(&self.subnet_id)
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        compare_cidrs(&self.cidr_block, &other.cidr_block)
            .then_with(|| compare_names(self.name(), other.name()))
            .then_with(|| self.subnet_id.cmp(&other.subnet_id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubnetLinks {
    pub vpc: Option<Ix<Vpc>>,
    pub zone: Option<Ix<AvailabilityZone>>,
    pub zone_view: Option<Ix<ZoneView>>,
    pub instances: Vec<Ix<Instance>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    pub route_tables: Vec<Ix<RouteTable>>,
    pub network_acls: Vec<Ix<NetworkAcl>>,
    pub functions: Vec<Ix<Function>>,
    pub network_interfaces: Vec<Ix<NetworkInterface>>,
    pub internet_gateways: Vec<Ix<InternetGateway>>,
    pub vpc_endpoints: Vec<Ix<VpcEndpoint>>,
    pub vpn_gateways: Vec<Ix<VpnGateway>>,
    pub vpn_connections: Vec<Ix<VpnConnection>>,
    pub peering_connections: Vec<Ix<PeeringConnection>>,
    /// Instances routing traffic for this subnet with source/dest check off
    pub nat_instances: Vec<Ix<Instance>>,
    pub nat_gateways: Vec<Ix<NatGateway>>,
}

impl SubnetLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.instances);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.route_tables);
        canonicalize(&mut self.network_acls);
        canonicalize(&mut self.functions);
        canonicalize(&mut self.network_interfaces);
        canonicalize(&mut self.internet_gateways);
        canonicalize(&mut self.vpc_endpoints);
        canonicalize(&mut self.vpn_gateways);
        canonicalize(&mut self.vpn_connections);
        canonicalize(&mut self.peering_connections);
        canonicalize(&mut self.nat_instances);
        canonicalize(&mut self.nat_gateways);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkAcl {
    pub network_acl_id: String,
    pub vpc_id: String,
    pub is_default: bool,
    /// Subnets associated with this ACL
    pub subnet_ids: Vec<String>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: AttachedLinks,
}

tagged_entity!(NetworkAcl, ResourceKind::NetworkAcl, network_acl_id);

/// Links of kinds that belong to one VPC and apply to a set of its subnets.
#[derive(Debug, Clone, Default)]
pub struct AttachedLinks {
    pub vpc: Option<Ix<Vpc>>,
    pub subnets: Vec<Ix<Subnet>>,
}

impl AttachedLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subnets);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub destination_cidr_block: Option<String>,
    pub gateway_id: Option<String>,
    pub instance_id: Option<String>,
    pub nat_gateway_id: Option<String>,
    pub vpc_peering_connection_id: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    pub route_table_id: String,
    pub vpc_id: String,
    pub main: bool,
    /// Subnets explicitly associated with this table
    pub subnet_ids: Vec<String>,
    pub routes: Vec<Route>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: AttachedLinks,
}

tagged_entity!(RouteTable, ResourceKind::RouteTable, route_table_id);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InternetGateway {
    pub internet_gateway_id: String,
    pub attached_vpc_ids: Vec<String>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: GatewayLinks,
}

tagged_entity!(InternetGateway, ResourceKind::InternetGateway, internet_gateway_id);

#[derive(Debug, Clone, Default)]
pub struct GatewayLinks {
    pub vpcs: Vec<Ix<Vpc>>,
    /// Subnets with a route through this gateway
    pub subnets: Vec<Ix<Subnet>>,
}

impl GatewayLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.vpcs);
        canonicalize(&mut self.subnets);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerGateway {
    pub customer_gateway_id: String,
    pub ip_address: String,
    pub bgp_asn: String,
    pub state: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: CustomerGatewayLinks,
}

tagged_entity!(CustomerGateway, ResourceKind::CustomerGateway, customer_gateway_id);

#[derive(Debug, Clone, Default)]
pub struct CustomerGatewayLinks {
    pub vpn_connections: Vec<Ix<VpnConnection>>,
    pub vpcs: Vec<Ix<Vpc>>,
}

impl CustomerGatewayLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.vpn_connections);
        canonicalize(&mut self.vpcs);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnGateway {
    pub vpn_gateway_id: String,
    pub state: String,
    pub attached_vpc_ids: Vec<String>,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: VpnGatewayLinks,
}

tagged_entity!(VpnGateway, ResourceKind::VpnGateway, vpn_gateway_id);

#[derive(Debug, Clone, Default)]
pub struct VpnGatewayLinks {
    pub vpcs: Vec<Ix<Vpc>>,
    pub vpn_connections: Vec<Ix<VpnConnection>>,
    pub subnets: Vec<Ix<Subnet>>,
}

impl VpnGatewayLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.vpcs);
        canonicalize(&mut self.vpn_connections);
        canonicalize(&mut self.subnets);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnConnection {
    pub vpn_connection_id: String,
    pub customer_gateway_id: String,
    pub vpn_gateway_id: String,
    pub state: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: VpnConnectionLinks,
}

tagged_entity!(VpnConnection, ResourceKind::VpnConnection, vpn_connection_id);

#[derive(Debug, Clone, Default)]
pub struct VpnConnectionLinks {
    pub customer_gateway: Option<Ix<CustomerGateway>>,
    pub vpn_gateway: Option<Ix<VpnGateway>>,
    pub vpcs: Vec<Ix<Vpc>>,
    pub subnets: Vec<Ix<Subnet>>,
}

impl VpnConnectionLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.vpcs);
        canonicalize(&mut self.subnets);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcEndpoint {
    pub vpc_endpoint_id: String,
    pub vpc_id: String,
    pub service_name: String,
    pub state: String,
    #[serde(skip)]
    pub links: AttachedLinks,
}

impl Entity for VpcEndpoint {
    const KIND: ResourceKind = ResourceKind::VpcEndpoint;

    fn key(&self) -> &str {
        &self.vpc_endpoint_id
    }

    fn name(&self) -> &str {
        &self.vpc_endpoint_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeeringConnection {
    pub vpc_peering_connection_id: String,
    pub requester_vpc_id: String,
    pub accepter_vpc_id: String,
    pub status: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: PeeringLinks,
}

tagged_entity!(
    PeeringConnection,
    ResourceKind::PeeringConnection,
    vpc_peering_connection_id
);

#[derive(Debug, Clone, Default)]
pub struct PeeringLinks {
    pub requester: Option<Ix<Vpc>>,
    pub accepter: Option<Ix<Vpc>>,
    pub subnets: Vec<Ix<Subnet>>,
}

impl PeeringLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subnets);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NatGateway {
    pub nat_gateway_id: String,
    pub vpc_id: String,
    /// Subnet the gateway itself lives in
    pub subnet_id: String,
    pub state: String,
    pub public_ip: Option<String>,
    #[serde(skip)]
    pub links: AttachedLinks,
}

impl Entity for NatGateway {
    const KIND: ResourceKind = ResourceKind::NatGateway;

    fn key(&self) -> &str {
        &self.nat_gateway_id
    }

    fn name(&self) -> &str {
        &self.nat_gateway_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    pub network_interface_id: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub availability_zone: String,
    pub attachment_instance_id: Option<String>,
    pub private_ip_address: String,
    pub status: String,
    pub description: String,
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub links: NetworkInterfaceLinks,
}

tagged_entity!(
    NetworkInterface,
    ResourceKind::NetworkInterface,
    network_interface_id
);

#[derive(Debug, Clone, Default)]
pub struct NetworkInterfaceLinks {
    pub instance: Option<Ix<Instance>>,
    pub vpc: Option<Ix<Vpc>>,
    pub subnet: Option<Ix<Subnet>>,
    pub zone_view: Option<Ix<ZoneView>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityZone {
    pub zone_name: String,
    pub region_name: String,
    pub state: String,
    pub messages: Vec<String>,
    #[serde(skip)]
    pub links: ZoneLinks,
}

impl Entity for AvailabilityZone {
    const KIND: ResourceKind = ResourceKind::AvailabilityZone;

    fn key(&self) -> &str {
        &self.zone_name
    }

    fn name(&self) -> &str {
        &self.zone_name
    }
}

/// Region-wide zone aggregates.
#[derive(Debug, Clone, Default)]
pub struct ZoneLinks {
    pub subnets: Vec<Ix<Subnet>>,
    pub instances: Vec<Ix<Instance>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    pub auto_scaling_groups: Vec<Ix<AutoScalingGroup>>,
    pub database_instances: Vec<Ix<DatabaseInstance>>,
    pub cache_clusters: Vec<Ix<CacheCluster>>,
    pub views: Vec<Ix<ZoneView>>,
}

impl ZoneLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subnets);
        canonicalize(&mut self.instances);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.auto_scaling_groups);
        canonicalize(&mut self.database_instances);
        canonicalize(&mut self.cache_clusters);
        canonicalize(&mut self.views);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ZoneScope {
    Vpc(Ix<Vpc>),
    Classic,
}

/// A zone seen from inside one VPC (or from Classic), holding only that
/// scope's resources. Descriptive fields are copied from the region-wide
/// zone when the view is created.
#[derive(Debug, Clone)]
pub struct ZoneView {
    pub zone: Ix<AvailabilityZone>,
    pub scope: ZoneScope,
    pub zone_name: String,
    pub region_name: String,
    pub state: String,
    pub messages: Vec<String>,
    pub links: ZoneViewLinks,
}

impl ZoneView {
    pub(crate) fn new(zone: Ix<AvailabilityZone>, source: &AvailabilityZone, scope: ZoneScope) -> Self {
        Self {
            zone,
            scope,
            zone_name: source.zone_name.clone(),
            region_name: source.region_name.clone(),
            state: source.state.clone(),
            messages: source.messages.clone(),
            links: ZoneViewLinks::default(),
        }
    }

    /// True when the copied fields still match the region-wide zone.
    pub fn mirrors(&self, zone: &AvailabilityZone) -> bool {
        self.zone_name == zone.zone_name
            && self.region_name == zone.region_name
            && self.state == zone.state
            && self.messages == zone.messages
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneViewLinks {
    pub subnets: Vec<Ix<Subnet>>,
    pub instances: Vec<Ix<Instance>>,
    pub network_interfaces: Vec<Ix<NetworkInterface>>,
    pub database_instances: Vec<Ix<DatabaseInstance>>,
}

impl ZoneViewLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subnets);
        canonicalize(&mut self.instances);
        canonicalize(&mut self.network_interfaces);
        canonicalize(&mut self.database_instances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnets_order_by_cidr_before_name() {
        let a = Subnet {
            subnet_id: "subnet-a".into(),
            cidr_block: "10.0.10.0/24".into(),
            tags: vec![Tag::new("Name", "aaa")],
            ..Default::default()
        };
        let b = Subnet {
            subnet_id: "subnet-b".into(),
            cidr_block: "10.0.2.0/24".into(),
            tags: vec![Tag::new("Name", "zzz")],
            ..Default::default()
        };
        assert_eq!(b.canonical_cmp(&a), Ordering::Less);
        assert_eq!(a.identity(), "subnet:subnet-a");
        assert_eq!(a.name(), "aaa");
    }

    #[test]
    fn zone_views_copy_zone_fields() {
        let zone = AvailabilityZone {
            zone_name: "us-east-1a".into(),
            region_name: "us-east-1".into(),
            state: "available".into(),
            messages: vec!["degraded".into()],
            ..Default::default()
        };
        let view = ZoneView::new(Ix::new(0), &zone, ZoneScope::Classic);
        assert_eq!(view.messages, ["degraded"]);
        assert!(view.mirrors(&zone));
        assert_eq!(zone.identity(), "az:us-east-1a");

        let recovered = AvailabilityZone {
            messages: Vec::new(),
            ..zone.clone()
        };
        assert!(!view.mirrors(&recovered));
    }
}
