use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Every resource kind discovered in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Vpc,
    Subnet,
    Instance,
    SecurityGroup,
    NetworkAcl,
    RouteTable,
    LoadBalancer,
    AvailabilityZone,
    InternetGateway,
    CustomerGateway,
    VpnGateway,
    VpnConnection,
    VpcEndpoint,
    PeeringConnection,
    AutoScalingGroup,
    Image,
    DatabaseInstance,
    CacheCluster,
    Queue,
    Topic,
    Subscription,
    Alarm,
    Function,
    NetworkInterface,
    NatGateway,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 25] = [
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::Instance,
        ResourceKind::SecurityGroup,
        ResourceKind::NetworkAcl,
        ResourceKind::RouteTable,
        ResourceKind::LoadBalancer,
        ResourceKind::AvailabilityZone,
        ResourceKind::InternetGateway,
        ResourceKind::CustomerGateway,
        ResourceKind::VpnGateway,
        ResourceKind::VpnConnection,
        ResourceKind::VpcEndpoint,
        ResourceKind::PeeringConnection,
        ResourceKind::AutoScalingGroup,
        ResourceKind::Image,
        ResourceKind::DatabaseInstance,
        ResourceKind::CacheCluster,
        ResourceKind::Queue,
        ResourceKind::Topic,
        ResourceKind::Subscription,
        ResourceKind::Alarm,
        ResourceKind::Function,
        ResourceKind::NetworkInterface,
        ResourceKind::NatGateway,
    ];

    /// Prefix of the identity string used as the registry key.
    pub fn prefix(self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Instance => "inst",
            ResourceKind::SecurityGroup => "sg",
            ResourceKind::NetworkAcl => "acl",
            ResourceKind::RouteTable => "rt",
            ResourceKind::LoadBalancer => "elb",
            ResourceKind::AvailabilityZone => "az",
            ResourceKind::InternetGateway => "igw",
            ResourceKind::CustomerGateway => "cgw",
            ResourceKind::VpnGateway => "vpg",
            ResourceKind::VpnConnection => "vpn",
            ResourceKind::VpcEndpoint => "vpce",
            ResourceKind::PeeringConnection => "vpcp",
            ResourceKind::AutoScalingGroup => "asg",
            ResourceKind::Image => "ami",
            ResourceKind::DatabaseInstance => "rds",
            ResourceKind::CacheCluster => "ecc",
            ResourceKind::Queue => "sqs",
            ResourceKind::Topic => "sns",
            ResourceKind::Subscription => "snssub",
            ResourceKind::Alarm => "cwa",
            ResourceKind::Function => "lambda",
            ResourceKind::NetworkInterface => "eni",
            ResourceKind::NatGateway => "nat",
        }
    }

    /// Snake-case name, used for fixture files and tracker labels.
    pub fn slug(self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpcs",
            ResourceKind::Subnet => "subnets",
            ResourceKind::Instance => "instances",
            ResourceKind::SecurityGroup => "security_groups",
            ResourceKind::NetworkAcl => "network_acls",
            ResourceKind::RouteTable => "route_tables",
            ResourceKind::LoadBalancer => "load_balancers",
            ResourceKind::AvailabilityZone => "availability_zones",
            ResourceKind::InternetGateway => "internet_gateways",
            ResourceKind::CustomerGateway => "customer_gateways",
            ResourceKind::VpnGateway => "vpn_gateways",
            ResourceKind::VpnConnection => "vpn_connections",
            ResourceKind::VpcEndpoint => "vpc_endpoints",
            ResourceKind::PeeringConnection => "peering_connections",
            ResourceKind::AutoScalingGroup => "auto_scaling_groups",
            ResourceKind::Image => "images",
            ResourceKind::DatabaseInstance => "database_instances",
            ResourceKind::CacheCluster => "cache_clusters",
            ResourceKind::Queue => "queues",
            ResourceKind::Topic => "topics",
            ResourceKind::Subscription => "subscriptions",
            ResourceKind::Alarm => "alarms",
            ResourceKind::Function => "functions",
            ResourceKind::NetworkInterface => "network_interfaces",
            ResourceKind::NatGateway => "nat_gateways",
        }
    }

    pub fn identity(self, key: &str) -> String {
        format!("{}:{}", self.prefix(), key)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Value of the `Name` tag, matched case-insensitively. Empty values are ignored.
pub fn name_tag(tags: &[Tag]) -> Option<&str> {
    tags.iter()
        .find(|t| t.key.eq_ignore_ascii_case("name") && !t.value.is_empty())
        .map(|t| t.value.as_str())
}

/// Optional narrowing passed to a loader. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Filter {
    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            tags: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.tags.is_empty()
    }

    pub fn matches(&self, id: &str, tags: &[Tag]) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|i| i == id) {
            return false;
        }
        self.tags.iter().all(|(key, values)| {
            tags.iter()
                .any(|t| &t.key == key && (values.is_empty() || values.contains(&t.value)))
        })
    }
}
