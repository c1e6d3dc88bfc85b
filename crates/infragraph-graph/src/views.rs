//! Typed presentation trees built from a linked generation.
//!
//! Both trees are built from canonically ordered handles and collected
//! through ordered maps, so output order never depends on hash iteration.
//! Absent levels (`None`) order before present ones.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::arena::Ix;
use crate::entities::*;
use crate::generation::Generation;

/// One path from a customer gateway through to an internet gateway. Any hop
/// may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionRow {
    pub customer_gateway: Option<Ix<CustomerGateway>>,
    pub vpn_connection: Option<Ix<VpnConnection>>,
    pub vpn_gateway: Option<Ix<VpnGateway>>,
    pub vpc: Option<Ix<Vpc>>,
    pub internet_gateway: Option<Ix<InternetGateway>>,
}

/// Row names, with `-` for absent hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRowNames {
    pub customer_gateway: String,
    pub vpn_connection: String,
    pub vpn_gateway: String,
    pub vpc: String,
    pub internet_gateway: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    pub rows: Vec<ConnectionRow>,
}

impl ConnectionTable {
    pub fn build(g: &Generation) -> Self {
        let mut rows = BTreeSet::new();
        let row = |customer_gateway, vpn_connection, vpn_gateway, vpc, internet_gateway| {
            ConnectionRow {
                customer_gateway,
                vpn_connection,
                vpn_gateway,
                vpc,
                internet_gateway,
            }
        };

        for (v, vpc) in g.vpcs.iter() {
            let igws = optional(&vpc.links.internet_gateways);
            for &ig in &igws {
                if vpc.links.vpn_gateways.is_empty() {
                    rows.insert(row(None, None, None, Some(v), ig));
                }
                for &vg in &vpc.links.vpn_gateways {
                    let connections = &g.vpn_gateways[vg].links.vpn_connections;
                    if connections.is_empty() {
                        rows.insert(row(None, None, Some(vg), Some(v), ig));
                    }
                    for &c in connections {
                        let cg = g.vpn_connections[c].links.customer_gateway;
                        rows.insert(row(cg, Some(c), Some(vg), Some(v), ig));
                    }
                }
            }
        }

        for (vg, gateway) in g.vpn_gateways.iter() {
            if !gateway.links.vpcs.is_empty() {
                continue;
            }
            if gateway.links.vpn_connections.is_empty() {
                rows.insert(row(None, None, Some(vg), None, None));
            }
            for &c in &gateway.links.vpn_connections {
                let cg = g.vpn_connections[c].links.customer_gateway;
                rows.insert(row(cg, Some(c), Some(vg), None, None));
            }
        }

        for (c, connection) in g.vpn_connections.iter() {
            if connection.links.vpn_gateway.is_none() {
                rows.insert(row(connection.links.customer_gateway, Some(c), None, None, None));
            }
        }

        for (cg, gateway) in g.customer_gateways.iter() {
            if gateway.links.vpn_connections.is_empty() {
                rows.insert(row(Some(cg), None, None, None, None));
            }
        }

        for (ig, gateway) in g.internet_gateways.iter() {
            if gateway.links.vpcs.is_empty() {
                rows.insert(row(None, None, None, None, Some(ig)));
            }
        }

        Self {
            rows: rows.into_iter().collect(),
        }
    }

    pub fn names(&self, g: &Generation) -> Vec<ConnectionRowNames> {
        fn name<T: Entity>(arena: &crate::arena::Arena<T>, ix: Option<Ix<T>>) -> String {
            ix.map_or_else(|| "-".to_string(), |ix| arena[ix].name().to_string())
        }
        self.rows
            .iter()
            .map(|r| ConnectionRowNames {
                customer_gateway: name(&g.customer_gateways, r.customer_gateway),
                vpn_connection: name(&g.vpn_connections, r.vpn_connection),
                vpn_gateway: name(&g.vpn_gateways, r.vpn_gateway),
                vpc: name(&g.vpcs, r.vpc),
                internet_gateway: name(&g.internet_gateways, r.internet_gateway),
            })
            .collect()
    }
}

fn optional<T>(ids: &[Ix<T>]) -> Vec<Option<Ix<T>>> {
    if ids.is_empty() {
        vec![None]
    } else {
        ids.iter().copied().map(Some).collect()
    }
}

/// A balancer's instances grouped by scaling group, zone and subnet.
#[derive(Debug, Clone)]
pub struct LoadBalancerTree {
    pub load_balancer: Ix<LoadBalancer>,
    pub groups: Vec<GroupBranch>,
}

#[derive(Debug, Clone)]
pub struct GroupBranch {
    pub group: Option<Ix<AutoScalingGroup>>,
    pub zones: Vec<ZoneBranch>,
}

#[derive(Debug, Clone)]
pub struct ZoneBranch {
    pub zone: Option<Ix<AvailabilityZone>>,
    pub subnets: Vec<SubnetBranch>,
}

#[derive(Debug, Clone)]
pub struct SubnetBranch {
    pub subnet: Option<Ix<Subnet>>,
    pub instances: Vec<Ix<Instance>>,
}

type Branches = BTreeMap<
    Option<Ix<AutoScalingGroup>>,
    BTreeMap<Option<Ix<AvailabilityZone>>, BTreeMap<Option<Ix<Subnet>>, Vec<Ix<Instance>>>>,
>;

impl LoadBalancerTree {
    pub fn build(g: &Generation, load_balancer: Ix<LoadBalancer>) -> Self {
        let mut branches = Branches::new();
        for &i in &g.load_balancers[load_balancer].links.instances {
            let links = &g.instances[i].links;
            branches
                .entry(links.auto_scaling_group)
                .or_default()
                .entry(links.zone)
                .or_default()
                .entry(links.subnet)
                .or_default()
                .push(i);
        }

        let groups = branches
            .into_iter()
            .map(|(group, zones)| GroupBranch {
                group,
                zones: zones
                    .into_iter()
                    .map(|(zone, subnets)| ZoneBranch {
                        zone,
                        subnets: subnets
                            .into_iter()
                            .map(|(subnet, instances)| SubnetBranch { subnet, instances })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            load_balancer,
            groups,
        }
    }

    pub fn instance_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| &g.zones)
            .flat_map(|z| &z.subnets)
            .map(|s| s.instances.len())
            .sum()
    }
}
