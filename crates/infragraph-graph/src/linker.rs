//! Cross-references one cycle's loader output into a generation.
//!
//! Every relationship is a single pass over one kind that resolves foreign
//! keys through per-kind key maps and records the link on both sides.
//! Unresolved keys are skipped. Lists are sorted and deduplicated once at the
//! end, so joins may push the same handle more than once.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use infragraph_core::{Dimension, Result};

use crate::arena::Ix;
use crate::entities::*;
use crate::generation::{Discovered, EntityRef, Generation, Keys};

/// Builds generation `number` from freshly loaded entities.
pub fn link(discovered: Discovered, number: u64) -> Result<Generation> {
    let (generation, keys) = Generation::arrange(discovered, number);
    let mut linker = Linker::new(generation, keys);

    linker.subnets();
    linker.instances();
    linker.load_balancers();
    linker.auto_scaling_groups();
    linker.route_tables();
    linker.network_acls();
    linker.endpoints_and_peering();
    linker.gateway_attachments();
    linker.vpn_connections();
    linker.network_interfaces();
    linker.database_instances();
    linker.zone_views();
    linker.routes();
    linker.memberships();
    linker.cache_clusters();
    linker.functions();
    linker.messaging();
    linker.nat_gateways();
    linker.alarm_dimensions();
    linker.alarm_actions();

    let mut generation = linker.g;
    generation.canonicalize_links();
    generation.build_registry()?;
    debug!(
        generation = number,
        entities = generation.entity_count(),
        zone_views = generation.zone_views.len(),
        classic_instances = generation.classic.instances.len(),
        "linked generation"
    );
    Ok(generation)
}

fn find<T>(keys: &HashMap<String, Ix<T>>, key: &str) -> Option<Ix<T>> {
    if key.is_empty() {
        return None;
    }
    keys.get(key).copied()
}

fn resolve<T>(keys: &HashMap<String, Ix<T>>, ids: &[String]) -> Vec<Ix<T>> {
    ids.iter().filter_map(|id| find(keys, id)).collect()
}

/// Next hop of one route, resolved to an entity.
enum Hop {
    Internet(Ix<InternetGateway>),
    Endpoint(Ix<VpcEndpoint>),
    Vpn(Ix<VpnGateway>),
    Peering(Ix<PeeringConnection>),
    NatInstance(Ix<Instance>),
    NatGateway(Ix<NatGateway>),
}

struct Linker {
    g: Generation,
    keys: Keys,
    groups_by_name: HashMap<String, Vec<Ix<SecurityGroup>>>,
    groups_by_arn: HashMap<String, Ix<AutoScalingGroup>>,
    queues_by_arn: HashMap<String, Ix<Queue>>,
}

impl Linker {
    fn new(g: Generation, keys: Keys) -> Self {
        let mut groups_by_name: HashMap<String, Vec<Ix<SecurityGroup>>> = HashMap::new();
        for (ix, group) in g.security_groups.iter() {
            if !group.group_name.is_empty() {
                groups_by_name
                    .entry(group.group_name.clone())
                    .or_default()
                    .push(ix);
            }
        }
        let groups_by_arn = g
            .auto_scaling_groups
            .iter()
            .map(|(ix, asg)| (asg.auto_scaling_group_arn.clone(), ix))
            .collect();
        let queues_by_arn = g
            .queues
            .iter()
            .map(|(ix, queue)| (queue.queue_arn.clone(), ix))
            .collect();

        Self {
            g,
            keys,
            groups_by_name,
            groups_by_arn,
            queues_by_arn,
        }
    }

    /// Resolves a security group reference that may be an id or a group name.
    /// Name matches prefer groups of `vpc_id`.
    fn groups_by_ref(&self, reference: &str, vpc_id: Option<&str>) -> Vec<Ix<SecurityGroup>> {
        if let Some(ix) = find(&self.keys.security_groups, reference) {
            return vec![ix];
        }
        let Some(named) = self.groups_by_name.get(reference) else {
            return Vec::new();
        };
        let scoped: Vec<_> = named
            .iter()
            .copied()
            .filter(|&ix| self.g.security_groups[ix].vpc_id.as_deref() == vpc_id)
            .collect();
        if scoped.is_empty() {
            named.clone()
        } else {
            scoped
        }
    }

    fn subnets(&mut self) {
        for s in self.g.subnets.ids() {
            let subnet = &self.g.subnets[s];
            let zone = find(&self.keys.availability_zones, &subnet.availability_zone);
            let vpc = find(&self.keys.vpcs, &subnet.vpc_id);

            if let Some(z) = zone {
                self.g.availability_zones[z].links.subnets.push(s);
            }
            if let Some(v) = vpc {
                self.g.vpcs[v].links.subnets.push(s);
            }
            let links = &mut self.g.subnets[s].links;
            links.zone = zone;
            links.vpc = vpc;
        }
    }

    fn instances(&mut self) {
        for i in self.g.instances.ids() {
            let inst = &self.g.instances[i];
            let vpc = inst.vpc_id.as_deref().and_then(|id| find(&self.keys.vpcs, id));
            let zone = find(
                &self.keys.availability_zones,
                &inst.placement.availability_zone,
            );
            let subnet = inst
                .subnet_id
                .as_deref()
                .and_then(|id| find(&self.keys.subnets, id));
            let groups = resolve(&self.keys.security_groups, &inst.security_group_ids);
            let image = find(&self.keys.images, &inst.image_id);

            match vpc {
                Some(v) => self.g.vpcs[v].links.instances.push(i),
                None => self.g.classic.instances.push(i),
            }
            if let Some(z) = zone {
                self.g.availability_zones[z].links.instances.push(i);
            }
            if let Some(s) = subnet {
                self.g.subnets[s].links.instances.push(i);
            }
            for &sg in &groups {
                self.g.security_groups[sg].links.instances.push(i);
            }
            if let Some(a) = image {
                self.g.images[a].links.instances.push(i);
            }

            let links = &mut self.g.instances[i].links;
            links.vpc = vpc;
            links.classic = vpc.is_none();
            links.zone = zone;
            links.subnet = subnet;
            links.security_groups = groups;
            links.image = image;
        }
    }

    fn load_balancers(&mut self) {
        for l in self.g.load_balancers.ids() {
            let lb = &self.g.load_balancers[l];
            let vpc_id = lb.vpc_id.as_deref();
            let vpc = vpc_id.and_then(|id| find(&self.keys.vpcs, id));
            let zones = resolve(&self.keys.availability_zones, &lb.availability_zones);
            let subnets = resolve(&self.keys.subnets, &lb.subnet_ids);
            let instances = resolve(&self.keys.instances, &lb.instance_ids);
            let groups: Vec<_> = lb
                .security_groups
                .iter()
                .flat_map(|reference| self.groups_by_ref(reference, vpc_id))
                .collect();
            let source = lb
                .source_security_group
                .as_deref()
                .and_then(|name| self.groups_by_ref(name, vpc_id).first().copied());

            match vpc {
                Some(v) => self.g.vpcs[v].links.load_balancers.push(l),
                None => self.g.classic.load_balancers.push(l),
            }
            for &z in &zones {
                self.g.availability_zones[z].links.load_balancers.push(l);
            }
            for &s in &subnets {
                self.g.subnets[s].links.load_balancers.push(l);
            }
            for &i in &instances {
                self.g.instances[i].links.load_balancers.push(l);
            }
            for &sg in &groups {
                self.g.security_groups[sg].links.load_balancers.push(l);
            }
            if let Some(sg) = source {
                self.g.security_groups[sg]
                    .links
                    .sourced_load_balancers
                    .push(l);
            }

            let links = &mut self.g.load_balancers[l].links;
            links.vpc = vpc;
            links.classic = vpc.is_none();
            links.zones = zones;
            links.subnets = subnets;
            links.instances = instances;
            links.security_groups = groups;
            links.source_security_group = source;
        }
    }

    /// Groups inherit zones, balancers and VPCs from their instances.
    fn auto_scaling_groups(&mut self) {
        for a in self.g.auto_scaling_groups.ids() {
            let instances = resolve(
                &self.keys.instances,
                &self.g.auto_scaling_groups[a].instance_ids,
            );
            let mut zones = Vec::new();
            let mut balancers = Vec::new();
            let mut vpcs = Vec::new();
            let mut classic = false;

            for &i in &instances {
                let links = &mut self.g.instances[i].links;
                links.auto_scaling_group = Some(a);
                zones.extend(links.zone);
                balancers.extend(links.load_balancers.iter().copied());
                match links.vpc {
                    Some(v) => vpcs.push(v),
                    None => classic = true,
                }
            }

            for &z in &zones {
                self.g.availability_zones[z]
                    .links
                    .auto_scaling_groups
                    .push(a);
            }
            for &l in &balancers {
                self.g.load_balancers[l].links.auto_scaling_groups.push(a);
            }
            for &v in &vpcs {
                self.g.vpcs[v].links.auto_scaling_groups.push(a);
            }
            if classic {
                self.g.classic.auto_scaling_groups.push(a);
            }

            let links = &mut self.g.auto_scaling_groups[a].links;
            links.instances = instances;
            links.zones = zones;
            links.load_balancers = balancers;
            links.vpcs = vpcs;
            links.classic = classic;
        }
    }

    /// Subnets without an explicit association use their VPC's main table.
    fn route_tables(&mut self) {
        let mut main_tables = HashMap::new();
        for r in self.g.route_tables.ids() {
            let table = &self.g.route_tables[r];
            let vpc = find(&self.keys.vpcs, &table.vpc_id);
            let subnets = resolve(&self.keys.subnets, &table.subnet_ids);
            if let (true, Some(v)) = (table.main, vpc) {
                main_tables.insert(v, r);
            }

            if let Some(v) = vpc {
                self.g.vpcs[v].links.route_tables.push(r);
            }
            for &s in &subnets {
                self.g.subnets[s].links.route_tables.push(r);
            }
            let links = &mut self.g.route_tables[r].links;
            links.vpc = vpc;
            links.subnets = subnets;
        }

        for s in self.g.subnets.ids() {
            let links = &self.g.subnets[s].links;
            if !links.route_tables.is_empty() {
                continue;
            }
            if let Some(&r) = links.vpc.and_then(|v| main_tables.get(&v)) {
                self.g.subnets[s].links.route_tables.push(r);
                self.g.route_tables[r].links.subnets.push(s);
            }
        }
    }

    /// Subnets without an explicit association use their VPC's default ACL.
    fn network_acls(&mut self) {
        let mut default_acls = HashMap::new();
        for n in self.g.network_acls.ids() {
            let acl = &self.g.network_acls[n];
            let vpc = find(&self.keys.vpcs, &acl.vpc_id);
            let subnets = resolve(&self.keys.subnets, &acl.subnet_ids);
            if let (true, Some(v)) = (acl.is_default, vpc) {
                default_acls.insert(v, n);
            }

            if let Some(v) = vpc {
                self.g.vpcs[v].links.network_acls.push(n);
            }
            for &s in &subnets {
                self.g.subnets[s].links.network_acls.push(n);
            }
            let links = &mut self.g.network_acls[n].links;
            links.vpc = vpc;
            links.subnets = subnets;
        }

        for s in self.g.subnets.ids() {
            let links = &self.g.subnets[s].links;
            if !links.network_acls.is_empty() {
                continue;
            }
            if let Some(&n) = links.vpc.and_then(|v| default_acls.get(&v)) {
                self.g.subnets[s].links.network_acls.push(n);
                self.g.network_acls[n].links.subnets.push(s);
            }
        }
    }

    fn endpoints_and_peering(&mut self) {
        for e in self.g.vpc_endpoints.ids() {
            if let Some(v) = find(&self.keys.vpcs, &self.g.vpc_endpoints[e].vpc_id) {
                self.g.vpc_endpoints[e].links.vpc = Some(v);
                self.g.vpcs[v].links.vpc_endpoints.push(e);
            }
        }

        for p in self.g.peering_connections.ids() {
            let peering = &self.g.peering_connections[p];
            let requester = find(&self.keys.vpcs, &peering.requester_vpc_id);
            let accepter = find(&self.keys.vpcs, &peering.accepter_vpc_id);
            for v in requester.into_iter().chain(accepter) {
                self.g.vpcs[v].links.peering_connections.push(p);
            }
            let links = &mut self.g.peering_connections[p].links;
            links.requester = requester;
            links.accepter = accepter;
        }
    }

    fn gateway_attachments(&mut self) {
        for ig in self.g.internet_gateways.ids() {
            let vpcs = resolve(
                &self.keys.vpcs,
                &self.g.internet_gateways[ig].attached_vpc_ids,
            );
            for &v in &vpcs {
                self.g.vpcs[v].links.internet_gateways.push(ig);
            }
            self.g.internet_gateways[ig].links.vpcs = vpcs;
        }

        for vg in self.g.vpn_gateways.ids() {
            let vpcs = resolve(&self.keys.vpcs, &self.g.vpn_gateways[vg].attached_vpc_ids);
            for &v in &vpcs {
                self.g.vpcs[v].links.vpn_gateways.push(vg);
            }
            self.g.vpn_gateways[vg].links.vpcs = vpcs;
        }
    }

    /// Connections join a customer gateway to a VPN gateway and through it
    /// to every VPC the gateway is attached to.
    fn vpn_connections(&mut self) {
        for c in self.g.vpn_connections.ids() {
            let vpn = &self.g.vpn_connections[c];
            let customer = find(&self.keys.customer_gateways, &vpn.customer_gateway_id);
            let gateway = find(&self.keys.vpn_gateways, &vpn.vpn_gateway_id);
            let vpcs = gateway
                .map(|vg| self.g.vpn_gateways[vg].links.vpcs.clone())
                .unwrap_or_default();

            if let Some(cg) = customer {
                self.g.customer_gateways[cg].links.vpn_connections.push(c);
                self.g.customer_gateways[cg]
                    .links
                    .vpcs
                    .extend(vpcs.iter().copied());
            }
            if let Some(vg) = gateway {
                self.g.vpn_gateways[vg].links.vpn_connections.push(c);
            }
            for &v in &vpcs {
                let links = &mut self.g.vpcs[v].links;
                links.vpn_connections.push(c);
                links.customer_gateways.extend(customer);
            }

            let links = &mut self.g.vpn_connections[c].links;
            links.customer_gateway = customer;
            links.vpn_gateway = gateway;
            links.vpcs = vpcs;
        }
    }

    fn network_interfaces(&mut self) {
        for n in self.g.network_interfaces.ids() {
            let eni = &self.g.network_interfaces[n];
            let instance = eni
                .attachment_instance_id
                .as_deref()
                .and_then(|id| find(&self.keys.instances, id));
            let vpc = find(&self.keys.vpcs, &eni.vpc_id);
            let subnet = find(&self.keys.subnets, &eni.subnet_id);

            if let Some(i) = instance {
                self.g.instances[i].links.network_interfaces.push(n);
            }
            if let Some(v) = vpc {
                self.g.vpcs[v].links.network_interfaces.push(n);
            }
            if let Some(s) = subnet {
                self.g.subnets[s].links.network_interfaces.push(n);
            }
            let links = &mut self.g.network_interfaces[n].links;
            links.instance = instance;
            links.vpc = vpc;
            links.subnet = subnet;
        }
    }

    /// Creates one view per (scope, zone) pair in use, in canonical order,
    /// then files subnets, instances, interfaces and VPC databases into
    /// their view. Runs after the database join.
    fn zone_views(&mut self) {
        let mut pairs = BTreeSet::new();
        for subnet in self.g.subnets.values() {
            if let (Some(v), Some(z)) = (subnet.links.vpc, subnet.links.zone) {
                pairs.insert((ZoneScope::Vpc(v), z));
            }
        }
        for inst in self.g.instances.values() {
            if let Some(z) = inst.links.zone {
                let scope = inst.links.vpc.map_or(ZoneScope::Classic, ZoneScope::Vpc);
                pairs.insert((scope, z));
            }
        }
        for eni in self.g.network_interfaces.values() {
            let zone = find(&self.keys.availability_zones, &eni.availability_zone);
            if let (Some(v), Some(z)) = (eni.links.vpc, zone) {
                pairs.insert((ZoneScope::Vpc(v), z));
            }
        }
        for db in self.g.database_instances.values() {
            if let (Some(v), Some(z)) = (db.links.vpc, db.links.zone) {
                pairs.insert((ZoneScope::Vpc(v), z));
            }
        }

        let mut views = HashMap::with_capacity(pairs.len());
        for (scope, z) in pairs {
            let view = ZoneView::new(z, &self.g.availability_zones[z], scope);
            let vx = self.g.zone_views.push(view);
            views.insert((scope, z), vx);
            self.g.availability_zones[z].links.views.push(vx);
            match scope {
                ZoneScope::Vpc(v) => self.g.vpcs[v].links.zones.push(vx),
                ZoneScope::Classic => self.g.classic.zones.push(vx),
            }
        }

        for s in self.g.subnets.ids() {
            let links = &self.g.subnets[s].links;
            let Some(&vx) = links
                .vpc
                .zip(links.zone)
                .and_then(|(v, z)| views.get(&(ZoneScope::Vpc(v), z)))
            else {
                continue;
            };
            self.g.subnets[s].links.zone_view = Some(vx);
            self.g.zone_views[vx].links.subnets.push(s);
        }
        for i in self.g.instances.ids() {
            let links = &self.g.instances[i].links;
            let scope = links.vpc.map_or(ZoneScope::Classic, ZoneScope::Vpc);
            let Some(&vx) = links.zone.and_then(|z| views.get(&(scope, z))) else {
                continue;
            };
            self.g.instances[i].links.zone_view = Some(vx);
            self.g.zone_views[vx].links.instances.push(i);
        }
        for n in self.g.network_interfaces.ids() {
            let eni = &self.g.network_interfaces[n];
            let zone = find(&self.keys.availability_zones, &eni.availability_zone);
            let Some(&vx) = eni
                .links
                .vpc
                .zip(zone)
                .and_then(|(v, z)| views.get(&(ZoneScope::Vpc(v), z)))
            else {
                continue;
            };
            self.g.network_interfaces[n].links.zone_view = Some(vx);
            self.g.zone_views[vx].links.network_interfaces.push(n);
        }
        for d in self.g.database_instances.ids() {
            let links = &self.g.database_instances[d].links;
            let Some(&vx) = links
                .vpc
                .zip(links.zone)
                .and_then(|(v, z)| views.get(&(ZoneScope::Vpc(v), z)))
            else {
                continue;
            };
            self.g.database_instances[d].links.zone_view = Some(vx);
            self.g.zone_views[vx].links.database_instances.push(d);
        }
    }

    fn hop(&self, route: &Route) -> Option<Hop> {
        if let Some(id) = route.gateway_id.as_deref() {
            if let Some(ig) = find(&self.keys.internet_gateways, id) {
                return Some(Hop::Internet(ig));
            }
            if let Some(e) = find(&self.keys.vpc_endpoints, id) {
                return Some(Hop::Endpoint(e));
            }
            if let Some(vg) = find(&self.keys.vpn_gateways, id) {
                return Some(Hop::Vpn(vg));
            }
        }
        if let Some(p) = route
            .vpc_peering_connection_id
            .as_deref()
            .and_then(|id| find(&self.keys.peering_connections, id))
        {
            return Some(Hop::Peering(p));
        }
        if let Some(i) = route
            .instance_id
            .as_deref()
            .and_then(|id| find(&self.keys.instances, id))
        {
            if !self.g.instances[i].source_dest_check {
                return Some(Hop::NatInstance(i));
            }
        }
        route
            .nat_gateway_id
            .as_deref()
            .and_then(|id| find(&self.keys.nat_gateways, id))
            .map(Hop::NatGateway)
    }

    fn routes(&mut self) {
        for s in self.g.subnets.ids() {
            let hops: Vec<Hop> = self.g.subnets[s]
                .links
                .route_tables
                .iter()
                .flat_map(|&r| self.g.route_tables[r].routes.iter())
                .filter_map(|route| self.hop(route))
                .collect();

            for hop in hops {
                match hop {
                    Hop::Internet(ig) => {
                        self.g.subnets[s].links.internet_gateways.push(ig);
                        self.g.internet_gateways[ig].links.subnets.push(s);
                    }
                    Hop::Endpoint(e) => {
                        self.g.subnets[s].links.vpc_endpoints.push(e);
                        self.g.vpc_endpoints[e].links.subnets.push(s);
                    }
                    Hop::Vpn(vg) => {
                        self.g.subnets[s].links.vpn_gateways.push(vg);
                        self.g.vpn_gateways[vg].links.subnets.push(s);
                        for c in self.g.vpn_gateways[vg].links.vpn_connections.clone() {
                            self.g.subnets[s].links.vpn_connections.push(c);
                            self.g.vpn_connections[c].links.subnets.push(s);
                        }
                    }
                    Hop::Peering(p) => {
                        self.g.subnets[s].links.peering_connections.push(p);
                        self.g.peering_connections[p].links.subnets.push(s);
                    }
                    Hop::NatInstance(i) => {
                        self.g.subnets[s].links.nat_instances.push(i);
                        self.g.instances[i].links.nat_for_subnets.push(s);
                    }
                    Hop::NatGateway(n) => {
                        self.g.subnets[s].links.nat_gateways.push(n);
                        self.g.nat_gateways[n].links.subnets.push(s);
                    }
                }
            }
        }
    }

    /// Images and security groups belong to every VPC (or Classic) that one
    /// of their instances runs in. Groups also belong to their declared VPC.
    fn memberships(&mut self) {
        for i in self.g.instances.ids() {
            let links = &self.g.instances[i].links;
            let (vpc, image) = (links.vpc, links.image);
            let groups = links.security_groups.clone();
            match vpc {
                Some(v) => {
                    if let Some(a) = image {
                        self.g.vpcs[v].links.images.push(a);
                        self.g.images[a].links.vpcs.push(v);
                    }
                    for sg in groups {
                        self.g.vpcs[v].links.security_groups.push(sg);
                        self.g.security_groups[sg].links.vpcs.push(v);
                    }
                }
                None => {
                    if let Some(a) = image {
                        self.g.classic.images.push(a);
                        self.g.images[a].links.classic = true;
                    }
                    for sg in groups {
                        self.g.classic.security_groups.push(sg);
                        self.g.security_groups[sg].links.classic = true;
                    }
                }
            }
        }

        for sg in self.g.security_groups.ids() {
            let vpc = self.g.security_groups[sg]
                .vpc_id
                .as_deref()
                .and_then(|id| find(&self.keys.vpcs, id));
            if let Some(v) = vpc {
                self.g.vpcs[v].links.security_groups.push(sg);
                self.g.security_groups[sg].links.vpcs.push(v);
            }
        }
    }

    fn database_instances(&mut self) {
        for d in self.g.database_instances.ids() {
            let db = &self.g.database_instances[d];
            let zone = db
                .availability_zone
                .as_deref()
                .and_then(|z| find(&self.keys.availability_zones, z));
            let vpc = db
                .subnet_group_vpc_id
                .as_deref()
                .and_then(|id| find(&self.keys.vpcs, id));
            let groups = resolve(&self.keys.security_groups, &db.vpc_security_group_ids);

            if let Some(z) = zone {
                self.g.availability_zones[z]
                    .links
                    .database_instances
                    .push(d);
            }
            match vpc {
                Some(v) => self.g.vpcs[v].links.database_instances.push(d),
                None => self.g.classic.database_instances.push(d),
            }
            for &sg in &groups {
                self.g.security_groups[sg].links.database_instances.push(d);
            }

            let links = &mut self.g.database_instances[d].links;
            links.zone = zone;
            links.vpc = vpc;
            links.classic = vpc.is_none();
            links.security_groups = groups;
        }
    }

    /// A cache cluster's VPC is taken from its VPC security groups.
    fn cache_clusters(&mut self) {
        for c in self.g.cache_clusters.ids() {
            let cluster = &self.g.cache_clusters[c];
            let zones = resolve(
                &self.keys.availability_zones,
                &cluster.node_availability_zones,
            );
            let mut groups = resolve(&self.keys.security_groups, &cluster.security_group_ids);
            let vpc = groups.iter().find_map(|&sg| {
                self.g.security_groups[sg]
                    .vpc_id
                    .as_deref()
                    .and_then(|id| find(&self.keys.vpcs, id))
            });
            for name in &cluster.cache_security_group_names {
                groups.extend(self.groups_by_ref(name, None));
            }

            for &z in &zones {
                self.g.availability_zones[z].links.cache_clusters.push(c);
            }
            match vpc {
                Some(v) => self.g.vpcs[v].links.cache_clusters.push(c),
                None => self.g.classic.cache_clusters.push(c),
            }
            for &sg in &groups {
                self.g.security_groups[sg].links.cache_clusters.push(c);
            }

            let links = &mut self.g.cache_clusters[c].links;
            links.zones = zones;
            links.vpc = vpc;
            links.classic = vpc.is_none();
            links.security_groups = groups;
        }
    }

    fn functions(&mut self) {
        for f in self.g.functions.ids() {
            let Some(config) = self.g.functions[f].vpc_config.as_ref() else {
                continue;
            };
            let vpc = find(&self.keys.vpcs, &config.vpc_id);
            let groups = resolve(&self.keys.security_groups, &config.security_group_ids);
            let subnets = resolve(&self.keys.subnets, &config.subnet_ids);

            if let Some(v) = vpc {
                self.g.vpcs[v].links.functions.push(f);
            }
            for &sg in &groups {
                self.g.security_groups[sg].links.functions.push(f);
            }
            for &s in &subnets {
                self.g.subnets[s].links.functions.push(f);
            }

            let links = &mut self.g.functions[f].links;
            links.vpc = vpc;
            links.security_groups = groups;
            links.subnets = subnets;
        }
    }

    fn messaging(&mut self) {
        for s in self.g.subscriptions.ids() {
            let sub = &self.g.subscriptions[s];
            let topic = find(&self.keys.topics, &sub.topic_arn);
            let queue = self.queues_by_arn.get(&sub.endpoint).copied();

            if let Some(t) = topic {
                self.g.topics[t].links.subscriptions.push(s);
            }
            if let Some(q) = queue {
                self.g.queues[q].links.subscriptions.push(s);
            }
            let links = &mut self.g.subscriptions[s].links;
            links.topic = topic;
            links.queue = queue;
        }
    }

    fn nat_gateways(&mut self) {
        for n in self.g.nat_gateways.ids() {
            if let Some(v) = find(&self.keys.vpcs, &self.g.nat_gateways[n].vpc_id) {
                self.g.nat_gateways[n].links.vpc = Some(v);
                self.g.vpcs[v].links.nat_gateways.push(n);
            }
        }
    }

    fn dimension_target(&self, dimension: &Dimension) -> Option<EntityRef> {
        let value = dimension.value.as_str();
        match dimension.name.as_str() {
            "InstanceId" => find(&self.keys.instances, value).map(EntityRef::from),
            "DBInstanceIdentifier" => {
                find(&self.keys.database_instances, value).map(EntityRef::from)
            }
            "CacheClusterId" => find(&self.keys.cache_clusters, value).map(EntityRef::from),
            "AutoScalingGroupName" => {
                find(&self.keys.auto_scaling_groups, value).map(EntityRef::from)
            }
            "LoadBalancerName" => find(&self.keys.load_balancers, value).map(EntityRef::from),
            "FunctionName" => find(&self.keys.functions, value).map(EntityRef::from),
            "MountPath" | "Filesystem" | "CacheNodeId" => None,
            other => {
                debug!(dimension = other, "alarm dimension not linked");
                None
            }
        }
    }

    fn alarm_dimensions(&mut self) {
        for a in self.g.alarms.ids() {
            let targets: Vec<EntityRef> = self.g.alarms[a]
                .dimensions
                .iter()
                .filter_map(|d| self.dimension_target(d))
                .collect();

            for &target in &targets {
                match target {
                    EntityRef::Instance(i) => self.g.instances[i].links.alarms.push(a),
                    EntityRef::DatabaseInstance(d) => {
                        self.g.database_instances[d].links.alarms.push(a)
                    }
                    EntityRef::CacheCluster(c) => self.g.cache_clusters[c].links.alarms.push(a),
                    EntityRef::AutoScalingGroup(g) => {
                        self.g.auto_scaling_groups[g].links.alarms.push(a)
                    }
                    EntityRef::LoadBalancer(l) => self.g.load_balancers[l].links.alarms.push(a),
                    EntityRef::Function(f) => self.g.functions[f].links.alarms.push(a),
                    _ => {}
                }
            }
            self.g.alarms[a].links.targets = targets;
        }
    }

    /// Scaling policy ARNs embed `autoScalingGroupName/<name>`; plain group
    /// ARNs match directly.
    fn action_group(&self, arn: &str) -> Option<Ix<AutoScalingGroup>> {
        if let Some(&g) = self.groups_by_arn.get(arn) {
            return Some(g);
        }
        let name = arn.split(':').find_map(|part| part.strip_prefix("autoScalingGroupName/"))?;
        find(&self.keys.auto_scaling_groups, name)
    }

    fn action_targets(&self, arns: &[String]) -> (Vec<Ix<Topic>>, Vec<Ix<AutoScalingGroup>>) {
        let mut topics = Vec::new();
        let mut groups = Vec::new();
        for arn in arns {
            if arn.contains(":sns:") {
                topics.extend(find(&self.keys.topics, arn));
            } else if arn.contains(":autoscaling:") {
                groups.extend(self.action_group(arn));
            }
        }
        (topics, groups)
    }

    fn alarm_actions(&mut self) {
        for a in self.g.alarms.ids() {
            let alarm = &self.g.alarms[a];
            let (alarm_topics, alarm_groups) = self.action_targets(&alarm.alarm_actions);
            let (ok_topics, ok_groups) = self.action_targets(&alarm.ok_actions);
            let (insufficient_topics, insufficient_groups) =
                self.action_targets(&alarm.insufficient_data_actions);

            for &t in alarm_topics
                .iter()
                .chain(&ok_topics)
                .chain(&insufficient_topics)
            {
                self.g.topics[t].links.alarms.push(a);
            }
            for &g in alarm_groups
                .iter()
                .chain(&ok_groups)
                .chain(&insufficient_groups)
            {
                self.g.auto_scaling_groups[g].links.action_alarms.push(a);
            }

            let links = &mut self.g.alarms[a].links;
            links.alarm_topics = alarm_topics;
            links.ok_topics = ok_topics;
            links.insufficient_data_topics = insufficient_topics;
            links.alarm_groups = alarm_groups;
            links.ok_groups = ok_groups;
            links.insufficient_data_groups = insufficient_groups;
        }
    }
}
