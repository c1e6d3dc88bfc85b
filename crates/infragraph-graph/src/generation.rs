use std::collections::HashMap;

use infragraph_core::{InfraGraphError, ResourceKind, Result};

use crate::arena::{canonicalize, Arena, Ix};
use crate::entities::*;
use crate::registry::Registry;

/// Resources with no VPC membership.
#[derive(Debug, Clone, Default)]
pub struct Classic {
    pub instances: Vec<Ix<Instance>>,
    pub images: Vec<Ix<Image>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub load_balancers: Vec<Ix<LoadBalancer>>,
    pub auto_scaling_groups: Vec<Ix<AutoScalingGroup>>,
    pub database_instances: Vec<Ix<DatabaseInstance>>,
    pub cache_clusters: Vec<Ix<CacheCluster>>,
    pub zones: Vec<Ix<ZoneView>>,
}

impl Classic {
    fn canonicalize(&mut self) {
        canonicalize(&mut self.instances);
        canonicalize(&mut self.images);
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.load_balancers);
        canonicalize(&mut self.auto_scaling_groups);
        canonicalize(&mut self.database_instances);
        canonicalize(&mut self.cache_clusters);
        canonicalize(&mut self.zones);
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
            && self.load_balancers.is_empty()
            && self.database_instances.is_empty()
            && self.cache_clusters.is_empty()
    }
}

macro_rules! entity_table {
    ($($variant:ident => $field:ident),* $(,)?) => {
        /// Per-kind loader output for one cycle, keyed by provider id.
        #[derive(Debug, Default)]
        pub struct Discovered {
            $(pub $field: HashMap<String, $variant>,)*
        }

        impl Discovered {
            pub fn counts(&self) -> Vec<(ResourceKind, usize)> {
                vec![$((<$variant as Entity>::KIND, self.$field.len()),)*]
            }
        }

        /// One complete, internally consistent snapshot of a region.
        ///
        /// Each arena is stored in its kind's canonical order, so iterating an
        /// arena yields the region-wide sorted collection.
        #[derive(Debug, Default)]
        pub struct Generation {
            pub number: u64,
            $(pub $field: Arena<$variant>,)*
            pub zone_views: Arena<ZoneView>,
            pub classic: Classic,
            pub registry: Registry,
        }

        /// Provider key to handle, per kind.
        #[derive(Debug, Default)]
        pub(crate) struct Keys {
            $(pub $field: HashMap<String, Ix<$variant>>,)*
        }

        /// Kind-erased handle to any entity of a generation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum EntityRef {
            $($variant(Ix<$variant>),)*
        }

        impl EntityRef {
            pub fn kind(self) -> ResourceKind {
                match self {
                    $(EntityRef::$variant(_) => <$variant as Entity>::KIND,)*
                }
            }
        }

        $(
            impl From<Ix<$variant>> for EntityRef {
                fn from(ix: Ix<$variant>) -> Self {
                    EntityRef::$variant(ix)
                }
            }
        )*

        impl Generation {
            /// Moves loaded entities into arenas in canonical order.
            pub(crate) fn arrange(discovered: Discovered, number: u64) -> (Self, Keys) {
                let mut generation = Generation {
                    number,
                    ..Default::default()
                };
                let mut keys = Keys::default();
                $(
                    let mut values: Vec<$variant> = discovered.$field.into_values().collect();
                    values.sort_by(|a, b| a.canonical_cmp(b));
                    keys.$field = values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (v.key().to_string(), Ix::new(i)))
                        .collect();
                    generation.$field = Arena::from_vec(values);
                )*
                (generation, keys)
            }

            pub fn name_of(&self, entity: EntityRef) -> &str {
                match entity {
                    $(EntityRef::$variant(ix) => self.$field[ix].name(),)*
                }
            }

            pub fn key_of(&self, entity: EntityRef) -> &str {
                match entity {
                    $(EntityRef::$variant(ix) => self.$field[ix].key(),)*
                }
            }

            pub fn identity_of(&self, entity: EntityRef) -> String {
                match entity {
                    $(EntityRef::$variant(ix) => self.$field[ix].identity(),)*
                }
            }

            pub fn counts(&self) -> Vec<(ResourceKind, usize)> {
                vec![$((<$variant as Entity>::KIND, self.$field.len()),)*]
            }

            pub fn entity_count(&self) -> usize {
                0 $(+ self.$field.len())*
            }

            pub(crate) fn build_registry(&mut self) -> Result<()> {
                let mut registry = Registry::with_capacity(self.entity_count());
                $(
                    for (ix, entity) in self.$field.iter() {
                        registry.insert(entity.identity(), EntityRef::$variant(ix))?;
                    }
                )*
                self.registry = registry;
                Ok(())
            }
        }
    };
}

entity_table! {
    Vpc => vpcs,
    Subnet => subnets,
    Instance => instances,
    SecurityGroup => security_groups,
    NetworkAcl => network_acls,
    RouteTable => route_tables,
    LoadBalancer => load_balancers,
    AvailabilityZone => availability_zones,
    InternetGateway => internet_gateways,
    CustomerGateway => customer_gateways,
    VpnGateway => vpn_gateways,
    VpnConnection => vpn_connections,
    VpcEndpoint => vpc_endpoints,
    PeeringConnection => peering_connections,
    AutoScalingGroup => auto_scaling_groups,
    Image => images,
    DatabaseInstance => database_instances,
    CacheCluster => cache_clusters,
    Queue => queues,
    Topic => topics,
    Subscription => subscriptions,
    Alarm => alarms,
    Function => functions,
    NetworkInterface => network_interfaces,
    NatGateway => nat_gateways,
}

impl Generation {
    /// Resolves an identity string such as `inst:i-0abc` to its entity.
    pub fn lookup(&self, identity: &str) -> Option<EntityRef> {
        self.registry.get(identity)
    }

    pub fn require(&self, identity: &str) -> Result<EntityRef> {
        self.lookup(identity)
            .ok_or_else(|| InfraGraphError::NotFound(identity.to_string()))
    }

    pub fn instance_by_id(&self, instance_id: &str) -> Option<Ix<Instance>> {
        match self.lookup(&ResourceKind::Instance.identity(instance_id))? {
            EntityRef::Instance(ix) => Some(ix),
            _ => None,
        }
    }

    /// Sorts and deduplicates every association list.
    pub(crate) fn canonicalize_links(&mut self) {
        self.vpcs.values_mut().for_each(|e| e.links.canonicalize());
        self.subnets.values_mut().for_each(|e| e.links.canonicalize());
        self.instances.values_mut().for_each(|e| e.links.canonicalize());
        for group in self.security_groups.values_mut() {
            group.links.canonicalize();
            group.sort_permissions();
        }
        self.network_acls.values_mut().for_each(|e| e.links.canonicalize());
        self.route_tables.values_mut().for_each(|e| e.links.canonicalize());
        self.load_balancers.values_mut().for_each(|e| e.links.canonicalize());
        self.availability_zones.values_mut().for_each(|e| e.links.canonicalize());
        self.internet_gateways.values_mut().for_each(|e| e.links.canonicalize());
        self.customer_gateways.values_mut().for_each(|e| e.links.canonicalize());
        self.vpn_gateways.values_mut().for_each(|e| e.links.canonicalize());
        self.vpn_connections.values_mut().for_each(|e| e.links.canonicalize());
        self.vpc_endpoints.values_mut().for_each(|e| e.links.canonicalize());
        self.peering_connections.values_mut().for_each(|e| e.links.canonicalize());
        self.auto_scaling_groups.values_mut().for_each(|e| e.links.canonicalize());
        self.images.values_mut().for_each(|e| e.links.canonicalize());
        self.database_instances.values_mut().for_each(|e| e.links.canonicalize());
        self.cache_clusters.values_mut().for_each(|e| e.links.canonicalize());
        self.queues.values_mut().for_each(|e| e.links.canonicalize());
        self.topics.values_mut().for_each(|e| e.links.canonicalize());
        self.alarms.values_mut().for_each(|e| e.links.canonicalize());
        self.functions.values_mut().for_each(|e| e.links.canonicalize());
        self.nat_gateways.values_mut().for_each(|e| e.links.canonicalize());
        self.zone_views.values_mut().for_each(|e| e.links.canonicalize());
        self.classic.canonicalize();
    }
}
