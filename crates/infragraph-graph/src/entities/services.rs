use serde::{Deserialize, Serialize};

use infragraph_core::{Dimension, ResourceKind};

use super::{
    AutoScalingGroup, AvailabilityZone, CacheStats, DatabaseStats, Entity, QueueStats,
    SecurityGroup, StatsCell, TopicStats, Vpc, ZoneView,
};
use crate::arena::{canonicalize, Ix};
use crate::generation::EntityRef;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseInstance {
    pub db_instance_identifier: String,
    pub db_instance_class: String,
    pub engine: String,
    pub engine_version: String,
    pub status: String,
    pub availability_zone: Option<String>,
    pub multi_az: bool,
    pub allocated_storage_gb: i64,
    /// VPC of the instance's subnet group, absent for Classic databases
    pub subnet_group_vpc_id: Option<String>,
    pub vpc_security_group_ids: Vec<String>,
    #[serde(skip)]
    pub stats: StatsCell<DatabaseStats>,
    #[serde(skip)]
    pub links: DatabaseLinks,
}

impl Entity for DatabaseInstance {
    const KIND: ResourceKind = ResourceKind::DatabaseInstance;

    fn key(&self) -> &str {
        &self.db_instance_identifier
    }

    fn name(&self) -> &str {
        &self.db_instance_identifier
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseLinks {
    pub vpc: Option<Ix<Vpc>>,
    pub classic: bool,
    pub zone: Option<Ix<AvailabilityZone>>,
    pub zone_view: Option<Ix<ZoneView>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub alarms: Vec<Ix<Alarm>>,
}

impl DatabaseLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.alarms);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCluster {
    pub cache_cluster_id: String,
    pub engine: String,
    pub engine_version: String,
    pub cache_node_type: String,
    pub status: String,
    pub num_cache_nodes: i64,
    /// Zone of each cache node
    pub node_availability_zones: Vec<String>,
    /// VPC security group ids
    pub security_group_ids: Vec<String>,
    /// Classic cache security group names
    pub cache_security_group_names: Vec<String>,
    #[serde(skip)]
    pub stats: StatsCell<CacheStats>,
    #[serde(skip)]
    pub links: CacheLinks,
}

impl Entity for CacheCluster {
    const KIND: ResourceKind = ResourceKind::CacheCluster;

    fn key(&self) -> &str {
        &self.cache_cluster_id
    }

    fn name(&self) -> &str {
        &self.cache_cluster_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheLinks {
    pub vpc: Option<Ix<Vpc>>,
    pub classic: bool,
    pub zones: Vec<Ix<AvailabilityZone>>,
    pub security_groups: Vec<Ix<SecurityGroup>>,
    pub alarms: Vec<Ix<Alarm>>,
}

impl CacheLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.zones);
        canonicalize(&mut self.security_groups);
        canonicalize(&mut self.alarms);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Queue {
    pub queue_url: String,
    pub queue_arn: String,
    pub approximate_number_of_messages: i64,
    pub approximate_number_of_messages_not_visible: i64,
    pub visibility_timeout_secs: i64,
    #[serde(skip)]
    pub stats: StatsCell<QueueStats>,
    #[serde(skip)]
    pub links: QueueLinks,
}

impl Entity for Queue {
    const KIND: ResourceKind = ResourceKind::Queue;

    fn key(&self) -> &str {
        &self.queue_url
    }

    /// Last path segment of the queue URL.
    fn name(&self) -> &str {
        self.queue_url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(&self.queue_url)
    }

    fn identity_key(&self) -> &str {
        &self.queue_arn
    }
}

impl Queue {
    pub fn inactive(&self) -> bool {
        match self.stats.read().as_ref() {
            Some(stats) => {
                stats.sent_per_second == 0.0
                    && stats.empty_receives_per_second == 0.0
                    && self.approximate_number_of_messages == 0
            }
            None => self.approximate_number_of_messages == 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueLinks {
    /// Topic subscriptions delivering into this queue
    pub subscriptions: Vec<Ix<Subscription>>,
}

impl QueueLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subscriptions);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    pub topic_arn: String,
    pub display_name: String,
    #[serde(skip)]
    pub stats: StatsCell<TopicStats>,
    #[serde(skip)]
    pub links: TopicLinks,
}

impl Topic {
    /// Text after the last `:` of the ARN.
    pub fn topic_name(&self) -> &str {
        self.topic_arn
            .rsplit(':')
            .next()
            .unwrap_or(&self.topic_arn)
    }

    pub fn inactive(&self) -> bool {
        self.links.subscriptions.is_empty()
            || self
                .stats
                .read()
                .as_ref()
                .is_some_and(|s| s.published_per_second == 0.0)
    }
}

impl Entity for Topic {
    const KIND: ResourceKind = ResourceKind::Topic;

    fn key(&self) -> &str {
        &self.topic_arn
    }

    fn name(&self) -> &str {
        if self.display_name.is_empty() {
            self.topic_name()
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicLinks {
    pub subscriptions: Vec<Ix<Subscription>>,
    /// Alarms notifying this topic in any state
    pub alarms: Vec<Ix<Alarm>>,
}

impl TopicLinks {
    pub(crate) fn canonicalize(&mut self) {
        canonicalize(&mut self.subscriptions);
        canonicalize(&mut self.alarms);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub subscription_arn: String,
    pub topic_arn: String,
    pub endpoint: String,
    pub protocol: String,
    pub owner: String,
    #[serde(skip)]
    pub links: SubscriptionLinks,
}

impl Entity for Subscription {
    const KIND: ResourceKind = ResourceKind::Subscription;

    fn key(&self) -> &str {
        &self.subscription_arn
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionLinks {
    pub topic: Option<Ix<Topic>>,
    pub queue: Option<Ix<Queue>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alarm {
    pub alarm_arn: String,
    pub alarm_name: String,
    pub alarm_description: String,
    pub actions_enabled: bool,
    pub state_value: String,
    pub state_reason: String,
    pub namespace: String,
    pub metric_name: String,
    pub comparison_operator: String,
    pub threshold: f64,
    pub dimensions: Vec<Dimension>,
    pub alarm_actions: Vec<String>,
    pub ok_actions: Vec<String>,
    pub insufficient_data_actions: Vec<String>,
    #[serde(skip)]
    pub links: AlarmLinks,
}

impl Entity for Alarm {
    const KIND: ResourceKind = ResourceKind::Alarm;

    fn key(&self) -> &str {
        &self.alarm_arn
    }

    fn name(&self) -> &str {
        &self.alarm_name
    }
}

impl Alarm {
    pub fn inactive(&self) -> bool {
        !self.actions_enabled
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlarmLinks {
    /// Entities named by the alarm's dimensions
    pub targets: Vec<EntityRef>,
    pub alarm_topics: Vec<Ix<Topic>>,
    pub ok_topics: Vec<Ix<Topic>>,
    pub insufficient_data_topics: Vec<Ix<Topic>>,
    pub alarm_groups: Vec<Ix<AutoScalingGroup>>,
    pub ok_groups: Vec<Ix<AutoScalingGroup>>,
    pub insufficient_data_groups: Vec<Ix<AutoScalingGroup>>,
}

impl AlarmLinks {
    pub(crate) fn canonicalize(&mut self) {
        self.targets.sort_unstable();
        self.targets.dedup();
        canonicalize(&mut self.alarm_topics);
        canonicalize(&mut self.ok_topics);
        canonicalize(&mut self.insufficient_data_topics);
        canonicalize(&mut self.alarm_groups);
        canonicalize(&mut self.ok_groups);
        canonicalize(&mut self.insufficient_data_groups);
    }
}
