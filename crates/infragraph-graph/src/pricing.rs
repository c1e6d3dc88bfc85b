//! On-demand price lookup for instances, databases and cache clusters.
//!
//! Rows are keyed `offer:term:option:type:os` (cache keys omit the option).
//! The table is ingested elsewhere and shared across generations.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use infragraph_core::Result;

use crate::entities::{CacheCluster, DatabaseInstance, Image, Instance};

const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

const ON_DEMAND: &str = "OnDemand";
const EC2_OFFER: &str = "AmazonEC2";
const RDS_OFFER: &str = "AmazonRDS";
const ELASTICACHE_OFFER: &str = "AmazonElastiCache";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRow {
    pub price_per_unit: f64,
    pub unit: String,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable {
    rows: HashMap<String, PriceRow>,
}

impl PriceTable {
    pub fn new(rows: HashMap<String, PriceRow>) -> Self {
        Self { rows }
    }

    /// Reads a JSON object of key to row.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PriceRow> {
        self.rows.get(key)
    }

    fn hourly(&self, key: &str) -> f64 {
        self.get(key).map_or(0.0, |row| row.price_per_unit)
    }

    /// Zero when no row matches.
    pub fn instance_hourly(&self, instance: &Instance, image: Option<&Image>) -> f64 {
        self.hourly(&instance_price_key(instance, image))
    }

    pub fn instance_monthly(&self, instance: &Instance, image: Option<&Image>) -> f64 {
        self.instance_hourly(instance, image) * HOURS_PER_MONTH
    }

    pub fn database_hourly(&self, db: &DatabaseInstance) -> f64 {
        self.hourly(&database_price_key(db))
    }

    pub fn database_monthly(&self, db: &DatabaseInstance) -> f64 {
        self.database_hourly(db) * HOURS_PER_MONTH
    }

    pub fn cache_hourly(&self, cluster: &CacheCluster) -> f64 {
        self.hourly(&cache_price_key(cluster))
    }

    pub fn cache_monthly(&self, cluster: &CacheCluster) -> f64 {
        self.cache_hourly(cluster) * HOURS_PER_MONTH
    }
}

fn tenancy(placement: &str) -> &'static str {
    match placement {
        "dedicated" => "Dedicated",
        "host" => "Host",
        _ => "Shared",
    }
}

/// The instance platform wins; otherwise the image platform is classified.
fn operating_system(instance: &Instance, image: Option<&Image>) -> &'static str {
    if instance.is_windows() {
        return "Windows";
    }
    let platform = image.and_then(|i| i.platform.as_deref()).unwrap_or_default();
    if platform.contains("Windows") || platform.eq_ignore_ascii_case("windows") {
        "Windows"
    } else if platform.contains("RHEL") {
        "RHEL"
    } else if platform.contains("SUSE") {
        "SUSE"
    } else {
        "Linux"
    }
}

pub fn instance_price_key(instance: &Instance, image: Option<&Image>) -> String {
    format!(
        "{EC2_OFFER}:{ON_DEMAND}:{}:{}:{}",
        tenancy(&instance.placement.tenancy),
        instance.instance_type,
        operating_system(instance, image)
    )
}

pub fn database_price_key(db: &DatabaseInstance) -> String {
    let deployment = if db.multi_az { "Multi-AZ" } else { "Single-AZ" };
    let engine = match db.engine.as_str() {
        "amazonaurora" | "aurora" => "Amazon Aurora",
        "mariadb" => "MariaDB",
        "mysql" => "MySQL",
        "oracle" => "Oracle",
        "postgres" => "PostgreSQL",
        "sqlserver" => "SQL Server",
        _ => "",
    };
    format!(
        "{RDS_OFFER}:{ON_DEMAND}:{deployment}:{}:{engine}",
        db.db_instance_class
    )
}

pub fn cache_price_key(cluster: &CacheCluster) -> String {
    let engine = match cluster.engine.as_str() {
        "redis" => "Redis",
        "memcached" => "Memcached",
        _ => "",
    };
    format!(
        "{ELASTICACHE_OFFER}:{ON_DEMAND}:{}:{engine}",
        cluster.cache_node_type
    )
}
