use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One aggregated metric request covering a single period.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub namespace: &'static str,
    pub metric_name: &'static str,
    pub dimension: Dimension,
    pub statistics: &'static [Statistic],
    pub unit: &'static str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: u32,
}

impl MetricQuery {
    /// Window ending now and spanning `period_minutes`.
    pub fn trailing(
        namespace: &'static str,
        metric_name: &'static str,
        dimension: Dimension,
        statistics: &'static [Statistic],
        unit: &'static str,
        period_minutes: u32,
    ) -> Self {
        let end = Utc::now();
        Self {
            namespace,
            metric_name,
            dimension,
            statistics,
            unit,
            start: end - Duration::minutes(i64::from(period_minutes)),
            end,
            period_secs: period_minutes * 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub average: Option<f64>,
    pub sum: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub sample_count: Option<f64>,
}

/// Source of aggregated monitoring statistics.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Returns the single datapoint for the query window, if the provider has one.
    async fn statistics(&self, query: &MetricQuery) -> Result<Option<Datapoint>>;
}

/// Metrics source that never has data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

#[async_trait]
impl MetricsSource for NullMetrics {
    async fn statistics(&self, _query: &MetricQuery) -> Result<Option<Datapoint>> {
        Ok(None)
    }
}

/// Most recent host-level observation collected from inside an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSummary {
    pub timestamp: Option<DateTime<Utc>>,
    pub memory_total: u64,
    pub memory_percent_used: f64,
    pub swap_percent_used: f64,
    pub cpu_percent_used: f64,
    pub load_average: f64,
    pub disk_percent_used: f64,
    pub network_bytes_in_per_sec: u64,
    pub network_bytes_out_per_sec: u64,
    pub processes: u64,
}

/// A live session against one host.
#[async_trait]
pub trait HostCollector: Send + Sync {
    async fn poll(&self) -> Result<()>;
    fn summary(&self) -> Option<HostSummary>;
}

impl fmt::Debug for dyn HostCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCollector")
            .field("summary", &self.summary())
            .finish()
    }
}

/// What a connector needs to reach an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    pub instance_id: String,
    pub key_name: String,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub platform: Option<String>,
}

/// Opens collectors for instances when remote access is configured.
#[async_trait]
pub trait HostConnector: Send + Sync {
    /// `Ok(None)` means the host was reached but no usable login exists.
    async fn connect(&self, target: &HostTarget) -> Result<Option<Arc<dyn HostCollector>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_metrics_has_no_data() {
        let query = MetricQuery::trailing(
            "AWS/ELB",
            "RequestCount",
            Dimension::new("LoadBalancerName", "web"),
            &[Statistic::Sum],
            "Count",
            10,
        );
        assert_eq!(query.period_secs, 600);
        assert_eq!(query.end - query.start, Duration::minutes(10));
        assert!(NullMetrics.statistics(&query).await.unwrap().is_none());
    }
}
