//! Live observations attached to entities after a generation is built.
//!
//! These sit behind their own locks so pollers can update them on a
//! published generation without taking the region lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use infragraph_core::{HostCollector, HostSummary};

pub type Shared<T> = Arc<RwLock<T>>;

/// Stats cell: `None` until the first successful poll.
pub type StatsCell<T> = Shared<Option<T>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Latency {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadBalancerStats {
    pub requests_per_second: f64,
    pub unhealthy_hosts_avg: f64,
    pub latency: Latency,
    pub http_2xx_per_second: f64,
    pub http_3xx_per_second: f64,
    pub http_4xx_per_second: f64,
    pub http_5xx_per_second: f64,
    pub backend_connection_errors_avg: f64,
    pub surge_queue_length_avg: f64,
    pub spillover_count_avg: f64,
    pub polled_at: Option<DateTime<Utc>>,
}

impl LoadBalancerStats {
    /// Combines per-balancer stats into one region-wide figure.
    /// Rates add up; averages and latency are averaged over the inputs.
    pub fn summarize<'a>(stats: impl IntoIterator<Item = &'a LoadBalancerStats>) -> Option<Self> {
        let mut total = Self::default();
        let mut count = 0.0;
        for s in stats {
            count += 1.0;
            total.requests_per_second += s.requests_per_second;
            total.http_2xx_per_second += s.http_2xx_per_second;
            total.http_3xx_per_second += s.http_3xx_per_second;
            total.http_4xx_per_second += s.http_4xx_per_second;
            total.http_5xx_per_second += s.http_5xx_per_second;
            total.unhealthy_hosts_avg += s.unhealthy_hosts_avg;
            total.backend_connection_errors_avg += s.backend_connection_errors_avg;
            total.surge_queue_length_avg += s.surge_queue_length_avg;
            total.spillover_count_avg += s.spillover_count_avg;
            total.latency.avg_ms += s.latency.avg_ms;
            total.latency.max_ms = total.latency.max_ms.max(s.latency.max_ms);
            if count == 1.0 || s.latency.min_ms < total.latency.min_ms {
                total.latency.min_ms = s.latency.min_ms;
            }
            total.polled_at = total.polled_at.max(s.polled_at);
        }
        if count == 0.0 {
            return None;
        }
        total.latency.avg_ms /= count;
        total.unhealthy_hosts_avg /= count;
        total.backend_connection_errors_avg /= count;
        total.surge_queue_length_avg /= count;
        total.spillover_count_avg /= count;
        Some(total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseStats {
    pub cpu_utilization: f64,
    pub database_connections: i64,
    pub freeable_memory: i64,
    pub free_storage_space: i64,
    pub read_iops: f64,
    pub write_iops: f64,
    pub read_latency: Latency,
    pub write_latency: Latency,
    pub polled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub cpu_utilization: f64,
    pub freeable_memory: i64,
    pub curr_connections: i64,
    pub evictions_per_second: f64,
    pub hits_per_second: f64,
    pub misses_per_second: f64,
    pub polled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub sent_per_second: f64,
    pub message_size_avg_bytes: i64,
    pub received_per_second: f64,
    pub empty_receives_per_second: f64,
    pub deleted_per_second: f64,
    pub polled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicStats {
    pub published_per_second: f64,
    pub publish_size_avg_bytes: i64,
    pub delivered_per_second: f64,
    pub failed_per_second: f64,
    pub polled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionStats {
    pub invocations_per_second: f64,
    pub errors_per_second: f64,
    pub throttles_per_second: f64,
    pub duration: Latency,
    pub polled_at: Option<DateTime<Utc>>,
}

/// What the host poll path has learned about an instance. Publish copies it
/// into the replacing generation's own cell.
#[derive(Debug, Clone, Default)]
pub struct HostObservation {
    pub unreachable: bool,
    pub reason: Option<String>,
    pub summary: Option<HostSummary>,
    pub collector: Option<Arc<dyn HostCollector>>,
}

impl HostObservation {
    pub fn mark_unreachable(&mut self, reason: impl Into<String>) {
        self.unreachable = true;
        self.reason = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_adds_rates_and_averages_the_rest() {
        let a = LoadBalancerStats {
            requests_per_second: 10.0,
            unhealthy_hosts_avg: 1.0,
            latency: Latency {
                min_ms: 5.0,
                avg_ms: 20.0,
                max_ms: 90.0,
            },
            ..Default::default()
        };
        let b = LoadBalancerStats {
            requests_per_second: 4.0,
            unhealthy_hosts_avg: 3.0,
            latency: Latency {
                min_ms: 2.0,
                avg_ms: 40.0,
                max_ms: 60.0,
            },
            ..Default::default()
        };

        let total = LoadBalancerStats::summarize([&a, &b]).unwrap();
        assert_eq!(total.requests_per_second, 14.0);
        assert_eq!(total.unhealthy_hosts_avg, 2.0);
        assert_eq!(total.latency.min_ms, 2.0);
        assert_eq!(total.latency.avg_ms, 30.0);
        assert_eq!(total.latency.max_ms, 90.0);
        assert!(LoadBalancerStats::summarize(Vec::<&LoadBalancerStats>::new()).is_none());
    }
}
