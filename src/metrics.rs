//! Per-provider call metrics: outcome counters and latency percentiles

use crate::error::ProviderErrorKind;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of latency samples kept per provider
const MAX_SAMPLES: usize = 100;

/// Snapshot of one provider's call metrics
#[derive(Debug, Clone)]
pub struct ProviderMetrics {
    /// Name of the provider
    pub provider_name: String,
    /// Total outbound calls, lifetime
    pub total_requests: u64,
    /// Calls that ended in any provider error
    pub failed_requests: u64,
    /// Failure counts broken down by error kind label
    pub errors_by_kind: HashMap<&'static str, u64>,
    /// 50th percentile latency of successful calls, in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful calls, in milliseconds
    pub latency_p99_ms: f64,
    /// Fraction of calls that succeeded (1.0 when nothing was recorded)
    pub success_rate: f64,
}

#[derive(Debug, Default)]
struct ProviderRecord {
    total: u64,
    failed: u64,
    errors_by_kind: HashMap<ProviderErrorKind, u64>,
    /// Rolling window of successful-call latencies, in milliseconds
    latencies_ms: VecDeque<f64>,
}

impl ProviderRecord {
    fn push_latency(&mut self, duration: Duration) {
        if self.latencies_ms.len() >= MAX_SAMPLES {
            self.latencies_ms.pop_front();
        }
        self.latencies_ms.push_back(duration.as_secs_f64() * 1000.0);
    }
}

/// Collects call outcomes for every provider the tracker talks to
#[derive(Default)]
pub struct MetricsCollector {
    records: RwLock<HashMap<&'static str, ProviderRecord>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful provider call
    pub async fn record_success(&self, provider: &'static str, latency: Duration) {
        let mut records = self.records.write().await;
        let record = records.entry(provider).or_default();
        record.total += 1;
        record.push_latency(latency);
    }

    /// Records a failed provider call with its error classification
    pub async fn record_failure(&self, provider: &'static str, kind: ProviderErrorKind) {
        let mut records = self.records.write().await;
        let record = records.entry(provider).or_default();
        record.total += 1;
        record.failed += 1;
        *record.errors_by_kind.entry(kind).or_insert(0) += 1;
    }

    /// Current metrics for every provider seen so far
    pub async fn all_metrics(&self) -> Vec<ProviderMetrics> {
        let records = self.records.read().await;
        let mut metrics: Vec<ProviderMetrics> = records
            .iter()
            .map(|(name, record)| Self::to_metrics(name, record))
            .collect();
        metrics.sort_by(|a, b| a.provider_name.cmp(&b.provider_name));
        metrics
    }

    /// Current metrics for one provider, if it has been called
    pub async fn provider_metrics(&self, provider: &str) -> Option<ProviderMetrics> {
        let records = self.records.read().await;
        records
            .get(provider)
            .map(|record| Self::to_metrics(provider, record))
    }

    fn to_metrics(name: &str, record: &ProviderRecord) -> ProviderMetrics {
        let mut latencies: Vec<f64> = record.latencies_ms.iter().copied().collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if record.total > 0 {
            (record.total - record.failed) as f64 / record.total as f64
        } else {
            1.0
        };

        ProviderMetrics {
            provider_name: name.to_string(),
            total_requests: record.total,
            failed_requests: record.failed,
            errors_by_kind: record
                .errors_by_kind
                .iter()
                .map(|(kind, count)| (kind.as_str(), *count))
                .collect(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
