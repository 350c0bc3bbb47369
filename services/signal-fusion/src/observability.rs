//! Observability: scan metrics and structured fusion logging

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::types::{Grade, TradingCall};

/// Metrics collector for scan and fusion health
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<RwLock<MetricsInner>>,
}

struct MetricsInner {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, Vec<f64>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner {
                counters: HashMap::new(),
                gauges: HashMap::new(),
                histograms: HashMap::new(),
                start_time: Instant::now(),
            })),
        }
    }

    /// Increment a counter
    pub async fn increment(&self, name: &str, value: u64) {
        let mut inner = self.inner.write().await;
        *inner.counters.entry(name.to_string()).or_insert(0) += value;
    }

    /// Set a gauge value
    pub async fn gauge(&self, name: &str, value: f64) {
        let mut inner = self.inner.write().await;
        inner.gauges.insert(name.to_string(), value);
    }

    /// Record a histogram value
    pub async fn histogram(&self, name: &str, value: f64) {
        let mut inner = self.inner.write().await;
        inner
            .histograms
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    /// Record everything a finished call contributes
    pub async fn record_call(&self, call: &TradingCall) {
        let grade_counter = match call.grade {
            Grade::AiGrade => metrics::GRADE_AI,
            Grade::HighGrade => metrics::GRADE_HIGH,
            Grade::Standard => metrics::GRADE_STANDARD,
        };

        let mut inner = self.inner.write().await;
        *inner.counters.entry(metrics::CALLS_GENERATED.to_string()).or_insert(0) += 1;
        *inner.counters.entry(grade_counter.to_string()).or_insert(0) += 1;
        if !call.consensus.passes_filter {
            *inner.counters.entry(metrics::WEAK_CONSENSUS.to_string()).or_insert(0) += 1;
        }
        inner
            .histograms
            .entry(metrics::FINAL_CONFIDENCE.to_string())
            .or_default()
            .push(call.final_confidence);
        inner
            .gauges
            .insert(metrics::LAST_CONFIDENCE.to_string(), call.final_confidence);
    }

    /// Get all metrics as JSON-serializable format
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read().await;
        let histograms = inner
            .histograms
            .iter()
            .map(|(name, values)| (name.clone(), HistogramSummary::from_values(values)))
            .collect();
        MetricsSnapshot {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            histograms,
            uptime_secs: inner.start_time.elapsed().as_secs(),
        }
    }

    /// Get specific counter
    pub async fn get_counter(&self, name: &str) -> u64 {
        let inner = self.inner.read().await;
        inner.counters.get(name).copied().unwrap_or(0)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Count, mean and range of a histogram
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HistogramSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        Self {
            count: values.len(),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub histograms: HashMap<String, HistogramSummary>,
    pub uptime_secs: u64,
}

/// Structured logger for consistent log formatting
pub struct Logger;

impl Logger {
    /// Log a structured event
    pub fn event(level: tracing::Level, component: &str, event: &str, attributes: &[(&str, &str)]) {
        let attrs = attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");

        match level {
            tracing::Level::ERROR => tracing::error!(component, event, %attrs),
            tracing::Level::WARN => tracing::warn!(component, event, %attrs),
            tracing::Level::INFO => tracing::info!(component, event, %attrs),
            tracing::Level::DEBUG => tracing::debug!(component, event, %attrs),
            _ => tracing::trace!(component, event, %attrs),
        }
    }

    /// Log a produced call
    pub fn fusion_event(call: &TradingCall) {
        tracing::info!(
            call_id = %call.call_id,
            symbol = %call.symbol,
            signal = %call.signal_label(),
            grade = %call.grade,
            summary = %call.summary_line(),
            "fusion_event"
        );
    }

    /// Log a scan lifecycle step
    pub fn scan_event(symbol: &str, event_type: &str, details: &str) {
        tracing::info!(
            symbol = %symbol,
            event_type = %event_type,
            details = %details,
            "scan_event"
        );
    }
}

/// Predefined metric names
pub mod metrics {
    // Scans
    pub const SCANS_STARTED: &str = "scans_started_total";
    pub const SCANS_SKIPPED: &str = "scans_skipped_total";
    pub const SCAN_DURATION_MS: &str = "scan_duration_ms";

    // Providers
    pub const PROVIDER_FAILURES: &str = "provider_failures_total";
    pub const PHASES_RECEIVED: &str = "phases_received_total";

    // Calls
    pub const CALLS_GENERATED: &str = "calls_generated_total";
    pub const CALLS_FAILED: &str = "calls_failed_total";
    pub const WEAK_CONSENSUS: &str = "weak_consensus_total";
    pub const GRADE_AI: &str = "grade_ai_total";
    pub const GRADE_HIGH: &str = "grade_high_total";
    pub const GRADE_STANDARD: &str = "grade_standard_total";

    // Confidence
    pub const FINAL_CONFIDENCE: &str = "final_confidence";
    pub const LAST_CONFIDENCE: &str = "last_confidence";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_and_histograms() {
        let collector = MetricsCollector::new();
        collector.increment(metrics::SCANS_STARTED, 2).await;
        collector.increment(metrics::SCANS_STARTED, 1).await;
        collector.histogram(metrics::SCAN_DURATION_MS, 4.0).await;
        collector.histogram(metrics::SCAN_DURATION_MS, 8.0).await;
        collector.gauge(metrics::LAST_CONFIDENCE, 72.0).await;

        assert_eq!(collector.get_counter(metrics::SCANS_STARTED).await, 3);
        assert_eq!(collector.get_counter(metrics::CALLS_FAILED).await, 0);

        let snapshot = collector.snapshot().await;
        let durations = snapshot.histograms[metrics::SCAN_DURATION_MS];
        assert_eq!(durations.count, 2);
        assert_eq!(durations.mean, 6.0);
        assert_eq!(durations.max, 8.0);
        assert_eq!(snapshot.gauges[metrics::LAST_CONFIDENCE], 72.0);
    }
}
