/*!
 * # Metrics Module
 *
 * Metrics collection for the repricer API. Counters track sweep activity,
 * price movements, toggle traffic, and undo usage; the exposition handler
 * renders both the in-process registry and the prometheus default registry
 * in Prometheus text format at `/metrics`.
 */

use dashmap::DashMap;
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

#[derive(Debug, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.store(value as u64, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Relaxed) as f64
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Histogram {
    sum: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: Arc::new(AtomicU64::new(0)),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn observe(&self, value: f64) {
        self.sum.fetch_add(value as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<String, Counter>>,
    gauges: Arc<DashMap<String, Gauge>>,
    histograms: Arc<DashMap<String, Histogram>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            gauges: Arc::new(DashMap::new()),
            histograms: Arc::new(DashMap::new()),
        }
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges
            .entry(name.to_string())
            .or_insert_with(Gauge::new)
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    pub fn export_metrics(&self) -> String {
        let mut output = String::new();

        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, gauge.get()));
        }

        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            output.push_str(&format!("# TYPE {} histogram\n", name));
            output.push_str(&format!("{}_count {}\n", name, histogram.get_count()));
            output.push_str(&format!("{}_sum {}\n", name, histogram.get_sum()));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Global metrics registry
lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn increment_counter_by(name: &str, value: u64) {
    METRICS.get_or_create_counter(name).inc_by(value);
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

pub fn observe_histogram(name: &str, value: f64) {
    METRICS.get_or_create_histogram(name).observe(value);
}

/// Pricing-engine metrics recorded by the sweep, toggle, and undo paths.
pub struct PricingMetrics {
    pub sweeps_completed: Counter,
    pub sweeps_rejected: Counter,
    pub sweeps_in_flight: Gauge,
    pub sweep_duration: Histogram,
    pub items_processed: Counter,
    pub price_increases: Counter,
    pub price_reverts: Counter,
    pub items_held: Counter,
    pub item_errors: Counter,
    pub automation_enabled: Counter,
    pub automation_disabled: Counter,
    pub undo_applied: Counter,
    pub undo_expired: Counter,
}

impl PricingMetrics {
    pub fn new() -> Self {
        Self {
            sweeps_completed: METRICS.get_or_create_counter("pricing_sweeps_completed_total"),
            sweeps_rejected: METRICS.get_or_create_counter("pricing_sweeps_rejected_total"),
            sweeps_in_flight: METRICS.get_or_create_gauge("pricing_sweeps_in_flight"),
            sweep_duration: METRICS.get_or_create_histogram("pricing_sweep_duration_ms"),
            items_processed: METRICS.get_or_create_counter("pricing_items_processed_total"),
            price_increases: METRICS.get_or_create_counter("pricing_increases_total"),
            price_reverts: METRICS.get_or_create_counter("pricing_reverts_total"),
            items_held: METRICS.get_or_create_counter("pricing_items_held_total"),
            item_errors: METRICS.get_or_create_counter("pricing_item_errors_total"),
            automation_enabled: METRICS.get_or_create_counter("pricing_automation_enabled_total"),
            automation_disabled: METRICS.get_or_create_counter("pricing_automation_disabled_total"),
            undo_applied: METRICS.get_or_create_counter("pricing_undo_applied_total"),
            undo_expired: METRICS.get_or_create_counter("pricing_undo_expired_total"),
        }
    }

    pub fn record_sweep(&self, duration: Duration) {
        self.sweeps_completed.inc();
        self.sweep_duration.observe(duration.as_millis() as f64);
    }
}

impl Default for PricingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    pub static ref PRICING_METRICS: PricingMetrics = PricingMetrics::new();
}

/// HTTP endpoint handler for metrics. Renders the in-process registry and
/// whatever was registered in the prometheus default registry.
pub async fn metrics_handler() -> Result<String, MetricsError> {
    let mut output = METRICS.export_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    output.push_str(
        &String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))?,
    );

    Ok(output)
}
