//! Prometheus metrics for the KPI service
//!
//! Two sources feed the `/metrics` output: the orchestrator's cache counters,
//! written by hand in text exposition format, and a per-service prometheus
//! registry holding request counters and latency histograms.

use std::fmt::{Display, Write};
use std::sync::Arc;

use prometheus::{
    Encoder, HistogramOpts, HistogramTimer, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::cache::{CacheStats, CacheStatsSnapshot};
use crate::error::{Error, Result};

/// Latency buckets in seconds, from cache hits up to slow warehouse scans
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Request counters and latency histograms
pub struct ServiceMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
}

impl ServiceMetrics {
    /// Create the metrics and register them in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("kpi_requests_total", "KPI section requests by outcome"),
            &["section", "outcome"],
        )
        .map_err(metrics_error)?;

        let latency = HistogramVec::new(
            HistogramOpts::new(
                "kpi_request_duration_seconds",
                "KPI section request latency, cache hits included",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["section"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(requests.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(latency.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            requests,
            latency,
        })
    }

    /// Start timing a request for `section`
    pub fn start_timer(&self, section: &str) -> HistogramTimer {
        self.latency.with_label_values(&[section]).start_timer()
    }

    /// Count a finished request by outcome
    pub fn record_request<T>(&self, section: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(Error::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        self.requests.with_label_values(&[section, outcome]).inc();
    }

    /// Requests seen for `section` with `outcome`
    pub fn request_count(&self, section: &str, outcome: &str) -> u64 {
        self.requests.with_label_values(&[section, outcome]).get()
    }

    /// The registry holding these metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Configuration(format!("Failed to set up metrics: {}", e))
}

/// Configuration for Prometheus exporter
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Prefix for the hand-written cache metrics (default: "retail_kpi_cache")
    pub metric_prefix: String,
    /// Append metrics from the process-wide prometheus registry
    pub include_global_metrics: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            metric_prefix: "retail_kpi_cache".to_string(),
            include_global_metrics: true,
        }
    }
}

/// Prometheus metrics exporter
///
/// Formats metrics in Prometheus text exposition format for scraping
/// by Prometheus or compatible monitoring systems.
pub struct PrometheusExporter {
    config: PrometheusConfig,
    cache_stats: Arc<CacheStats>,
    registry: Registry,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter
    pub fn new(config: PrometheusConfig, cache_stats: Arc<CacheStats>, registry: Registry) -> Self {
        Self {
            config,
            cache_stats,
            registry,
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let mut output = String::new();
        let snapshot = self.cache_stats.snapshot();

        self.export_cache_metrics(&mut output, &self.config.metric_prefix, &snapshot);

        if let Ok(service_metrics) = encode(&self.registry.gather()) {
            output.push_str(&service_metrics);
        }

        if self.config.include_global_metrics {
            if let Ok(global_metrics) = encode(&prometheus::gather()) {
                output.push_str(&global_metrics);
            }
        }

        output
    }

    fn export_cache_metrics(&self, output: &mut String, prefix: &str, s: &CacheStatsSnapshot) {
        write_metric(output, prefix, "hits_total", "counter", "Cache hits", s.hits);
        write_metric(output, prefix, "misses_total", "counter", "Cache misses", s.misses);
        write_metric(
            output,
            prefix,
            "bypasses_total",
            "counter",
            "Requests computed directly because the cache was not ready",
            s.bypasses,
        );
        write_metric(
            output,
            prefix,
            "read_errors_total",
            "counter",
            "Cache reads that failed and were treated as misses",
            s.read_errors,
        );
        write_metric(
            output,
            prefix,
            "decode_errors_total",
            "counter",
            "Cached entries that could not be decoded",
            s.decode_errors,
        );
        write_metric(output, prefix, "computes_total", "counter", "Computations run", s.computes);
        write_metric(
            output,
            prefix,
            "compute_errors_total",
            "counter",
            "Computations that failed",
            s.compute_errors,
        );
        write_metric(output, prefix, "writes_total", "counter", "Background cache writes", s.writes);
        write_metric(
            output,
            prefix,
            "write_errors_total",
            "counter",
            "Background cache writes that failed",
            s.write_errors,
        );
        write_metric(
            output,
            prefix,
            "hit_rate",
            "gauge",
            "Hits over hits plus misses (0.0-1.0)",
            format!("{:.4}", s.hit_rate()),
        );
    }

    /// Export metrics as HTTP response body with correct content type
    pub fn export_http(&self) -> (String, &'static str) {
        let body = self.export();
        let content_type = "text/plain; version=0.0.4; charset=utf-8";
        (body, content_type)
    }
}

fn write_metric(
    output: &mut String,
    prefix: &str,
    name: &str,
    kind: &str,
    help: &str,
    value: impl Display,
) {
    let _ = writeln!(output, "# HELP {}_{} {}", prefix, name, help);
    let _ = writeln!(output, "# TYPE {}_{} {}", prefix, name, kind);
    let _ = writeln!(output, "{}_{} {}\n", prefix, name, value);
}

fn encode(families: &[prometheus::proto::MetricFamily]) -> std::result::Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];

    encoder
        .encode(families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}
