//! Prometheus metrics for byoid-gateway

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const METRIC_UPTIME: &str = "byoid_gateway_uptime_seconds";
const METRIC_INFO: &str = "byoid_gateway_info";

// Authentication
const METRIC_AUTH_OUTCOMES: &str = "byoid_gateway_authentications_total";

// Metadata cache
const METRIC_METADATA_HITS: &str = "byoid_gateway_metadata_cache_hits_total";
const METRIC_METADATA_MISSES: &str = "byoid_gateway_metadata_cache_misses_total";
const METRIC_DISCOVERY_FETCHES: &str = "byoid_gateway_discovery_fetches_total";
const METRIC_DISCOVERY_DURATION: &str = "byoid_gateway_discovery_fetch_duration_seconds";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Gateway uptime in seconds");
    describe_gauge!(METRIC_INFO, "Gateway information (always 1)");

    describe_counter!(
        METRIC_AUTH_OUTCOMES,
        "Authentication attempts by outcome and fault kind"
    );

    describe_counter!(METRIC_METADATA_HITS, "Provider metadata cache hits");
    describe_counter!(METRIC_METADATA_MISSES, "Provider metadata cache misses");
    describe_counter!(
        METRIC_DISCOVERY_FETCHES,
        "Discovery document and key set fetches by status"
    );
    describe_histogram!(
        METRIC_DISCOVERY_DURATION,
        "Discovery fetch duration in seconds"
    );

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record one authentication outcome.
///
/// `kind` is the fault kind for failures and `none` otherwise.
pub fn record_authentication(outcome: &str, kind: &str) {
    counter!(
        METRIC_AUTH_OUTCOMES,
        "outcome" => outcome.to_owned(),
        "kind" => kind.to_owned(),
    )
    .increment(1);
}

/// Record a metadata cache lookup.
pub fn record_metadata_lookup(hit: bool) {
    if hit {
        counter!(METRIC_METADATA_HITS).increment(1);
    } else {
        counter!(METRIC_METADATA_MISSES).increment(1);
    }
}

/// Record a discovery fetch and its duration.
pub fn record_discovery_fetch(success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(METRIC_DISCOVERY_FETCHES, "status" => status).increment(1);
    histogram!(METRIC_DISCOVERY_DURATION, "status" => status).record(elapsed.as_secs_f64());
}
