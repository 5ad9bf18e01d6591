//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ghproxy_requests_total` (counter): requests by route kind and status
//! - `ghproxy_request_duration_seconds` (histogram): time to response head
//! - `ghproxy_redirect_hops_total` (counter): upstream redirects by disposition
//!   (`rewritten`, `followed`, `exhausted`)
//! - `ghproxy_cache_events_total` (counter): `hit`, `miss`, `queued`,
//!   `dropped`, `stored`
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "ghproxy_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("ghproxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_redirect(disposition: &'static str) {
    ::metrics::counter!("ghproxy_redirect_hops_total", "disposition" => disposition).increment(1);
}

pub fn record_cache(event: &'static str) {
    ::metrics::counter!("ghproxy_cache_events_total", "event" => event).increment(1);
}
