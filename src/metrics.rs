use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`
/// and pre-register the synchronizer counters at zero.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    counter!("push_events_total", "event" => "price_update").absolute(0);
    counter!("push_events_total", "event" => "new_signal").absolute(0);
    counter!("push_events_malformed_total").absolute(0);
    counter!("stale_detail_discarded_total").absolute(0);
    counter!("ws_reconnects_total").absolute(0);

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_push_event(event: &'static str) {
    counter!("push_events_total", "event" => event).increment(1);
}

pub fn record_malformed_push() {
    counter!("push_events_malformed_total").increment(1);
}

pub fn record_fetch_failure(operation: &'static str) {
    counter!("fetch_failures_total", "operation" => operation).increment(1);
}

pub fn record_stale_detail() {
    counter!("stale_detail_discarded_total").increment(1);
}

pub fn record_reconnect() {
    counter!("ws_reconnects_total").increment(1);
}
