// SPDX-License-Identifier: Apache-2.0 OR MIT
//! # Metrics Module
//!
//! Counter names mirrored into the `metrics` facade, and the optional
//! Prometheus exporter that serves them.

use anyhow::Result;
use std::net::SocketAddr;

/// Classified packet-ins, labelled by `outcome`
pub const CLASSIFIER_PACKETS: &str = "mcsnoop_classifier_packets_total";
/// Expectation hits, labelled by `table`
pub const EXPECTATION_MATCHES: &str = "mcsnoop_expectation_matches_total";
/// Idle notifications, labelled by `table` and `result` (sent/skipped/failed)
pub const IDLE_NOTIFICATIONS: &str = "mcsnoop_idle_notifications_total";
/// Originated frames, labelled by `table` and `result` (sent/unresolved/failed)
pub const TRANSMISSIONS: &str = "mcsnoop_transmissions_total";
/// Controller table requests, labelled by `table`, `op` and `result`
pub const TABLE_REQUESTS: &str = "mcsnoop_table_requests_total";

pub fn describe_counters() {
    use ::metrics::describe_counter;

    describe_counter!(CLASSIFIER_PACKETS, "Packet-ins by classifier outcome");
    describe_counter!(EXPECTATION_MATCHES, "Packets that refreshed an expectation");
    describe_counter!(IDLE_NOTIFICATIONS, "Idle notifications by result");
    describe_counter!(TRANSMISSIONS, "Originated IGMP frames by result");
    describe_counter!(TABLE_REQUESTS, "Controller table requests by result");
}

#[cfg(not(test))]
pub fn install_prometheus_recorder(prometheus_addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(prometheus_addr)
        .install()
        .map_err(anyhow::Error::from)
}

#[cfg(test)]
pub fn install_prometheus_recorder(_prometheus_addr: SocketAddr) -> Result<()> {
    // No HTTP listener under test
    Ok(())
}
