use std::net::SocketAddr;

use crate::model::ReservationEvent;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: slot queries answered.
pub const SLOT_QUERIES_TOTAL: &str = "parlor_slot_queries_total";

/// Histogram: slot query latency in seconds.
pub const SLOT_QUERY_DURATION_SECONDS: &str = "parlor_slot_query_duration_seconds";

/// Counter: bookings submitted through a view.
pub const BOOKINGS_SUBMITTED_TOTAL: &str = "parlor_bookings_submitted_total";

/// Counter: creates the store rejected under its overlap check.
pub const BOOKING_CONFLICTS_TOTAL: &str = "parlor_booking_conflicts_total";

// ── Reconciliation metrics ──────────────────────────────────────

/// Counter: feed events applied to snapshots. Labels: kind.
pub const RECONCILE_EVENTS_TOTAL: &str = "parlor_reconcile_events_total";

/// Counter: full re-fetches (startup, reconnect, lag recovery).
pub const RECONCILE_RESYNCS_TOTAL: &str = "parlor_reconcile_resyncs_total";

/// Counter: subscriptions that fell behind and were rebuilt.
pub const FEED_LAGGED_TOTAL: &str = "parlor_feed_lagged_total";

/// Gauge: reservations currently mirrored. Labels: provider.
pub const SNAPSHOT_RESERVATIONS: &str = "parlor_snapshot_reservations";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map an event to a short label for metrics.
pub fn event_label(event: &ReservationEvent) -> &'static str {
    match event {
        ReservationEvent::Created(_) => "created",
        ReservationEvent::Cancelled(_) => "cancelled",
    }
}
