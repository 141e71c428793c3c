//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "presence_connections_total";
/// Sessions removed after a disconnect (counter).
pub const DISCONNECTIONS_TOTAL: &str = "presence_disconnections_total";
/// Sessions evicted by the reaper (counter).
pub const EVICTIONS_TOTAL: &str = "presence_evictions_total";
/// Live sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "presence_sessions_active";
/// Broadcasts performed (counter, labels: type).
pub const BROADCASTS_TOTAL: &str = "presence_broadcasts_total";
/// Frames not delivered because a recipient queue was full (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "presence_broadcast_drops_total";
/// Inbound messages that failed to decode (counter).
pub const MALFORMED_MESSAGES_TOTAL: &str = "presence_malformed_messages_total";
/// Connection lifetime in seconds (histogram).
pub const CONNECTION_DURATION_SECONDS: &str = "presence_connection_duration_seconds";
