//! Fan-out of one serialized payload to many connections.

use std::sync::Arc;

use tracing::debug;

use crate::websocket::connection::ClientConnection;

/// Per-broadcast delivery tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Recipients whose queue accepted the payload.
    pub delivered: usize,
    /// Recipients skipped because their transport was no longer open.
    pub skipped: usize,
    /// Open recipients whose queue was full.
    pub dropped: usize,
}

/// Enqueue `payload` on every open connection in `recipients`.
///
/// Never blocks: a closed or full recipient is skipped and delivery to the
/// rest continues.
pub fn fan_out(recipients: &[Arc<ClientConnection>], payload: &Arc<String>) -> FanOut {
    let mut tally = FanOut::default();
    for conn in recipients {
        if !conn.is_open() {
            tally.skipped += 1;
            continue;
        }
        if conn.send(Arc::clone(payload)) {
            tally.delivered += 1;
        } else {
            tally.dropped += 1;
            debug!(session_id = %conn.id, "outbound queue full, dropping frame");
        }
    }
    tally
}
