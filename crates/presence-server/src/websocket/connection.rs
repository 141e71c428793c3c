//! Live connection handle for one `WebSocket` client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use presence_core::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Represents a connected `WebSocket` client.
///
/// Outbound frames go through a bounded queue drained by the connection's
/// writer task, which keeps per-connection FIFO order. `close` asks both the
/// reader and writer tasks to stop.
pub struct ClientConnection {
    /// Session ID this connection carries.
    pub id: SessionId,
    /// Send channel to the client's `WebSocket` write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Cancelled once the connection is closing.
    closed: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of messages dropped due to a full or closed queue.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: SessionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            closed: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a text frame without waiting.
    ///
    /// Returns `false` if the queue is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the transport can still accept frames.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled() && !self.tx.is_closed()
    }

    /// Ask the connection tasks to shut the transport down. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Token cancelled when the connection is closing.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
