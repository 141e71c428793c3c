//! The presence relay: admission, pose ingestion, fan-out and eviction.
//!
//! `Relay` owns the [`SessionTable`] and is shared as `Arc<Relay>` by every
//! connection task and the reaper. Connection tasks only mutate their own
//! session; the reaper only removes.

pub mod broadcast;
pub mod reaper;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use presence_core::{ClientMessage, ProtocolError, ServerMessage, Session, SessionId, now_millis};
use tracing::{debug, info, warn};

use crate::metrics::{
    BROADCAST_DROPS_TOTAL, BROADCASTS_TOTAL, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL,
    EVICTIONS_TOTAL, MALFORMED_MESSAGES_TOTAL, SESSIONS_ACTIVE,
};
use crate::websocket::connection::ClientConnection;

pub use broadcast::{FanOut, fan_out};
pub use table::{Departed, SessionTable};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Pose applied and broadcast to the other sessions.
    Updated {
        /// Recipients whose queue accepted the broadcast.
        delivered: usize,
    },
    /// Liveness refreshed, nothing broadcast.
    Heartbeat,
    /// Well-formed message of an unknown type; liveness refreshed only.
    Ignored,
    /// Payload could not be decoded; nothing changed.
    Malformed,
    /// The session was already removed.
    Gone,
}

/// Shared relay state and protocol operations.
pub struct Relay {
    table: SessionTable,
    stale_timeout: Duration,
}

impl Relay {
    /// Create a relay that evicts sessions silent for longer than `stale_timeout`.
    pub fn new(stale_timeout: Duration) -> Self {
        Self {
            table: SessionTable::new(),
            stale_timeout,
        }
    }

    /// The underlying session table.
    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    /// Staleness threshold.
    pub fn stale_timeout(&self) -> Duration {
        self.stale_timeout
    }

    /// Register a freshly accepted connection.
    ///
    /// The new client gets `init` (its id and every live session, itself
    /// included) ahead of anything else; every other client gets `join`.
    pub fn accept(&self, connection: Arc<ClientConnection>) -> Session {
        let session = Session::new(connection.id.clone(), now_millis());
        let greeter = Arc::clone(&connection);

        self.table.admit(session.clone(), connection, |players| {
            let init = ServerMessage::Init {
                id: greeter.id.clone(),
                players: players.to_vec(),
            };
            match init.encode() {
                Ok(json) => {
                    if !greeter.send(Arc::new(json)) {
                        warn!(session_id = %greeter.id, "failed to enqueue init");
                    }
                }
                Err(e) => warn!(session_id = %greeter.id, error = %e, "failed to encode init"),
            }
        });

        counter!(CONNECTIONS_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        info!(session_id = %session.id, sessions = self.table.len(), "session joined");

        let join = ServerMessage::Join {
            player: session.clone(),
        };
        let _ = self.broadcast(&join, Some(&session.id));
        session
    }

    /// Decode and apply a text frame from `id`.
    pub fn ingest_text(&self, id: &SessionId, text: &str) -> Ingest {
        self.ingest_decoded(id, ClientMessage::decode(text))
    }

    /// Decode and apply a binary frame from `id`.
    pub fn ingest_binary(&self, id: &SessionId, data: &[u8]) -> Ingest {
        self.ingest_decoded(id, ClientMessage::decode_binary(data))
    }

    fn ingest_decoded(&self, id: &SessionId, decoded: Result<ClientMessage, ProtocolError>) -> Ingest {
        match decoded {
            Ok(message) => self.ingest(id, message),
            Err(e) => {
                counter!(MALFORMED_MESSAGES_TOTAL).increment(1);
                warn!(session_id = %id, error = %e, "discarding malformed message");
                Ingest::Malformed
            }
        }
    }

    /// Apply a decoded message from `id` to its own session.
    pub fn ingest(&self, id: &SessionId, message: ClientMessage) -> Ingest {
        let now = now_millis();
        match message {
            ClientMessage::Update(pose) => {
                let Some(player) = self.table.apply_update(id, pose, now) else {
                    return Ingest::Gone;
                };
                let tally = self.broadcast(&ServerMessage::Update { player }, Some(id));
                Ingest::Updated {
                    delivered: tally.delivered,
                }
            }
            ClientMessage::Heartbeat => {
                if self.table.touch(id, now) {
                    Ingest::Heartbeat
                } else {
                    Ingest::Gone
                }
            }
            ClientMessage::Unknown => {
                debug!(session_id = %id, "ignoring message of unknown type");
                if self.table.touch(id, now) {
                    Ingest::Ignored
                } else {
                    Ingest::Gone
                }
            }
        }
    }

    /// Remove `id` after its connection closed and announce `leave`.
    ///
    /// Returns `false` if the session was already gone (for example reaped),
    /// in which case nothing is broadcast.
    pub fn disconnect(&self, id: &SessionId) -> bool {
        let Some(departed) = self.table.remove(id) else {
            return false;
        };
        counter!(DISCONNECTIONS_TOTAL).increment(1);
        self.depart(departed);
        true
    }

    /// Evict every session silent for longer than the staleness threshold.
    pub fn reap(&self) -> Vec<SessionId> {
        self.reap_at(now_millis())
    }

    /// Evict relative to an explicit `now` (epoch milliseconds).
    pub fn reap_at(&self, now: i64) -> Vec<SessionId> {
        let timeout_ms = self.stale_timeout.as_millis() as i64;
        let stale = self.table.drain_stale(now, timeout_ms);
        let mut evicted = Vec::with_capacity(stale.len());
        for departed in stale {
            counter!(EVICTIONS_TOTAL).increment(1);
            info!(
                session_id = %departed.session.id,
                silent_ms = now - departed.session.last_heartbeat,
                "evicting stale session"
            );
            evicted.push(departed.session.id.clone());
            self.depart(departed);
        }
        evicted
    }

    /// Shared tail of disconnect and eviction: close the transport, announce `leave`.
    fn depart(&self, departed: Departed) {
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
        departed.connection.close();
        let id = departed.session.id;
        info!(session_id = %id, sessions = self.table.len(), "session left");
        let _ = self.broadcast(&ServerMessage::Leave { id: id.clone() }, Some(&id));
    }

    /// Send `message` to every live session except `exclude`.
    ///
    /// The table lock is held only while collecting recipients.
    pub fn broadcast(&self, message: &ServerMessage, exclude: Option<&SessionId>) -> FanOut {
        let json = match message.encode() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = message.kind(), error = %e, "failed to serialize broadcast");
                return FanOut::default();
            }
        };
        let recipients = self.table.recipients(exclude);
        let tally = fan_out(&recipients, &json);

        counter!(BROADCASTS_TOTAL, "type" => message.kind()).increment(1);
        if tally.dropped > 0 {
            counter!(BROADCAST_DROPS_TOTAL).increment(tally.dropped as u64);
        }
        debug!(
            event_type = message.kind(),
            recipients = recipients.len(),
            delivered = tally.delivered,
            "broadcast"
        );
        tally
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.table.len()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.table.connection_count()
    }
}
