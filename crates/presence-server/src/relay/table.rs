//! Session table and connection registry, guarded together by one lock.
//!
//! Every operation takes the lock once and never awaits while holding it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use presence_core::{PoseUpdate, Session, SessionId};

use crate::websocket::connection::ClientConnection;

/// A session removed from the table, with the connection it belonged to.
pub struct Departed {
    /// Last known state.
    pub session: Session,
    /// Its connection handle.
    pub connection: Arc<ClientConnection>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    connections: HashMap<SessionId, Arc<ClientConnection>>,
}

/// All live sessions and their connection handles.
#[derive(Default)]
pub struct SessionTable {
    inner: Mutex<Inner>,
}

impl SessionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` with `connection` and call `greet` with the full
    /// snapshot (new session included) before the lock is released.
    ///
    /// Anything `greet` enqueues on the new connection is therefore ahead of
    /// every broadcast that can reach it.
    pub fn admit<F>(&self, session: Session, connection: Arc<ClientConnection>, greet: F)
    where
        F: FnOnce(&[Session]),
    {
        let mut inner = self.inner.lock();
        let id = session.id.clone();
        let _ = inner.sessions.insert(id.clone(), session);
        let _ = inner.connections.insert(id, connection);
        let players: Vec<Session> = inner.sessions.values().cloned().collect();
        greet(&players);
    }

    /// Apply a pose update to `id` and return the resulting state.
    ///
    /// Returns `None` if the session is no longer in the table.
    pub fn apply_update(&self, id: &SessionId, update: PoseUpdate, now: i64) -> Option<Session> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.get_mut(id)?;
        session.apply(update, now);
        Some(session.clone())
    }

    /// Refresh the liveness stamp of `id`. Returns `false` if it is gone.
    pub fn touch(&self, id: &SessionId, now: i64) -> bool {
        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(id) {
            Some(session) => {
                session.touch(now);
                true
            }
            None => false,
        }
    }

    /// Remove `id` if present. A second call for the same id returns `None`.
    pub fn remove(&self, id: &SessionId) -> Option<Departed> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.remove(id)?;
        let connection = inner.connections.remove(id)?;
        Some(Departed {
            session,
            connection,
        })
    }

    /// Remove and return every session silent for more than `timeout_ms`.
    pub fn drain_stale(&self, now: i64, timeout_ms: i64) -> Vec<Departed> {
        let mut inner = self.inner.lock();
        let stale: Vec<SessionId> = inner
            .sessions
            .values()
            .filter(|s| s.is_stale(now, timeout_ms))
            .map(|s| s.id.clone())
            .collect();

        let mut departed = Vec::with_capacity(stale.len());
        for id in stale {
            let session = inner.sessions.remove(&id);
            let connection = inner.connections.remove(&id);
            if let (Some(session), Some(connection)) = (session, connection) {
                departed.push(Departed {
                    session,
                    connection,
                });
            }
        }
        departed
    }

    /// Connection handles of every session except `exclude`.
    pub fn recipients(&self, exclude: Option<&SessionId>) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.lock();
        inner
            .connections
            .iter()
            .filter(|(id, _)| Some(*id) != exclude)
            .map(|(_, conn)| Arc::clone(conn))
            .collect()
    }

    /// Current state of `id`.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.inner.lock().sessions.get(id).cloned()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered connection handles.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }
}
