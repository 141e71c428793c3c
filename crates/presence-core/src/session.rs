//! The per-client `Session` record.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::protocol::PoseUpdate;

/// Milliseconds since the Unix epoch, the unit of `Session::last_heartbeat`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Server-side record of one connected client.
///
/// Serialized as `{ id, x, y, z, ry, lastHeartbeat, wallet }`; `wallet` is
/// emitted as `null` when the client never supplied one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Relay-assigned identifier.
    pub id: SessionId,
    /// World-space X.
    pub x: f64,
    /// World-space Y.
    pub y: f64,
    /// World-space Z.
    pub z: f64,
    /// Yaw in radians.
    pub ry: f64,
    /// Last inbound message time, in epoch milliseconds.
    pub last_heartbeat: i64,
    /// Client-supplied wallet identifier, never verified.
    pub wallet: Option<String>,
}

impl Session {
    /// A fresh session at the origin with zero rotation and no wallet.
    pub fn new(id: SessionId, now: i64) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            ry: 0.0,
            last_heartbeat: now,
            wallet: None,
        }
    }

    /// Overwrite the pose verbatim and refresh liveness.
    ///
    /// The stored wallet is only replaced when the update carries one.
    pub fn apply(&mut self, update: PoseUpdate, now: i64) {
        self.x = update.x;
        self.y = update.y;
        self.z = update.z;
        self.ry = update.ry;
        if let Some(wallet) = update.wallet {
            self.wallet = Some(wallet);
        }
        self.last_heartbeat = now;
    }

    /// Refresh liveness without touching the pose.
    pub fn touch(&mut self, now: i64) {
        self.last_heartbeat = now;
    }

    /// Whether more than `timeout_ms` has passed since the last message.
    pub fn is_stale(&self, now: i64, timeout_ms: i64) -> bool {
        now.saturating_sub(self.last_heartbeat) > timeout_ms
    }
}
