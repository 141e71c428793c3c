//! Wire protocol: JSON text envelopes discriminated by a `type` field.
//!
//! | type | direction | fields |
//! |---|---|---|
//! | `init` | server → new client | `id`, `players` |
//! | `join` | server → others | `player` |
//! | `update` | client → server | `x`, `y`, `z`, `ry`, `wallet?` |
//! | `update` | server → others | `player` |
//! | `heartbeat` | client → server | — |
//! | `leave` | server → others | `id` |

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};
use crate::ids::SessionId;
use crate::session::Session;

/// Pose carried by a client `update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    /// World-space X.
    pub x: f64,
    /// World-space Y.
    pub y: f64,
    /// World-space Z.
    pub z: f64,
    /// Yaw in radians.
    pub ry: f64,
    /// Wallet identifier; absent or `null` keeps the stored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

/// Messages a client sends to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// New pose for the sender's session.
    Update(PoseUpdate),
    /// Liveness only.
    Heartbeat,
    /// Any other well-formed `type`; ignored by the relay.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a binary frame carrying UTF-8 JSON.
    pub fn decode_binary(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8 { len: data.len() })?;
        Self::decode(text)
    }
}

/// Messages the relay sends to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once to a new client: its id and every live session, itself included.
    Init {
        /// The recipient's own session id.
        id: SessionId,
        /// Snapshot of all live sessions.
        players: Vec<Session>,
    },
    /// A new session joined.
    Join {
        /// The new session.
        player: Session,
    },
    /// A session moved.
    Update {
        /// Full state after the update.
        player: Session,
    },
    /// A session left or was evicted.
    Leave {
        /// The departed session id.
        id: SessionId,
    },
}

impl ServerMessage {
    /// The `type` discriminator, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Join { .. } => "join",
            Self::Update { .. } => "update",
            Self::Leave { .. } => "leave",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_update_without_wallet() {
        let msg = ClientMessage::decode(r#"{"type":"update","x":10,"y":0,"z":5,"ry":1.2}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Update(PoseUpdate {
                x: 10.0,
                y: 0.0,
                z: 5.0,
                ry: 1.2,
                wallet: None,
            })
        );
    }

    #[test]
    fn decode_update_with_wallet() {
        let msg =
            ClientMessage::decode(r#"{"type":"update","x":1,"y":2,"z":3,"ry":0.5,"wallet":"0xABC"}"#)
                .unwrap();
        let ClientMessage::Update(pose) = msg else {
            panic!("expected update");
        };
        assert_eq!(pose.wallet.as_deref(), Some("0xABC"));
    }

    #[test]
    fn null_wallet_decodes_as_absent() {
        let msg =
            ClientMessage::decode(r#"{"type":"update","x":1,"y":2,"z":3,"ry":0,"wallet":null}"#)
                .unwrap();
        let ClientMessage::Update(pose) = msg else {
            panic!("expected update");
        };
        assert!(pose.wallet.is_none());
    }

    #[test]
    fn decode_heartbeat() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"heartbeat"}"#).unwrap(),
            ClientMessage::Heartbeat
        );
    }

    #[test]
    fn heartbeat_ignores_extra_fields() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"heartbeat","seq":4}"#).unwrap(),
            ClientMessage::Heartbeat
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"emote","name":"wave"}"#).unwrap(),
            ClientMessage::Unknown
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let err = ClientMessage::decode("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn missing_type_is_malformed() {
        assert!(ClientMessage::decode(r#"{"x":1}"#).is_err());
    }

    #[test]
    fn update_missing_fields_is_malformed() {
        assert!(ClientMessage::decode(r#"{"type":"update","x":1}"#).is_err());
    }

    #[test]
    fn update_with_string_coordinate_is_malformed() {
        assert!(ClientMessage::decode(r#"{"type":"update","x":"1","y":0,"z":0,"ry":0}"#).is_err());
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(ClientMessage::decode("[1,2,3]").is_err());
    }

    #[test]
    fn binary_utf8_decodes() {
        let msg = ClientMessage::decode_binary(br#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Heartbeat);
    }

    #[test]
    fn binary_non_utf8_rejected() {
        let err = ClientMessage::decode_binary(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::NotUtf8 { len: 3 }));
    }

    #[test]
    fn init_wire_shape() {
        let me = Session::new(SessionId::from("a"), 5);
        let msg = ServerMessage::Init {
            id: me.id.clone(),
            players: vec![me],
        };
        let v: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "init");
        assert_eq!(v["id"], "a");
        assert_eq!(v["players"][0]["id"], "a");
        assert_eq!(v["players"][0]["lastHeartbeat"], 5);
    }

    #[test]
    fn update_wire_shape() {
        let mut player = Session::new(SessionId::from("a"), 0);
        player.x = 10.0;
        player.wallet = Some("0xABC".into());
        let msg = ServerMessage::Update { player };
        let v: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "update",
                "player": {
                    "id": "a", "x": 10.0, "y": 0.0, "z": 0.0, "ry": 0.0,
                    "lastHeartbeat": 0, "wallet": "0xABC"
                }
            })
        );
    }

    #[test]
    fn leave_wire_shape() {
        let msg = ServerMessage::Leave {
            id: SessionId::from("b"),
        };
        assert_eq!(msg.encode().unwrap(), r#"{"type":"leave","id":"b"}"#);
        assert_eq!(msg.kind(), "leave");
    }

    #[test]
    fn join_kind() {
        let msg = ServerMessage::Join {
            player: Session::new(SessionId::from("c"), 0),
        };
        assert_eq!(msg.kind(), "join");
        let v: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["player"]["id"], "c");
    }
}
