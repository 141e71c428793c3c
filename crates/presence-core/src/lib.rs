//! # presence-core
//!
//! Shared vocabulary for the presence relay.
//!
//! - **Session IDs**: `SessionId` newtype, random UUID v4 minted server-side
//! - **Sessions**: `Session` record with pose, optional wallet and liveness stamp
//! - **Protocol**: `ClientMessage` / `ServerMessage` JSON envelopes keyed by `type`
//! - **Errors**: `ProtocolError` via `thiserror`
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod session;

pub use errors::ProtocolError;
pub use ids::SessionId;
pub use protocol::{ClientMessage, PoseUpdate, ServerMessage};
pub use session::{Session, now_millis};
