//! `WebSocket` connection handles and per-client session lifecycle.

pub mod connection;
pub mod session;
