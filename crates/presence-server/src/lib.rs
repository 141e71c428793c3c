//! # presence-server
//!
//! Axum HTTP + `WebSocket` presence relay.
//!
//! - `WebSocket` gateway: one task per connection, `init`/`join` handshake, pose ingestion
//! - Session table: sessions and connection handles behind one lock
//! - Broadcast fan-out: snapshot recipients, release the lock, enqueue per connection
//! - Liveness reaper: periodic eviction of silent sessions
//! - HTTP endpoints: health check, Prometheus metrics
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use relay::Relay;
pub use server::RelayServer;
