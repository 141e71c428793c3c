//! # presence-relay
//!
//! Presence relay binary: loads settings, starts the HTTP/`WebSocket`
//! server and runs until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use presence_server::{RelayServer, ServerConfig};
use presence_settings::PresenceSettings;

/// How long to wait for the server and reaper after Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Multiplayer presence relay.
#[derive(Parser, Debug)]
#[command(name = "presence-relay", about = "Multiplayer presence relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.presence/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter, e.g. `debug` or `presence_server=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply CLI flags over loaded settings.
    fn apply(&self, settings: &mut PresenceSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(presence_settings::settings_path);
    let mut settings = presence_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    presence_core::logging::init_subscriber(&settings.logging.level);

    let config = ServerConfig::from(&settings.server);
    let mut server = RelayServer::new(config);
    match presence_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable"),
    }

    let handle = server
        .listen()
        .await
        .with_context(|| format!("Failed to start server on {}", server.config().bind_addr()))?;
    tracing::info!(
        addr = %handle.addr,
        stale_timeout_ms = server.config().stale_timeout_ms,
        reap_interval_ms = server.config().reap_interval_ms,
        "presence relay ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let clean = server
        .shutdown()
        .graceful_shutdown(handle.into_tasks(), Some(SHUTDOWN_TIMEOUT))
        .await;
    if !clean {
        tracing::warn!("forced shutdown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["presence-relay"]);
        let mut settings = PresenceSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "presence-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "9001",
            "--log-level",
            "debug",
        ]);
        let mut settings = PresenceSettings::default();
        settings.server.port = 7000;
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["presence-relay", "--config", "/tmp/presence.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/presence.json")));
    }

    #[test]
    fn cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["presence-relay", "--port", "70000"]).is_err());
    }
}
