//! Server configuration and command-line arguments.

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use tephra_core::{RegistryConfig, SessionConfig};

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "tephra-server", version, about = "Tephra UI-tree sync server")]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Close a session after this many seconds without client traffic
    #[arg(long, default_value_t = 30)]
    pub idle_timeout_secs: u64,

    /// Keep state of disconnected sessions for this many seconds
    #[arg(long, default_value_t = 600)]
    pub retention_secs: u64,

    /// Session timer resolution in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub tick_interval_ms: u64,
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Per-session settings
    pub session: SessionConfig,
    /// Resume-token retention
    pub registry: RegistryConfig,
    /// How often idle sessions are checked
    pub tick_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            session: SessionConfig::default(),
            registry: RegistryConfig::default(),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind: args.bind,
            session: SessionConfig { idle_timeout: Duration::from_secs(args.idle_timeout_secs) },
            registry: RegistryConfig { retention: Duration::from_secs(args.retention_secs) },
            tick_interval: Duration::from_millis(args.tick_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        let args = Args::parse_from(["tephra-server"]);
        let config = ServerConfig::from(args);
        let defaults = ServerConfig::default();
        assert_eq!(config.bind, defaults.bind);
        assert_eq!(config.session.idle_timeout, defaults.session.idle_timeout);
        assert_eq!(config.registry.retention, defaults.registry.retention);
        assert_eq!(config.tick_interval, defaults.tick_interval);
    }

    #[test]
    fn flags_override() {
        let args = Args::parse_from([
            "tephra-server",
            "--bind",
            "0.0.0.0:9000",
            "--idle-timeout-secs",
            "5",
            "--tick-interval-ms",
            "250",
        ]);
        let config = ServerConfig::from(args);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.session.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.tick_interval, Duration::from_millis(250));
    }
}
