//! Server configuration.
//!
//! Values come from environment variables, and command-line flags override
//! them.
//!
//! # Environment Variables
//!
//! - `MURMUR_LISTEN_ADDR`: Socket address to listen on. Default: `0.0.0.0:6500`
//! - `MURMUR_ANNOUNCE_ON_CONNECT`: Broadcast the roster on bare connect. Default: `false`
//! - `MURMUR_OUTBOUND_BUFFER`: Per-connection outbound queue length. Default: `256`
//! - `MURMUR_EVENT_BUFFER`: Relay hub event queue length. Default: `1024`
//! - `MURMUR_DRAIN_TIMEOUT_SECS`: Seconds to wait for the hub on shutdown. Default: `10`
//!
//! # Examples
//!
//! ```bash
//! MURMUR_LISTEN_ADDR=127.0.0.1:7000 murmur-server
//! murmur-server --listen 127.0.0.1:7000 --announce-on-connect
//! ```

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use murmur_relay::RelayConfig;
use thiserror::Error;
use tracing::info;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unparseable value
    #[error("Invalid value {value:?} for {var}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
}

/// Murmur - WebSocket chat relay server
#[derive(Debug, Default, Parser)]
#[command(name = "murmur-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address to listen on
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Broadcast the roster when a client connects, before it has a name
    #[arg(long)]
    pub announce_on_connect: bool,

    /// Per-connection outbound queue length
    #[arg(long)]
    pub outbound_buffer: Option<usize>,

    /// Relay hub event queue length
    #[arg(long)]
    pub event_buffer: Option<usize>,

    /// Seconds to wait for the relay hub to stop on shutdown
    #[arg(long)]
    pub drain_timeout_secs: Option<u64>,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub listen_addr: SocketAddr,
    /// Broadcast the roster on bare connect
    pub announce_on_connect: bool,
    /// Frames buffered per connection before new ones are dropped
    pub outbound_buffer: usize,
    /// Relay hub event queue length
    pub event_buffer: usize,
    /// How long shutdown waits for the relay hub
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6500)),
            announce_on_connect: false,
            outbound_buffer: 256,
            event_buffer: murmur_relay::hub::DEFAULT_EVENT_BUFFER,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Load server configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = parse_var(&lookup, "MURMUR_LISTEN_ADDR")?.unwrap_or(defaults.listen_addr);
        let announce_on_connect = match lookup("MURMUR_ANNOUNCE_ON_CONNECT") {
            Some(value) => parse_flag("MURMUR_ANNOUNCE_ON_CONNECT", value)?,
            None => defaults.announce_on_connect,
        };
        let outbound_buffer =
            parse_var(&lookup, "MURMUR_OUTBOUND_BUFFER")?.unwrap_or(defaults.outbound_buffer);
        let event_buffer =
            parse_var(&lookup, "MURMUR_EVENT_BUFFER")?.unwrap_or(defaults.event_buffer);
        let drain_timeout = parse_var(&lookup, "MURMUR_DRAIN_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.drain_timeout);

        Ok(Self {
            listen_addr,
            announce_on_connect,
            outbound_buffer: outbound_buffer.max(1),
            event_buffer: event_buffer.max(1),
            drain_timeout,
        })
    }

    /// Apply command-line overrides.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(listen) = cli.listen {
            self.listen_addr = listen;
        }
        if cli.announce_on_connect {
            self.announce_on_connect = true;
        }
        if let Some(n) = cli.outbound_buffer {
            self.outbound_buffer = n.max(1);
        }
        if let Some(n) = cli.event_buffer {
            self.event_buffer = n.max(1);
        }
        if let Some(secs) = cli.drain_timeout_secs {
            self.drain_timeout = Duration::from_secs(secs);
        }
        self
    }

    /// The relay core's share of the configuration.
    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            announce_on_connect: self.announce_on_connect,
            event_buffer: self.event_buffer,
        }
    }

    /// Log the current server configuration.
    pub fn log_config(&self) {
        info!("Listen address: {}", self.listen_addr);
        info!(
            "Roster on connect: {}",
            if self.announce_on_connect { "enabled" } else { "disabled" }
        );
        info!("Outbound buffer: {} frames", self.outbound_buffer);
        info!("Event buffer: {} events", self.event_buffer);
        info!("Drain timeout: {}s", self.drain_timeout.as_secs());
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&'static str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        ServerConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:6500");
    }

    #[test]
    fn test_env_values() {
        let config = load(&[
            ("MURMUR_LISTEN_ADDR", "127.0.0.1:7000"),
            ("MURMUR_ANNOUNCE_ON_CONNECT", "true"),
            ("MURMUR_OUTBOUND_BUFFER", "8"),
            ("MURMUR_EVENT_BUFFER", "16"),
            ("MURMUR_DRAIN_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:7000".parse().unwrap());
        assert!(config.announce_on_connect);
        assert_eq!(config.outbound_buffer, 8);
        assert_eq!(config.event_buffer, 16);
        assert_eq!(config.drain_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = load(&[("MURMUR_LISTEN_ADDR", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains("MURMUR_LISTEN_ADDR"));

        assert!(load(&[("MURMUR_ANNOUNCE_ON_CONNECT", "maybe")]).is_err());
        assert!(load(&[("MURMUR_OUTBOUND_BUFFER", "-1")]).is_err());
    }

    #[test]
    fn test_zero_buffers_clamped() {
        let config = load(&[("MURMUR_OUTBOUND_BUFFER", "0"), ("MURMUR_EVENT_BUFFER", "0")]).unwrap();
        assert_eq!(config.outbound_buffer, 1);
        assert_eq!(config.event_buffer, 1);
    }

    #[test]
    fn test_cli_overrides_env() {
        let cli = Cli::parse_from([
            "murmur-server",
            "--listen",
            "127.0.0.1:9000",
            "--announce-on-connect",
            "--outbound-buffer",
            "4",
        ]);
        let config = load(&[("MURMUR_LISTEN_ADDR", "127.0.0.1:7000")])
            .unwrap()
            .with_cli(&cli);

        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(config.announce_on_connect);
        assert_eq!(config.outbound_buffer, 4);
        assert_eq!(config.event_buffer, murmur_relay::hub::DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_relay_config() {
        let config = ServerConfig {
            announce_on_connect: true,
            event_buffer: 32,
            ..ServerConfig::default()
        };
        let relay = config.relay();
        assert!(relay.announce_on_connect);
        assert_eq!(relay.event_buffer, 32);
    }
}
