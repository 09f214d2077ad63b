//! Poller and transport configuration.
//!
//! Both structures deserialize from TOML with every field optional, so a
//! partial file only overrides what it names:
//!
//! ```toml
//! [poller]
//! iteration_threshold = 5
//! max_events = 1024
//!
//! [transport]
//! bind_addr = "0.0.0.0:40456"
//! recv_buffer_size = 2097152
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use thiserror::Error;

/// Registry sizes up to this many transports are polled by direct iteration
pub const DEFAULT_ITERATION_THRESHOLD: usize = 5;

/// Readiness events collected per multiplexer wait
pub const DEFAULT_MAX_EVENTS: usize = 1024;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Poll loop configuration
    #[serde(default)]
    pub poller: PollerConfig,
    /// Channel transport configuration
    #[serde(default)]
    pub transport: UdpTransportConfig,
}

/// Poll loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Largest registry size polled by direct iteration; above it the
    /// multiplexer is consulted
    #[serde(default = "default_iteration_threshold")]
    pub iteration_threshold: usize,
    /// Readiness events collected per multiplexer wait
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

/// UDP channel transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpTransportConfig {
    /// Local address to bind
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Socket receive buffer size; kernel default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv_buffer_size: Option<usize>,
    /// IPv4 multicast group to join
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multicast_group: Option<Ipv4Addr>,
    /// Interface used for the multicast join
    #[serde(default = "default_multicast_interface")]
    pub multicast_interface: Ipv4Addr,
}

// Default values

fn default_iteration_threshold() -> usize {
    DEFAULT_ITERATION_THRESHOLD
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

fn default_bind_addr() -> String {
    "0.0.0.0:0".to_string()
}

fn default_multicast_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            iteration_threshold: default_iteration_threshold(),
            max_events: default_max_events(),
        }
    }
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            recv_buffer_size: None,
            multicast_group: None,
            multicast_interface: default_multicast_interface(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poller.validate()?;
        self.transport.validate()
    }
}

impl PollerConfig {
    /// Load the `[poller]` section of a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Ok(Config::load(path)?.poller)
    }

    /// Use a different iteration threshold
    #[must_use]
    pub fn with_iteration_threshold(mut self, threshold: usize) -> Self {
        self.iteration_threshold = threshold;
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `max_events` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::Invalid(
                "max_events must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl UdpTransportConfig {
    /// Parse the bind address
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn parse_bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind_addr)))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error for an unparsable bind address, a zero buffer size, a
    /// non-multicast group address, or a multicast group on an IPv6 bind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let addr = self.parse_bind_addr()?;

        if self.recv_buffer_size == Some(0) {
            return Err(ConfigError::Invalid(
                "recv_buffer_size must be non-zero".to_string(),
            ));
        }

        if let Some(group) = self.multicast_group {
            if !group.is_multicast() {
                return Err(ConfigError::Invalid(format!(
                    "{group} is not a multicast address"
                )));
            }
            if addr.is_ipv6() {
                return Err(ConfigError::Invalid(
                    "IPv4 multicast group requires an IPv4 bind address".to_string(),
                ));
            }
        }

        Ok(())
    }
}
