//! Configuration for liveness endpoints
//!
//! Both endpoints are fully usable without a configuration file; these
//! types exist for embedders that wire the pair up from TOML. Durations
//! are carried as integer milliseconds in the file format and converted
//! at the boundary.

use std::{io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

/// Configuration for the liveness server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on; 0 requests an ephemeral port
    ///
    /// Default: 0
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Accept-poll timeout in milliseconds
    ///
    /// Default: 100
    #[serde(default = "defaults::poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl ServerConfig {
    /// Accept-poll timeout as a [`Duration`]
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            poll_timeout_ms: defaults::poll_timeout_ms(),
        }
    }
}

/// Configuration for the liveness client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host the server is expected on
    ///
    /// Default: `127.0.0.1`
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Port the server is expected on
    ///
    /// Default: 0, a placeholder no server can be reached at; deployments
    /// probing a fixed port must set it.
    #[serde(default = "defaults::server_port")]
    pub server_port: u16,

    /// Delay between probe cycles in milliseconds
    ///
    /// Default: 1000
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Probe attempts per cycle before reporting failure
    ///
    /// Values below 1 are treated as 1.
    ///
    /// Default: 1
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl ClientConfig {
    /// Delay between probe cycles as a [`Duration`]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            server_port: defaults::server_port(),
            poll_interval_ms: defaults::poll_interval_ms(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// Aggregate configuration for a server/client pair
///
/// Either section may be omitted from the file; its defaults apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Client settings
    #[serde(default)]
    pub client: ClientConfig,
}

impl BeaconConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or
    /// [`io::ErrorKind::InvalidData`] if it is not valid TOML for these
    /// types.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }
}

mod defaults {
    pub const fn port() -> u16 {
        0
    }

    pub const fn poll_timeout_ms() -> u64 {
        100
    }

    pub fn host() -> String {
        crate::client::DEFAULT_HOST.to_string()
    }

    pub const fn server_port() -> u16 {
        0
    }

    pub const fn poll_interval_ms() -> u64 {
        1000
    }

    pub const fn max_retries() -> u32 {
        1
    }
}
