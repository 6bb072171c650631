//! Minimal TCP liveness protocol
//!
//! A [`BeaconServer`] proves its host process is alive by accepting TCP
//! connections on a well-known port and closing them immediately; a
//! [`BeaconClient`] probes that port on a fixed schedule and reports each
//! cycle's outcome to an observer. No bytes travel in either direction:
//! the completed connection is the entire protocol.
//!
//! Both endpoints run their background work on a caller-supplied
//! [`tokio::runtime::Handle`], so hundreds of clients can share a single
//! runtime sized by the embedder.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use beacon::{BeaconClient, BeaconServer, ProtocolListener};
//!
//! struct Console;
//!
//! impl ProtocolListener for Console {
//!     fn on_success(&self) {
//!         println!("server is up");
//!     }
//!
//!     fn on_failure(&self, reason: &str) {
//!         println!("server is down: {reason}");
//!     }
//! }
//!
//! # async fn example() -> beacon::Result<()> {
//! let scheduler = tokio::runtime::Handle::current();
//!
//! let mut server = BeaconServer::new(scheduler.clone());
//! server.start().await?;
//!
//! let mut client = BeaconClient::new(server.port(), scheduler);
//! client.start(Some(Arc::new(Console)));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod server;

pub use client::{
    BeaconClient, CONNECT_TIMEOUT, DEFAULT_FAILURE_REASON, DEFAULT_HOST, DEFAULT_POLL_INTERVAL,
};
pub use config::{BeaconConfig, ClientConfig, ServerConfig};
pub use error::{BeaconError, Result};
pub use listener::{MessageListener, ProtocolListener, TracingMessageListener};
pub use server::{BeaconServer, DEFAULT_POLL_TIMEOUT};
