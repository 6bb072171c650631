//! Error types for liveness operations

use thiserror::Error;

/// Errors that can occur while operating a liveness endpoint
///
/// Only lifecycle faults are representable here. Transient probe and accept
/// failures are handled inside the worker loops, and misbehaving observers
/// are contained at the call site; neither surfaces as an error.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// The server's accept loop is already running
    #[error("Liveness server already started on port {port}")]
    AlreadyStarted {
        /// Port the running server is bound to
        port: u16,
    },

    /// Failed to bind the liveness endpoint
    #[error("Failed to bind liveness server to port {port}: {source}")]
    Bind {
        /// Port that was requested
        port: u16,
        /// Underlying bind failure
        source: std::io::Error,
    },
}

/// Result type for liveness operations
pub type Result<T> = std::result::Result<T, BeaconError>;
