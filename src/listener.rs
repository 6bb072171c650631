//! Observer capabilities for liveness events
//!
//! Two kinds of observer exist. A [`ProtocolListener`] receives the outcome
//! of each client probe cycle and is the intended integration point for
//! supervisors and dashboards. A [`MessageListener`] receives human-readable
//! diagnostics from either endpoint and exists purely for visibility.
//!
//! Observers are untrusted: a panic inside a callback is caught at the call
//! site and reduced to a log record, so a misbehaving observer can never
//! take down a protocol worker.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

/// Observer for the outcome of each probe cycle
///
/// Exactly one of the two callbacks is invoked per cycle.
pub trait ProtocolListener: Send + Sync {
    /// A probe in this cycle reached the server
    fn on_success(&self);

    /// Every probe in this cycle failed; `reason` describes why
    fn on_failure(&self, reason: &str);
}

/// Observer for human-readable diagnostics
pub trait MessageListener: Send + Sync {
    /// Called with one diagnostic message per observable state change
    fn on_message(&self, message: &str);
}

/// Message listener that forwards every diagnostic to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessageListener;

impl MessageListener for TracingMessageListener {
    fn on_message(&self, message: &str) {
        debug!("{message}");
    }
}

/// Swappable slot holding the current message listener, if any
///
/// The slot may be replaced or cleared at any time, including while a worker
/// is mid-loop. Workers snapshot the listener once per message, so a swap
/// takes effect on the next message rather than mid-call.
#[derive(Clone, Default)]
pub(crate) struct MessageSink {
    listener: Arc<RwLock<Option<Arc<dyn MessageListener>>>>,
}

impl MessageSink {
    /// Install, replace, or remove the listener
    pub(crate) fn set(&self, listener: Option<Arc<dyn MessageListener>>) {
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = listener;
    }

    /// Deliver one message to the current listener, if any
    pub(crate) fn publish(&self, message: &str) {
        let snapshot = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(listener) = snapshot {
            let delivery = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_message(message);
            }));

            if delivery.is_err() {
                debug!("Message listener panicked, message dropped: {message}");
            }
        }
    }
}
