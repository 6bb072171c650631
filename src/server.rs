//! Liveness server: accepts probe connections and closes them immediately

use std::{
    fmt,
    net::Ipv4Addr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{net::TcpListener, runtime::Handle, sync::oneshot, task::JoinHandle, time::timeout};
use tracing::{debug, info, trace, warn};

use crate::{
    BeaconError, Result,
    config::ServerConfig,
    listener::{MessageListener, MessageSink},
};

/// Default accept-poll timeout
///
/// Bounds how long the worker sits in `accept` before re-checking the stop
/// flag, and therefore how quickly a stop request is observed.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Liveness server
///
/// Proves the host process is alive by accepting TCP connections on a
/// well-known port and closing them immediately. No bytes are exchanged:
/// a completed connection is the entire protocol.
///
/// All background work runs on the [`Handle`] supplied at construction;
/// the server never creates threads or runtimes of its own. Dropping a
/// running server aborts its worker and releases the endpoint;
/// [`stop`](Self::stop) additionally waits for the worker to finish.
pub struct BeaconServer {
    /// Requested port; 0 asks for an ephemeral port and is replaced with
    /// the resolved one once `start` has bound the endpoint
    port: u16,
    poll_timeout: Duration,
    stop_requested: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    accepted: Arc<AtomicU64>,
    /// The worker owns a clone, so the endpoint stays open across worker
    /// exit until `stop` drops this reference
    socket: Option<Arc<TcpListener>>,
    worker: Option<JoinHandle<()>>,
    scheduler: Handle,
    messages: MessageSink,
}

impl BeaconServer {
    /// Create a server on an ephemeral port with the default poll timeout
    #[must_use]
    pub fn new(scheduler: Handle) -> Self {
        Self {
            port: 0,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            stop_requested: Arc::new(AtomicBool::new(true)),
            started: Arc::new(AtomicBool::new(false)),
            accepted: Arc::new(AtomicU64::new(0)),
            socket: None,
            worker: None,
            scheduler,
            messages: MessageSink::default(),
        }
    }

    /// Create a server from configuration
    #[must_use]
    pub fn from_config(config: &ServerConfig, scheduler: Handle) -> Self {
        Self::new(scheduler)
            .with_port(config.port)
            .with_poll_timeout(config.poll_timeout())
    }

    /// Set the port to listen on; 0 requests an ephemeral port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the accept-poll timeout
    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Start accepting probe connections
    ///
    /// Binds the endpoint, spawns the accept loop on the scheduler, and
    /// returns once the loop is running. If an ephemeral port was requested,
    /// [`port`](Self::port) reports the resolved port from here on.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is already started or the endpoint
    /// cannot be bound. A failed start leaves the server stopped, with no
    /// partial state behind.
    pub async fn start(&mut self) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            return Err(BeaconError::AlreadyStarted { port: self.port });
        }

        let std_socket = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .and_then(|socket| socket.set_nonblocking(true).map(|()| socket))
            .map_err(|source| BeaconError::Bind {
                port: self.port,
                source,
            })?;

        // Register the socket with the injected scheduler's reactor, so
        // `start` works from any calling context.
        let socket = {
            let _scheduler = self.scheduler.enter();
            TcpListener::from_std(std_socket)
        };
        let socket = socket.map_err(|source| BeaconError::Bind {
            port: self.port,
            source,
        })?;

        self.port = socket
            .local_addr()
            .map_err(|source| BeaconError::Bind {
                port: self.port,
                source,
            })?
            .port();

        let socket = Arc::new(socket);
        self.socket = Some(Arc::clone(&socket));

        let (ready, running) = oneshot::channel();
        let stop_requested = Arc::clone(&self.stop_requested);
        let started = Arc::clone(&self.started);
        let accepted = Arc::clone(&self.accepted);
        let messages = self.messages.clone();
        let poll_timeout = self.poll_timeout;
        let port = self.port;

        self.worker = Some(self.scheduler.spawn(async move {
            stop_requested.store(false, Ordering::SeqCst);
            started.store(true, Ordering::SeqCst);
            // The receiver is dropped if the caller gave up; the loop
            // proceeds either way.
            let _ = ready.send(());

            info!(port, "Liveness server accepting probes");
            messages.publish(&format!("Server started. Listening on port {port}"));

            while !stop_requested.load(Ordering::SeqCst) {
                match timeout(poll_timeout, socket.accept()).await {
                    Ok(Ok((_probe, peer))) => {
                        // Dropping the stream closes it; the completed
                        // connection is the whole exchange.
                        let total = accepted.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!(%peer, total, "Probe accepted");
                        messages.publish(&format!("Probe accepted from {peer} ({total} total)"));
                    }
                    Ok(Err(error)) => {
                        // Transient accept failure; the endpoint stays up.
                        warn!(%error, "Error accepting probe connection");
                        messages.publish(&format!("Error accepting probe: {error}"));
                    }
                    Err(_elapsed) => {
                        trace!(port, "Accept poll timed out, re-checking stop flag");
                    }
                }
            }

            debug!(port, "Accept loop exiting");
        }));

        if running.await.is_err() {
            warn!(
                port = self.port,
                "Liveness worker exited before signalling readiness"
            );
        }

        Ok(())
    }

    /// Stop accepting probe connections and close the endpoint
    ///
    /// Requests the stop, waits for the accept loop to observe it and exit
    /// (bounded by the poll timeout), then closes the endpoint. Safe to call
    /// on a server that never started, and safe to call repeatedly; a
    /// stopped server may be started again.
    pub async fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);

        let Some(worker) = self.worker.take() else {
            debug!(port = self.port, "Stop requested with no accept loop running");
            return;
        };

        if let Err(error) = worker.await {
            warn!(%error, "Liveness worker ended abnormally");
        }

        // The worker never closes the endpoint; dropping the last listener
        // reference here does.
        self.socket = None;
        self.started.store(false, Ordering::SeqCst);

        info!(
            port = self.port,
            pings = self.ping_count(),
            "Liveness server stopped"
        );
        self.messages.publish(&format!("Server stopped. {self}"));
    }

    /// Port the server is (or will be) bound to
    ///
    /// Before a start with port 0 this is 0; afterwards it is the resolved
    /// ephemeral port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Accept-poll timeout currently in effect
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Whether the accept loop is currently running
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of probe connections accepted since construction
    #[must_use]
    pub fn ping_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Install, replace, or remove the diagnostic message listener
    ///
    /// Takes effect from the next message on; may be called at any time,
    /// including while the server is running.
    pub fn set_message_listener(&self, listener: Option<Arc<dyn MessageListener>>) {
        self.messages.set(listener);
    }
}

impl Drop for BeaconServer {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl fmt::Display for BeaconServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BeaconServer[port={}, stop_requested={}, pings={}]",
            self.port,
            self.stop_requested.load(Ordering::SeqCst),
            self.accepted.load(Ordering::Relaxed)
        )
    }
}
