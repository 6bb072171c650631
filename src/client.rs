//! Liveness client: probes a server on a fixed schedule

use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures_util::FutureExt;
use tokio::{
    net::TcpStream,
    runtime::Handle,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    listener::{MessageListener, MessageSink, ProtocolListener},
};

/// Host probed when none is configured
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default delay between probe cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Timeout applied to every connection attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Failure reason seeded at the start of every probe cycle
///
/// A cycle that makes at least one attempt replaces this with the
/// exhaustion reason; since every cycle makes at least one attempt, this
/// exists as the defined starting state rather than a reachable outcome.
pub const DEFAULT_FAILURE_REASON: &str = "server not available";

/// Failure reason reported when a cycle has used up all its attempts
fn exhaustion_reason(max_retries: u32) -> String {
    format!("Server not contactable after {max_retries} retries")
}

/// Liveness client
///
/// Probes a [`BeaconServer`](crate::BeaconServer) on a fixed schedule. Each
/// cycle attempts to connect up to `max_retries` times and reports exactly
/// one outcome to the [`ProtocolListener`] supplied to [`start`](Self::start):
/// `on_success` if any attempt connected, `on_failure` with a reason once
/// every attempt has failed.
///
/// Probe settings are fixed at construction; the schedule runs on the
/// [`Handle`] supplied there and is cancelled by [`stop`](Self::stop).
/// Dropping a running client aborts its schedule without waiting;
/// [`stop`](Self::stop) additionally waits for the worker to end.
pub struct BeaconClient {
    host: String,
    server_port: u16,
    poll_interval: Duration,
    max_retries: u32,
    stop_requested: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    scheduler: Handle,
    messages: MessageSink,
}

impl BeaconClient {
    /// Create a client probing `server_port` on the local host
    ///
    /// Defaults: one attempt per cycle, one cycle per second.
    #[must_use]
    pub fn new(server_port: u16, scheduler: Handle) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            server_port,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_retries: 1,
            stop_requested: Arc::new(AtomicBool::new(true)),
            worker: None,
            scheduler,
            messages: MessageSink::default(),
        }
    }

    /// Create a client from configuration
    ///
    /// A configured `max_retries` of 0 is treated as 1, the same clamp
    /// [`with_max_retries`](Self::with_max_retries) applies.
    #[must_use]
    pub fn from_config(config: &ClientConfig, scheduler: Handle) -> Self {
        Self::new(config.server_port, scheduler)
            .with_host(config.host.clone())
            .with_poll_interval(config.poll_interval())
            .with_max_retries(config.max_retries)
    }

    /// Set the host the server is expected on
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the delay between probe cycles
    ///
    /// The schedule needs a non-zero period; anything below 1 ms is raised
    /// to 1 ms.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Set the number of attempts per cycle
    ///
    /// A cycle always makes at least one attempt; 0 is treated as 1.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Probe the server once
    ///
    /// Opens a connection to the configured host and port and closes it
    /// immediately; the connection itself is the entire probe. Returns
    /// `true` if the connection was established within [`CONNECT_TIMEOUT`],
    /// `false` on refusal, timeout, or any other I/O failure.
    pub async fn ping(&self) -> bool {
        Self::probe(&self.host, self.server_port, &self.messages).await
    }

    async fn probe(host: &str, port: u16, messages: &MessageSink) -> bool {
        match timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(Ok(_probe)) => {
                debug!(host, port, "Probe connected");
                true
            }
            Ok(Err(error)) => {
                debug!(host, port, %error, "Probe failed");
                messages.publish(&format!("Probe to {host}:{port} failed: {error}"));
                false
            }
            Err(_elapsed) => {
                debug!(host, port, "Probe timed out");
                messages.publish(&format!("Probe to {host}:{port} timed out"));
                false
            }
        }
    }

    /// Run one probe cycle and notify the observer of its outcome
    async fn run_cycle(
        host: &str,
        port: u16,
        max_retries: u32,
        observer: Option<&Arc<dyn ProtocolListener>>,
        messages: &MessageSink,
    ) {
        let mut retries = max_retries;
        let mut reason = DEFAULT_FAILURE_REASON.to_string();
        let mut reachable = false;

        while !reachable && retries > 0 {
            // A probe that panics counts as a failed attempt.
            reachable = match AssertUnwindSafe(Self::probe(host, port, messages))
                .catch_unwind()
                .await
            {
                Ok(connected) => connected,
                Err(_panic) => {
                    warn!(host, port, "Probe panicked, counting as a failed attempt");
                    messages.publish(&format!("Probe to {host}:{port} panicked"));
                    false
                }
            };

            if reachable {
                break;
            }

            retries -= 1;
            if retries == 0 {
                reason = exhaustion_reason(max_retries);
                debug!(host, port, %reason, "Probe cycle exhausted its attempts");
                messages.publish(&format!("Probe cycle failed: {reason}"));
            } else {
                messages.publish(&format!("Retrying probe to {host}:{port} ({retries} left)"));
            }
        }

        // Exactly one notification per cycle; a panicking observer is
        // contained here.
        if let Some(observer) = observer {
            let notified = std::panic::catch_unwind(AssertUnwindSafe(|| {
                if reachable {
                    observer.on_success();
                } else {
                    observer.on_failure(&reason);
                }
            }));

            if notified.is_err() {
                debug!(host, port, "Protocol listener panicked, notification dropped");
            }
        } else {
            debug!(host, port, reachable, "No protocol listener registered");
        }
    }

    /// Start probing on the fixed schedule
    ///
    /// Spawns the recurring worker on the scheduler. The first cycle runs
    /// immediately, subsequent cycles at `poll_interval`; cycles never
    /// overlap, so a cycle that outlives the interval delays the following
    /// ones. Starting a client whose schedule is still running replaces
    /// that schedule.
    pub fn start(&mut self, observer: Option<Arc<dyn ProtocolListener>>) {
        if let Some(previous) = self.worker.take() {
            warn!(port = self.server_port, "Replacing a running probe schedule");
            previous.abort();
        }

        let host = self.host.clone();
        let port = self.server_port;
        let poll_interval = self.poll_interval;
        let max_retries = self.max_retries;
        let stop_requested = Arc::clone(&self.stop_requested);
        let messages = self.messages.clone();

        self.worker = Some(self.scheduler.spawn(async move {
            stop_requested.store(false, Ordering::SeqCst);

            let mut tick = interval(poll_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Burst);

            info!(%host, port, ?poll_interval, max_retries, "Probe schedule started");

            loop {
                tick.tick().await;
                if stop_requested.load(Ordering::SeqCst) {
                    break;
                }

                Self::run_cycle(&host, port, max_retries, observer.as_ref(), &messages).await;
            }

            debug!(%host, port, "Probe schedule exiting");
        }));
    }

    /// Stop probing
    ///
    /// Cancels the scheduled worker and waits for it to finish. Safe to
    /// call on a client that never started, and safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);

        let Some(worker) = self.worker.take() else {
            debug!(port = self.server_port, "Stop requested with no probe schedule running");
            return;
        };

        worker.abort();
        if let Err(error) = worker.await {
            if error.is_cancelled() {
                debug!(port = self.server_port, "Probe schedule cancelled");
            } else {
                warn!(%error, "Probe worker ended abnormally");
            }
        }

        info!(port = self.server_port, "Probe schedule stopped");
        self.messages.publish(&format!("Client stopped. {self}"));
    }

    /// Host being probed
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port being probed
    #[must_use]
    pub const fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Delay between probe cycles
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Attempts per cycle
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Install, replace, or remove the diagnostic message listener
    ///
    /// Takes effect from the next message on; may be called at any time,
    /// including while the schedule is running.
    pub fn set_message_listener(&self, listener: Option<Arc<dyn MessageListener>>) {
        self.messages.set(listener);
    }
}

impl Drop for BeaconClient {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl fmt::Display for BeaconClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BeaconClient[host={}, port={}, interval={:?}, max_retries={}]",
            self.host, self.server_port, self.poll_interval, self.max_retries
        )
    }
}
