//! Liveness checks for contacts that are about to be evicted.

use std::{
    fmt::{self, Debug, Formatter},
    num::NonZeroUsize,
    sync::Arc,
    thread,
    time::Duration,
};

use flume::{Receiver, Sender, TrySendError};
use tracing::{debug, trace};

use crate::common::Contact;

/// Default number of threads running liveness probes for a [TimeoutVerifier].
pub const DEFAULT_PROBE_WORKERS: usize = 4;
/// Default number of probes a [TimeoutVerifier] queues while all workers are busy.
pub const DEFAULT_MAX_PENDING_PROBES: usize = 32;

/// Outcome of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The contact answered.
    Alive,
    /// The contact did not answer, or the probe timed out.
    Dead,
}

/// Checks whether the least recently seen contact of a full bucket is still alive.
///
/// Implemented by the surrounding node, usually by sending a PING and waiting
/// for the response. [crate::RoutingTable] never holds its lock while probing.
pub trait StalenessVerifier: Send + Sync {
    /// Block until `contact` answered or is considered unreachable.
    fn probe(&self, contact: &Contact) -> Liveness;
}

impl<F> StalenessVerifier for F
where
    F: Fn(&Contact) -> Liveness + Send + Sync,
{
    fn probe(&self, contact: &Contact) -> Liveness {
        self(contact)
    }
}

/// Verifier that considers every contact alive, so full buckets never evict.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAlive;

impl StalenessVerifier for AlwaysAlive {
    fn probe(&self, _contact: &Contact) -> Liveness {
        Liveness::Alive
    }
}

/// A probe waiting for a worker, and where to send its answer.
struct ProbeRequest {
    contact: Contact,
    reply: Sender<Liveness>,
}

/// Bounds the duration of another verifier's probes.
///
/// Probes run on a fixed pool of worker threads fed through a bounded queue.
/// A probe that does not finish within `timeout` is reported as
/// [Liveness::Dead], and so is a probe that finds the queue full. Queued
/// probes whose caller already gave up are skipped. Workers exit once every
/// clone of the verifier is dropped and their current probe returns.
#[derive(Clone)]
pub struct TimeoutVerifier {
    requests: Sender<ProbeRequest>,
    timeout: Duration,
    workers: usize,
}

impl TimeoutVerifier {
    /// Wrap `inner` with [DEFAULT_PROBE_WORKERS] workers and
    /// [DEFAULT_MAX_PENDING_PROBES] queued probes.
    pub fn new(inner: Arc<dyn StalenessVerifier>, timeout: Duration) -> Self {
        let workers = NonZeroUsize::new(DEFAULT_PROBE_WORKERS).expect("infallible");
        let max_pending = NonZeroUsize::new(DEFAULT_MAX_PENDING_PROBES).expect("infallible");

        Self::with_pool(inner, timeout, workers, max_pending)
    }

    /// Wrap `inner` with `workers` probe threads and room for `max_pending` queued probes.
    pub fn with_pool(
        inner: Arc<dyn StalenessVerifier>,
        timeout: Duration,
        workers: NonZeroUsize,
        max_pending: NonZeroUsize,
    ) -> Self {
        let (requests, receiver) = flume::bounded::<ProbeRequest>(max_pending.get());

        let mut spawned = 0;
        for i in 0..workers.get() {
            let inner = inner.clone();
            let receiver = receiver.clone();

            match thread::Builder::new()
                .name(format!("kbuckets-probe-{i}"))
                .spawn(move || run_worker(inner, receiver))
            {
                Ok(_) => spawned += 1,
                Err(error) => debug!(?error, "Failed to spawn liveness probe worker"),
            }
        }

        TimeoutVerifier {
            requests,
            timeout,
            workers: spawned,
        }
    }

    /// How long a caller waits for a probe before treating the contact as dead.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of running worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl StalenessVerifier for TimeoutVerifier {
    fn probe(&self, contact: &Contact) -> Liveness {
        let (reply, receiver) = flume::bounded::<Liveness>(1);

        let request = ProbeRequest {
            contact: *contact,
            reply,
        };

        match self.requests.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(id = ?contact.id(), "Too many pending liveness probes");
                return Liveness::Dead;
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(id = ?contact.id(), "No liveness probe workers");
                return Liveness::Dead;
            }
        }

        match receiver.recv_timeout(self.timeout) {
            Ok(liveness) => liveness,
            Err(_) => {
                debug!(id = ?contact.id(), timeout = ?self.timeout, "Liveness probe timed out");
                Liveness::Dead
            }
        }
    }
}

impl Debug for TimeoutVerifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimeoutVerifier{{ timeout: {:?}, workers: {}, pending: {} }}",
            self.timeout,
            self.workers,
            self.requests.len()
        )
    }
}

fn run_worker(inner: Arc<dyn StalenessVerifier>, requests: Receiver<ProbeRequest>) {
    // Ends when every sender, i.e. every TimeoutVerifier clone, is dropped.
    while let Ok(ProbeRequest { contact, reply }) = requests.recv() {
        if reply.is_disconnected() {
            trace!(id = ?contact.id(), "Skipping liveness probe, caller timed out");
            continue;
        }

        // Receiver is gone if the probe already timed out.
        let _ = reply.send(inner.probe(&contact));
    }
}
