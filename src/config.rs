use std::time::Duration;

use crate::kbucket::{DEFAULT_REPLACEMENT_CACHE_SIZE, MAX_BUCKET_SIZE_K};
use crate::verifier::{DEFAULT_MAX_PENDING_PROBES, DEFAULT_PROBE_WORKERS};

/// Default upper bound on a single liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Routing table configurations
pub struct Config {
    /// Maximum number of contacts in each k-bucket.
    ///
    /// This is also the default `count` of [crate::RoutingTable::closest].
    ///
    /// Defaults to [MAX_BUCKET_SIZE_K]
    pub k: usize,
    /// Maximum number of contacts each bucket keeps aside while it is full,
    /// to replace evicted contacts.
    ///
    /// Defaults to [DEFAULT_REPLACEMENT_CACHE_SIZE]
    pub replacement_cache_size: usize,
    /// Upper bound on how long [crate::RoutingTable::add] waits for a
    /// liveness probe before treating the probed contact as dead.
    ///
    /// `None` trusts the verifier to bound its own probes.
    ///
    /// Defaults to [DEFAULT_PROBE_TIMEOUT]
    pub probe_timeout: Option<Duration>,
    /// Number of threads running timed liveness probes.
    ///
    /// Unused when `probe_timeout` is `None`.
    ///
    /// Defaults to [DEFAULT_PROBE_WORKERS]
    pub probe_workers: usize,
    /// Maximum number of timed probes waiting for a worker. A probe that
    /// finds the queue full treats the contact as dead.
    ///
    /// Defaults to [DEFAULT_MAX_PENDING_PROBES]
    pub max_pending_probes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k: MAX_BUCKET_SIZE_K,
            replacement_cache_size: DEFAULT_REPLACEMENT_CACHE_SIZE,
            probe_timeout: Some(DEFAULT_PROBE_TIMEOUT),
            probe_workers: DEFAULT_PROBE_WORKERS,
            max_pending_probes: DEFAULT_MAX_PENDING_PROBES,
        }
    }
}
