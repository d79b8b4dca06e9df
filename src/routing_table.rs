//! Thread-safe Kademlia routing table

mod table;

use std::fmt::{self, Debug, Formatter};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::common::{Contact, Id};
use crate::config::Config;
use crate::verifier::{AlwaysAlive, Liveness, StalenessVerifier, TimeoutVerifier};
use crate::{Error, Result};

pub use table::AddOutcome;
use table::{Insertion, PendingEviction, Table};

/// Kademlia routing table, keyed by the XOR distance of contacts to the owner's [Id].
///
/// Every operation runs in a single critical section of one table-wide lock,
/// except [Self::add] on a full bucket, which releases the lock while the
/// [StalenessVerifier] probes the bucket's least recently seen contact.
pub struct RoutingTable {
    table: Mutex<Table>,
    verifier: Arc<dyn StalenessVerifier>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id, default [Config], and a
    /// verifier that considers every contact alive.
    pub fn new(id: Id) -> Self {
        let k = NonZeroUsize::new(Config::default().k).expect("infallible");
        let replacement_cache_size =
            NonZeroUsize::new(Config::default().replacement_cache_size).expect("infallible");

        RoutingTable {
            table: Mutex::new(Table::new(id, k, replacement_cache_size)),
            verifier: Arc::new(AlwaysAlive),
        }
    }

    /// Returns a builder to configure the [RoutingTable] owned by `id`.
    pub fn builder(id: Id) -> RoutingTableBuilder {
        RoutingTableBuilder::new(id)
    }

    // === Getters ===

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> Id {
        *self.lock().id()
    }

    /// Maximum size of each bucket, and the default count of [Self::closest].
    pub fn k(&self) -> usize {
        self.lock().k()
    }

    // === Public Methods ===

    /// Add a contact that was just heard from.
    ///
    /// If its bucket is full, the bucket's least recently seen contact is
    /// probed without holding the lock. A dead (or timed out) contact is
    /// evicted in favor of the most recent replacement and the new contact
    /// is inserted again. A live one keeps its slot, and the new contact
    /// waits in the replacement cache.
    ///
    /// At most one probe per contact is in flight. Adds that find the same
    /// contact already probed return [AddOutcome::Queued] right away.
    pub fn add(&self, contact: Contact) -> AddOutcome {
        let insertion = self.lock().insert(contact);

        let pending = match insertion {
            Insertion::Done(outcome) => return outcome,
            Insertion::Pending(pending) => pending,
        };

        trace!(
            id = ?pending.least_recently_seen.id(),
            incoming = ?contact.id(),
            "Bucket full, probing least recently seen contact"
        );

        let in_flight = InFlight {
            table: self,
            pending: Some(pending),
        };

        let liveness = self.verifier.probe(&pending.least_recently_seen);

        in_flight.commit(liveness)
    }

    /// Remove a contact from this routing table, returns `true` if it was there.
    pub fn remove(&self, id: &Id) -> bool {
        self.lock().remove(id)
    }

    /// Return the stored contact with this exact id.
    pub fn lookup(&self, id: &Id) -> Option<Contact> {
        self.lock().lookup(id)
    }

    /// Return up to `count` contacts closest to `target`, sorted by XOR distance.
    ///
    /// Returns fewer than `count` contacts only if the table holds fewer.
    pub fn find_k_nearest(&self, target: &Id, count: usize) -> Vec<Contact> {
        self.lock().find_k_nearest(target, count)
    }

    /// Return the [Self::k] closest contacts to `target`.
    pub fn closest(&self, target: &Id) -> Vec<Contact> {
        let table = self.lock();
        let k = table.k();

        table.find_k_nearest(target, k)
    }

    /// Drop every bucket, and their replacement caches.
    pub fn clear(&self) {
        self.lock().clear()
    }

    /// Returns `true` if a contact with this id is in the table.
    pub fn contains(&self, id: &Id) -> bool {
        self.lock().contains(id)
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Return the number of contacts in this routing table.
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// Export an owned vector of all contacts, nearest buckets first.
    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().contacts().copied().collect()
    }

    /// Number of contacts in each non-empty bucket, by bucket index.
    pub fn bucket_sizes(&self) -> Vec<(u8, usize)> {
        self.lock().bucket_sizes()
    }

    // === Private Methods ===

    fn lock(&self) -> MutexGuard<'_, Table> {
        // No operation panics halfway through a mutation.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A probe started by [RoutingTable::add], released even if the verifier panics.
struct InFlight<'a> {
    table: &'a RoutingTable,
    pending: Option<PendingEviction>,
}

impl InFlight<'_> {
    fn commit(mut self, liveness: Liveness) -> AddOutcome {
        match self.pending.take() {
            Some(pending) => self.table.lock().commit(pending, liveness),
            None => AddOutcome::Rejected,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.table.lock().abandon(&pending);
        }
    }
}

impl Debug for RoutingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = self.lock();

        f.debug_struct("RoutingTable")
            .field("id", table.id())
            .field("size", &table.size())
            .field("buckets", &table.bucket_sizes())
            .finish()
    }
}

/// Builder for [RoutingTable].
pub struct RoutingTableBuilder {
    id: Id,
    config: Config,
    verifier: Option<Arc<dyn StalenessVerifier>>,
}

impl RoutingTableBuilder {
    fn new(id: Id) -> Self {
        Self {
            id,
            config: Config::default(),
            verifier: None,
        }
    }

    /// Replace the whole [Config].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set [Config::k].
    pub fn k(mut self, k: usize) -> Self {
        self.config.k = k;
        self
    }

    /// Set [Config::replacement_cache_size].
    pub fn replacement_cache_size(mut self, size: usize) -> Self {
        self.config.replacement_cache_size = size;
        self
    }

    /// Set [Config::probe_timeout].
    pub fn probe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set [Config::probe_workers].
    pub fn probe_workers(mut self, workers: usize) -> Self {
        self.config.probe_workers = workers;
        self
    }

    /// Set [Config::max_pending_probes].
    pub fn max_pending_probes(mut self, max_pending: usize) -> Self {
        self.config.max_pending_probes = max_pending;
        self
    }

    /// Verifier used to probe the least recently seen contact of full buckets.
    ///
    /// Defaults to [AlwaysAlive], so full buckets never evict.
    pub fn verifier<V: StalenessVerifier + 'static>(mut self, verifier: V) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Build the [RoutingTable], failing if `k`, the replacement cache size,
    /// or the probe pool sizes are zero.
    pub fn build(self) -> Result<RoutingTable> {
        let k = NonZeroUsize::new(self.config.k).ok_or(Error::InvalidBucketSize("k"))?;
        let replacement_cache_size = NonZeroUsize::new(self.config.replacement_cache_size)
            .ok_or(Error::InvalidBucketSize("replacement_cache_size"))?;
        let probe_workers = NonZeroUsize::new(self.config.probe_workers)
            .ok_or(Error::InvalidProbePool("probe_workers"))?;
        let max_pending_probes = NonZeroUsize::new(self.config.max_pending_probes)
            .ok_or(Error::InvalidProbePool("max_pending_probes"))?;

        let verifier: Arc<dyn StalenessVerifier> = match (self.verifier, self.config.probe_timeout)
        {
            (Some(verifier), Some(timeout)) => Arc::new(TimeoutVerifier::with_pool(
                verifier,
                timeout,
                probe_workers,
                max_pending_probes,
            )),
            (Some(verifier), None) => verifier,
            (None, _) => Arc::new(AlwaysAlive),
        };

        Ok(RoutingTable {
            table: Mutex::new(Table::new(self.id, k, replacement_cache_size)),
            verifier,
        })
    }
}

impl Debug for RoutingTableBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingTableBuilder")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}
