//! Unsynchronized routing table state, guarded by [super::RoutingTable].

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;

use tracing::{debug, trace};

use crate::common::{Contact, Id};
use crate::kbucket::{InsertOutcome, KBucket};
use crate::verifier::Liveness;

/// Result of [crate::RoutingTable::add].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The contact carries the owner's own id and was not added.
    Ignored,
    /// The contact was new and its bucket had room.
    Inserted,
    /// The contact was already known, its address and recency were updated.
    Updated,
    /// The bucket was full and its least recently seen contact is alive.
    /// The contact is kept in the bucket's replacement cache only.
    Rejected,
    /// The bucket was full and its least recently seen contact is already
    /// being probed by another add. The contact waits in the replacement
    /// cache, and may be promoted if that probe fails.
    Queued,
    /// The bucket's least recently seen contact failed its liveness probe and
    /// was evicted.
    Evicted {
        /// The evicted contact.
        evicted: Contact,
        /// Whether the added contact is now in the bucket.
        inserted: bool,
    },
}

/// A full bucket waiting on a liveness probe of its least recently seen contact.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingEviction {
    pub(crate) index: u8,
    pub(crate) least_recently_seen: Contact,
    pub(crate) incoming: Contact,
}

#[derive(Debug)]
pub(crate) enum Insertion {
    Done(AddOutcome),
    Pending(PendingEviction),
}

#[derive(Debug)]
pub(crate) struct Table {
    id: Id,
    k: NonZeroUsize,
    replacement_cache_size: NonZeroUsize,
    /// Buckets keyed by [Id::bucket_index], created on first insertion.
    buckets: BTreeMap<u8, KBucket>,
    /// Contacts with a liveness probe in flight.
    probing: HashSet<Id>,
}

impl Table {
    pub(crate) fn new(id: Id, k: NonZeroUsize, replacement_cache_size: NonZeroUsize) -> Self {
        Table {
            id,
            k,
            replacement_cache_size,
            buckets: BTreeMap::new(),
            probing: HashSet::new(),
        }
    }

    // === Getters ===

    pub(crate) fn id(&self) -> &Id {
        &self.id
    }

    pub(crate) fn k(&self) -> usize {
        self.k.get()
    }

    // === Public Methods ===

    /// First half of an add: insert into the routed bucket, or report which
    /// contact must be probed before the bucket can make room.
    pub(crate) fn insert(&mut self, contact: Contact) -> Insertion {
        let index = match Id::bucket_index(&self.id, contact.id()) {
            Some(index) => index,
            // Do not add self to the routing_table
            None => return Insertion::Done(AddOutcome::Ignored),
        };

        let bucket = self.bucket_mut(index);

        let least_recently_seen = match bucket.insert(contact) {
            InsertOutcome::Inserted => return Insertion::Done(AddOutcome::Inserted),
            InsertOutcome::UpdatedExisting => return Insertion::Done(AddOutcome::Updated),
            InsertOutcome::Full => match bucket.least_recently_seen() {
                Some(least_recently_seen) => *least_recently_seen,
                None => return Insertion::Done(AddOutcome::Rejected),
            },
        };

        if !self.probing.insert(*least_recently_seen.id()) {
            trace!(
                id = ?least_recently_seen.id(),
                incoming = ?contact.id(),
                "Probe already in flight, queued as replacement"
            );

            return Insertion::Done(AddOutcome::Queued);
        }

        Insertion::Pending(PendingEviction {
            index,
            least_recently_seen,
            incoming: contact,
        })
    }

    /// Forget an in-flight probe that will never be committed.
    pub(crate) fn abandon(&mut self, pending: &PendingEviction) {
        self.probing.remove(pending.least_recently_seen.id());
    }

    /// Second half of an add: apply the probe outcome to the bucket.
    ///
    /// Only evicts if the probed contact is still the least recently seen,
    /// so concurrent adds racing on the same probe evict at most once.
    pub(crate) fn commit(&mut self, pending: PendingEviction, liveness: Liveness) -> AddOutcome {
        let PendingEviction {
            index,
            least_recently_seen,
            incoming,
        } = pending;

        self.probing.remove(least_recently_seen.id());

        let bucket = self.bucket_mut(index);

        if liveness == Liveness::Alive {
            if let Some(current) = bucket.get(least_recently_seen.id()).copied() {
                bucket.touch(current);
            }

            debug!(
                id = ?least_recently_seen.id(),
                rejected = ?incoming.id(),
                "Least recently seen contact is alive, keeping it"
            );

            return if bucket.contains(incoming.id()) {
                AddOutcome::Updated
            } else {
                AddOutcome::Rejected
            };
        }

        let still_first = bucket
            .least_recently_seen()
            .map_or(false, |first| first == &least_recently_seen);

        let eviction = if still_first {
            bucket.evict_lru_and_promote()
        } else {
            trace!(
                id = ?least_recently_seen.id(),
                "Stale contact was already evicted or refreshed"
            );
            None
        };

        if let Some(eviction) = &eviction {
            debug!(
                evicted = ?eviction.evicted.id(),
                promoted = ?eviction.promoted.map(|c| *c.id()),
                "Evicted stale contact"
            );
        }

        let outcome = bucket.insert(incoming);

        match (eviction, outcome) {
            (Some(eviction), outcome) => AddOutcome::Evicted {
                evicted: eviction.evicted,
                inserted: outcome != InsertOutcome::Full,
            },
            (None, InsertOutcome::Inserted) => AddOutcome::Inserted,
            (None, InsertOutcome::UpdatedExisting) => AddOutcome::Updated,
            (None, InsertOutcome::Full) => AddOutcome::Rejected,
        }
    }

    /// Remove a contact from this routing table.
    pub(crate) fn remove(&mut self, id: &Id) -> bool {
        let index = match Id::bucket_index(&self.id, id) {
            Some(index) => index,
            None => return false,
        };

        match self.buckets.get_mut(&index) {
            Some(bucket) => bucket.remove(id),
            None => false,
        }
    }

    /// Exact match lookup in the bucket `id` routes to.
    pub(crate) fn lookup(&self, id: &Id) -> Option<Contact> {
        let index = Id::bucket_index(&self.id, id)?;

        self.buckets.get(&index)?.get(id).copied()
    }

    /// Up to `count` contacts closest to `target`, sorted by XOR distance.
    pub(crate) fn find_k_nearest(&self, target: &Id, count: usize) -> Vec<Contact> {
        if count == 0 {
            return Vec::new();
        }

        let mut candidates = Vec::with_capacity(count);

        let start = match Id::bucket_index(&self.id, target) {
            Some(index) => {
                if let Some(bucket) = self.buckets.get(&index) {
                    candidates.extend(bucket.iter().copied());
                }

                // Contacts in every bucket below `index` share the same
                // highest differing bit with the target, so none of these
                // buckets can be cut short.
                if candidates.len() < count {
                    for bucket in self.buckets.range(..index).map(|(_, bucket)| bucket) {
                        candidates.extend(bucket.iter().copied());
                    }
                }

                index + 1
            }
            // Distance to the owner is the bucket index itself.
            None => 0,
        };

        // Each bucket above `start` is strictly farther than the previous one.
        for bucket in self.buckets.range(start..).map(|(_, bucket)| bucket) {
            if candidates.len() >= count {
                break;
            }

            candidates.extend(bucket.iter().copied());
        }

        candidates.sort_by(|a, b| target.cmp_distance(a.id(), b.id()));
        candidates.truncate(count);

        candidates
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }

    pub(crate) fn contains(&self, id: &Id) -> bool {
        self.lookup(id).is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.is_empty())
    }

    /// Return the number of contacts in this routing table.
    pub(crate) fn size(&self) -> usize {
        self.buckets
            .values()
            .fold(0, |acc, bucket| acc + bucket.len())
    }

    /// Iterate all contacts, nearest buckets first.
    pub(crate) fn contacts(&self) -> impl Iterator<Item = &Contact> + '_ {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    /// Number of contacts in each non-empty bucket, by bucket index.
    pub(crate) fn bucket_sizes(&self) -> Vec<(u8, usize)> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(index, bucket)| (*index, bucket.len()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn bucket(&self, index: u8) -> Option<&KBucket> {
        self.buckets.get(&index)
    }

    // === Private Methods ===

    fn bucket_mut(&mut self, index: u8) -> &mut KBucket {
        let k = self.k;
        let replacement_cache_size = self.replacement_cache_size;

        self.buckets.entry(index).or_insert_with(|| {
            trace!(index, "Creating bucket");
            KBucket::with_capacity(k, replacement_cache_size)
        })
    }
}
