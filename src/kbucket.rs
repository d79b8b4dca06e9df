//! Kbuckets
use std::{
    fmt::{self, Debug, Formatter},
    num::NonZeroUsize,
    slice::Iter,
};

use lru::LruCache;

use crate::common::{Contact, Id};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;
/// Default capacity of a bucket's replacement cache.
pub const DEFAULT_REPLACEMENT_CACHE_SIZE: usize = MAX_BUCKET_SIZE_K;

/// Result of [KBucket::insert].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The contact was new and the bucket had room.
    Inserted,
    /// The contact was already in the bucket, its address was updated and it
    /// was moved to the most-recently-seen end.
    UpdatedExisting,
    /// The bucket is full. The contact was pushed to the replacement cache,
    /// and the least recently seen contact should be checked for liveness.
    Full,
}

/// Result of [KBucket::evict_lru_and_promote].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// The least recently seen contact that was removed.
    pub evicted: Contact,
    /// The replacement cache entry that took its place, if any.
    pub promoted: Option<Contact>,
}

/// Kbuckets are similar to LRU caches that checks and evicts unresponsive nodes,
/// without dropping any responsive nodes in the process.
pub struct KBucket {
    /// K (as in k-bucket) is the maximum number of contacts in a k-bucket.
    k: usize,
    /// Contacts in the k-bucket, sorted by the least recently seen.
    contacts: Vec<Contact>,
    /// Contacts seen while the bucket was full, waiting for a slot.
    replacements: LruCache<Id, Contact>,
}

impl KBucket {
    /// Create a bucket of [MAX_BUCKET_SIZE_K] contacts and
    /// [DEFAULT_REPLACEMENT_CACHE_SIZE] replacements.
    pub fn new() -> Self {
        let k = NonZeroUsize::new(MAX_BUCKET_SIZE_K).expect("infallible");
        let replacements = NonZeroUsize::new(DEFAULT_REPLACEMENT_CACHE_SIZE).expect("infallible");

        Self::with_capacity(k, replacements)
    }

    /// Create a bucket holding up to `k` contacts and `replacements` cached candidates.
    pub fn with_capacity(k: NonZeroUsize, replacements: NonZeroUsize) -> Self {
        KBucket {
            k: k.get(),
            contacts: Vec::with_capacity(k.get()),
            replacements: LruCache::new(replacements),
        }
    }

    // === Getters ===

    /// Maximum number of contacts in this bucket.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.len() >= self.k
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.iter().any(|contact| contact.id() == id)
    }

    pub fn get(&self, id: &Id) -> Option<&Contact> {
        self.iter().find(|contact| contact.id() == id)
    }

    /// The contact at the front of the bucket, first candidate for eviction.
    pub fn least_recently_seen(&self) -> Option<&Contact> {
        self.contacts.first()
    }

    /// Iterate contacts from least to most recently seen.
    pub fn iter(&self) -> Iter<'_, Contact> {
        self.contacts.iter()
    }

    /// Owned copy of the contacts, least recently seen first.
    ///
    /// Always exactly [Self::len] entries.
    pub fn snapshot(&self) -> Vec<Contact> {
        self.contacts.clone()
    }

    /// Owned copy of the replacement cache, least recently seen first.
    pub fn replacement_cache(&self) -> Vec<Contact> {
        self.replacements.iter().rev().map(|(_, c)| *c).collect()
    }

    // === Public Methods ===

    /// If a contact with the same id is in the bucket, store the given address
    /// and move it to the most recently seen end.
    pub fn touch(&mut self, contact: Contact) -> bool {
        match self.position(contact.id()) {
            Some(index) => {
                self.contacts.remove(index);
                self.contacts.push(contact);
                true
            }
            None => false,
        }
    }

    /// Insert a contact that was just heard from.
    pub fn insert(&mut self, contact: Contact) -> InsertOutcome {
        if self.touch(contact) {
            InsertOutcome::UpdatedExisting
        } else if self.contacts.len() < self.k {
            self.replacements.pop(contact.id());
            self.contacts.push(contact);

            InsertOutcome::Inserted
        } else {
            // Evicts the least recently seen replacement if the cache is full.
            self.replacements.put(*contact.id(), contact);

            InsertOutcome::Full
        }
    }

    /// Remove the least recently seen contact, and fill its slot with the
    /// most recently seen replacement, if any.
    pub fn evict_lru_and_promote(&mut self) -> Option<Eviction> {
        if self.contacts.is_empty() {
            return None;
        }

        let evicted = self.contacts.remove(0);
        let promoted = self.pop_replacement();

        if let Some(promoted) = promoted {
            self.contacts.push(promoted);
        }

        Some(Eviction { evicted, promoted })
    }

    /// Remove a contact from the bucket, and any copy of it from the replacement cache.
    ///
    /// Returns `true` if the contact was in the bucket.
    pub fn remove(&mut self, id: &Id) -> bool {
        self.replacements.pop(id);

        match self.position(id) {
            Some(index) => {
                self.contacts.remove(index);
                true
            }
            None => false,
        }
    }

    // === Private Methods ===

    fn position(&self, id: &Id) -> Option<usize> {
        self.iter().position(|contact| contact.id() == id)
    }

    fn pop_replacement(&mut self) -> Option<Contact> {
        let most_recent = self.replacements.iter().next().map(|(id, _)| *id)?;

        self.replacements.pop(&most_recent)
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for KBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KBucket")
            .field("k", &self.k)
            .field("contacts", &self.contacts)
            .field("replacements", &self.replacements.len())
            .finish()
    }
}
