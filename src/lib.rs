//! Kademlia routing table core.
//!
//! A [RoutingTable] keeps up to `k` [Contact]s per bucket, where a contact's
//! bucket is the position of the highest bit in which its [Id] differs from
//! the owner's. Full buckets only make room when their least recently seen
//! contact fails a liveness probe through a [StalenessVerifier], which runs
//! without holding the table's lock.
//!
//! ```
//! use std::net::SocketAddr;
//! use kbuckets::{AddOutcome, Contact, Id, RoutingTable};
//!
//! let table = RoutingTable::new(Id::random());
//!
//! let contact = Contact::from_address(SocketAddr::from(([127, 0, 0, 1], 6881)));
//! assert_eq!(table.add(contact), AddOutcome::Inserted);
//!
//! let closest = table.closest(contact.id());
//! assert_eq!(closest[0], contact);
//! ```

mod common;
mod config;
mod error;
pub mod kbucket;
mod routing_table;
pub mod verifier;

pub use crate::common::{Contact, Id, ID_BITS, ID_SIZE};
pub use config::{Config, DEFAULT_PROBE_TIMEOUT};
pub use error::{Error, Result};
pub use kbucket::{InsertOutcome, KBucket, MAX_BUCKET_SIZE_K};
pub use routing_table::{AddOutcome, RoutingTable, RoutingTableBuilder};
pub use verifier::{
    AlwaysAlive, Liveness, StalenessVerifier, TimeoutVerifier, DEFAULT_MAX_PENDING_PROBES,
    DEFAULT_PROBE_WORKERS,
};
