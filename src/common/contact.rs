//! Struct and implementation of the Contact entry in the Kademlia routing table
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use crate::common::Id;

#[derive(Debug, Clone, Copy)]
/// Contact entry in Kademlia routing table
///
/// Two contacts are equal if their Ids are equal, the address is only
/// where the peer was last seen.
pub struct Contact {
    id: Id,
    address: SocketAddr,
}

impl Contact {
    /// Creates a new Contact from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Contact {
        Contact { id, address }
    }

    /// Creates a Contact whose id is derived from its address.
    pub fn from_address(address: SocketAddr) -> Contact {
        Contact {
            id: Id::from_address(&address),
            address,
        }
    }

    /// Creates a contact with a random id on `127.0.0.1:0`, for tests and benchmarks.
    pub fn random() -> Contact {
        Contact {
            id: Id::random(),
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns `true` if both the id and the address match.
    pub fn same_address(&self, other: &Contact) -> bool {
        self.id == other.id && self.address == other.address
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
