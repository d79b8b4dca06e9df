//! Identifiers and contacts shared by buckets and the routing table.

mod contact;
mod id;

pub use contact::*;
pub use id::*;
