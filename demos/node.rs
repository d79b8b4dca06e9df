//! Feeds a routing table with simulated peers, some of which go offline,
//! and prints the closest contacts to a random target.
//!
//! Run: `RUST_LOG=debug cargo run --example node`

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
    time::Duration,
};

use kbuckets::{AddOutcome, Contact, Id, Liveness, RoutingTable};
use tracing::{info, Level};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let offline: Arc<RwLock<HashSet<Id>>> = Arc::new(RwLock::new(HashSet::new()));

    let table = {
        let offline = offline.clone();

        RoutingTable::builder(Id::random())
            .probe_timeout(Some(Duration::from_millis(200)))
            .verifier(move |contact: &Contact| {
                // Pretend to send a PING.
                thread::sleep(Duration::from_millis(5));

                match offline.read() {
                    Ok(offline) if offline.contains(contact.id()) => Liveness::Dead,
                    _ => Liveness::Alive,
                }
            })
            .build()
            .expect("valid config")
    };

    info!(id = %table.id(), "Routing table created");

    let peers: Vec<Contact> = (0..500_u32)
        .map(|i| {
            let address = SocketAddr::from(((0x0a00_0000 + i).to_be_bytes(), 6881));
            Contact::from_address(address)
        })
        .collect();

    for peer in &peers {
        table.add(*peer);
    }

    info!(size = table.size(), buckets = ?table.bucket_sizes(), "Bootstrapped");

    // Half of the peers go offline, new peers keep showing up.
    if let Ok(mut offline) = offline.write() {
        offline.extend(peers.iter().step_by(2).map(|peer| *peer.id()));
    }

    let mut evicted = 0;
    for i in 0..500_u32 {
        let address = SocketAddr::from(((0x0b00_0000 + i).to_be_bytes(), 6881));

        if let AddOutcome::Evicted { .. } = table.add(Contact::from_address(address)) {
            evicted += 1;
        }
    }

    info!(evicted, size = table.size(), "Churn applied");

    let target = Id::random();
    for contact in table.closest(&target) {
        println!(
            "{} {} {:?}",
            contact.id(),
            contact.address(),
            Id::bucket_index(&table.id(), contact.id())
        );
    }
}
