//! Lookup guarantees of find_k_nearest over randomly populated tables.

use kbuckets::{AddOutcome, Contact, Id, RoutingTable};
use rand::Rng;
use std::net::SocketAddr;

fn random_contact(rng: &mut impl Rng) -> Contact {
    let address = SocketAddr::from((rng.gen::<[u8; 4]>(), rng.gen::<u16>()));
    Contact::new(Id::random(), address)
}

/// Id sharing the first `shared_bits` bits with `owner`, then random.
fn id_near(owner: &Id, shared_bits: usize, rng: &mut impl Rng) -> Id {
    let mut bytes: [u8; 20] = rng.gen();
    let owner_bytes = owner.as_bytes();

    for bit in 0..shared_bits.min(160) {
        let byte = bit / 8;
        let mask = 0x80 >> (bit % 8);
        bytes[byte] = (bytes[byte] & !mask) | (owner_bytes[byte] & mask);
    }

    Id::from(bytes)
}

/// Random contacts at many prefix lengths, so low buckets are populated too.
fn populated_table(rng: &mut impl Rng) -> RoutingTable {
    let owner = Id::random();
    let table = RoutingTable::new(owner);

    for _ in 0..300 {
        table.add(random_contact(rng));
    }

    for shared_bits in 1..40 {
        for _ in 0..4 {
            let id = id_near(&owner, shared_bits, rng);
            table.add(Contact::new(id, random_contact(rng).address()));
        }
    }

    table
}

fn brute_force(table: &RoutingTable, target: &Id, count: usize) -> Vec<Contact> {
    let mut all = table.contacts();
    all.sort_by(|a, b| target.cmp_distance(a.id(), b.id()));
    all.truncate(count);
    all
}

#[test]
fn sorted_and_not_dominated() {
    let mut rng = rand::thread_rng();

    for _ in 0..10 {
        let table = populated_table(&mut rng);
        let owner = table.id();

        let mut targets = vec![owner, Id::random()];
        for shared_bits in [1, 5, 12, 30] {
            targets.push(id_near(&owner, shared_bits, &mut rng));
        }

        for target in &targets {
            for count in [1, 3, 8, 20, 50] {
                let nearest = table.find_k_nearest(target, count);

                assert_eq!(nearest.len(), count.min(table.size()));

                for pair in nearest.windows(2) {
                    assert!(target.cmp_distance(pair[0].id(), pair[1].id()).is_le());
                }

                assert_eq!(nearest, brute_force(&table, target, count));
            }
        }
    }
}

#[test]
fn short_only_when_table_is_small() {
    let table = RoutingTable::new(Id::random());
    let mut rng = rand::thread_rng();

    for _ in 0..7 {
        table.add(random_contact(&mut rng));
    }

    assert_eq!(table.find_k_nearest(&Id::random(), 20).len(), 7);
    assert_eq!(table.closest(&table.id()).len(), 7);
}

#[test]
fn re_adding_updates_address_everywhere() {
    let table = RoutingTable::new(Id::random());
    let mut rng = rand::thread_rng();

    let contacts: Vec<Contact> = (0..100).map(|_| random_contact(&mut rng)).collect();
    for contact in &contacts {
        table.add(*contact);
    }

    let size = table.size();

    for contact in contacts.iter().filter(|c| table.contains(c.id())) {
        let moved = Contact::new(*contact.id(), SocketAddr::from(([192, 0, 2, 1], 1)));

        assert_eq!(table.add(moved), AddOutcome::Updated);
        assert!(table.lookup(contact.id()).unwrap().same_address(&moved));
    }

    assert_eq!(table.size(), size);
}

#[test]
fn remove_twice_is_idempotent() {
    let table = RoutingTable::new(Id::random());
    let mut rng = rand::thread_rng();

    let contacts: Vec<Contact> = (0..50).map(|_| random_contact(&mut rng)).collect();
    for contact in &contacts {
        table.add(*contact);
    }

    let removed = contacts[0];

    assert!(table.remove(removed.id()));
    let after_first = table.contacts();

    assert!(!table.remove(removed.id()));
    assert_eq!(table.contacts(), after_first);
    assert!(table.lookup(removed.id()).is_none());
}
