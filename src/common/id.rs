//! Kademlia node Id or a lookup target
use rand::Rng;
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    net::SocketAddr,
    str::FromStr,
};

use crate::{Error, Result};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 20;
/// The size of node IDs in bits, which is also the number of buckets in a routing table.
pub const ID_BITS: usize = ID_SIZE * 8;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
/// Kademlia node Id or a lookup target
pub struct Id([u8; ID_SIZE]);

impl Id {
    /// Create a random Id.
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    /// Derive an Id from a peer's network address.
    ///
    /// The Id is the SHA-1 of the address' string form (`ip:port`), so the
    /// same address always yields the same Id.
    pub fn from_address(address: &SocketAddr) -> Id {
        Id::hash(address.to_string().as_bytes())
    }

    /// SHA-1 of arbitrary bytes, for example a public key.
    pub fn hash<T: AsRef<[u8]>>(input: T) -> Id {
        Id(sha1_smol::Sha1::from(input).digest().bytes())
    }

    /// Returns the inner bytes in big-endian order.
    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Bitwise XOR of two Ids, the Kademlia distance.
    ///
    /// The result is itself an Id, compared by its full 160-bit magnitude.
    pub fn xor(&self, other: &Id) -> Id {
        let mut result = [0_u8; ID_SIZE];

        for (i, byte) in result.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Id(result)
    }

    /// Number of leading zero bits, 160 for the zero Id.
    pub fn leading_zeros(&self) -> u32 {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return i as u32 * 8 + byte.leading_zeros();
            }
        }

        ID_BITS as u32
    }

    /// Returns `true` if all bits are zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Compare `a` and `b` by their XOR distance to `self`.
    ///
    /// Big-endian lexicographic comparison of the XOR results is exactly the
    /// unsigned comparison of the two 160-bit distances.
    pub fn cmp_distance(&self, a: &Id, b: &Id) -> Ordering {
        for i in 0..ID_SIZE {
            let da = a.0[i] ^ self.0[i];
            let db = b.0[i] ^ self.0[i];

            if da != db {
                return da.cmp(&db);
            }
        }

        Ordering::Equal
    }

    /// Index of the bucket `peer` belongs to in a routing table owned by `owner`.
    ///
    /// The index is the position of the highest set bit of `owner ^ peer`,
    /// counted from the least significant bit:
    ///
    /// Index of an Id that differs from the owner only in its last bit is 0
    /// Index of an Id that differs from the owner in its first bit is 159
    /// Index of an Id with 5 leading matching bits is 154
    ///
    /// Returns `None` for the owner itself, which never belongs to a bucket.
    pub fn bucket_index(owner: &Id, peer: &Id) -> Option<u8> {
        let leading_zeros = owner.xor(peer).leading_zeros() as usize;

        if leading_zeros == ID_BITS {
            return None;
        }

        Some((ID_BITS - 1 - leading_zeros) as u8)
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Id {
        Id(bytes)
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if s.len() != ID_SIZE * 2 {
            return Err(Error::InvalidIdEncoding(s.to_string()));
        }

        let mut bytes = [0_u8; ID_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| Error::InvalidIdEncoding(s.to_string()))?;

        Ok(Id(bytes))
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id_with_last_byte(byte: u8) -> Id {
        let mut bytes = [0; ID_SIZE];
        bytes[ID_SIZE - 1] = byte;
        Id(bytes)
    }

    #[test]
    fn xor_is_symmetric_and_zero_to_self() {
        let a = Id::random();
        let b = Id::random();

        assert_eq!(a.xor(&b), b.xor(&a));
        assert!(a.xor(&a).is_zero());
    }

    #[test]
    fn bucket_index_bounds() {
        let owner = Id([0; ID_SIZE]);

        assert_eq!(Id::bucket_index(&owner, &owner), None);
        assert_eq!(Id::bucket_index(&owner, &id_with_last_byte(1)), Some(0));
        assert_eq!(Id::bucket_index(&owner, &id_with_last_byte(0b10)), Some(1));
        assert_eq!(Id::bucket_index(&owner, &id_with_last_byte(0b11)), Some(1));
        assert_eq!(Id::bucket_index(&owner, &id_with_last_byte(0x14)), Some(4));

        let mut far = [0; ID_SIZE];
        far[0] = 0x80;
        assert_eq!(Id::bucket_index(&owner, &Id(far)), Some(159));

        let mut five_matching = [0xff; ID_SIZE];
        five_matching[0] = 0b0000_0111;
        assert_eq!(Id::bucket_index(&owner, &Id(five_matching)), Some(154));
    }

    #[test]
    fn bucket_index_is_symmetric() {
        let a = Id::random();
        let b = Id::random();

        assert_eq!(Id::bucket_index(&a, &b), Id::bucket_index(&b, &a));
    }

    #[test]
    fn cmp_distance_uses_full_width() {
        let target = Id([0; ID_SIZE]);

        // Differ only beyond the first 8 bytes, where a narrowed u64 comparison
        // would consider them equal.
        let mut a = [0; ID_SIZE];
        a[ID_SIZE - 1] = 1;
        let mut b = [0; ID_SIZE];
        b[ID_SIZE - 1] = 2;

        assert_eq!(target.cmp_distance(&Id(a), &Id(b)), Ordering::Less);

        let mut high = [0; ID_SIZE];
        high[0] = 1;
        let mut low = [0xff; ID_SIZE];
        low[0] = 0;

        assert_eq!(target.cmp_distance(&Id(high), &Id(low)), Ordering::Greater);
        assert_eq!(target.cmp_distance(&Id(low), &Id(low)), Ordering::Equal);
    }

    #[test]
    fn from_address_is_deterministic() {
        let address: SocketAddr = "127.0.0.1:6881".parse().unwrap();
        let other: SocketAddr = "127.0.0.1:6882".parse().unwrap();

        assert_eq!(Id::from_address(&address), Id::from_address(&address));
        assert_ne!(Id::from_address(&address), Id::from_address(&other));
        assert_eq!(
            Id::hash("abc").to_string(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn from_str_round_trip() {
        let str = "ba3042eb2d373b19e7c411ce6826e31b37be0b2e";
        let id = Id::from_str(str).unwrap();

        assert_eq!(id.to_string(), str);
        assert_eq!(Id::from_bytes(id.as_bytes()).unwrap(), id);
    }

    #[test]
    fn invalid_ids() {
        assert_eq!(Id::from_bytes([0; 19]), Err(Error::InvalidIdSize(19)));
        assert!(matches!(
            Id::from_str("not hex"),
            Err(Error::InvalidIdEncoding(_))
        ));
        assert!(matches!(
            Id::from_str("zz3042eb2d373b19e7c411ce6826e31b37be0b2e"),
            Err(Error::InvalidIdEncoding(_))
        ));
    }
}
