//! # Consistent Hash Ring
//!
//! Maps a key to one physical peer such that adding or removing a peer
//! only reshuffles the keys owned by its neighbors on the ring, not the
//! whole keyspace. Each peer is hashed onto the ring at several virtual
//! node positions (`"{replica}-{peer}"` through CRC-32) so a small peer
//! set still gets a reasonably even key distribution; a key's owner is
//! whichever virtual node sits at or after the key's own hash, wrapping
//! around to the first node if the key hashes past every entry.

use std::collections::BTreeMap;

/// A consistent hash ring over a set of named peers, each replicated onto
/// `replicas` virtual nodes.
pub struct HashRing {
    replicas: usize,
    ring: BTreeMap<u32, String>,
}

fn virtual_node_hash(replica: usize, peer: &str) -> u32 {
    let label = format!("{replica}-{peer}");
    crc32fast::hash(label.as_bytes())
}

impl HashRing {
    /// Builds an empty ring. `replicas` is the number of virtual nodes
    /// placed per physical peer.
    pub fn new(replicas: usize) -> Self {
        HashRing { replicas, ring: BTreeMap::new() }
    }

    /// Adds `peer`, placing `replicas` virtual nodes on the ring. A no-op
    /// if `peer` is already present.
    pub fn add(&mut self, peer: &str) {
        for replica in 0..self.replicas {
            self.ring.insert(virtual_node_hash(replica, peer), peer.to_string());
        }
    }

    /// Removes every virtual node belonging to `peer`.
    pub fn remove(&mut self, peer: &str) {
        for replica in 0..self.replicas {
            self.ring.remove(&virtual_node_hash(replica, peer));
        }
    }

    /// Returns the peer owning `key`: the first virtual node at or after
    /// `key`'s hash, wrapping around to the smallest node if `key` hashes
    /// past the last one.
    pub fn route(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let hash = crc32fast::hash(key.as_bytes());
        let owner = self
            .ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, peer)| peer.as_str());
        owner
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of distinct physical peers currently on the ring.
    pub fn peer_count(&self) -> usize {
        self.ring.values().collect::<std::collections::HashSet<_>>().len()
    }
}
