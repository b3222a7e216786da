//! # Ring-Backed Peer Picker
//!
//! Ties [`crate::ring::HashRing`] to a live set of peer clients: routes a
//! key to a peer id via the ring, then resolves that id to the
//! [`PeerClient`] registered under it, returning `None` when the ring
//! routes the key to this node itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::group::{PeerClient, PeerPicker};
use crate::ring::HashRing;

/// A [`PeerPicker`] backed by a consistent hash ring over named peers,
/// including this node's own id so keys that hash to it correctly stay
/// local.
pub struct RingPeerPicker {
    self_id: String,
    ring: RwLock<HashRing>,
    clients: RwLock<HashMap<String, Arc<dyn PeerClient>>>,
}

impl RingPeerPicker {
    /// Builds a picker for a node identified as `self_id`, with `replicas`
    /// virtual nodes per physical peer on the ring.
    pub fn new(self_id: impl Into<String>, replicas: usize) -> Self {
        let self_id = self_id.into();
        let mut ring = HashRing::new(replicas);
        ring.add(&self_id);
        RingPeerPicker { self_id, ring: RwLock::new(ring), clients: RwLock::new(HashMap::new()) }
    }

    /// Adds or replaces the client used to reach `id`.
    pub fn add_peer(&self, id: impl Into<String>, client: Arc<dyn PeerClient>) {
        let id = id.into();
        self.ring.write().add(&id);
        self.clients.write().insert(id, client);
    }

    /// Removes a peer from the ring and its client mapping.
    pub fn remove_peer(&self, id: &str) {
        self.ring.write().remove(id);
        self.clients.write().remove(id);
    }
}

impl PeerPicker for RingPeerPicker {
    fn pick_owner(&self, key: &str) -> Option<Arc<dyn PeerClient>> {
        let owner = self.ring.read().route(key)?.to_string();
        if owner == self.self_id {
            return None;
        }
        self.clients.read().get(&owner).cloned()
    }

    fn all_peers(&self) -> Vec<Arc<dyn PeerClient>> {
        self.clients.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcache_common::{CacheError, CacheResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingPeer {
        removed: Mutex<Vec<String>>,
    }
    impl RecordingPeer {
        fn new() -> Self {
            RecordingPeer { removed: Mutex::new(Vec::new()) }
        }
    }
    impl PeerClient for RecordingPeer {
        fn get(&self, _group: &str, _key: &str) -> CacheResult<crate::ByteView> {
            Err(CacheError::transport("not implemented in this test double"))
        }
        fn remove(&self, _group: &str, key: &str) -> CacheResult<()> {
            self.removed.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[test]
    fn key_routed_to_self_returns_no_peer() {
        let picker = RingPeerPicker::new("node-a", 10);
        assert!(picker.pick_owner("anything").is_none());
    }

    #[test]
    fn key_routed_to_a_remote_peer_resolves_its_client() {
        let picker = RingPeerPicker::new("node-a", 50);
        let peer = Arc::new(RecordingPeer::new());
        picker.add_peer("node-b", peer.clone());

        // With only two nodes on the ring, every key now routes to
        // whichever of the two owns it; either is a meaningful assertion.
        let counts = Arc::new(AtomicUsize::new(0));
        for i in 0..50 {
            if picker.pick_owner(&format!("key-{i}")).is_some() {
                counts.fetch_add(1, Ordering::SeqCst);
            }
        }
        assert!(counts.load(Ordering::SeqCst) > 0, "at least some keys should route to the remote peer");
    }

    #[test]
    fn all_peers_lists_every_registered_client() {
        let picker = RingPeerPicker::new("node-a", 10);
        picker.add_peer("node-b", Arc::new(RecordingPeer::new()));
        picker.add_peer("node-c", Arc::new(RecordingPeer::new()));
        assert_eq!(picker.all_peers().len(), 2);
    }

    #[test]
    fn removed_peer_is_no_longer_returned() {
        let picker = RingPeerPicker::new("node-a", 10);
        picker.add_peer("node-b", Arc::new(RecordingPeer::new()));
        picker.remove_peer("node-b");
        assert!(picker.all_peers().is_empty());
    }
}
