//! # LRU Shard
//!
//! A single-threaded-semantics LRU map with TTL and a byte budget.
//! Callers serialize access through the `RwLock` in
//! [`crate::sharded::ShardedCache`]; this module only implements the data
//! structure and its invariants.
//!
//! ## Design
//!
//! An index-addressed node arena plus a free list gives O(1) LRU
//! relinking without `unsafe` pointer juggling: the doubly linked list is
//! expressed as `prev`/`next` indices into a `Vec<Option<Node>>` rather
//! than raw pointers, and a removed node's slot is pushed onto the free
//! list for reuse instead of shifting the vector.
//!
//! ```text
//! Shard
//!   └── map: HashMap<String, usize>
//!   └── nodes: Vec<Option<Node>>
//!   └── free: Vec<usize>
//!   └── head/tail: LRU indices
//!         └── Node { key, value, expires_at, size, prev, next }
//! ```

use std::time::{Duration, Instant};

use ahash::RandomState;
use hashbrown::HashMap;

/// Observer invoked on eviction. Must not call back into the shard that
/// invoked it — doing so would deadlock on the shard's own lock.
pub type EvictObserver = Box<dyn Fn(&str, &crate::byteview::ByteView) + Send + Sync>;

struct Node {
    key: String,
    value: crate::byteview::ByteView,
    expires_at: Option<Instant>,
    size: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Node {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// A single LRU shard bounded by a byte budget.
///
/// Not internally synchronized — the owner (`ShardedCache`) wraps each
/// shard in its own lock.
pub struct Shard {
    map: HashMap<String, usize, RandomState>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    budget: usize,
    used: usize,
    on_evict: Option<EvictObserver>,
}

impl Shard {
    /// Creates an empty shard with the given byte budget.
    pub fn new(budget: usize) -> Self {
        Shard {
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            budget,
            used: 0,
            on_evict: None,
        }
    }

    /// Registers the eviction observer.
    pub fn set_on_evict(&mut self, observer: EvictObserver) {
        self.on_evict = Some(observer);
    }

    /// Current tracked byte count: sum of `len(key) + len(value)` over all
    /// live entries.
    pub fn bytes(&self) -> usize {
        self.used
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn entry_size(key: &str, value: &crate::byteview::ByteView) -> usize {
        key.len() + value.len()
    }

    /// Inserts or updates `key`, moves it to MRU, and evicts from LRU
    /// order until back under budget.
    pub fn add(&mut self, key: &str, value: crate::byteview::ByteView, ttl: Duration) {
        let expires_at = if ttl.is_zero() { None } else { Some(Instant::now() + ttl) };
        let new_size = Self::entry_size(key, &value);

        if let Some(&idx) = self.map.get(key) {
            let old_size = self.nodes[idx].as_ref().expect("node exists").size;
            if let Some(node) = self.nodes[idx].as_mut() {
                node.value = value;
                node.expires_at = expires_at;
                node.size = new_size;
            }
            self.touch(idx);
            self.used = self.used + new_size - old_size;
        } else {
            let idx = self.free.pop().unwrap_or_else(|| {
                self.nodes.push(None);
                self.nodes.len() - 1
            });
            self.nodes[idx] = Some(Node {
                key: key.to_string(),
                value,
                expires_at,
                size: new_size,
                prev: None,
                next: None,
            });
            self.push_back(idx);
            self.map.insert(key.to_string(), idx);
            self.used += new_size;
        }

        while self.used > self.budget {
            if !self.evict_lru() {
                break;
            }
        }
    }

    /// Looks up `key`. A hit moves the entry to MRU; an expired entry is
    /// evicted and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<crate::byteview::ByteView> {
        let idx = *self.map.get(key)?;
        let now = Instant::now();
        let expired = self.nodes[idx].as_ref().expect("node exists").is_expired(now);
        if expired {
            self.remove_idx(idx);
            return None;
        }
        self.touch(idx);
        Some(self.nodes[idx].as_ref().expect("node exists").value.clone())
    }

    /// Removes `key` if present; no-op otherwise.
    pub fn remove(&mut self, key: &str) {
        if let Some(&idx) = self.map.get(key) {
            self.remove_idx(idx);
        }
    }

    /// Scans at most `budget` entries for expiration, evicting any that
    /// have passed. Bounded so a sweep cannot
    /// monopolize the shard's lock.
    pub fn remove_expired(&mut self, budget: usize) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        for (scanned, (_, &idx)) in self.map.iter().enumerate() {
            if scanned >= budget {
                break;
            }
            if self.nodes[idx].as_ref().expect("node exists").is_expired(now) {
                expired.push(idx);
            }
        }
        let count = expired.len();
        for idx in expired {
            self.remove_idx(idx);
        }
        count
    }

    fn remove_idx(&mut self, idx: usize) {
        self.detach(idx);
        let node = self.nodes[idx].take().expect("node exists");
        self.map.remove(&node.key);
        self.used -= node.size;
        self.free.push(idx);
        if let Some(observer) = &self.on_evict {
            observer(&node.key, &node.value);
        }
    }

    fn evict_lru(&mut self) -> bool {
        match self.head {
            Some(idx) => {
                self.remove_idx(idx);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].as_mut().expect("node exists").next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().expect("node exists").prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_back(&mut self, idx: usize) {
        let tail = self.tail;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = tail;
            node.next = None;
        }
        match tail {
            Some(t) => self.nodes[t].as_mut().expect("node exists").next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.detach(idx);
        self.push_back(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byteview::ByteView;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread::sleep;

    #[test]
    fn add_get_roundtrip() {
        let mut shard = Shard::new(1024);
        shard.add("k", ByteView::new(b"v"), Duration::ZERO);
        assert_eq!(shard.get("k"), Some(ByteView::new(b"v")));
    }

    #[test]
    fn bytes_never_exceed_budget() {
        let mut shard = Shard::new(10);
        shard.add("a", ByteView::new(b"1234"), Duration::ZERO);
        shard.add("b", ByteView::new(b"1234"), Duration::ZERO);
        shard.add("c", ByteView::new(b"1234"), Duration::ZERO);
        assert!(shard.bytes() <= shard.budget());
    }

    #[test]
    fn lru_order_evicts_oldest_first() {
        let mut shard = Shard::new(10);
        shard.add("k1", ByteView::new(b"1234"), Duration::ZERO);
        shard.add("k2", ByteView::new(b"1234"), Duration::ZERO);
        // cumulative bytes (k1:5 + k2:5 + k3:5 = 15) exceed budget 10,
        // exactly one eviction should occur and it must be k1.
        shard.add("k3", ByteView::new(b"1234"), Duration::ZERO);
        assert_eq!(shard.get("k1"), None);
        assert!(shard.get("k2").is_some());
        assert!(shard.get("k3").is_some());
    }

    #[test]
    fn get_after_expiration_misses() {
        let mut shard = Shard::new(1024);
        shard.add("k", ByteView::new(b"v"), Duration::from_millis(1));
        sleep(Duration::from_millis(5));
        assert_eq!(shard.get("k"), None);
    }

    #[test]
    fn remove_is_noop_for_missing_key() {
        let mut shard = Shard::new(1024);
        shard.remove("missing");
        assert!(shard.is_empty());
    }

    #[test]
    fn remove_expired_is_bounded_and_reaps_only_expired() {
        let mut shard = Shard::new(1024);
        shard.add("alive", ByteView::new(b"v"), Duration::ZERO);
        shard.add("dead", ByteView::new(b"v"), Duration::from_millis(1));
        sleep(Duration::from_millis(5));

        let removed = shard.remove_expired(10);
        assert_eq!(removed, 1);
        assert!(shard.get("alive").is_some());
    }

    #[test]
    fn eviction_observer_is_called_without_reentrancy() {
        let mut shard = Shard::new(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        shard.set_on_evict(Box::new(move |_k, _v| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        shard.add("a", ByteView::new(b"1234"), Duration::ZERO);
        shard.add("b", ByteView::new(b"1234"), Duration::ZERO);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
