//! Deduplication cache (C3): a bounded, TTL-scoped set of message
//! fingerprints. `parking_lot::Mutex` keeps the hot path lock cheap and
//! synchronous; a periodic sweep task (spawned by the node) evicts expired
//! entries so memory doesn't grow with idle peers.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mesh_wire::Fingerprint;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300_000);
pub const DEFAULT_CAPACITY: usize = 10_000;

struct Inner {
    seen: HashSet<Fingerprint>,
    order: VecDeque<(Fingerprint, Instant)>,
}

pub struct DedupCache {
    inner: Mutex<Inner>,
    window: Duration,
    capacity: usize,
}

impl DedupCache {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                seen: HashSet::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            window,
            capacity,
        }
    }

    /// idempotent, side-effect-free membership check.
    pub fn has_seen(&self, fp: &Fingerprint) -> bool {
        self.inner.lock().seen.contains(fp)
    }

    /// insert `fp`, evicting the oldest entry first if this
    /// would exceed capacity. Idempotent — inserting an already-seen
    /// fingerprint is a no-op.
    pub fn mark_seen_at(&self, fp: Fingerprint, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.seen.contains(&fp) {
            return;
        }
        if inner.order.len() >= self.capacity {
            if let Some((oldest, _)) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
        inner.seen.insert(fp);
        inner.order.push_back((fp, now));
    }

    pub fn mark_seen(&self, fp: Fingerprint) {
        self.mark_seen_at(fp, Instant::now());
    }

    /// Atomically check-then-insert: returns `true` if this fingerprint is
    /// new (the caller should proceed to relay/deliver), `false` if it is
    /// a duplicate within the current window (the caller must drop it).
    /// Equivalent to `!has_seen(fp)` followed by `mark_seen(fp)` performed
    /// under a single lock acquisition, which is what the router (C6)
    /// needs to avoid a check-then-insert race between concurrent inbound
    /// frames carrying the same fingerprint.
    pub fn check_and_insert_at(&self, fp: Fingerprint, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.seen.contains(&fp) {
            return false;
        }
        if inner.order.len() >= self.capacity {
            if let Some((oldest, _)) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
        inner.seen.insert(fp);
        inner.order.push_back((fp, now));
        true
    }

    pub fn check_and_insert(&self, fp: Fingerprint) -> bool {
        self.check_and_insert_at(fp, Instant::now())
    }

    /// Drop every entry older than `window` relative to `now`.
    pub fn sweep_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        while let Some((fp, seen_at)) = inner.order.front() {
            if now.duration_since(*seen_at) <= self.window {
                break;
            }
            let fp = *fp;
            inner.order.pop_front();
            inner.seen.remove(&fp);
        }
    }

    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint([byte; 32])
    }

    #[test]
    fn first_sighting_is_new_second_is_duplicate() {
        let cache = DedupCache::new(Duration::from_secs(300), 100);
        let now = Instant::now();
        assert!(cache.check_and_insert_at(fp(1), now));
        assert!(!cache.check_and_insert_at(fp(1), now));
    }

    #[test]
    fn has_seen_is_side_effect_free_until_mark_seen_is_called() {
        let cache = DedupCache::new(Duration::from_secs(300), 100);
        let now = Instant::now();
        assert!(!cache.has_seen(&fp(1)));
        assert!(!cache.has_seen(&fp(1)), "has_seen must not itself mark the fingerprint seen");
        cache.mark_seen_at(fp(1), now);
        assert!(cache.has_seen(&fp(1)));
        // mark_seen is idempotent.
        cache.mark_seen_at(fp(1), now);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_eviction_drops_oldest_first() {
        let cache = DedupCache::new(Duration::from_secs(300), 2);
        let now = Instant::now();
        assert!(cache.check_and_insert_at(fp(1), now));
        assert!(cache.check_and_insert_at(fp(2), now));
        assert!(cache.check_and_insert_at(fp(3), now));
        assert_eq!(cache.len(), 2);
        // fp(1) was evicted to make room, so it looks "new" again.
        assert!(cache.check_and_insert_at(fp(1), now));
    }

    #[test]
    fn sweep_removes_entries_past_the_window() {
        let cache = DedupCache::new(Duration::from_millis(10), 100);
        let t0 = Instant::now();
        cache.check_and_insert_at(fp(1), t0);
        cache.sweep_at(t0 + Duration::from_millis(50));
        assert!(cache.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// mark_seen is idempotent — inserting the same fingerprint
        /// any number of times in a row behaves exactly like inserting it
        /// once, and it stays "seen" until the window elapses.
        #[test]
        fn repeated_insertion_of_same_fingerprint_is_idempotent(
            byte in any::<u8>(),
            repeats in 1usize..20,
        ) {
            let cache = DedupCache::new(Duration::from_secs(300), 1000);
            let now = Instant::now();
            let fingerprint = Fingerprint([byte; 32]);

            prop_assert!(cache.check_and_insert_at(fingerprint, now));
            for _ in 0..repeats {
                prop_assert!(!cache.check_and_insert_at(fingerprint, now));
            }
            prop_assert_eq!(cache.len(), 1);
        }

        /// capacity eviction drops the oldest entry first,
        /// regardless of how many distinct fingerprints are inserted beyond
        /// capacity.
        #[test]
        fn capacity_is_never_exceeded(
            distinct_bytes in proptest::collection::hash_set(any::<u8>(), 1..50),
            capacity in 1usize..10,
        ) {
            let cache = DedupCache::new(Duration::from_secs(300), capacity);
            let now = Instant::now();
            for b in distinct_bytes {
                cache.check_and_insert_at(Fingerprint([b; 32]), now);
            }
            prop_assert!(cache.len() <= capacity);
        }
    }
}
