//! Bounded mapping from public job ids to queue ids.
//!
//! Entries expire after a fixed TTL and the oldest entry is evicted when the
//! store is full, so the mapping cannot grow without bound.

use crate::queue::InternalJobId;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    internal: InternalJobId,
    inserted_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    map: HashMap<String, Entry>,
    /// Insertion log, oldest first. May hold stale keys for overwritten ids.
    order: VecDeque<(String, Instant, u64)>,
    next_seq: u64,
}

impl Inner {
    /// Remove `key` if the log record still describes the live entry.
    fn remove_if_current(&mut self, key: &str, seq: u64) -> bool {
        match self.map.get(key) {
            Some(entry) if entry.seq == seq => {
                self.map.remove(key);
                true
            }
            _ => false,
        }
    }
}

pub struct JobIdStore {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl JobIdStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Map a freshly drawn public id to `internal`.
    ///
    /// `draw` is called up to `max_attempts` times (at least once) while the
    /// drawn id is still live; the draws and the insert happen under one lock.
    /// Returns the id and, if every draw collided, the mapping it replaced.
    pub fn insert_with<F>(
        &self,
        internal: InternalJobId,
        max_attempts: usize,
        mut draw: F,
    ) -> (String, Option<InternalJobId>)
    where
        F: FnMut() -> String,
    {
        let now = Instant::now();
        let mut inner = self.lock();
        let evicted = self.evict(&mut inner, now);
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted job id mappings");
        }

        // eviction removed every expired mapping, so a present key is live
        let mut public = draw();
        for _ in 1..max_attempts {
            if !inner.map.contains_key(&public) {
                break;
            }
            public = draw();
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let replaced = inner
            .map
            .insert(
                public.clone(),
                Entry {
                    internal,
                    inserted_at: now,
                    seq,
                },
            )
            .map(|old| old.internal);
        inner.order.push_back((public.clone(), now, seq));
        (public, replaced)
    }

    /// Expire old entries, then make room for one more.
    fn evict(&self, inner: &mut Inner, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some((key, inserted_at, seq)) = inner.order.front().cloned() {
            let expired = now.duration_since(inserted_at) >= self.ttl;
            let full = inner.map.len() >= self.capacity;
            if !expired && !full {
                break;
            }
            inner.order.pop_front();
            if inner.remove_if_current(&key, seq) {
                evicted += 1;
            }
        }
        evicted
    }

    /// Queue id for a public id, if it was minted and has not expired.
    pub fn get(&self, public: &str) -> Option<InternalJobId> {
        let mut inner = self.lock();
        let entry = inner.map.get(public)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            inner.map.remove(public);
            return None;
        }
        Some(entry.internal.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
