//! Last-evaluation memoization for curves and surfaces.
//!
//! A cache never changes results: it only remembers the most recent
//! `(key, value)` pair. Readers get a clone, so a value can never be torn
//! by another thread's write. Clearing requires `&mut`, which makes every
//! shape mutation exclusive with evaluation.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use gkern_math::MultithreadingMode;
use rustc_hash::FxHashMap;
use tracing::trace;

/// Most per-thread slots kept at once. Slots of exited threads are only
/// reclaimed by eviction.
pub const MAX_THREAD_SLOTS: usize = 32;

/// Per-object evaluation cache keyed by the last evaluated parameter.
pub struct EvalCache<K, V> {
    mode: MultithreadingMode,
    shared: Mutex<Option<(K, V)>>,
    per_thread: Mutex<ThreadSlots<K, V>>,
}

/// Per-thread slots stamped with a write counter.
struct ThreadSlots<K, V> {
    clock: u64,
    slots: FxHashMap<ThreadId, (u64, K, V)>,
}

impl<K, V> ThreadSlots<K, V> {
    fn new() -> Self {
        Self {
            clock: 0,
            slots: FxHashMap::default(),
        }
    }

    fn insert(&mut self, id: ThreadId, key: K, value: V) {
        if self.slots.len() >= MAX_THREAD_SLOTS && !self.slots.contains_key(&id) {
            let oldest = self
                .slots
                .iter()
                .min_by_key(|(_, (stamp, _, _))| *stamp)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                self.slots.remove(&oldest);
                trace!(?oldest, "evicted thread cache slot");
            }
        }
        self.clock += 1;
        self.slots.insert(id, (self.clock, key, value));
    }
}

impl<K: PartialEq + Copy, V: Clone> EvalCache<K, V> {
    /// An empty cache.
    pub fn new(mode: MultithreadingMode) -> Self {
        Self {
            mode,
            shared: Mutex::new(None),
            per_thread: Mutex::new(ThreadSlots::new()),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if self.mode.per_thread() {
            let id = thread::current().id();
            {
                let slots = self.per_thread.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some((_, k, v)) = slots.slots.get(&id) {
                    if *k == key {
                        return v.clone();
                    }
                }
            }
            let value = compute();
            self.per_thread
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id, key, value.clone());
            value
        } else {
            // Single slot: a contended or poisoned slot is simply bypassed.
            let Ok(mut slot) = self.shared.try_lock() else {
                return compute();
            };
            if let Some((k, v)) = slot.as_ref() {
                if *k == key {
                    return v.clone();
                }
            }
            let value = compute();
            *slot = Some((key, value.clone()));
            value
        }
    }

    /// Drop every cached value.
    pub fn clear(&mut self) {
        *self.shared.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
        self.per_thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .clear();
    }

    /// The concurrency mode this cache was built with.
    pub fn mode(&self) -> MultithreadingMode {
        self.mode
    }
}

impl<K: PartialEq + Copy, V: Clone> Clone for EvalCache<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.mode)
    }
}

impl<K, V> fmt::Debug for EvalCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalCache").field("mode", &self.mode).finish()
    }
}
