//! The 128-entry direct-mapped bind cache (§4.4).
//!
//! Grounded in `src/frontend/query.c`'s pattern-bind cache (the `p_cache`/
//! `bind_cache` array keyed by a cheap xor-fold of the pattern's constant
//! slots) and the teacher's `execution::cache` module (`CacheEntry`,
//! `CacheStats` naming conventions).

use crate::storage::{BindColumns, SlotSpec};
use parking_lot::Mutex;

/// Only cacheable when every slot is either a single constant or fully
/// unbound (`SlotSpec::is_cacheable`); multi-valued slots bypass the cache
/// entirely rather than trying to key on a whole vector.
fn slot_key(slot: &SlotSpec) -> u64 {
    if slot.unbound {
        0xFFFF_FFFF_FFFF_FFFF
    } else {
        slot.rids.first().map(|r| r.raw()).unwrap_or(0)
    }
}

/// Folds a bind request's four cacheable slots into one direct-mapped index.
fn fold_key(graph: u64, subject: u64, predicate: u64, object: u64) -> u64 {
    graph ^ subject.rotate_left(16) ^ predicate.rotate_left(32) ^ object.rotate_left(48)
}

#[derive(Debug, Clone)]
struct Entry {
    key: u64,
    result: BindColumns,
}

/// Direct-mapped cache of the most recent bind call per slot, sized per
/// spec.md §4.4 (128 entries). A cache miss or a collision both just
/// overwrite the slot; there is no eviction policy beyond that.
pub struct BindCache {
    slots: Mutex<Vec<Option<Entry>>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl BindCache {
    pub fn new(capacity: usize) -> Self {
        BindCache { slots: Mutex::new(vec![None; capacity.max(1)]) }
    }

    fn index_for(&self, key: u64, len: usize) -> usize {
        (key % len as u64) as usize
    }

    /// Look up a cached bind result for the given slots, if this request
    /// shape is cacheable and the last occupant of its slot matches.
    pub fn get(
        &self,
        graph: &SlotSpec,
        subject: &SlotSpec,
        predicate: &SlotSpec,
        object: &SlotSpec,
    ) -> Option<BindColumns> {
        if ![graph, subject, predicate, object].iter().all(|s| s.is_cacheable()) {
            return None;
        }
        let key = fold_key(slot_key(graph), slot_key(subject), slot_key(predicate), slot_key(object));
        let slots = self.slots.lock();
        let idx = self.index_for(key, slots.len());
        slots[idx].as_ref().filter(|e| e.key == key).map(|e| e.result.clone())
    }

    pub fn put(
        &self,
        graph: &SlotSpec,
        subject: &SlotSpec,
        predicate: &SlotSpec,
        object: &SlotSpec,
        result: BindColumns,
    ) {
        if ![graph, subject, predicate, object].iter().all(|s| s.is_cacheable()) {
            return;
        }
        let key = fold_key(slot_key(graph), slot_key(subject), slot_key(predicate), slot_key(object));
        let mut slots = self.slots.lock();
        let idx = self.index_for(key, slots.len());
        slots[idx] = Some(Entry { key, result });
    }
}

impl Default for BindCache {
    fn default() -> Self {
        BindCache::new(128)
    }
}
