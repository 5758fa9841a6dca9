//! Two-tier RID-to-resource resolution cache (§4.9).
//!
//! Row-at-a-time output resolves each projected RID to its `(attr, lex)`
//! resource record, batching prefetch across the next N rows (N ≈ 1800,
//! capped by LIMIT) so each storage segment is hit once per window instead
//! of once per cell. Grounded in `src/frontend/results.c`'s row-resolve loop
//! and `src/backend/rhash.c`'s `fs_rhash` two-level resource cache
//! (direct-mapped L2, hash-mapped L1 for the hot window); reshaped here as
//! the teacher's `execution::cache::QueryCache` pattern — a lock-protected
//! map plus a bulk sweep on spill, never returning references into the
//! cache (always copying out under the lock).

use crate::rid::{Rid, GONE, NULL};
use crate::storage::{Resource, StorageBackend, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// L2: direct-mapped array of `capacity` entries, indexed by the low bits of
/// the RID. A collision simply overwrites the slot — no chaining, matching
/// the teacher's/`rhash.c`'s fixed-array design.
struct L2Cache {
    slots: Vec<Option<(Rid, Resource)>>,
}

impl L2Cache {
    fn new(capacity: usize) -> Self {
        L2Cache { slots: vec![None; capacity.max(1)] }
    }

    fn index(&self, rid: Rid) -> usize {
        (rid.raw() as usize) % self.slots.len()
    }

    fn get(&self, rid: Rid) -> Option<Resource> {
        let idx = self.index(rid);
        self.slots[idx].as_ref().filter(|(r, _)| *r == rid).map(|(_, res)| res.clone())
    }

    fn put(&mut self, rid: Rid, resource: Resource) {
        let idx = self.index(rid);
        self.slots[idx] = Some((rid, resource));
    }
}

/// Process-global two-tier resolution cache (§5): L1 is a hash map sized to
/// the current prefetch window, L2 is the fixed 65,536-entry array. Both
/// sit behind one mutex; L1→L2 spill happens in a bulk sweep under that same
/// lock, matching spec.md §5's "no other cross-query sharing" rule — this is
/// the one piece of state that is genuinely process-scoped rather than
/// per-query.
pub struct ResolveCache {
    inner: Mutex<ResolveCacheInner>,
}

struct ResolveCacheInner {
    l1: HashMap<Rid, Resource>,
    l2: L2Cache,
}

impl ResolveCache {
    pub fn new(l2_capacity: usize) -> Self {
        ResolveCache {
            inner: Mutex::new(ResolveCacheInner { l1: HashMap::new(), l2: L2Cache::new(l2_capacity) }),
        }
    }

    /// Look up without touching storage. `NULL` is never cached and always
    /// misses; bNode RIDs are never cached (their lexical form is synthesized
    /// on the fly by the caller instead).
    fn lookup(&self, rid: Rid) -> Option<Resource> {
        if rid.is_null() || rid.is_bnode() {
            return None;
        }
        let inner = self.inner.lock();
        inner.l1.get(&rid).cloned().or_else(|| inner.l2.get(rid))
    }

    fn insert_l1(&self, resources: &[Resource]) {
        let mut inner = self.inner.lock();
        for r in resources {
            if r.rid.is_null() || r.rid.is_bnode() {
                continue;
            }
            inner.l1.insert(r.rid, r.clone());
        }
    }

    /// Spills the current L1 contents into L2 in one bulk sweep under the
    /// lock, then clears L1 — called when the executor advances past the
    /// current prefetch window.
    pub fn spill(&self) {
        let mut inner = self.inner.lock();
        let drained: Vec<(Rid, Resource)> = inner.l1.drain().collect();
        for (rid, res) in drained {
            inner.l2.put(rid, res);
        }
    }

    /// Resolves every RID in `rids`, consulting the cache first and issuing
    /// one batched `resolve_all` call to storage for whatever's left. `GONE`
    /// surfaces as an error per spec.md §4.9 — it must never reach an output
    /// row silently.
    pub fn resolve_batch(
        &self,
        rids: &[Rid],
        backend: &dyn StorageBackend,
    ) -> StorageResult<HashMap<Rid, Resource>> {
        let mut out = HashMap::with_capacity(rids.len());
        let mut misses = Vec::new();
        for &rid in rids {
            if rid.is_gone() {
                return Err(StorageError::Gone(rid));
            }
            if rid.is_null() {
                continue;
            }
            match self.lookup(rid) {
                Some(r) => {
                    out.insert(rid, r);
                }
                None => misses.push(rid),
            }
        }
        misses.sort_unstable();
        misses.dedup();
        if !misses.is_empty() {
            let resolved = backend.resolve_all(&misses)?;
            self.insert_l1(&resolved);
            for r in resolved {
                out.insert(r.rid, r);
            }
        }
        Ok(out)
    }
}

impl Default for ResolveCache {
    fn default() -> Self {
        ResolveCache::new(65_536)
    }
}

/// Synthesizes the `_:b<hex>` lexical form for a bNode RID, never stored in
/// either cache tier per spec.md §4.9.
pub fn bnode_lex(rid: Rid) -> String {
    format!("_:b{:x}", rid.raw() & 0x3FFF_FFFF_FFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryBackend, InMemoryHasher, RidHasher};

    #[test]
    fn resolves_and_caches_a_uri() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let rid = hasher.hash_uri("http://example/s");
        backend.register_resource(rid, NULL, "http://example/s");

        let cache = ResolveCache::new(1024);
        let resolved = cache.resolve_batch(&[rid], &backend).unwrap();
        assert_eq!(resolved[&rid].lex, "http://example/s");
        // Second lookup should hit L1 without needing storage again.
        assert!(cache.lookup(rid).is_some());
    }

    #[test]
    fn null_is_never_cached() {
        let backend = InMemoryBackend::new();
        let cache = ResolveCache::new(8);
        let resolved = cache.resolve_batch(&[NULL], &backend).unwrap();
        assert!(!resolved.contains_key(&NULL));
    }

    #[test]
    fn gone_surfaces_as_error() {
        let backend = InMemoryBackend::new();
        let cache = ResolveCache::new(8);
        let err = cache.resolve_batch(&[GONE], &backend);
        assert!(err.is_err());
    }

    #[test]
    fn spill_moves_l1_entries_into_l2() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let rid = hasher.hash_uri("http://example/s");
        backend.register_resource(rid, NULL, "http://example/s");

        let cache = ResolveCache::new(1024);
        cache.resolve_batch(&[rid], &backend).unwrap();
        cache.spill();
        let inner = cache.inner.lock();
        assert!(inner.l1.is_empty());
        assert!(inner.l2.get(rid).is_some());
    }
}
