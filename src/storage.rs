//! Storage capability interfaces the query core depends on (§6), plus a
//! minimal in-memory fake backend used by tests. The real segment storage,
//! bulk import pipeline, and on-disk quad index layout are external
//! collaborators and out of scope per spec.md §1.
//!
//! Grounded in `src/frontend/query.h`/`src/common/4store/datatypes.h`
//! (`fs_bind_slot`, `FS_BIND_*` flag constants) and `src/backend/rhash.c`
//! (resource record storage).

use crate::rid::{BNodeAllocator, Rid};
use bitflags::bitflags;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

bitflags! {
    /// Mirrors `FS_BIND_*` from `datatypes.h`, minus the wire-only bits
    /// (`FS_BIND_START`/`FS_BIND_PRICE` are backend-internal and never
    /// constructed here).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindFlags: u32 {
        const MODEL      = 0x01;
        const SUBJECT    = 0x02;
        const PREDICATE  = 0x04;
        const OBJECT     = 0x08;
        const DISTINCT   = 0x100;
        const OPTIONAL   = 0x200;
        const UNION      = 0x400;
        const BY_SUBJECT = 0x1_000_000;
        const BY_OBJECT  = 0x2_000_000;
    }
}

/// The co-occurrence-of-variables catalogue from spec.md §4.4, used to tell
/// storage which quad slots are constrained to be equal so it can avoid
/// producing non-matching rows (e.g. `?x ?p ?x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotCooccurrence {
    #[default]
    None,
    XxAa,
    XaXa,
    XaAx,
    XaAa,
    AxXa,
    AxAx,
    AxAa,
    AaXx,
    AaXa,
    AaAx,
    AaAa,
    AaBb,
    AbAb,
    AbBa,
}

/// Checks a candidate quad against the equalities a [`SlotCooccurrence`]
/// demands between its four slots. `fs_bind_slot`'s callers never see
/// non-matching quads for a repeated-variable pattern like `?x ?p ?x`
/// because this runs inside the same scan that `slot_matches` does.
fn cooccurrence_holds(same: SlotCooccurrence, g: Rid, s: Rid, p: Rid, o: Rid) -> bool {
    match same {
        SlotCooccurrence::None => true,
        SlotCooccurrence::XxAa => p == o,
        SlotCooccurrence::XaXa => s == o,
        SlotCooccurrence::XaAx => s == p,
        SlotCooccurrence::XaAa => s == p && p == o,
        SlotCooccurrence::AxXa => g == o,
        SlotCooccurrence::AxAx => g == p,
        SlotCooccurrence::AxAa => g == p && p == o,
        SlotCooccurrence::AaXx => g == s,
        SlotCooccurrence::AaXa => g == s && s == o,
        SlotCooccurrence::AaAx => g == s && s == p,
        SlotCooccurrence::AaAa => g == s && s == p && p == o,
        SlotCooccurrence::AaBb => g == s && p == o,
        SlotCooccurrence::AbAb => g == p && s == o,
        SlotCooccurrence::AbBa => g == o && s == p,
    }
}

/// One slot of a bind call: either a fixed set of candidate RIDs (possibly
/// a single constant) or fully unbound.
#[derive(Debug, Clone, Default)]
pub struct SlotSpec {
    pub rids: Vec<Rid>,
    pub unbound: bool,
}

impl SlotSpec {
    pub fn constant(rid: Rid) -> Self {
        SlotSpec { rids: vec![rid], unbound: false }
    }

    pub fn bound(rids: Vec<Rid>) -> Self {
        SlotSpec { rids, unbound: false }
    }

    pub fn unbound() -> Self {
        SlotSpec { rids: Vec::new(), unbound: true }
    }

    /// Cache keys require every slot to be fully constant or fully unbound.
    pub fn is_cacheable(&self) -> bool {
        self.rids.len() <= 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindRequest {
    pub flags: BindFlags,
    pub cooccurrence: SlotCooccurrence,
    pub graph: SlotSpec,
    pub subject: SlotSpec,
    pub predicate: SlotSpec,
    pub object: SlotSpec,
    pub offset: usize,
    pub limit: usize,
}

/// Columns returned by a bind call, row-aligned across slots, in the order
/// the caller requested (per the bits set in `flags`).
#[derive(Debug, Clone, Default)]
pub struct BindColumns {
    pub columns: Vec<(String, Vec<Rid>)>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadFreq {
    pub primary: Rid,
    pub secondary: Rid,
    pub freq: u64,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub rid: Rid,
    pub attr: Rid,
    pub lex: String,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("segment unavailable: {0}")]
    SegmentUnavailable(String),
    #[error("resolve returned GONE for rid {0}")]
    Gone(Rid),
    #[error("storage backend error: {0}")]
    Other(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage capability the executor binds against. Implementations may fan a
/// single call out to many segments in parallel (§5); from the executor's
/// point of view each call is synchronous and either returns columns or an
/// error.
pub trait StorageBackend: Send + Sync {
    fn bind(&self, req: &BindRequest) -> StorageResult<BindColumns>;
    fn reverse_bind(&self, req: &BindRequest) -> StorageResult<BindColumns>;
    fn resolve(&self, segment: u32, rids: &[Rid]) -> StorageResult<Vec<Resource>>;
    fn resolve_all(&self, rids: &[Rid]) -> StorageResult<Vec<Resource>>;
    fn quad_freq(&self, primary: Rid, secondary: Rid) -> Option<QuadFreq>;
    fn allocate_bnode(&self, count: u64) -> (Rid, Rid);
}

/// RID hashing capability (§6). Tag bits are fixed by the rule in spec.md
/// §3: URI RIDs get the `11` prefix forced on, literal RIDs are the keyed
/// hash of lexical form plus attribute RID (so identical lexical forms with
/// different datatypes never collide), bNode RIDs come from the allocator.
pub trait RidHasher {
    fn hash_uri(&self, uri: &str) -> Rid;
    fn hash_literal(&self, lex: &str, attr: Rid) -> Rid;
}

/// A UMAC-shaped (but not cryptographically equivalent) 64-bit keyed hash,
/// standing in for `src/common/umac.c` which is out of scope here.
fn keyed_hash(data: &[u8], key: u64) -> u64 {
    let mut h = key ^ 0xcbf2_9ce4_8422_2325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

#[derive(Debug, Clone)]
pub struct InMemoryHasher {
    key: u64,
}

impl InMemoryHasher {
    pub fn new(key: u64) -> Self {
        InMemoryHasher { key }
    }
}

impl Default for InMemoryHasher {
    fn default() -> Self {
        InMemoryHasher::new(0x4f75_7220_4b65_79ff)
    }
}

impl RidHasher for InMemoryHasher {
    fn hash_uri(&self, uri: &str) -> Rid {
        let h = keyed_hash(uri.as_bytes(), self.key);
        Rid::from_raw(h | 0xC000_0000_0000_0000)
    }

    fn hash_literal(&self, lex: &str, attr: Rid) -> Rid {
        let mut buf = lex.as_bytes().to_vec();
        buf.extend_from_slice(&attr.raw().to_le_bytes());
        let h = keyed_hash(&buf, self.key);
        // Literal RIDs have tag bit 63 clear.
        Rid::from_raw(h & 0x7FFF_FFFF_FFFF_FFFF)
    }
}

/// A trivial in-memory quad store, good enough to exercise every operation
/// in §4 end to end without a real segment cluster.
pub struct InMemoryBackend {
    quads: Mutex<Vec<(Rid, Rid, Rid, Rid)>>,
    resources: Mutex<HashMap<Rid, (Rid, String)>>,
    freq: Mutex<HashMap<(Rid, Rid), u64>>,
    bnodes: Mutex<BNodeAllocator>,
    bind_calls: std::sync::atomic::AtomicUsize,
    reverse_bind_calls: std::sync::atomic::AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            quads: Mutex::new(Vec::new()),
            resources: Mutex::new(HashMap::new()),
            freq: Mutex::new(HashMap::new()),
            bnodes: Mutex::new(BNodeAllocator::new()),
            bind_calls: std::sync::atomic::AtomicUsize::new(0),
            reverse_bind_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `bind()` calls observed so far, for tests that assert which
    /// storage operation the executor actually dispatched through.
    pub fn bind_call_count(&self) -> usize {
        self.bind_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of `reverse_bind()` calls observed so far.
    pub fn reverse_bind_call_count(&self) -> usize {
        self.reverse_bind_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn insert_quad(&self, g: Rid, s: Rid, p: Rid, o: Rid) {
        self.quads.lock().push((g, s, p, o));
        let key = (s, p);
        *self.freq.lock().entry(key).or_insert(0) += 1;
    }

    pub fn register_resource(&self, rid: Rid, attr: Rid, lex: impl Into<String>) {
        self.resources.lock().insert(rid, (attr, lex.into()));
    }

    pub fn mark_gone(&self, rid: Rid) {
        self.resources.lock().remove(&rid);
        self.resources.lock().insert(rid, (crate::rid::GONE, String::new()));
    }

    fn slot_matches(slot: &SlotSpec, value: Rid) -> bool {
        if slot.unbound {
            true
        } else {
            slot.rids.is_empty() || slot.rids.contains(&value)
        }
    }

    fn do_bind(&self, req: &BindRequest) -> StorageResult<BindColumns> {
        let quads = self.quads.lock();
        let mut g_col = Vec::new();
        let mut s_col = Vec::new();
        let mut p_col = Vec::new();
        let mut o_col = Vec::new();
        for &(g, s, p, o) in quads.iter() {
            if Self::slot_matches(&req.graph, g)
                && Self::slot_matches(&req.subject, s)
                && Self::slot_matches(&req.predicate, p)
                && Self::slot_matches(&req.object, o)
                && cooccurrence_holds(req.cooccurrence, g, s, p, o)
            {
                g_col.push(g);
                s_col.push(s);
                p_col.push(p);
                o_col.push(o);
            }
        }
        let mut truncated = false;
        if req.limit > 0 && g_col.len() > req.limit {
            g_col.truncate(req.limit);
            s_col.truncate(req.limit);
            p_col.truncate(req.limit);
            o_col.truncate(req.limit);
            truncated = true;
        }
        // Which slots to echo back is driven by `flags`, not by whether the
        // slot restricted candidates: a reverse-bind slot with several
        // already-known candidate values (`SlotSpec::bound`) still needs its
        // matched value returned so the caller can re-correlate rows back to
        // the binding table it came from (spec.md §4.5's absorb step).
        let mut columns = Vec::new();
        if req.flags.contains(BindFlags::MODEL) {
            columns.push(("graph".to_string(), g_col));
        }
        if req.flags.contains(BindFlags::SUBJECT) {
            columns.push(("subject".to_string(), s_col));
        }
        if req.flags.contains(BindFlags::PREDICATE) {
            columns.push(("predicate".to_string(), p_col));
        }
        if req.flags.contains(BindFlags::OBJECT) {
            columns.push(("object".to_string(), o_col));
        }
        Ok(BindColumns { columns, truncated })
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryBackend {
    fn bind(&self, req: &BindRequest) -> StorageResult<BindColumns> {
        self.bind_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.do_bind(req)
    }

    fn reverse_bind(&self, req: &BindRequest) -> StorageResult<BindColumns> {
        self.reverse_bind_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.do_bind(req)
    }

    fn resolve(&self, _segment: u32, rids: &[Rid]) -> StorageResult<Vec<Resource>> {
        self.resolve_all(rids)
    }

    fn resolve_all(&self, rids: &[Rid]) -> StorageResult<Vec<Resource>> {
        let resources = self.resources.lock();
        let mut out = Vec::with_capacity(rids.len());
        for &rid in rids {
            if rid.is_null() {
                continue;
            }
            match resources.get(&rid) {
                Some((attr, _)) if *attr == crate::rid::GONE => {
                    return Err(StorageError::Gone(rid));
                }
                Some((attr, lex)) => out.push(Resource { rid, attr: *attr, lex: lex.clone() }),
                None if rid.is_bnode() => out.push(Resource {
                    rid,
                    attr: crate::rid::NULL,
                    lex: format!("_:b{:x}", rid.raw() & 0x3FFF_FFFF_FFFF_FFFF),
                }),
                None => {
                    return Err(StorageError::Other(format!("unresolvable rid {rid}")));
                }
            }
        }
        Ok(out)
    }

    fn quad_freq(&self, primary: Rid, secondary: Rid) -> Option<QuadFreq> {
        self.freq.lock().get(&(primary, secondary)).map(|&freq| QuadFreq {
            primary,
            secondary,
            freq,
        })
    }

    fn allocate_bnode(&self, count: u64) -> (Rid, Rid) {
        self.bnodes.lock().allocate(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_uri_sets_uri_tag_bits() {
        let h = InMemoryHasher::default();
        let rid = h.hash_uri("http://example/p");
        assert!(rid.is_uri());
    }

    #[test]
    fn hash_literal_distinguishes_by_attribute() {
        let h = InMemoryHasher::default();
        let xsd_int = Rid::from_raw(1);
        let xsd_str = Rid::from_raw(2);
        let a = h.hash_literal("1", xsd_int);
        let b = h.hash_literal("1", xsd_str);
        assert_ne!(a, b);
        assert!(a.is_literal() && b.is_literal());
    }

    #[test]
    fn resolve_round_trip_for_uri() {
        let backend = InMemoryBackend::new();
        let h = InMemoryHasher::default();
        let rid = h.hash_uri("http://example/s");
        backend.register_resource(rid, crate::rid::NULL, "http://example/s");
        let resolved = backend.resolve_all(&[rid]).unwrap();
        assert_eq!(resolved[0].lex, "http://example/s");
    }

    #[test]
    fn resolve_gone_is_an_error() {
        let backend = InMemoryBackend::new();
        let rid = Rid::from_raw(0xC000_0000_0000_0099);
        backend.register_resource(rid, crate::rid::NULL, "http://example/x");
        backend.mark_gone(rid);
        assert!(backend.resolve_all(&[rid]).is_err());
    }

    #[test]
    fn bind_returns_matching_rows() {
        let backend = InMemoryBackend::new();
        let s1 = Rid::from_raw(0xC000_0000_0000_0001);
        let p = Rid::from_raw(0xC000_0000_0000_0002);
        let o = Rid::from_raw(0x0000_0000_0000_0003);
        backend.insert_quad(crate::rid::NULL, s1, p, o);
        let req = BindRequest {
            flags: BindFlags::SUBJECT,
            subject: SlotSpec::unbound(),
            predicate: SlotSpec::constant(p),
            object: SlotSpec::constant(o),
            graph: SlotSpec::unbound(),
            ..Default::default()
        };
        let cols = backend.bind(&req).unwrap();
        let subject_col = cols.columns.iter().find(|(n, _)| n == "subject").unwrap();
        assert_eq!(subject_col.1, vec![s1]);
    }

    #[test]
    fn cooccurrence_excludes_rows_where_the_repeated_slots_differ() {
        let backend = InMemoryBackend::new();
        let p = Rid::from_raw(0xC000_0000_0000_0001);
        let x = Rid::from_raw(0xC000_0000_0000_0002);
        let y = Rid::from_raw(0xC000_0000_0000_0003);
        backend.insert_quad(crate::rid::NULL, x, p, x); // s == o, matches `?x ?p ?x`
        backend.insert_quad(crate::rid::NULL, x, p, y); // s != o, must be excluded
        let req = BindRequest {
            flags: BindFlags::SUBJECT | BindFlags::OBJECT,
            cooccurrence: SlotCooccurrence::XaXa,
            subject: SlotSpec::unbound(),
            predicate: SlotSpec::constant(p),
            object: SlotSpec::unbound(),
            graph: SlotSpec::unbound(),
            ..Default::default()
        };
        let cols = backend.bind(&req).unwrap();
        let subject_col = cols.columns.iter().find(|(n, _)| n == "subject").unwrap();
        assert_eq!(subject_col.1, vec![x]);
        let object_col = cols.columns.iter().find(|(n, _)| n == "object").unwrap();
        assert_eq!(object_col.1, vec![x]);
    }
}
