//! RID (resource identifier) tagging.
//!
//! A `Rid` is an unsigned 64-bit tag. The top two bits classify it: `11` URI,
//! `10` bNode, `0x` literal. Two sentinels carry out-of-band meaning: `NULL`
//! (unbound/unmatched) and `GONE` (resource deleted or unresolvable).
//!
//! Grounded in `src/common/4store/datatypes.h` (`FS_RID_NULL`, `FS_RID_GONE`)
//! and `src/common/hash.h` (`FS_IS_URI`, `FS_IS_BNODE`).

use serde::{Deserialize, Serialize};
use std::fmt;

const TAG_MASK: u64 = 0xC000_0000_0000_0000;
const TAG_URI: u64 = 0xC000_0000_0000_0000;
const TAG_BNODE: u64 = 0x8000_0000_0000_0000;

/// Unbound / unmatched.
pub const NULL: Rid = Rid(0x8000_0000_0000_0000);
/// Resource deleted or unresolvable. Must never reach an output row.
pub const GONE: Rid = Rid(0x0000_0000_0000_0000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid(pub u64);

impl Rid {
    pub const fn from_raw(raw: u64) -> Self {
        Rid(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self == NULL
    }

    pub fn is_gone(self) -> bool {
        self == GONE
    }

    /// Tag bits `11`. `NULL` and `GONE` are never classified as URIs even
    /// though `NULL`'s raw bits happen to start `10`.
    pub fn is_uri(self) -> bool {
        !self.is_null() && !self.is_gone() && (self.0 & TAG_MASK) == TAG_URI
    }

    /// Tag bits `10`, excluding the `NULL` sentinel which shares that prefix.
    pub fn is_bnode(self) -> bool {
        !self.is_null() && (self.0 & TAG_MASK) == TAG_BNODE
    }

    /// Tag bit 63 is `0`, excluding the `GONE` sentinel which shares that bit.
    pub fn is_literal(self) -> bool {
        !self.is_gone() && (self.0 >> 63) == 0
    }

    /// Classify this RID, returning `None` for the `NULL`/`GONE` sentinels.
    pub fn class(self) -> Option<RidClass> {
        if self.is_null() || self.is_gone() {
            None
        } else if self.is_uri() {
            Some(RidClass::Uri)
        } else if self.is_bnode() {
            Some(RidClass::BNode)
        } else {
            Some(RidClass::Literal)
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RidClass {
    Uri,
    BNode,
    Literal,
}

/// Dense bNode RID allocator: issues a contiguous range with the bNode tag set.
///
/// Grounded in the `allocate_bnode(count) -> [from, to]` capability of spec §6.
#[derive(Debug, Default)]
pub struct BNodeAllocator {
    next: u64,
}

impl BNodeAllocator {
    pub fn new() -> Self {
        BNodeAllocator { next: 1 }
    }

    /// Allocate `count` dense bNode RIDs, returning the inclusive `[from, to]` range.
    pub fn allocate(&mut self, count: u64) -> (Rid, Rid) {
        assert!(count > 0, "allocate_bnode requires count > 0");
        let from = self.next;
        let to = from + count - 1;
        self.next = to + 1;
        (Rid(TAG_BNODE | from), Rid(TAG_BNODE | to))
    }
}
