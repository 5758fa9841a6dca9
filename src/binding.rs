//! The columnar binding table: one column per query variable, rows
//! correlated across columns. Grounded in `src/frontend/query-datatypes.h`
//! (`fs_binding`) and the binding operations of `src/frontend/query.c`
//! (`fs_binding_sort`, `fs_binding_uniq`, `fs_binding_merge`,
//! `fs_binding_join`, `fs_binding_union`, `fs_binding_truncate`).

use crate::rid::{Rid, NULL};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ColumnFlags {
    pub bound: bool,
    pub proj: bool,
    pub selected: bool,
    pub used: bool,
    pub need_val: bool,
    pub sort: bool,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub flags: ColumnFlags,
    /// Block this variable first appears in.
    pub appears: usize,
    /// Per-block appearance counts, keyed by block id.
    pub bound_in_block: HashMap<usize, u32>,
    pub vals: Vec<Rid>,
}

impl Column {
    pub fn new(name: impl Into<String>, appears: usize) -> Self {
        Column {
            name: name.into(),
            flags: ColumnFlags::default(),
            appears,
            bound_in_block: HashMap::new(),
            vals: Vec::new(),
        }
    }
}

/// A columnar table of variable bindings. A table with zero rows represents
/// "no solutions"; a table with one all-NULL row represents "ASK true" in
/// some contexts — that distinction is carried by the query's `boolean`
/// field, never inferred from table shape (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    row_count: usize,
    /// After `sort`, `ord[i]` is the physical row for logical row `i`.
    /// Reset to empty by `uniq`/`join`/`union` (canonical physical order).
    pub ord: Vec<usize>,
    pub truncated: bool,
}

impl BindingTable {
    pub fn new() -> Self {
        BindingTable::default()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn ensure_column(&mut self, name: &str, appears: usize) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let mut col = Column::new(name, appears);
        col.vals = vec![NULL; self.row_count];
        let i = self.columns.len();
        self.index.insert(name.to_string(), i);
        self.columns.push(col);
        i
    }

    /// Append one value to `col`, bounds-checking that the column exists and
    /// that every column stays the same length (spec.md §8's column-length
    /// invariant).
    pub fn add(&mut self, col: &str, rid: Rid) {
        let idx = self
            .index
            .get(col)
            .copied()
            .unwrap_or_else(|| panic!("add() to unknown column {col}"));
        for (i, c) in self.columns.iter_mut().enumerate() {
            if i == idx {
                c.vals.push(rid);
                if rid != NULL {
                    c.flags.bound = true;
                }
            } else {
                c.vals.push(NULL);
            }
        }
        self.row_count += 1;
    }

    pub fn new_row_all_null(&mut self) {
        for c in self.columns.iter_mut() {
            c.vals.push(NULL);
        }
        self.row_count += 1;
    }

    /// Builds a fresh table directly from column data, used by the executor
    /// to stage one pattern's bind-call result before absorbing it via
    /// `merge`. Every column must carry exactly `row_count` values.
    pub fn from_columns(columns: Vec<(String, usize, Vec<Rid>)>, row_count: usize) -> BindingTable {
        let mut out = BindingTable::new();
        out.row_count = row_count;
        for (name, appears, vals) in columns {
            assert_eq!(vals.len(), row_count, "column {name} length mismatch in from_columns");
            let mut col = Column::new(name.clone(), appears);
            col.flags.bound = vals.iter().any(|&v| v != NULL);
            col.vals = vals;
            out.index.insert(name, out.columns.len());
            out.columns.push(col);
        }
        out
    }

    /// An empty table sharing this table's schema, used to stage a
    /// per-pattern bind result before absorbing it via `merge`.
    pub fn copy_and_clear(&self) -> BindingTable {
        let mut out = BindingTable::new();
        for c in &self.columns {
            let mut nc = Column::new(c.name.clone(), c.appears);
            nc.flags = c.flags.clone();
            nc.bound_in_block = c.bound_in_block.clone();
            out.index.insert(nc.name.clone(), out.columns.len());
            out.columns.push(nc);
        }
        out
    }

    pub fn assert_column_length_invariant(&self) {
        for c in &self.columns {
            assert_eq!(c.vals.len(), self.row_count, "column {} length mismatch", c.name);
        }
    }

    fn row_compare(&self, cols: &[usize], a: usize, b: usize) -> std::cmp::Ordering {
        for &ci in cols {
            let va = self.columns[ci].vals[a];
            let vb = self.columns[ci].vals[b];
            // NULL compares equal to anything: ignored for OPTIONAL join semantics.
            if va == NULL || vb == NULL {
                continue;
            }
            let ord = va.cmp(&vb);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    }

    /// Quicksort row indices into `ord` using the subset of columns flagged
    /// `sort`.
    pub fn sort(&mut self, cols: &[usize]) {
        let mut idx: Vec<usize> = (0..self.row_count).collect();
        idx.sort_by(|&a, &b| self.row_compare(cols, a, b));
        self.ord = idx;
    }

    fn physical_rows(&self) -> Vec<usize> {
        if self.ord.is_empty() {
            (0..self.row_count).collect()
        } else {
            self.ord.clone()
        }
    }

    /// Linear pass over a sorted table, dropping rows equal on every `bound`
    /// column. Resets `ord` (canonical order afterward).
    pub fn uniq(&mut self) {
        let order = self.physical_rows();
        let bound_cols: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.flags.bound)
            .map(|(i, _)| i)
            .collect();
        let mut kept_rows: Vec<usize> = Vec::with_capacity(order.len());
        for &row in &order {
            let dup = kept_rows.last().is_some_and(|&prev| {
                bound_cols.iter().all(|&ci| self.columns[ci].vals[row] == self.columns[ci].vals[prev])
            });
            if !dup {
                kept_rows.push(row);
            }
        }
        self.reorder_rows(&kept_rows);
        self.ord.clear();
    }

    fn reorder_rows(&mut self, rows: &[usize]) {
        for c in self.columns.iter_mut() {
            c.vals = rows.iter().map(|&r| c.vals[r]).collect();
        }
        self.row_count = rows.len();
    }

    /// Keeps only the given (logical, pre-`ord`) row indices, in the order
    /// given. Used by filter evaluation and the constant-disjunct rewrite to
    /// drop rows without disturbing column identity.
    pub fn retain_rows(&mut self, rows: &[usize]) {
        self.reorder_rows(rows);
        self.ord.clear();
    }

    /// The intra-block absorb (§4.5): pairs up rows of `self` ("into") with
    /// matching rows of `from` on their shared `bound` columns, filling
    /// missing `into` cells from the match. Rows of `into` without a match
    /// are kept as-is; newly introduced columns stay NULL for them
    /// (inner-join-at-block-scope semantics, because the block has already
    /// filtered to compatible rows). When neither side shares a bound
    /// column, every `from` row extends every `into` row.
    pub fn merge(&mut self, from: &BindingTable) {
        for c in from.columns.iter() {
            if !self.index.contains_key(&c.name) {
                self.ensure_column(&c.name, c.appears);
            }
        }

        let shared: Vec<(usize, usize)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                if c.flags.bound {
                    from.index.get(&c.name).map(|&j| (i, j))
                } else {
                    None
                }
            })
            .collect();

        // Row pairs to materialize: (into_row, Some(from_row)) on a match,
        // (into_row, None) when into has no match and from is non-empty
        // enough to require a pass-through.
        let mut pairs: Vec<(usize, Option<usize>)> = Vec::new();
        if self.row_count == 0 {
            for r in 0..from.row_count() {
                pairs.push((usize::MAX, Some(r)));
            }
        } else if shared.is_empty() {
            for into_row in 0..self.row_count {
                if from.row_count() == 0 {
                    pairs.push((into_row, None));
                } else {
                    for from_row in 0..from.row_count() {
                        pairs.push((into_row, Some(from_row)));
                    }
                }
            }
        } else {
            let mut from_by_key: HashMap<Vec<Rid>, Vec<usize>> = HashMap::new();
            for r in 0..from.row_count() {
                let key: Vec<Rid> = shared.iter().map(|&(_, fj)| from.columns[fj].vals[r]).collect();
                from_by_key.entry(key).or_default().push(r);
            }
            for into_row in 0..self.row_count {
                let key: Vec<Rid> = shared.iter().map(|&(i, _)| self.columns[i].vals[into_row]).collect();
                match from_by_key.get(&key) {
                    Some(matches) if !matches.is_empty() => {
                        for &fr in matches {
                            pairs.push((into_row, Some(fr)));
                        }
                    }
                    _ => pairs.push((into_row, None)),
                }
            }
        }

        let new_len = pairs.len();
        for c in self.columns.iter_mut() {
            let from_idx = from.index.get(&c.name).copied();
            let mut new_vals = Vec::with_capacity(new_len);
            for &(into_row, from_row) in &pairs {
                let into_v = if into_row == usize::MAX { NULL } else { c.vals[into_row] };
                let v = if into_v == NULL {
                    match (from_row, from_idx) {
                        (Some(fr), Some(fi)) => from.columns[fi].vals[fr],
                        _ => into_v,
                    }
                } else {
                    into_v
                };
                new_vals.push(v);
            }
            if new_vals.iter().any(|&v| v != NULL) {
                c.flags.bound = true;
            }
            c.vals = new_vals;
        }
        self.row_count = new_len;
        self.ord.clear();
    }

    /// Shared-column equi-join. `kind` selects `INNER`/`LEFT`/`UNION`
    /// semantics per spec.md §4.2.
    pub fn join(a: &BindingTable, b: &BindingTable, kind: JoinKind) -> BindingTable {
        // A column is a join key only when it carries real values on *both*
        // sides; gating on `a`'s flag alone made `join(a, b)` and
        // `join(b, a)` disagree whenever a same-named column was bound on
        // one side and all-NULL on the other, violating the commutativity
        // property of spec.md §8.
        let shared: Vec<(String, usize, usize)> = a
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, ca)| {
                if !ca.flags.bound {
                    return None;
                }
                b.index.get(&ca.name).and_then(|&j| if b.columns[j].flags.bound { Some((ca.name.clone(), i, j)) } else { None })
            })
            .collect();

        let mut out = BindingTable::new();
        for c in a.columns.iter().chain(b.columns.iter()) {
            if out.index.contains_key(&c.name) {
                continue;
            }
            out.ensure_column(&c.name, c.appears);
        }
        out.row_count = 0;

        let mut b_by_key: HashMap<Vec<Rid>, Vec<usize>> = HashMap::new();
        if !shared.is_empty() {
            for r in 0..b.row_count() {
                let key: Vec<Rid> = shared.iter().map(|&(_, _, bj)| b.columns[bj].vals[r]).collect();
                b_by_key.entry(key).or_default().push(r);
            }
        }

        let mut b_matched = vec![false; b.row_count()];
        let mut push_row = |out: &mut BindingTable, a_row: Option<usize>, b_row: Option<usize>| {
            for c in out.columns.iter_mut() {
                let av = a_row.and_then(|ar| a.index.get(&c.name).map(|&ai| a.columns[ai].vals[ar]));
                let bv = b_row.and_then(|br| b.index.get(&c.name).map(|&bi| b.columns[bi].vals[br]));
                let v = match (av, bv) {
                    (Some(x), Some(y)) => {
                        if x == NULL {
                            y
                        } else {
                            x
                        }
                    }
                    (Some(x), None) => x,
                    (None, Some(y)) => y,
                    (None, None) => NULL,
                };
                c.vals.push(v);
                if v != NULL {
                    c.flags.bound = true;
                }
            }
            out.row_count += 1;
        };

        for a_row in 0..a.row_count() {
            let matches: Vec<usize> = if shared.is_empty() {
                (0..b.row_count()).collect()
            } else {
                let key: Vec<Rid> = shared.iter().map(|&(_, ai, _)| a.columns[ai].vals[a_row]).collect();
                b_by_key.get(&key).cloned().unwrap_or_default()
            };
            if matches.is_empty() {
                if kind == JoinKind::Left {
                    push_row(&mut out, Some(a_row), None);
                }
                continue;
            }
            for b_row in matches {
                b_matched[b_row] = true;
                push_row(&mut out, Some(a_row), Some(b_row));
            }
        }

        out.ord.clear();
        out
    }

    /// Append rows of `b` onto `a` (self), lifting columns bound on only one
    /// side (the other side reads NULL there). Does not multiply rows, unlike
    /// `join INNER` over an empty intersection.
    pub fn union(&mut self, b: &BindingTable) {
        for c in b.columns.iter() {
            if !self.index.contains_key(&c.name) {
                self.ensure_column(&c.name, c.appears);
            }
        }
        let a_rows = self.row_count;
        for r in 0..b.row_count() {
            for c in self.columns.iter_mut() {
                let v = b.index.get(&c.name).map(|&bi| b.columns[bi].vals[r]).unwrap_or(NULL);
                c.vals.push(v);
                if v != NULL {
                    c.flags.bound = true;
                }
            }
            self.row_count += 1;
        }
        let _ = a_rows;
        self.ord.clear();
    }

    /// Limit to `n` rows. Returns true (and sets `self.truncated`) when rows
    /// were actually dropped, so the caller can emit the truncation warning
    /// once per query.
    pub fn truncate(&mut self, n: usize) -> bool {
        if self.row_count <= n {
            return false;
        }
        for c in self.columns.iter_mut() {
            c.vals.truncate(n);
        }
        self.row_count = n;
        self.truncated = true;
        self.ord.retain(|&r| r < n);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Union,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(n: u64) -> Rid {
        Rid::from_raw(0xC000_0000_0000_0000 | n)
    }

    #[test]
    fn column_length_invariant_holds_after_add() {
        let mut t = BindingTable::new();
        t.ensure_column("x", 0);
        t.ensure_column("y", 0);
        t.add("x", uri(1));
        t.assert_column_length_invariant();
    }

    #[test]
    fn uniq_drops_duplicate_rows() {
        let mut t = BindingTable::new();
        t.ensure_column("x", 0);
        t.columns[0].flags.bound = true;
        t.add("x", uri(1));
        t.add("x", uri(1));
        t.add("x", uri(2));
        t.sort(&[0]);
        t.uniq();
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn inner_join_commutes_as_multisets() {
        let mut a = BindingTable::new();
        a.ensure_column("x", 0);
        a.columns[0].flags.bound = true;
        a.add("x", uri(1));
        a.add("x", uri(2));

        let mut b = BindingTable::new();
        b.ensure_column("x", 0);
        b.columns[0].flags.bound = true;
        b.ensure_column("y", 0);
        b.add("x", uri(1));
        b.columns[1].vals[0] = uri(10);

        let ab = BindingTable::join(&a, &b, JoinKind::Inner);
        let ba = BindingTable::join(&b, &a, JoinKind::Inner);
        assert_eq!(ab.row_count(), ba.row_count());
        assert_eq!(ab.row_count(), 1);
    }

    #[test]
    fn left_join_identity_pads_child_unique_columns() {
        let mut a = BindingTable::new();
        a.ensure_column("x", 0);
        a.columns[0].flags.bound = true;
        a.add("x", uri(1));
        a.add("x", uri(2));

        let empty = BindingTable::new();
        let joined = BindingTable::join(&a, &empty, JoinKind::Left);
        assert_eq!(joined.row_count(), a.row_count());
    }

    #[test]
    fn inner_join_commutes_when_shared_column_is_unbound_on_one_side() {
        // `a`'s `x` column is present but never written (flags.bound stays
        // false, as if it came from a block that never constrained it);
        // `b`'s `x` column is a real bound column. Neither ordering should
        // treat `x` as a join key, so both directions degrade to the same
        // cross product.
        let mut a = BindingTable::new();
        a.ensure_column("x", 0);
        a.new_row_all_null();
        a.new_row_all_null();
        a.new_row_all_null();

        let mut b = BindingTable::new();
        b.ensure_column("x", 0);
        b.add("x", uri(1));
        b.add("x", uri(2));

        let ab = BindingTable::join(&a, &b, JoinKind::Inner);
        let ba = BindingTable::join(&b, &a, JoinKind::Inner);
        assert_eq!(ab.row_count(), ba.row_count());
        assert_eq!(ab.row_count(), 6);
    }

    #[test]
    fn union_does_not_multiply_rows() {
        let mut a = BindingTable::new();
        a.ensure_column("x", 0);
        a.add("x", uri(1));
        let mut b = BindingTable::new();
        b.ensure_column("x", 0);
        b.add("x", uri(2));
        a.union(&b);
        assert_eq!(a.row_count(), 2);
    }

    #[test]
    fn truncate_reports_whether_it_fired() {
        let mut t = BindingTable::new();
        t.ensure_column("x", 0);
        for i in 0..5 {
            t.add("x", uri(i));
        }
        assert!(t.truncate(3));
        assert_eq!(t.row_count(), 3);
        assert!(!t.truncate(10));
    }
}
