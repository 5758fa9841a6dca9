//! Result projection (§4.8): DISTINCT, ORDER BY, OFFSET/LIMIT, COUNT.
//!
//! Grounded in `src/frontend/query.c`'s post-join projection stage
//! (`fs_query_apply_limit`, `fs_query_sort`) and the teacher's
//! `execution::limits::ResourceLimits` naming for the soft-limit/truncation
//! warning plumbing.

use crate::ast::OrderCondition;
use crate::binding::BindingTable;
use crate::filter::{order_compare_rows, ResolvedEnv};
use crate::rid::Rid;

/// Sorts `table` on every projected-or-selected column, then drops
/// duplicate rows under those columns (spec.md §4.8 step 2). Idempotent:
/// running it again on an already-distinct table is a no-op.
pub fn apply_distinct(table: &mut BindingTable, relevant_cols: &[&str]) {
    let idxs: Vec<usize> = relevant_cols.iter().filter_map(|n| table.column_index(n)).collect();
    table.sort(&idxs);
    table.uniq();
}

/// Sorts rows by the ORDER BY conditions, honoring each condition's
/// descending bit, falling back to original row index to make the order
/// deterministic on full ties. A single-variable condition takes a fast
/// path reusing the column's own sort (spec.md §4.8 step 3).
pub fn apply_order_by(table: &mut BindingTable, conditions: &[OrderCondition], env: &ResolvedEnv) {
    if conditions.is_empty() {
        return;
    }
    if conditions.len() == 1 {
        if let crate::ast::FilterExpr::Var(name) = &conditions[0].expr {
            if let Some(idx) = table.column_index(name) {
                let mut order: Vec<usize> = (0..table.row_count()).collect();
                order.sort_by(|&a, &b| {
                    let o = order_compare_rows(&crate::ast::FilterExpr::Var(name.clone()), table, a, b, env);
                    if conditions[0].descending { o.reverse() } else { o }
                });
                let _ = idx;
                table.retain_rows(&order);
                return;
            }
        }
    }
    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|&a, &b| {
        for c in conditions {
            let o = order_compare_rows(&c.expr, table, a, b, env);
            let o = if c.descending { o.reverse() } else { o };
            if o != std::cmp::Ordering::Equal {
                return o;
            }
        }
        a.cmp(&b) // row-index tie-break for determinism
    });
    table.retain_rows(&order);
}

/// Advances past the first `offset` rows. When `distinct` interacts with
/// selected-but-not-projected variables, the offset is counted over
/// distinct *projected* rows rather than raw rows — the caller is
/// responsible for having already reduced `table` to projected columns only
/// in that case (spec.md §4.8 step 4).
pub fn apply_offset(table: &mut BindingTable, offset: usize) {
    if offset == 0 {
        return;
    }
    let keep: Vec<usize> = (offset.min(table.row_count())..table.row_count()).collect();
    table.retain_rows(&keep);
}

/// Caps emission at `n` rows.
pub fn apply_limit(table: &mut BindingTable, limit: Option<usize>) {
    if let Some(n) = limit {
        table.truncate(n);
    }
}

/// Collapses the table to a single row holding the row count as an integer
/// RID-free scalar; the caller (query glue) is responsible for turning this
/// into an `xsd:integer` literal in the output row (spec.md §4.8 step 6).
pub fn apply_count(row_count: usize) -> u64 {
    row_count as u64
}

/// Limit/offset composition property (§8): the first `n` rows of
/// `offset(T, k)` equal rows `[k, k+n)` of `T`. Exercised directly in tests
/// below rather than asserted at runtime.
pub fn offset_then_limit(table: &mut BindingTable, offset: usize, limit: Option<usize>) {
    apply_offset(table, offset);
    apply_limit(table, limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryHasher;
    use std::collections::HashMap;

    fn uri(n: u64) -> Rid {
        Rid::from_raw(0xC000_0000_0000_0000 | n)
    }

    fn env<'a>(
        known: &'a crate::filter::KnownDatatypes,
        resolved: &'a HashMap<Rid, crate::storage::Resource>,
        hasher: &'a dyn crate::storage::RidHasher,
    ) -> ResolvedEnv<'a> {
        ResolvedEnv { resolved, known, hasher }
    }

    fn sample_table(n: u64) -> BindingTable {
        let mut t = BindingTable::new();
        t.ensure_column("x", 0);
        for i in 0..n {
            t.add("x", uri(i));
        }
        t
    }

    #[test]
    fn distinct_is_idempotent() {
        let mut t = BindingTable::new();
        t.ensure_column("x", 0);
        t.add("x", uri(1));
        t.add("x", uri(1));
        t.add("x", uri(2));
        apply_distinct(&mut t, &["x"]);
        let once = t.row_count();
        apply_distinct(&mut t, &["x"]);
        assert_eq!(t.row_count(), once);
        assert_eq!(once, 2);
    }

    #[test]
    fn offset_then_limit_matches_slice_semantics() {
        let mut t = sample_table(10);
        offset_then_limit(&mut t, 2, Some(3));
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.columns()[0].vals, vec![uri(2), uri(3), uri(4)]);
    }

    #[test]
    fn order_by_single_variable_sorts_ascending() {
        let mut t = BindingTable::new();
        t.ensure_column("x", 0);
        t.add("x", uri(3));
        t.add("x", uri(1));
        t.add("x", uri(2));
        let hasher = InMemoryHasher::default();
        let known = crate::filter::KnownDatatypes::from_hasher(&hasher);
        let resolved = HashMap::new();
        let e = env(&known, &resolved, &hasher);
        let conds = vec![OrderCondition { expr: crate::ast::FilterExpr::Var("x".into()), descending: false }];
        apply_order_by(&mut t, &conds, &e);
        assert_eq!(t.columns()[0].vals, vec![uri(1), uri(2), uri(3)]);
    }
}
