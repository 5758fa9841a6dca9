//! Block-tree compaction (§4.7) and the post-order join/filter engine
//! (§4.6).
//!
//! Grounded in `src/frontend/query.c`'s `fs_query_execute` block-walk (a
//! recursive descent over the parsed tree, folding children into parents
//! depth-first) and `src/frontend/filter.c`'s constant-disjunct rewrite
//! pass. The redesign note in spec.md §9 replaces the source's recursive
//! descent with explicit post-order traversal over an arena of blocks
//! indexed by id, matching this crate's `ast::Query`/`ast::Block` shape.

use crate::ast::{Block, ComparisonOp, FilterExpr, JoinType, PatternTerm, Query};
use crate::binding::{BindingTable, JoinKind};
use crate::filter::{eval, ResolvedEnv};
use crate::rid::Rid;
use crate::storage::RidHasher;
use std::collections::HashMap;

/// A block after compaction: same shape as [`Block`] but patterns/filters
/// may have migrated in from a folded-away INNER child.
#[derive(Debug, Clone)]
pub struct CompactBlock {
    pub id: usize,
    pub parent: Option<usize>,
    pub join_type: JoinType,
    pub union_group: Option<u32>,
    pub patterns: Vec<PatternTerm4>,
    pub filters: Vec<FilterExpr>,
}

/// Carries the original `TriplePattern` plus its originating block id isn't
/// needed after compaction — patterns are plain data, so this alias just
/// keeps the type signature readable at call sites.
type PatternTerm4 = crate::ast::TriplePattern;

/// Merges a child block into its parent iff (a) the child's join type is
/// `INNER`, and (b) at least one of parent/child carries no filters
/// (spec.md §4.7). Patterns and filters migrate up; any block that still
/// points at the folded child is reseated onto the parent. Runs to a fixed
/// point: a chain of three INNER blocks collapses in one pass over
/// decreasing ids since children are always produced after their parents.
pub fn compact_block_tree(query: &Query) -> Vec<CompactBlock> {
    let mut blocks: HashMap<usize, CompactBlock> = query
        .blocks
        .iter()
        .map(|b| {
            (
                b.id,
                CompactBlock {
                    id: b.id,
                    parent: b.parent,
                    join_type: b.join_type,
                    union_group: b.union_group,
                    patterns: b.patterns.clone(),
                    filters: b.filters.clone(),
                },
            )
        })
        .collect();

    let mut removed: Vec<usize> = Vec::new();
    let ids: Vec<usize> = {
        let mut v: Vec<usize> = blocks.keys().copied().collect();
        v.sort_unstable();
        v
    };

    for &id in ids.iter().rev() {
        let Some(child) = blocks.get(&id).cloned() else { continue };
        let Some(parent_id) = child.parent else { continue };
        if child.join_type != JoinType::Inner {
            continue;
        }
        let Some(parent) = blocks.get(&parent_id).cloned() else { continue };
        if !(parent.filters.is_empty() || child.filters.is_empty()) {
            continue;
        }
        // Fold child into parent.
        let mut merged_patterns = parent.patterns.clone();
        merged_patterns.extend(child.patterns.clone());
        let mut merged_filters = parent.filters.clone();
        merged_filters.extend(child.filters.clone());
        if let Some(p) = blocks.get_mut(&parent_id) {
            p.patterns = merged_patterns;
            p.filters = merged_filters;
        }
        // Reseat any block that pointed at the folded child onto the parent.
        for other in blocks.values_mut() {
            if other.parent == Some(id) {
                other.parent = Some(parent_id);
            }
        }
        removed.push(id);
    }

    for id in removed {
        blocks.remove(&id);
    }

    let mut out: Vec<CompactBlock> = blocks.into_values().collect();
    out.sort_by_key(|b| b.id);
    out
}

/// All variables referenced by a filter whose *every* disjunct is
/// `?x = constant`, with every constant of a lexically unambiguous type
/// (i.e. not numeric/decimal/string/datetime — those may have more than one
/// valid lexical form for the same value, so the rewrite is skipped for
/// them per spec.md §9's preserved-literally Open Question).
fn constant_disjunct_candidates(expr: &FilterExpr) -> Option<(String, Vec<PatternTerm>)> {
    fn flatten_or(e: &FilterExpr, out: &mut Vec<FilterExpr>) {
        match e {
            FilterExpr::Or(l, r) => {
                flatten_or(l, out);
                flatten_or(r, out);
            }
            other => out.push(other.clone()),
        }
    }
    let mut disjuncts = Vec::new();
    flatten_or(expr, &mut disjuncts);
    if disjuncts.len() < 2 {
        return None;
    }
    let mut var_name: Option<String> = None;
    let mut constants = Vec::new();
    for d in &disjuncts {
        let FilterExpr::Compare(l, ComparisonOp::Eq, r) = d else { return None };
        let (var_side, const_side) = match (l.as_ref(), r.as_ref()) {
            (FilterExpr::Var(v), other) => (v.clone(), other),
            (other, FilterExpr::Var(v)) => (v.clone(), other),
            _ => return None,
        };
        match var_name {
            Some(ref existing) if *existing != var_side => return None,
            None => var_name = Some(var_side),
            _ => {}
        }
        match const_side {
            FilterExpr::UriConst(u) => constants.push(PatternTerm::Uri(u.clone())),
            // Lexically ambiguous types are deliberately excluded, per spec.md §9.
            _ => return None,
        }
    }
    var_name.map(|v| (v, constants))
}

/// Pre-constrains a variable's column to the given constant set by
/// intersecting its existing bound values with the disjunct's constants, if
/// the column already has rows; otherwise leaves table shape untouched (the
/// pattern executor still has to introduce the column).
pub fn apply_constant_disjunct(table: &mut BindingTable, var: &str, allowed: &[Rid]) {
    let Some(idx) = table.column_index(var) else { return };
    let allowed_set: std::collections::HashSet<Rid> = allowed.iter().copied().collect();
    let keep: Vec<usize> = (0..table.row_count())
        .filter(|&r| {
            let v = table.columns()[idx].vals[r];
            v.is_null() || allowed_set.contains(&v)
        })
        .collect();
    if keep.len() != table.row_count() {
        table.retain_rows(&keep);
    }
}

/// Recognizes and strips a filter-constant-disjunct (§4.6), returning the
/// surviving filters plus any pre-constraint to apply to the table before
/// the remaining filters run.
pub fn extract_constant_disjuncts(
    filters: &[FilterExpr],
    hasher: &dyn RidHasher,
) -> (Vec<FilterExpr>, Vec<(String, Vec<Rid>)>) {
    let mut kept = Vec::new();
    let mut preconstraints = Vec::new();
    for f in filters {
        match constant_disjunct_candidates(f) {
            Some((var, terms)) => {
                let rids: Vec<Rid> = terms
                    .iter()
                    .map(|t| match t {
                        PatternTerm::Uri(u) => hasher.hash_uri(u),
                        _ => unreachable!("only UriConst produced by constant_disjunct_candidates"),
                    })
                    .collect();
                preconstraints.push((var, rids));
            }
            None => kept.push(f.clone()),
        }
    }
    (kept, preconstraints)
}

/// Applies `filters` to `table`, dropping rows whose EBV is false or error
/// (spec.md §4.6). Returns the count of rows dropped due to an evaluation
/// error (surfaced by the caller as warnings keyed off the offending
/// lexical form, per spec.md §7) plus the filtered table.
pub fn apply_filters<'h>(
    mut table: BindingTable,
    filters: &[FilterExpr],
    env_for_row: impl Fn(usize) -> ResolvedEnvOwned<'h>,
) -> (BindingTable, usize) {
    if filters.is_empty() {
        return (table, 0);
    }
    let mut error_rows = 0usize;
    let keep: Vec<usize> = (0..table.row_count())
        .filter(|&r| {
            let owned = env_for_row(r);
            let env = ResolvedEnv { resolved: &owned.resolved, known: &owned.known, hasher: owned.hasher };
            for f in filters {
                let v = eval(f, &table, r, &env);
                match v.ebv() {
                    Ok(true) => continue,
                    Ok(false) => return false,
                    Err(_) => {
                        error_rows += 1;
                        return false;
                    }
                }
            }
            true
        })
        .collect();
    table.retain_rows(&keep);
    (table, error_rows)
}

/// Plain-data stand-in for [`ResolvedEnv`] so a closure can build one per
/// row without fighting the borrow checker over a shared `HashMap`.
pub struct ResolvedEnvOwned<'h> {
    pub resolved: HashMap<Rid, crate::storage::Resource>,
    pub known: crate::filter::KnownDatatypes,
    pub hasher: &'h dyn RidHasher,
}

/// Joins all blocks to their parents in post-order (deepest first), per
/// spec.md §4.6: sibling `UNION`-group blocks first merge via `union` into
/// the group's first member, then that result inner-joins onto the parent.
pub fn join_post_order(
    mut per_block: HashMap<usize, BindingTable>,
    blocks: &[CompactBlock],
) -> BindingTable {
    // Deepest-first = descending id, because children always have a larger
    // id than their parent in this tree's construction order.
    let mut ordered: Vec<&CompactBlock> = blocks.iter().collect();
    ordered.sort_by_key(|b| std::cmp::Reverse(b.id));

    // Group union-group siblings so each group is merged once.
    let mut union_groups: HashMap<u32, Vec<usize>> = HashMap::new();
    for b in blocks {
        if let Some(g) = b.union_group {
            union_groups.entry(g).or_default().push(b.id);
        }
    }
    let mut folded_union_groups: std::collections::HashSet<u32> = std::collections::HashSet::new();

    for block in ordered {
        let Some(parent_id) = block.parent else { continue };
        if let Some(group) = block.union_group {
            if folded_union_groups.contains(&group) {
                continue;
            }
            let members = union_groups.get(&group).cloned().unwrap_or_default();
            let mut iter = members.into_iter();
            let Some(first_id) = iter.next() else { continue };
            let mut merged = per_block.remove(&first_id).unwrap_or_default();
            for sib_id in iter {
                if let Some(sib) = per_block.remove(&sib_id) {
                    merged.union(&sib);
                }
            }
            let parent_table = per_block.remove(&parent_id).unwrap_or_default();
            let joined = BindingTable::join(&parent_table, &merged, JoinKind::Inner);
            per_block.insert(parent_id, joined);
            folded_union_groups.insert(group);
            continue;
        }

        let Some(child_table) = per_block.remove(&block.id) else { continue };
        let parent_table = per_block.remove(&parent_id).unwrap_or_default();
        let kind = match block.join_type {
            JoinType::Inner => JoinKind::Inner,
            JoinType::Left => JoinKind::Left,
            JoinType::Union => JoinKind::Inner, // handled via union_group above when tagged
        };
        let joined = BindingTable::join(&parent_table, &child_table, kind);
        per_block.insert(parent_id, joined);
    }

    per_block.remove(&0).unwrap_or_default()
}
