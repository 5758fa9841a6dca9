//! Per-block pattern planner (§4.3): a heuristic local reorder, not a
//! cost-based global plan search (explicitly out of scope, spec.md §1).
//!
//! Grounded in `src/frontend/optimiser.c` (`fs_opt_num_vals`, the
//! bound/constant slot classification it does before reordering patterns).

use crate::ast::{PatternTerm, TriplePattern};
use crate::storage::QuadFreq;
use std::collections::HashSet;

/// A lightweight view of one pattern slot, categorized before reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Constant,
    BoundVar,
    UnboundVar,
}

fn classify(term: &PatternTerm, bound_vars: &HashSet<String>) -> SlotKind {
    match term {
        PatternTerm::Variable(name) => {
            if bound_vars.contains(name) {
                SlotKind::BoundVar
            } else {
                SlotKind::UnboundVar
            }
        }
        _ => SlotKind::Constant,
    }
}

fn is_bound(kind: SlotKind) -> bool {
    matches!(kind, SlotKind::Constant | SlotKind::BoundVar)
}

/// Selectivity category, low value = evaluated first. Mirrors the eight
/// buckets of spec.md §4.3 exactly, in order.
fn category(
    pattern: &TriplePattern,
    bound_vars: &HashSet<String>,
    freq: Option<&dyn Fn(&TriplePattern) -> Option<QuadFreq>>,
) -> u8 {
    let s = classify(&pattern.subject, bound_vars);
    let p = classify(&pattern.predicate, bound_vars);
    let o = classify(&pattern.object, bound_vars);

    if let Some(f) = freq {
        if let Some(qf) = f(pattern) {
            if qf.freq == 1 {
                return 0;
            }
        }
    }
    if s == SlotKind::Constant && p == SlotKind::Constant && is_bound(o) {
        return 1;
    }
    if is_bound(s) && p == SlotKind::Constant && o == SlotKind::Constant {
        return 2;
    }
    if s == SlotKind::Constant && is_bound(o) {
        return 3;
    }
    if o == SlotKind::Constant && is_bound(s) {
        return 4;
    }
    if p == SlotKind::Constant && (is_bound(s) || is_bound(o)) {
        return 5;
    }
    if pattern.graph.as_ref().is_some_and(|g| !matches!(g, PatternTerm::Variable(_))) {
        return 6;
    }
    7
}

/// Estimated fan-out used only to break ties between adjacent patterns of
/// equal category: fewer bound slots means a larger expected result.
fn estimated_fanout(pattern: &TriplePattern, bound_vars: &HashSet<String>) -> u8 {
    let mut bound_slots = 0u8;
    if is_bound(classify(&pattern.subject, bound_vars)) {
        bound_slots += 1;
    }
    if is_bound(classify(&pattern.predicate, bound_vars)) {
        bound_slots += 1;
    }
    if is_bound(classify(&pattern.object, bound_vars)) {
        bound_slots += 1;
    }
    3 - bound_slots
}

/// One multi-pattern reverse-bind group: adjacent patterns sharing a
/// variable subject, all with a constant predicate.
#[derive(Debug, Clone)]
pub struct PlannedGroup {
    pub patterns: Vec<TriplePattern>,
    pub is_multi_reverse_bind: bool,
}

/// Reorder `patterns` by the categorical selectivity score, then fold
/// adjacent same-subject/constant-predicate runs into multi-pattern reverse
/// binds, and finally apply one adjacent-swap pass by estimated fan-out.
pub fn plan_block(
    patterns: &[TriplePattern],
    ancestor_bound_vars: &HashSet<String>,
    freq_lookup: Option<&dyn Fn(&TriplePattern) -> Option<QuadFreq>>,
) -> Vec<PlannedGroup> {
    let mut bound_vars = ancestor_bound_vars.clone();
    let mut indexed: Vec<(usize, &TriplePattern)> = patterns.iter().enumerate().collect();

    indexed.sort_by_key(|(_, p)| category(p, &bound_vars, freq_lookup));

    let mut ordered: Vec<TriplePattern> = Vec::with_capacity(patterns.len());
    for (_, p) in indexed {
        ordered.push(p.clone());
        // A variable becomes "bound" for later-pattern classification once
        // any earlier-in-plan pattern introduces it in a non-object slot
        // (conservative: subject/predicate commonly re-used as join keys).
        if let PatternTerm::Variable(v) = &p.subject {
            bound_vars.insert(v.clone());
        }
        if let PatternTerm::Variable(v) = &p.predicate {
            bound_vars.insert(v.clone());
        }
    }

    // Adjacent-swap pass: if pattern i+1 has strictly smaller estimated
    // fan-out than pattern i, and swapping wouldn't break a subject/object
    // dependency, swap them.
    let mut swap_vars = ancestor_bound_vars.clone();
    let mut i = 0;
    while i + 1 < ordered.len() {
        let fi = estimated_fanout(&ordered[i], &swap_vars);
        let fnext = estimated_fanout(&ordered[i + 1], &swap_vars);
        let shares_no_dependency = !patterns_share_variable(&ordered[i], &ordered[i + 1])
            || category(&ordered[i], &swap_vars, freq_lookup) == category(&ordered[i + 1], &swap_vars, freq_lookup);
        if fnext < fi && shares_no_dependency {
            ordered.swap(i, i + 1);
        }
        mark_bound(&ordered[i], &mut swap_vars);
        i += 1;
    }

    group_reverse_binds(ordered)
}

fn mark_bound(p: &TriplePattern, vars: &mut HashSet<String>) {
    if let PatternTerm::Variable(v) = &p.subject {
        vars.insert(v.clone());
    }
    if let PatternTerm::Variable(v) = &p.predicate {
        vars.insert(v.clone());
    }
    if let PatternTerm::Variable(v) = &p.object {
        vars.insert(v.clone());
    }
}

fn patterns_share_variable(a: &TriplePattern, b: &TriplePattern) -> bool {
    let vars_of = |p: &TriplePattern| -> HashSet<String> {
        [&p.subject, &p.predicate, &p.object]
            .into_iter()
            .filter_map(|t| t.as_variable().map(String::from))
            .collect()
    };
    !vars_of(a).is_disjoint(&vars_of(b))
}

fn group_reverse_binds(ordered: Vec<TriplePattern>) -> Vec<PlannedGroup> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < ordered.len() {
        let subject_var = ordered[i].subject.as_variable().map(String::from);
        if let Some(sv) = &subject_var {
            let mut j = i + 1;
            while j < ordered.len()
                && ordered[j].subject.as_variable() == Some(sv.as_str())
                && !matches!(ordered[j].predicate, PatternTerm::Variable(_))
                && !matches!(ordered[i].predicate, PatternTerm::Variable(_))
            {
                j += 1;
            }
            if j > i + 1 {
                groups.push(PlannedGroup {
                    patterns: ordered[i..j].to_vec(),
                    is_multi_reverse_bind: true,
                });
                i = j;
                continue;
            }
        }
        groups.push(PlannedGroup { patterns: vec![ordered[i].clone()], is_multi_reverse_bind: false });
        i += 1;
    }
    groups
}
