//! Per-pattern slot fill and bind dispatch (§4.4/§4.5).
//!
//! Grounded in `src/frontend/query.c` (`fs_query_bind`, the loop that fills
//! four `fs_rid_vector`s per pattern from either constants, already-bound
//! variable columns, or "still unbound"), generalized from the teacher's
//! `execution` module's cache/timeout plumbing.

use crate::ast::{PatternTerm, TriplePattern};
use crate::bind_cache::BindCache;
use crate::binding::BindingTable;
use crate::rid::{Rid, NULL};
use crate::storage::{
    BindFlags, BindRequest, RidHasher, SlotCooccurrence, SlotSpec, StorageBackend, StorageResult,
};
use std::collections::HashMap;

/// Classifies which of a pattern's four slots (graph, subject, predicate,
/// object, in that order) are bound to the same variable, picking the
/// catalogue entry from spec.md §4.4 that names exactly that equivalence.
/// Constants never join a group, matching `check_occurances`'s requirement
/// that every slot in a named group actually carry a variable.
fn classify_cooccurrence(vars: [Option<&str>; 4]) -> SlotCooccurrence {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, name) in vars.iter().enumerate() {
        if let Some(name) = name {
            groups.entry(name).or_default().push(pos);
        }
    }
    let mut repeated: Vec<Vec<usize>> = groups.into_values().filter(|positions| positions.len() >= 2).collect();
    repeated.sort_by_key(|positions| positions[0]);

    match repeated.as_slice() {
        [] => SlotCooccurrence::None,
        [a] => match a.as_slice() {
            [2, 3] => SlotCooccurrence::XxAa,
            [1, 3] => SlotCooccurrence::XaXa,
            [1, 2] => SlotCooccurrence::XaAx,
            [1, 2, 3] => SlotCooccurrence::XaAa,
            [0, 3] => SlotCooccurrence::AxXa,
            [0, 2] => SlotCooccurrence::AxAx,
            [0, 2, 3] => SlotCooccurrence::AxAa,
            [0, 1] => SlotCooccurrence::AaXx,
            [0, 1, 3] => SlotCooccurrence::AaXa,
            [0, 1, 2] => SlotCooccurrence::AaAx,
            [0, 1, 2, 3] => SlotCooccurrence::AaAa,
            _ => SlotCooccurrence::None,
        },
        [a, b] => match (a.as_slice(), b.as_slice()) {
            ([0, 1], [2, 3]) => SlotCooccurrence::AaBb,
            ([0, 2], [1, 3]) => SlotCooccurrence::AbAb,
            ([0, 3], [1, 2]) => SlotCooccurrence::AbBa,
            _ => SlotCooccurrence::None,
        },
        _ => SlotCooccurrence::None,
    }
}

fn variable_name(term: &PatternTerm) -> Option<&str> {
    match term {
        PatternTerm::Variable(v) => Some(v.as_str()),
        _ => None,
    }
}

/// Resolves one pattern term to a bind slot, consulting `table` for already
/// bound variable columns and `hasher` for constant terms.
fn slot_for(
    term: &PatternTerm,
    table: &BindingTable,
    hasher: &dyn RidHasher,
    flag: BindFlags,
    wants: &mut BindFlags,
) -> SlotSpec {
    match term {
        PatternTerm::Uri(u) => SlotSpec::constant(hasher.hash_uri(u)),
        PatternTerm::BNode(_) => SlotSpec::constant(NULL),
        PatternTerm::Literal { lex, datatype, .. } => {
            let attr = datatype.as_deref().map(|d| hasher.hash_uri(d)).unwrap_or(NULL);
            SlotSpec::constant(hasher.hash_literal(lex, attr))
        }
        PatternTerm::Variable(name) => {
            *wants |= flag;
            match table.column(name) {
                None => SlotSpec::unbound(),
                Some(col) if !col.flags.bound => SlotSpec::unbound(),
                Some(col) => {
                    let mut distinct: Vec<Rid> = col.vals.iter().copied().filter(|r| *r != NULL).collect();
                    distinct.sort_unstable();
                    distinct.dedup();
                    if distinct.is_empty() {
                        SlotSpec::unbound()
                    } else {
                        SlotSpec::bound(distinct)
                    }
                }
            }
        }
    }
}

/// Builds the `BindRequest` for one triple pattern against the current
/// binding table, recording which AST variable owns each requested column.
fn build_request(
    pattern: &TriplePattern,
    table: &BindingTable,
    hasher: &dyn RidHasher,
    default_graph: Option<Rid>,
) -> (BindRequest, Vec<(BindFlags, String)>) {
    let mut wants = BindFlags::empty();
    let graph = match &pattern.graph {
        Some(t) => slot_for(t, table, hasher, BindFlags::MODEL, &mut wants),
        None => match default_graph {
            Some(rid) => SlotSpec::constant(rid),
            None => SlotSpec::unbound(),
        },
    };
    let subject = slot_for(&pattern.subject, table, hasher, BindFlags::SUBJECT, &mut wants);
    let predicate = slot_for(&pattern.predicate, table, hasher, BindFlags::PREDICATE, &mut wants);
    let object = slot_for(&pattern.object, table, hasher, BindFlags::OBJECT, &mut wants);

    // Repeated variables (e.g. `?x ?p ?x`) must be staged into the binding
    // table only once: the equality itself is now enforced in storage via
    // `cooccurrence`, so the first slot to mention a name owns its column
    // and later slots sharing that name are dropped rather than clobbering
    // it (mirrors `bind_pattern`'s `numbindings` dedup loop).
    let mut var_names: Vec<(BindFlags, String)> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut push_var = |flag: BindFlags, name: &str| {
        if wants.contains(flag) && seen.insert(name.to_string()) {
            var_names.push((flag, name.to_string()));
        }
    };
    if let Some(PatternTerm::Variable(v)) = &pattern.graph {
        push_var(BindFlags::MODEL, v);
    }
    if let PatternTerm::Variable(v) = &pattern.subject {
        push_var(BindFlags::SUBJECT, v);
    }
    if let PatternTerm::Variable(v) = &pattern.predicate {
        push_var(BindFlags::PREDICATE, v);
    }
    if let PatternTerm::Variable(v) = &pattern.object {
        push_var(BindFlags::OBJECT, v);
    }

    let graph_var = pattern.graph.as_ref().and_then(variable_name);
    let cooccurrence =
        classify_cooccurrence([graph_var, variable_name(&pattern.subject), variable_name(&pattern.predicate), variable_name(&pattern.object)]);

    let req = BindRequest { flags: wants, cooccurrence, graph, subject, predicate, object, offset: 0, limit: 0 };
    (req, var_names)
}

/// Runs one triple pattern against storage (consulting the bind cache first)
/// and absorbs the result into `table` in place, per spec.md §4.5.
///
/// `use_cache` gates the bind cache on `opt_level >= 3` per spec.md §6
/// ("`opt_level` 0 disables planner reordering and bind-cache; 3 additionally
/// enables bind-cache") — at lower levels every bind goes straight to
/// storage, get and put alike.
///
/// `reverse` dispatches through `StorageBackend::reverse_bind` instead of
/// `bind` when the planner (§4.3) has grouped this pattern into a
/// multi-pattern reverse bind — same request shape, different storage
/// operation, per spec.md §4.5/§6.
///
/// Returns `false` when the bind produced zero rows, telling the caller the
/// block as a whole has no solutions (short-circuit).
pub fn bind_pattern_into(
    table: &mut BindingTable,
    pattern: &TriplePattern,
    block_id: usize,
    backend: &dyn StorageBackend,
    hasher: &dyn RidHasher,
    cache: &BindCache,
    default_graph: Option<Rid>,
    use_cache: bool,
    reverse: bool,
) -> StorageResult<bool> {
    let (req, var_names) = build_request(pattern, table, hasher, default_graph);

    let cached = if use_cache { cache.get(&req.graph, &req.subject, &req.predicate, &req.object) } else { None };
    let columns = match cached {
        Some(c) => c,
        None => {
            let result = if reverse { backend.reverse_bind(&req)? } else { backend.bind(&req)? };
            if use_cache {
                cache.put(&req.graph, &req.subject, &req.predicate, &req.object, result.clone());
            }
            result
        }
    };

    let row_count = columns.columns.first().map(|(_, v)| v.len()).unwrap_or(0);
    if row_count == 0 && !var_names.is_empty() {
        return Ok(false);
    }

    let slot_name_for = |flag: BindFlags| -> &'static str {
        match flag {
            BindFlags::MODEL => "graph",
            BindFlags::SUBJECT => "subject",
            BindFlags::PREDICATE => "predicate",
            _ => "object",
        }
    };
    let by_slot_name: std::collections::HashMap<&str, &Vec<Rid>> =
        columns.columns.iter().map(|(n, v)| (n.as_str(), v)).collect();

    let staged_columns: Vec<(String, usize, Vec<Rid>)> = var_names
        .iter()
        .filter_map(|(flag, name)| by_slot_name.get(slot_name_for(*flag)).map(|vals| (name.clone(), block_id, (*vals).clone())))
        .collect();
    let staged = BindingTable::from_columns(staged_columns, row_count);

    table.merge(&staged);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryBackend, InMemoryHasher};

    #[test]
    fn binds_a_single_unbound_pattern() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s = hasher.hash_uri("http://example/s");
        let p = hasher.hash_uri("http://example/p");
        let o = hasher.hash_uri("http://example/o");
        backend.insert_quad(NULL, s, p, o);

        let pattern = TriplePattern {
            graph: None,
            subject: PatternTerm::Variable("s".into()),
            predicate: PatternTerm::Uri("http://example/p".into()),
            object: PatternTerm::Uri("http://example/o".into()),
        };

        let mut table = BindingTable::new();
        table.ensure_column("s", 0);
        let cache = BindCache::new(128);
        let ok = bind_pattern_into(&mut table, &pattern, 0, &backend, &hasher, &cache, None, true, false).unwrap();
        assert!(ok);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn classifies_repeated_subject_object_variable() {
        let same = classify_cooccurrence([None, Some("x"), Some("p"), Some("x")]);
        assert_eq!(same, SlotCooccurrence::XaXa);
        let none = classify_cooccurrence([None, Some("x"), Some("p"), Some("o")]);
        assert_eq!(none, SlotCooccurrence::None);
    }

    #[test]
    fn repeated_pattern_variable_binds_a_single_column_with_matching_rows() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let p = hasher.hash_uri("http://example/p");
        let x = hasher.hash_uri("http://example/x");
        let y = hasher.hash_uri("http://example/y");
        backend.insert_quad(NULL, x, p, x);
        backend.insert_quad(NULL, x, p, y);

        let pattern = TriplePattern {
            graph: None,
            subject: PatternTerm::Variable("x".into()),
            predicate: PatternTerm::Uri("http://example/p".into()),
            object: PatternTerm::Variable("x".into()),
        };
        let mut table = BindingTable::new();
        let cache = BindCache::new(128);
        let ok = bind_pattern_into(&mut table, &pattern, 0, &backend, &hasher, &cache, None, true, false).unwrap();
        assert!(ok);
        assert_eq!(table.row_count(), 1);
        let col = table.column("x").unwrap();
        assert_eq!(col.vals, vec![x]);
    }

    #[test]
    fn zero_matches_reports_false() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let pattern = TriplePattern {
            graph: None,
            subject: PatternTerm::Variable("s".into()),
            predicate: PatternTerm::Uri("http://example/absent".into()),
            object: PatternTerm::Variable("o".into()),
        };
        let mut table = BindingTable::new();
        let cache = BindCache::new(128);
        let ok = bind_pattern_into(&mut table, &pattern, 0, &backend, &hasher, &cache, None, true, false).unwrap();
        assert!(!ok);
    }
}
