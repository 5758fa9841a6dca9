//! Top-level query execution (§6): wires the planner, executor, join/filter
//! engine, projection stage, and resolve cache into the `execute()` entry
//! point and the `QueryHandle` the caller drives.
//!
//! Grounded in the teacher's `execution` module's orchestration style (a free
//! function taking explicit collaborators rather than a God object) and
//! `src/frontend/query.c`'s `fs_query_execute` top-level driver, restructured
//! per spec.md §9 into explicit phase transitions over `QueryState` instead
//! of the original's setjmp-based early exit.

use crate::ast::{Query, SolutionForm};
use crate::bind_cache::BindCache;
use crate::binding::BindingTable;
use crate::config::ExecConfig;
use crate::error::{QueryError, QueryResult};
use crate::executor::bind_pattern_into;
use crate::filter::KnownDatatypes;
use crate::join::{apply_constant_disjunct, apply_filters, compact_block_tree, extract_constant_disjuncts, join_post_order, ResolvedEnvOwned};
use crate::planner::plan_block;
use crate::project::{apply_distinct, apply_limit, apply_offset, apply_order_by};
use crate::resolve::{bnode_lex, ResolveCache};
use crate::rid::{Rid, NULL};
use crate::state::{CellKind, QueryHandle, Row, RowCell};
use crate::storage::{RidHasher, StorageBackend};
use bitflags::bitflags;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

bitflags! {
    /// Per-call overrides layered over `ExecConfig` (§6's options table).
    /// `opt_level`/`soft_limit` have their own override parameters on
    /// [`execute`] since they're scalar, not boolean.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueryFlags: u32 {
        const RESTRICTED = 0x01;
        const EXPLAIN    = 0x02;
    }
}

/// Everything `execute` needs beyond the query itself and the per-call
/// overrides: the storage/hashing collaborators and the two caches that
/// outlive any single query (§5 — process-scoped, never query-scoped).
pub struct ExecutionContext<'a> {
    pub backend: &'a dyn StorageBackend,
    pub hasher: &'a dyn RidHasher,
    pub bind_cache: &'a BindCache,
    pub resolve_cache: &'a ResolveCache,
    pub known: KnownDatatypes,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(backend: &'a dyn StorageBackend, hasher: &'a dyn RidHasher, bind_cache: &'a BindCache, resolve_cache: &'a ResolveCache) -> Self {
        let known = KnownDatatypes::from_hasher(hasher);
        ExecutionContext { backend, hasher, bind_cache, resolve_cache, known }
    }
}

/// Runs `query` to completion and returns a handle ready for `fetch_row`.
/// This is an eager implementation: by the time `execute` returns, every
/// row has been computed and resolved, and the handle rests at `Emitting`.
/// `opt_level`/`soft_limit`, when `Some`, override `config`'s static values
/// for this call only, per spec.md §6.
pub fn execute(
    query: &Query,
    ctx: &ExecutionContext,
    config: &ExecConfig,
    flags: QueryFlags,
    opt_level: Option<u8>,
    soft_limit: Option<usize>,
) -> QueryHandle {
    let opt_level = opt_level.unwrap_or(config.opt_level);
    let restricted = flags.contains(QueryFlags::RESTRICTED) || config.restricted;
    let explain = flags.contains(QueryFlags::EXPLAIN);
    let soft_limit = soft_limit.unwrap_or(config.soft_limit);
    let default_graph = config.default_graph.map(Rid::from_raw);

    let mut handle = QueryHandle::new(query.projection.clone(), query.solution_form);
    handle.advance(); // Init -> Planned
    debug!(opt_level, soft_limit, restricted, explain, "query planned");

    match run(query, ctx, opt_level, soft_limit, restricted, explain, default_graph, &mut handle) {
        Ok(()) => {}
        Err(e) => {
            error!(error = %e, "query execution failed");
            handle.fail(e.to_string());
        }
    }
    handle
}

fn run(
    query: &Query,
    ctx: &ExecutionContext,
    opt_level: u8,
    soft_limit: usize,
    restricted: bool,
    explain: bool,
    default_graph: Option<Rid>,
    handle: &mut QueryHandle,
) -> QueryResult<()> {
    if handle.cancel_token().is_cancelled() {
        return Err(QueryError::Other("cancelled before execution began".into()));
    }

    let mut compacted = if opt_level >= 2 {
        compact_block_tree(query)
    } else {
        // opt_level < 2 skips block-tree compaction, preserving the parsed
        // block shape one-to-one.
        query
            .blocks
            .iter()
            .map(|b| crate::join::CompactBlock {
                id: b.id,
                parent: b.parent,
                join_type: b.join_type,
                union_group: b.union_group,
                patterns: b.patterns.clone(),
                filters: b.filters.clone(),
            })
            .collect()
    };
    compacted.sort_by_key(|b| b.id);

    handle.advance(); // Planned -> Executing

    let mut ancestor_bound: HashMap<usize, HashSet<String>> = HashMap::new();
    let mut per_block: HashMap<usize, BindingTable> = HashMap::new();

    for block in compacted.iter() {
        let ancestors = ancestor_bound.entry(block.id).or_default().clone();

        // `reverse` tags every pattern the planner folded into a multi-pattern
        // reverse-bind group (§4.3/§4.5): those dispatch through
        // `StorageBackend::reverse_bind` below rather than `bind`.
        let patterns: Vec<(crate::ast::TriplePattern, bool)> = if opt_level >= 1 {
            let freq_lookup = |pattern: &crate::ast::TriplePattern| quad_freq_for(pattern, ctx);
            let freq_lookup: &dyn Fn(&crate::ast::TriplePattern) -> Option<crate::storage::QuadFreq> = &freq_lookup;
            plan_block(&block.patterns, &ancestors, Some(freq_lookup))
                .into_iter()
                .flat_map(|g| {
                    let reverse = g.is_multi_reverse_bind;
                    g.patterns.into_iter().map(move |p| (p, reverse)).collect::<Vec<_>>()
                })
                .collect()
        } else {
            block.patterns.iter().cloned().map(|p| (p, false)).collect()
        };

        if explain {
            handle.warn(describe_block(block, &patterns));
        }

        let mut table = BindingTable::new();
        for name in ancestors.iter() {
            table.ensure_column(name, block.id);
        }
        if patterns.is_empty() {
            // A block with no triple patterns of its own (e.g. a UNION
            // parent whose only content is its children) still needs to
            // carry the join identity row forward, rather than read as "no
            // solutions" per the zero-columns-but-matched rule of §4.5.
            table.new_row_all_null();
        }

        let mut all_bound = true;
        for (pattern, reverse) in &patterns {
            if explain {
                continue;
            }
            if handle.cancel_token().is_cancelled() {
                return Err(QueryError::Other("cancelled mid-bind".into()));
            }
            for term in [&pattern.subject, &pattern.predicate, &pattern.object] {
                if let crate::ast::PatternTerm::Variable(v) = term {
                    table.ensure_column(v, block.id);
                }
            }
            let ok = bind_pattern_into(&mut table, pattern, block.id, ctx.backend, ctx.hasher, ctx.bind_cache, default_graph, opt_level >= 3, *reverse)?;
            if !ok {
                all_bound = false;
                break;
            }
            enforce_soft_limit(&mut table, soft_limit, restricted, handle)?;
        }
        if !all_bound {
            table = BindingTable::new();
        }

        let (remaining_filters, preconstraints) = extract_constant_disjuncts(&block.filters, ctx.hasher);
        for (var, allowed) in &preconstraints {
            apply_constant_disjunct(&mut table, var, allowed);
        }

        let row_resolved = if remaining_filters.is_empty() {
            HashMap::new()
        } else {
            let (resolved, _known) = resolve_table_env(ctx, &table)?;
            resolved
        };
        let known = ctx.known;
        let (filtered, error_rows) =
            apply_filters(table, &remaining_filters, |_row| ResolvedEnvOwned { resolved: row_resolved.clone(), known, hasher: ctx.hasher });
        if error_rows > 0 {
            warn!(block = block.id, error_rows, "rows dropped by filter evaluation error");
            handle.warn(format!("{error_rows} row(s) in block {} dropped due to a filter evaluation error", block.id));
        }
        per_block.insert(block.id, filtered);

        for child in compacted.iter().filter(|b| b.parent == Some(block.id)) {
            let entry = ancestor_bound.entry(child.id).or_default();
            entry.extend(ancestors.iter().cloned());
            for c in per_block.get(&block.id).map(|t| t.columns()).into_iter().flatten() {
                if c.flags.bound {
                    entry.insert(c.name.clone());
                }
            }
        }
    }

    if explain {
        // The plan trace was already recorded per block above; an explained
        // query never touches storage, so there are no rows to carry through
        // the remaining phases (spec.md §6's "suppress result rows").
        handle.advance(); // Executing -> Joined
        handle.advance(); // Joined -> Projected
        handle.advance(); // Projected -> Emitting
        handle.set_rows(Vec::new());
        return Ok(());
    }

    handle.advance(); // Executing -> Joined
    let mut joined = join_post_order(per_block, &compacted);
    enforce_soft_limit(&mut joined, soft_limit, restricted, handle)?;

    handle.advance(); // Joined -> Projected
    if query.count {
        finish_count(query, joined.row_count(), handle);
        handle.advance(); // Projected -> Emitting
        return Ok(());
    }

    let relevant: Vec<&str> = query.projection.iter().map(String::as_str).collect();
    if query.distinct {
        apply_distinct(&mut joined, &relevant);
    }
    if !query.order_by.is_empty() {
        let (resolved, known) = resolve_table_env(ctx, &joined)?;
        let env = crate::filter::ResolvedEnv { resolved: &resolved, known: &known, hasher: ctx.hasher };
        apply_order_by(&mut joined, &query.order_by, &env);
    }
    apply_offset(&mut joined, query.offset);
    if matches!(query.solution_form, SolutionForm::Ask) {
        apply_limit(&mut joined, Some(1));
    } else {
        apply_limit(&mut joined, query.limit);
    }

    handle.advance(); // Projected -> Emitting
    finish_rows(query, &joined, ctx, handle)?;
    Ok(())
}

/// Renders one planned block as a single trace line for `explain` mode:
/// its id, join type, and the pattern order the planner settled on, the
/// same order `run` would otherwise have bound against storage.
fn describe_block(block: &crate::join::CompactBlock, patterns: &[(crate::ast::TriplePattern, bool)]) -> String {
    let ordered: Vec<String> = patterns.iter().map(|(p, rev)| describe_pattern(p, *rev)).collect();
    let body = if ordered.is_empty() { "(no patterns)".to_string() } else { ordered.join(" . ") };
    format!("block {} ({:?}): {}", block.id, block.join_type, body)
}

fn describe_pattern(pattern: &crate::ast::TriplePattern, reverse: bool) -> String {
    let marker = if reverse { "~" } else { "" };
    format!(
        "{marker}{} {} {}",
        describe_term(&pattern.subject),
        describe_term(&pattern.predicate),
        describe_term(&pattern.object),
    )
}

fn describe_term(term: &crate::ast::PatternTerm) -> String {
    match term {
        crate::ast::PatternTerm::Variable(v) => format!("?{v}"),
        crate::ast::PatternTerm::Uri(u) => format!("<{u}>"),
        crate::ast::PatternTerm::BNode(b) => format!("_:{b}"),
        crate::ast::PatternTerm::Literal { lex, .. } => format!("\"{lex}\""),
    }
}

/// Resolves the planner's "this pattern matches exactly one quad" fast path
/// (spec.md §4.3's frequency-1 bucket): only applicable when subject and
/// predicate are both constants, since `quad_freq` is keyed by that pair.
fn quad_freq_for(pattern: &crate::ast::TriplePattern, ctx: &ExecutionContext) -> Option<crate::storage::QuadFreq> {
    let primary = constant_rid(&pattern.subject, ctx.hasher)?;
    let secondary = constant_rid(&pattern.predicate, ctx.hasher)?;
    ctx.backend.quad_freq(primary, secondary)
}

fn constant_rid(term: &crate::ast::PatternTerm, hasher: &dyn RidHasher) -> Option<Rid> {
    match term {
        crate::ast::PatternTerm::Uri(u) => Some(hasher.hash_uri(u)),
        crate::ast::PatternTerm::Literal { lex, datatype, .. } => {
            let attr = datatype.as_deref().map(|d| hasher.hash_uri(d)).unwrap_or(NULL);
            Some(hasher.hash_literal(lex, attr))
        }
        crate::ast::PatternTerm::BNode(_) | crate::ast::PatternTerm::Variable(_) => None,
    }
}

/// Caps `table` at `soft_limit`. In restricted mode this aborts the query;
/// otherwise it truncates and records a warning once.
fn enforce_soft_limit(table: &mut BindingTable, soft_limit: usize, restricted: bool, handle: &mut QueryHandle) -> QueryResult<()> {
    if soft_limit == 0 {
        // §6 / glossary: soft_limit == 0 means unlimited, not "cap at zero rows."
        return Ok(());
    }
    if table.row_count() <= soft_limit {
        return Ok(());
    }
    if restricted {
        return Err(QueryError::RestrictedLimitExceeded { limit: soft_limit });
    }
    if table.truncate(soft_limit) {
        warn!(soft_limit, "truncated binding table at soft limit");
        handle.warn(format!("intermediate result truncated at soft_limit of {soft_limit} rows"));
    }
    Ok(())
}

fn finish_count(query: &Query, row_count: usize, handle: &mut QueryHandle) {
    let xsd_integer = "http://www.w3.org/2001/XMLSchema#integer".to_string();
    let name = query.projection.first().cloned().unwrap_or_else(|| "count".to_string());
    let row = vec![RowCell {
        name,
        rid: NULL,
        kind: CellKind::Literal,
        lex: row_count.to_string(),
        datatype_uri: Some(xsd_integer),
        lang_tag: None,
    }];
    handle.set_rows(vec![row]);
}

/// Resolves every RID referenced (directly or via a filter's variable) in
/// one row of `table`, for ORDER BY's value-typed comparisons.
fn resolve_table_env(ctx: &ExecutionContext, table: &BindingTable) -> QueryResult<(HashMap<Rid, crate::storage::Resource>, KnownDatatypes)> {
    let mut rids: Vec<Rid> = Vec::new();
    for col in table.columns() {
        rids.extend(col.vals.iter().copied().filter(|r| !r.is_null() && !r.is_bnode()));
    }
    rids.sort_unstable();
    rids.dedup();
    let resolved = ctx.resolve_cache.resolve_batch(&rids, ctx.backend)?;
    Ok((resolved, ctx.known))
}

/// Resolves the projected columns of `joined` and materializes output rows,
/// honoring `LIMIT`/`ASK` short-circuit and batching resolution per §4.9.
fn finish_rows(query: &Query, joined: &BindingTable, ctx: &ExecutionContext, handle: &mut QueryHandle) -> QueryResult<()> {
    if matches!(query.solution_form, SolutionForm::Ask) {
        handle.boolean = joined.row_count() > 0;
        handle.set_rows(Vec::new());
        return Ok(());
    }

    let mut rids: Vec<Rid> = Vec::new();
    for name in &query.projection {
        if let Some(col) = joined.column(name) {
            rids.extend(col.vals.iter().copied().filter(|r| !r.is_null() && !r.is_bnode()));
        }
    }
    rids.sort_unstable();
    rids.dedup();
    let resolved = ctx.resolve_cache.resolve_batch(&rids, ctx.backend)?;
    ctx.resolve_cache.spill();

    let mut rows: Vec<Row> = Vec::with_capacity(joined.row_count());
    for r in 0..joined.row_count() {
        let mut row: Row = Vec::with_capacity(query.projection.len());
        for name in &query.projection {
            let rid = joined.column(name).map(|c| c.vals[r]).unwrap_or(NULL);
            row.push(cell_for(name, rid, &resolved, ctx));
        }
        rows.push(row);
    }
    handle.boolean = !rows.is_empty();
    handle.set_rows(rows);
    Ok(())
}

fn cell_for(name: &str, rid: Rid, resolved: &HashMap<Rid, crate::storage::Resource>, ctx: &ExecutionContext) -> RowCell {
    if rid.is_null() {
        return RowCell { name: name.to_string(), rid, kind: CellKind::None, lex: String::new(), datatype_uri: None, lang_tag: None };
    }
    if rid.is_bnode() {
        return RowCell { name: name.to_string(), rid, kind: CellKind::BNode, lex: bnode_lex(rid), datatype_uri: None, lang_tag: None };
    }
    match resolved.get(&rid) {
        Some(res) if rid.is_uri() => {
            RowCell { name: name.to_string(), rid, kind: CellKind::Uri, lex: res.lex.clone(), datatype_uri: None, lang_tag: None }
        }
        Some(res) => {
            let datatype_uri = if res.attr == ctx.known.xsd_integer {
                Some("http://www.w3.org/2001/XMLSchema#integer".to_string())
            } else if res.attr == ctx.known.xsd_double {
                Some("http://www.w3.org/2001/XMLSchema#double".to_string())
            } else if res.attr == ctx.known.xsd_decimal {
                Some("http://www.w3.org/2001/XMLSchema#decimal".to_string())
            } else if res.attr == ctx.known.xsd_boolean {
                Some("http://www.w3.org/2001/XMLSchema#boolean".to_string())
            } else if res.attr == ctx.known.xsd_datetime {
                Some("http://www.w3.org/2001/XMLSchema#dateTime".to_string())
            } else {
                None
            };
            RowCell { name: name.to_string(), rid, kind: CellKind::Literal, lex: res.lex.clone(), datatype_uri, lang_tag: None }
        }
        None => RowCell { name: name.to_string(), rid, kind: CellKind::None, lex: String::new(), datatype_uri: None, lang_tag: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, JoinType, PatternTerm, TriplePattern};
    use crate::storage::{InMemoryBackend, InMemoryHasher};

    fn p(s: &str, pred: &str, o: &str) -> TriplePattern {
        TriplePattern { graph: None, subject: PatternTerm::Variable(s.into()), predicate: PatternTerm::Uri(pred.into()), object: PatternTerm::Variable(o.into()) }
    }

    fn select(blocks: Vec<Block>, projection: Vec<&str>) -> Query {
        Query {
            blocks,
            projection: projection.into_iter().map(String::from).collect(),
            distinct: false,
            order_by: vec![],
            offset: 0,
            limit: None,
            solution_form: SolutionForm::Select,
            count: false,
        }
    }

    #[test]
    fn executes_a_single_pattern_query_end_to_end() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s = hasher.hash_uri("http://example/s");
        let p_rid = hasher.hash_uri("http://example/p");
        let o = hasher.hash_uri("http://example/o");
        backend.insert_quad(NULL, s, p_rid, o);
        backend.register_resource(s, NULL, "http://example/s");

        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();

        let root = Block::root(vec![p("s", "http://example/p", "o")]);
        let query = select(vec![root], vec!["s"]);

        let mut handle = execute(&query, &ctx, &config, QueryFlags::empty(), None, None);
        assert_eq!(handle.errors(), 0);
        let row = handle.fetch_row().cloned();
        assert!(row.is_some());
        assert_eq!(row.unwrap()[0].lex, "http://example/s");
    }

    #[test]
    fn ask_reports_boolean_without_rows() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();

        let root = Block::root(vec![p("s", "http://example/absent", "o")]);
        let mut query = select(vec![root], vec!["s"]);
        query.solution_form = SolutionForm::Ask;

        let mut handle = execute(&query, &ctx, &config, QueryFlags::empty(), None, None);
        assert!(!handle.boolean);
        assert!(handle.fetch_row().is_none());
    }

    #[test]
    fn count_collapses_to_one_row() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s1 = hasher.hash_uri("http://example/s1");
        let s2 = hasher.hash_uri("http://example/s2");
        let p_rid = hasher.hash_uri("http://example/p");
        let o = hasher.hash_uri("http://example/o");
        backend.insert_quad(NULL, s1, p_rid, o);
        backend.insert_quad(NULL, s2, p_rid, o);

        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();

        let root = Block::root(vec![p("s", "http://example/p", "o")]);
        let mut query = select(vec![root], vec!["count"]);
        query.count = true;

        let mut handle = execute(&query, &ctx, &config, QueryFlags::empty(), None, None);
        let row = handle.fetch_row().cloned().unwrap();
        assert_eq!(row[0].lex, "2");
        assert!(handle.fetch_row().is_none());
    }

    #[test]
    fn left_join_keeps_parent_row_when_child_unmatched() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s = hasher.hash_uri("http://example/s");
        let p_rid = hasher.hash_uri("http://example/p");
        let o = hasher.hash_uri("http://example/o");
        backend.insert_quad(NULL, s, p_rid, o);
        backend.register_resource(s, NULL, "http://example/s");

        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();

        let root = Block { id: 0, parent: None, join_type: JoinType::Inner, union_group: None, patterns: vec![p("s", "http://example/p", "o")], filters: vec![] };
        let optional = Block { id: 1, parent: Some(0), join_type: JoinType::Left, union_group: None, patterns: vec![p("s", "http://example/q", "missing")], filters: vec![] };
        let query = select(vec![root, optional], vec!["s", "missing"]);

        let mut handle = execute(&query, &ctx, &config, QueryFlags::empty(), None, None);
        let row = handle.fetch_row().cloned().unwrap();
        assert_eq!(row[0].lex, "http://example/s");
        assert_eq!(row[1].kind, CellKind::None);
    }

    #[test]
    fn explain_suppresses_rows_and_emits_a_plan_trace() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s = hasher.hash_uri("http://example/s");
        let p_rid = hasher.hash_uri("http://example/p");
        let o = hasher.hash_uri("http://example/o");
        backend.insert_quad(NULL, s, p_rid, o);

        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();

        let root = Block::root(vec![p("s", "http://example/p", "o")]);
        let query = select(vec![root], vec!["s"]);

        let mut handle = execute(&query, &ctx, &config, QueryFlags::EXPLAIN, None, None);
        assert!(handle.fetch_row().is_none());
        assert_eq!(handle.errors(), 0);
        assert_eq!(handle.warnings().len(), 1);
        assert!(handle.warnings()[0].contains("block 0"));
        assert!(handle.warnings()[0].contains("?s"));
    }

    #[test]
    fn quad_freq_for_reports_the_constant_subject_predicate_pair() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s = hasher.hash_uri("http://example/s");
        let p_rid = hasher.hash_uri("http://example/p");
        let o = hasher.hash_uri("http://example/o");
        backend.insert_quad(NULL, s, p_rid, o);

        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);

        let pattern = TriplePattern {
            graph: None,
            subject: PatternTerm::Uri("http://example/s".into()),
            predicate: PatternTerm::Uri("http://example/p".into()),
            object: PatternTerm::Variable("o".into()),
        };
        let freq = quad_freq_for(&pattern, &ctx).unwrap();
        assert_eq!(freq.freq, 1);

        // An unbound subject can never resolve to a single constant pair.
        assert!(quad_freq_for(&p("s", "http://example/p", "o"), &ctx).is_none());
    }

    #[test]
    fn adjacent_same_subject_constant_predicate_patterns_dispatch_through_reverse_bind() {
        let backend = InMemoryBackend::new();
        let hasher = InMemoryHasher::default();
        let s = hasher.hash_uri("http://example/s");
        let p1 = hasher.hash_uri("http://example/p1");
        let p2 = hasher.hash_uri("http://example/p2");
        let o1 = hasher.hash_uri("http://example/o1");
        let o2 = hasher.hash_uri("http://example/o2");
        backend.insert_quad(NULL, s, p1, o1);
        backend.insert_quad(NULL, s, p2, o2);

        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();

        let root = Block::root(vec![p("s", "http://example/p1", "o1"), p("s", "http://example/p2", "o2")]);
        let query = select(vec![root], vec!["s"]);

        let mut handle = execute(&query, &ctx, &config, QueryFlags::empty(), None, None);
        assert_eq!(handle.errors(), 0);
        assert!(handle.fetch_row().is_some());
        assert!(backend.reverse_bind_call_count() > 0);
        assert_eq!(backend.bind_call_count(), 0);
    }
}
