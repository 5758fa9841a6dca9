//! Query performance benchmarks: pattern bind, join, and sort/uniq hot paths.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use quadcore::ast::{Block, PatternTerm, Query, SolutionForm, TriplePattern};
use quadcore::bind_cache::BindCache;
use quadcore::resolve::ResolveCache;
use quadcore::storage::{InMemoryBackend, InMemoryHasher, RidHasher};
use quadcore::{execute, ExecConfig, ExecutionContext, QueryFlags, NULL};

fn seeded_backend(size: u32) -> (InMemoryBackend, InMemoryHasher) {
    let backend = InMemoryBackend::new();
    let hasher = InMemoryHasher::default();
    let knows = hasher.hash_uri("http://example/knows");
    for i in 0..size {
        let s = hasher.hash_uri(&format!("http://example/s{i}"));
        let o = hasher.hash_uri(&format!("http://example/o{i}"));
        backend.insert_quad(NULL, s, knows, o);
        backend.register_resource(s, NULL, format!("http://example/s{i}"));
    }
    (backend, hasher)
}

fn scan_query() -> Query {
    let pattern = TriplePattern {
        graph: None,
        subject: PatternTerm::Variable("s".into()),
        predicate: PatternTerm::Uri("http://example/knows".into()),
        object: PatternTerm::Variable("o".into()),
    };
    Query {
        blocks: vec![Block::root(vec![pattern])],
        projection: vec!["s".into()],
        distinct: false,
        order_by: vec![],
        offset: 0,
        limit: None,
        solution_form: SolutionForm::Select,
        count: false,
    }
}

fn two_pattern_join_query() -> Query {
    let p1 = TriplePattern {
        graph: None,
        subject: PatternTerm::Variable("s".into()),
        predicate: PatternTerm::Uri("http://example/knows".into()),
        object: PatternTerm::Variable("o".into()),
    };
    let p2 = TriplePattern {
        graph: None,
        subject: PatternTerm::Variable("o".into()),
        predicate: PatternTerm::Uri("http://example/knows".into()),
        object: PatternTerm::Variable("t".into()),
    };
    Query {
        blocks: vec![Block::root(vec![p1, p2])],
        projection: vec!["s".into(), "t".into()],
        distinct: false,
        order_by: vec![],
        offset: 0,
        limit: None,
        solution_form: SolutionForm::Select,
        count: false,
    }
}

fn bench_simple_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_scan");
    for size in [100u32, 1_000, 10_000] {
        let (backend, hasher) = seeded_backend(size);
        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();
        let query = scan_query();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| execute(&query, &ctx, &config, QueryFlags::empty(), None, None));
        });
    }
    group.finish();
}

fn bench_two_pattern_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_pattern_join");
    for size in [100u32, 1_000] {
        let (backend, hasher) = seeded_backend(size);
        // Chain s_i -knows-> o_i -knows-> (nothing, o_i never a subject) so
        // this exercises a self-join that always empties out; the cost we're
        // measuring is the bind+sort+join machinery, not result size.
        let bind_cache = BindCache::default();
        let resolve_cache = ResolveCache::default();
        let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
        let config = ExecConfig::default();
        let query = two_pattern_join_query();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| execute(&query, &ctx, &config, QueryFlags::empty(), None, None));
        });
    }
    group.finish();
}

fn bench_distinct_on_binding_table(c: &mut Criterion) {
    use quadcore::binding::BindingTable;
    use quadcore::rid::Rid;

    let mut group = c.benchmark_group("distinct_sort_uniq");
    for size in [1_000u64, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut t = BindingTable::new();
                t.ensure_column("x", 0);
                for i in 0..size {
                    t.add("x", Rid::from_raw(0xC000_0000_0000_0000 | (i % (size / 2 + 1))));
                }
                t.sort(&[0]);
                t.uniq();
                t.row_count()
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    targets = bench_simple_scan, bench_two_pattern_join, bench_distinct_on_binding_table
}
criterion_main!(benches);
