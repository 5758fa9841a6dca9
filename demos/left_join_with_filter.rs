//! Thin end-to-end driver exercising an OPTIONAL (LEFT join) block with a
//! FILTER on the outer pattern, run against the in-memory test backend.
//!
//! There is no SPARQL parser in this crate, so the query below is the
//! `Query` block tree a parser would have produced for:
//!
//! ```text
//! SELECT ?person ?age ?nick WHERE {
//!   ?person <http://example/age> ?age .
//!   OPTIONAL { ?person <http://example/nickname> ?nick }
//!   FILTER (?age > 30)
//! }
//! ```

use quadcore::ast::{
    Block, ComparisonOp, FilterExpr, JoinType, PatternTerm, Query, SolutionForm, TriplePattern,
};
use quadcore::bind_cache::BindCache;
use quadcore::resolve::ResolveCache;
use quadcore::storage::{InMemoryBackend, InMemoryHasher, RidHasher};
use quadcore::{execute, ExecConfig, ExecutionContext, QueryFlags, NULL};

fn seed(backend: &InMemoryBackend, hasher: &InMemoryHasher) {
    let age = hasher.hash_uri("http://example/age");
    let nickname = hasher.hash_uri("http://example/nickname");

    let alice = hasher.hash_uri("http://example/alice");
    let bob = hasher.hash_uri("http://example/bob");

    let integer = hasher.hash_uri("http://www.w3.org/2001/XMLSchema#integer");
    let age_25 = hasher.hash_literal("25", integer);
    let age_40 = hasher.hash_literal("40", integer);
    let nick_bobby = hasher.hash_literal("Bobby", NULL);

    backend.insert_quad(NULL, alice, age, age_25);
    backend.insert_quad(NULL, bob, age, age_40);
    backend.insert_quad(NULL, bob, nickname, nick_bobby);

    backend.register_resource(alice, NULL, "http://example/alice");
    backend.register_resource(bob, NULL, "http://example/bob");
    backend.register_resource(age, NULL, "http://example/age");
    backend.register_resource(nickname, NULL, "http://example/nickname");
    backend.register_resource(age_25, integer, "25");
    backend.register_resource(age_40, integer, "40");
    backend.register_resource(nick_bobby, NULL, "Bobby");
}

fn query() -> Query {
    let outer = TriplePattern {
        graph: None,
        subject: PatternTerm::Variable("person".into()),
        predicate: PatternTerm::Uri("http://example/age".into()),
        object: PatternTerm::Variable("age".into()),
    };
    let outer_block = Block {
        id: 0,
        parent: None,
        join_type: JoinType::Inner,
        union_group: None,
        patterns: vec![outer],
        filters: vec![FilterExpr::Compare(
            Box::new(FilterExpr::Var("age".into())),
            ComparisonOp::Gt,
            Box::new(FilterExpr::IntConst(30)),
        )],
    };

    let inner = TriplePattern {
        graph: None,
        subject: PatternTerm::Variable("person".into()),
        predicate: PatternTerm::Uri("http://example/nickname".into()),
        object: PatternTerm::Variable("nick".into()),
    };
    let inner_block = Block {
        id: 1,
        parent: Some(0),
        join_type: JoinType::Left,
        union_group: None,
        patterns: vec![inner],
        filters: vec![],
    };

    Query {
        blocks: vec![outer_block, inner_block],
        projection: vec!["person".into(), "age".into(), "nick".into()],
        distinct: false,
        order_by: vec![],
        offset: 0,
        limit: None,
        solution_form: SolutionForm::Select,
        count: false,
    }
}

fn main() {
    let backend = InMemoryBackend::new();
    let hasher = InMemoryHasher::default();
    seed(&backend, &hasher);

    let bind_cache = BindCache::default();
    let resolve_cache = ResolveCache::default();
    let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
    let config = ExecConfig::default();

    let mut handle = execute(&query(), &ctx, &config, QueryFlags::empty(), None, None);
    println!("{:?}", handle.fetch_header_row());
    while let Some(row) = handle.fetch_row() {
        let rendered: Vec<&str> = row.iter().map(|c| c.lex.as_str()).collect();
        println!("  {rendered:?}");
    }
    for w in handle.warnings() {
        eprintln!("warning: {w}");
    }
}
