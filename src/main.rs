//! Minimal driver exercising `execute()` against the in-memory backend.
//!
//! ```bash
//! cargo run --bin quadcore
//! ```
//!
//! Loads a handful of triples, runs a SELECT and an ASK through the query
//! core, and prints the resolved rows. There is no SPARQL parser here (the
//! frontend that builds a `Query` block tree is out of scope) so the query
//! below is built directly as an AST.

use quadcore::ast::{Block, PatternTerm, Query, SolutionForm, TriplePattern};
use quadcore::bind_cache::BindCache;
use quadcore::resolve::ResolveCache;
use quadcore::storage::{InMemoryBackend, InMemoryHasher, RidHasher};
use quadcore::{execute, Config, ExecConfig, ExecutionContext, QueryFlags, NULL};
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber per `config.logging`: `format = "json"`
/// switches to structured output, anything else keeps the human-readable
/// formatter. `level` seeds the env-filter default so `RUST_LOG` can still
/// override it per the teacher's own `tracing-subscriber` setup.
fn init_logging(config: &quadcore::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn seed(backend: &InMemoryBackend, hasher: &InMemoryHasher) {
    let alice = hasher.hash_uri("http://example/alice");
    let bob = hasher.hash_uri("http://example/bob");
    let knows = hasher.hash_uri("http://example/knows");
    let carol = hasher.hash_uri("http://example/carol");

    backend.insert_quad(NULL, alice, knows, bob);
    backend.insert_quad(NULL, alice, knows, carol);

    backend.register_resource(alice, NULL, "http://example/alice");
    backend.register_resource(bob, NULL, "http://example/bob");
    backend.register_resource(carol, NULL, "http://example/carol");
}

fn select_query() -> Query {
    let pattern = TriplePattern {
        graph: None,
        subject: PatternTerm::Variable("s".into()),
        predicate: PatternTerm::Uri("http://example/knows".into()),
        object: PatternTerm::Variable("o".into()),
    };
    Query {
        blocks: vec![Block::root(vec![pattern])],
        projection: vec!["s".into(), "o".into()],
        distinct: false,
        order_by: vec![],
        offset: 0,
        limit: None,
        solution_form: SolutionForm::Select,
        count: false,
    }
}

fn ask_query() -> Query {
    let mut q = select_query();
    q.solution_form = SolutionForm::Ask;
    q
}

fn main() {
    let config = Config::load().unwrap_or_default();
    init_logging(&config.logging);

    let backend = InMemoryBackend::new();
    let hasher = InMemoryHasher::default();
    seed(&backend, &hasher);

    let bind_cache = BindCache::default();
    let resolve_cache = ResolveCache::default();
    let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
    let exec_config: ExecConfig = config.execution;

    let select = select_query();
    let mut handle = execute(&select, &ctx, &exec_config, QueryFlags::empty(), None, None);
    println!("SELECT {:?}", handle.fetch_header_row());
    while let Some(row) = handle.fetch_row() {
        let rendered: Vec<&str> = row.iter().map(|c| c.lex.as_str()).collect();
        println!("  {rendered:?}");
    }
    for w in handle.warnings() {
        eprintln!("warning: {w}");
    }

    let ask = ask_query();
    let handle = execute(&ask, &ctx, &exec_config, QueryFlags::empty(), None, None);
    println!("ASK -> {}", handle.boolean);
}
