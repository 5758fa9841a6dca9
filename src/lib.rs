//! # quadcore
//!
//! A distributed SPARQL query execution core: quad-pattern binding, joins,
//! filter evaluation, and RID resolution, extracted so it can sit behind any
//! storage backend and any frontend that can produce the `Query` block tree
//! this crate consumes.
//!
//! ## Pipeline
//!
//! ```text
//! Query (block tree of triple patterns + filters)
//!     ↓
//! [planner]        per-block pattern reordering by selectivity
//!     ↓
//! [executor]       pattern-by-pattern binding against a StorageBackend
//!     ↓
//! [join]           block-tree compaction, constant-disjunct filters,
//!                   general FILTER evaluation, post-order INNER/LEFT/UNION
//!     ↓
//! [project]        DISTINCT, ORDER BY, OFFSET/LIMIT, COUNT
//!     ↓
//! [resolve]        RID -> (attr, lex) resolution through the two-tier cache
//!     ↓
//! QueryHandle (fetch_header_row / fetch_row / errors / warnings)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quadcore::{execute, ExecutionContext, ExecConfig, QueryFlags};
//! use quadcore::storage::{InMemoryBackend, InMemoryHasher, RidHasher};
//! use quadcore::bind_cache::BindCache;
//! use quadcore::resolve::ResolveCache;
//! use quadcore::ast::{Block, PatternTerm, Query, SolutionForm, TriplePattern};
//!
//! let backend = InMemoryBackend::new();
//! let hasher = InMemoryHasher::default();
//! let s = hasher.hash_uri("http://example/s");
//! let p = hasher.hash_uri("http://example/knows");
//! let o = hasher.hash_uri("http://example/o");
//! backend.insert_quad(quadcore::rid::NULL, s, p, o);
//! backend.register_resource(s, quadcore::rid::NULL, "http://example/s");
//!
//! let pattern = TriplePattern {
//!     graph: None,
//!     subject: PatternTerm::Variable("s".into()),
//!     predicate: PatternTerm::Uri("http://example/knows".into()),
//!     object: PatternTerm::Variable("o".into()),
//! };
//! let query = Query {
//!     blocks: vec![Block::root(vec![pattern])],
//!     projection: vec!["s".into()],
//!     distinct: false,
//!     order_by: vec![],
//!     offset: 0,
//!     limit: None,
//!     solution_form: SolutionForm::Select,
//!     count: false,
//! };
//!
//! let bind_cache = BindCache::default();
//! let resolve_cache = ResolveCache::default();
//! let ctx = ExecutionContext::new(&backend, &hasher, &bind_cache, &resolve_cache);
//! let mut handle = execute(&query, &ctx, &ExecConfig::default(), QueryFlags::empty(), None, None);
//! while let Some(row) = handle.fetch_row() {
//!     println!("{}", row[0].lex);
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `ast` | Query block tree consumed from the frontend |
//! | `rid` | 64-bit resource identifier tagging |
//! | `value` / `decimal` | Filter evaluator's tagged value type and fixed-point decimal |
//! | `binding` | Columnar binding table: sort/uniq/merge/join/union |
//! | `planner` | Per-block pattern reordering by selectivity |
//! | `executor` | Pattern binding against a `StorageBackend` |
//! | `bind_cache` | Direct-mapped cache of fully-constant/fully-unbound bind results |
//! | `filter` | FILTER expression evaluation (EBV, numeric promotion, REGEX, BNODE()) |
//! | `join` | Block-tree compaction and INNER/LEFT/UNION join engine |
//! | `project` | DISTINCT, ORDER BY, OFFSET/LIMIT, COUNT |
//! | `resolve` | Two-tier RID-to-resource resolution cache |
//! | `state` | Query state machine and the caller-facing `QueryHandle` |
//! | `storage` | `StorageBackend`/`RidHasher` traits plus in-memory test doubles |
//! | `config` | Hierarchical configuration (figment: file + env) |
//! | `error` | Top-level error type |
//! | `query` | Wires everything above into `execute()` |

pub mod ast;
pub mod bind_cache;
pub mod binding;
pub mod config;
pub mod decimal;
pub mod error;
pub mod executor;
pub mod filter;
pub mod join;
pub mod planner;
pub mod project;
pub mod query;
pub mod resolve;
pub mod rid;
pub mod state;
pub mod storage;
pub mod value;

pub use ast::{Block, FilterExpr, JoinType, OrderCondition, PatternTerm, Query, SolutionForm, TriplePattern};
pub use config::{CacheConfig, Config, ExecConfig, LoggingConfig};
pub use error::{QueryError, QueryResult};
pub use query::{execute, ExecutionContext, QueryFlags};
pub use rid::{Rid, GONE, NULL};
pub use state::{CancelToken, CellKind, QueryHandle, QueryState, Row, RowCell};
pub use storage::{InMemoryBackend, InMemoryHasher, RidHasher, StorageBackend, StorageError, StorageResult};
