//! Top-level error type (§7). Every fallible operation the query core
//! exposes returns `QueryResult<T>`; per-row evaluation failures instead
//! become `EvalValue::Error` and surface as warnings (spec.md §7's
//! distinction between aborting errors and row-level errors).

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("storage backend error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("query referenced unknown variable: {0}")]
    UnknownVariable(String),

    #[error("query exceeded soft_limit of {limit} rows and restricted mode is active")]
    RestrictedLimitExceeded { limit: usize },

    #[error("operation invalid in query state {state:?}")]
    InvalidState { state: crate::state::QueryState },

    #[error("regex pattern failed to compile: {0}")]
    RegexCompile(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
