//! Query state machine and the `QueryHandle` exposed to callers (§4.10, §6).
//!
//! Grounded in the teacher's `execution::timeout::QueryTimeout` (an
//! `Arc<AtomicBool>` cancellation flag checked cooperatively between
//! phases) and `protocol`'s handle-oriented request lifecycle. `free()` from
//! spec.md §6 is realized as `Drop` on `QueryHandle`, an idiomatic
//! replacement noted in DESIGN.md.

use crate::ast::SolutionForm;
use crate::rid::Rid;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `INIT -> PLANNED -> EXECUTING -> JOINED -> PROJECTED -> EMITTING -> DONE`.
/// An early failure in any phase transitions directly to `DONE` (spec.md
/// §4.10); there is no going back once `Done` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Init,
    Planned,
    Executing,
    Joined,
    Projected,
    Emitting,
    Done,
}

impl QueryState {
    /// The phase a successful transition from `self` lands on.
    pub fn next(self) -> QueryState {
        match self {
            QueryState::Init => QueryState::Planned,
            QueryState::Planned => QueryState::Executing,
            QueryState::Executing => QueryState::Joined,
            QueryState::Joined => QueryState::Projected,
            QueryState::Projected => QueryState::Emitting,
            QueryState::Emitting | QueryState::Done => QueryState::Done,
        }
    }
}

/// Cooperative cancellation, checked at phase boundaries and between
/// prefetch windows during `Emitting` (spec.md §5). An in-flight bind call
/// does not observe cancellation; its result is simply discarded on return.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One output row: a resolved value per projected column, in projection
/// order. `rid == NULL` and `kind == None` together mean the column was
/// unbound in this solution.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCell {
    pub name: String,
    pub rid: Rid,
    pub kind: CellKind,
    pub lex: String,
    pub datatype_uri: Option<String>,
    pub lang_tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    None,
    Uri,
    Literal,
    BNode,
}

pub type Row = Vec<RowCell>;

/// The caller-facing query execution result: drives `fetch_header_row`,
/// `fetch_row`, `errors`, `warnings`, and frees its resources on `Drop`
/// (spec.md §6's `free(handle)`).
pub struct QueryHandle {
    state: QueryState,
    pub boolean: bool,
    pub solution_form: SolutionForm,
    header: Vec<String>,
    rows: Vec<Row>,
    cursor: usize,
    error_count: usize,
    warnings: Vec<String>,
    cancel: CancelToken,
}

impl QueryHandle {
    pub fn new(header: Vec<String>, solution_form: SolutionForm) -> Self {
        QueryHandle {
            state: QueryState::Init,
            boolean: false,
            solution_form,
            header,
            rows: Vec::new(),
            cursor: 0,
            error_count: 0,
            warnings: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn advance(&mut self) {
        if self.state != QueryState::Done {
            self.state = self.state.next();
        }
    }

    /// Fails the query immediately: any in-progress phase jumps straight to
    /// `Done`, per spec.md §4.10.
    pub fn fail(&mut self, warning: impl Into<String>) {
        self.error_count += 1;
        self.warnings.push(warning.into());
        self.boolean = false;
        self.state = QueryState::Done;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn fetch_header_row(&self) -> &[String] {
        &self.header
    }

    /// Returns the next row, or `None` at end of results. Cancellation reads
    /// identically to "no further rows" to the caller, plus the warning
    /// already recorded when cancellation was requested (spec.md §7).
    pub fn fetch_row(&mut self) -> Option<&Row> {
        if self.cancel.is_cancelled() || self.cursor >= self.rows.len() {
            return None;
        }
        let row = &self.rows[self.cursor];
        self.cursor += 1;
        Some(row)
    }

    pub fn errors(&self) -> usize {
        self.error_count
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_advances_in_order() {
        let mut s = QueryState::Init;
        for expected in [
            QueryState::Planned,
            QueryState::Executing,
            QueryState::Joined,
            QueryState::Projected,
            QueryState::Emitting,
            QueryState::Done,
        ] {
            s = s.next();
            assert_eq!(s, expected);
        }
    }

    #[test]
    fn fail_jumps_straight_to_done() {
        let mut handle = QueryHandle::new(vec!["x".into()], SolutionForm::Select);
        handle.advance();
        handle.fail("storage unavailable");
        assert_eq!(handle.state(), QueryState::Done);
        assert_eq!(handle.errors(), 1);
        assert!(!handle.boolean);
    }

    #[test]
    fn fetch_row_stops_after_cancellation() {
        let mut handle = QueryHandle::new(vec!["x".into()], SolutionForm::Select);
        handle.set_rows(vec![vec![RowCell {
            name: "x".into(),
            rid: crate::rid::NULL,
            kind: CellKind::None,
            lex: String::new(),
            datatype_uri: None,
            lang_tag: None,
        }]]);
        let tok = handle.cancel_token();
        tok.cancel();
        assert!(handle.fetch_row().is_none());
    }
}
