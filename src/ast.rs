//! Query AST consumed from the parser (external collaborator, out of scope
//! per spec.md §1). This module defines the shapes the query core expects to
//! receive: a block tree of triple patterns and filter expressions, a
//! projection list, and solution modifiers.
//!
//! Adapted from the teacher's `ast`/`ir` modules (`Atom`, `Term`, `Rule`),
//! generalized from Datalog atoms over tuples to RDF quad patterns over RIDs.

use serde::{Deserialize, Serialize};

/// A term occupying one slot of a quad pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternTerm {
    Variable(String),
    Uri(String),
    Literal { lex: String, datatype: Option<String>, lang: Option<String> },
    BNode(String),
}

impl PatternTerm {
    pub fn is_variable(&self) -> bool {
        matches!(self, PatternTerm::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&str> {
        if let PatternTerm::Variable(name) = self {
            Some(name)
        } else {
            None
        }
    }
}

/// One `(graph, subject, predicate, object)` triple pattern, graph optional
/// (falls back to the default-graph RID per spec.md §6 when absent and the
/// `default_graph` option is active).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriplePattern {
    pub graph: Option<PatternTerm>,
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A FILTER expression tree. Covers the subset of SPARQL filter expressions
/// the evaluator (§4.6) needs: comparisons, boolean connectives, `BOUND`,
/// `REGEX`, and arithmetic sub-expressions for numeric comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    Var(String),
    UriConst(String),
    LiteralConst { lex: String, datatype: Option<String>, lang: Option<String> },
    IntConst(i64),
    DoubleConst(f64),
    BoolConst(bool),
    Compare(Box<FilterExpr>, ComparisonOp, Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    Bound(String),
    Regex { text: Box<FilterExpr>, pattern: String, flags: String },
    Arithmetic(ArithOp, Box<FilterExpr>, Box<FilterExpr>),
    /// `BNODE()`: synthesizes a best-effort unique bNode by XORing a seed RID
    /// with the current row and block indices. Not collision-free — preserved
    /// literally per spec.md §9's Open Question.
    Bnode(Box<FilterExpr>),
}

impl FilterExpr {
    /// All variables referenced anywhere in this expression tree.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            FilterExpr::Var(v) | FilterExpr::Bound(v) => out.push(v.clone()),
            FilterExpr::Compare(l, _, r) | FilterExpr::Arithmetic(_, l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
            FilterExpr::And(l, r) | FilterExpr::Or(l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
            FilterExpr::Not(e) | FilterExpr::Bnode(e) => e.collect_variables(out),
            FilterExpr::Regex { text, .. } => text.collect_variables(out),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Union,
}

/// A lexical block of triple patterns and filters, forming a tree rooted at
/// block 0. `parent` is `None` only for block 0 (the spec's `-1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: usize,
    pub parent: Option<usize>,
    pub join_type: JoinType,
    /// Sibling blocks sharing this tag form one SPARQL `UNION`.
    pub union_group: Option<u32>,
    pub patterns: Vec<TriplePattern>,
    pub filters: Vec<FilterExpr>,
}

impl Block {
    pub fn root(patterns: Vec<TriplePattern>) -> Self {
        Block {
            id: 0,
            parent: None,
            join_type: JoinType::Inner,
            union_group: None,
            patterns,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCondition {
    pub expr: FilterExpr,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionForm {
    Select,
    Ask,
    Construct,
    Describe,
}

/// The full parsed query: a block tree plus projection and solution
/// modifiers, exactly the shape spec.md §6 says the core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub blocks: Vec<Block>,
    pub projection: Vec<String>,
    pub distinct: bool,
    pub order_by: Vec<OrderCondition>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub solution_form: SolutionForm,
    pub count: bool,
}

impl Query {
    pub fn root_block(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn children_of(&self, block_id: usize) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.parent == Some(block_id))
    }
}
