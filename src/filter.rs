//! FILTER expression evaluation (§4.6).
//!
//! Grounded in `src/frontend/filter.c`'s expression-tree walk and
//! `src/frontend/filter-datatypes.h`'s small fixed set of recognized
//! datatypes. The RID layer never carries a datatype tag by itself — a
//! literal's attribute RID is just the hash of its datatype URI — so a
//! [`KnownDatatypes`] table of precomputed RIDs for the handful of XSD types
//! this evaluator parses stands in for `src/frontend/filter-datatypes.c`'s
//! static datatype-URI table.

use crate::ast::{ArithOp, ComparisonOp, FilterExpr};
use crate::binding::BindingTable;
use crate::decimal::Decimal;
use crate::rid::{Rid, NULL};
use crate::storage::{Resource, RidHasher};
use crate::value::{order_compare, promote, EvalErrorKind, EvalValue};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct KnownDatatypes {
    pub xsd_integer: Rid,
    pub xsd_double: Rid,
    pub xsd_decimal: Rid,
    pub xsd_boolean: Rid,
    pub xsd_datetime: Rid,
}

impl KnownDatatypes {
    pub fn from_hasher(hasher: &dyn RidHasher) -> Self {
        KnownDatatypes {
            xsd_integer: hasher.hash_uri("http://www.w3.org/2001/XMLSchema#integer"),
            xsd_double: hasher.hash_uri("http://www.w3.org/2001/XMLSchema#double"),
            xsd_decimal: hasher.hash_uri("http://www.w3.org/2001/XMLSchema#decimal"),
            xsd_boolean: hasher.hash_uri("http://www.w3.org/2001/XMLSchema#boolean"),
            xsd_datetime: hasher.hash_uri("http://www.w3.org/2001/XMLSchema#dateTime"),
        }
    }
}

/// Parses `lex` under datatype `attr` into the typed value the evaluator
/// operates on, the shared core of [`resource_to_value`] (a resolved RID's
/// lexical form) and a `LiteralConst`'s own lexical form — both must produce
/// the same value for the same `(lex, attr)` pair or a constant compared
/// against a bound variable of that datatype would never match.
fn literal_value_from_lex(lex: &str, attr: Rid, known: &KnownDatatypes) -> EvalValue {
    if attr == known.xsd_integer {
        lex.parse::<i64>().map(EvalValue::Int).unwrap_or_else(|_| EvalValue::type_error("bad integer lexical form"))
    } else if attr == known.xsd_double {
        lex.parse::<f64>().map(EvalValue::Double).unwrap_or_else(|_| EvalValue::type_error("bad double lexical form"))
    } else if attr == known.xsd_decimal {
        Decimal::parse(lex).map(EvalValue::Decimal).unwrap_or_else(|| EvalValue::type_error("bad decimal lexical form"))
    } else if attr == known.xsd_boolean {
        match lex {
            "true" | "1" => EvalValue::Bool(true),
            "false" | "0" => EvalValue::Bool(false),
            _ => EvalValue::type_error("bad boolean lexical form"),
        }
    } else if attr == known.xsd_datetime {
        chrono::DateTime::parse_from_rfc3339(lex)
            .map(|dt| EvalValue::DateTime(dt.timestamp_millis()))
            .unwrap_or_else(|_| EvalValue::type_error("bad dateTime lexical form"))
    } else {
        EvalValue::Str(Arc::from(lex))
    }
}

/// Converts a resolved `(rid, attr, lex)` resource into the typed value the
/// expression evaluator operates on.
pub fn resource_to_value(rid: Rid, resource: &Resource, known: &KnownDatatypes) -> EvalValue {
    if rid.is_uri() || rid.is_bnode() {
        return EvalValue::Rid { rid, attr: Some(resource.attr) };
    }
    literal_value_from_lex(&resource.lex, resource.attr, known)
}

/// Everything the evaluator needs to turn a bound RID into a typed value:
/// a batch-resolved lookup of `(attr, lex)` by RID, the datatype table, and
/// a hasher to fold `UriConst`/`LiteralConst` constants down to the same
/// RID space a bound variable's value lives in.
pub struct ResolvedEnv<'a> {
    pub resolved: &'a HashMap<Rid, Resource>,
    pub known: &'a KnownDatatypes,
    pub hasher: &'a dyn RidHasher,
}

impl<'a> ResolvedEnv<'a> {
    fn value_of(&self, rid: Rid) -> (EvalValue, String) {
        if rid.is_null() {
            return (EvalValue::Null, String::new());
        }
        match self.resolved.get(&rid) {
            Some(res) => (resource_to_value(rid, res, self.known), res.lex.clone()),
            None => (EvalValue::type_error("unresolved rid in filter context"), String::new()),
        }
    }
}

/// Evaluates `expr` against `row` of `table`.
pub fn eval(expr: &FilterExpr, table: &BindingTable, row: usize, env: &ResolvedEnv) -> EvalValue {
    match expr {
        FilterExpr::Var(name) => match table.column(name) {
            Some(col) => env.value_of(col.vals[row]).0,
            None => EvalValue::Null,
        },
        // A URI constant must evaluate to the same RID space a bound URI
        // variable resolves to (`resource_to_value`'s `Rid` arm) — comparing
        // it as a lexical `Str` would always mismatch a `Rid`, per
        // `eval_compare`'s lack of a `Rid`-vs-`Str` arm.
        FilterExpr::UriConst(u) => EvalValue::Rid { rid: env.hasher.hash_uri(u), attr: None },
        // Same reasoning for a typed literal constant: it must parse to the
        // exact value type `resource_to_value` would produce for a bound
        // variable carrying that datatype (e.g. `"5"^^xsd:integer` is
        // `Int(5)`, not the string `"5"`), or the two never compare equal.
        FilterExpr::LiteralConst { lex, datatype, .. } => {
            let attr = datatype.as_deref().map(|d| env.hasher.hash_uri(d)).unwrap_or(NULL);
            literal_value_from_lex(lex, attr, env.known)
        }
        FilterExpr::IntConst(i) => EvalValue::Int(*i),
        FilterExpr::DoubleConst(d) => EvalValue::Double(*d),
        FilterExpr::BoolConst(b) => EvalValue::Bool(*b),
        FilterExpr::Bound(name) => {
            let bound = table.column(name).is_some_and(|c| c.vals[row] != NULL);
            EvalValue::Bool(bound)
        }
        FilterExpr::Not(inner) => match eval(inner, table, row, env).ebv() {
            Ok(b) => EvalValue::Bool(!b),
            Err(k) => EvalValue::Error(k, "NOT over non-boolean".into()),
        },
        FilterExpr::And(l, r) => eval_and(l, r, table, row, env),
        FilterExpr::Or(l, r) => eval_or(l, r, table, row, env),
        FilterExpr::Compare(l, op, r) => eval_compare(l, *op, r, table, row, env),
        FilterExpr::Arithmetic(op, l, r) => eval_arithmetic(*op, l, r, table, row, env),
        FilterExpr::Regex { text, pattern, flags } => eval_regex(text, pattern, flags, table, row, env),
        FilterExpr::Bnode(seed) => {
            let v = eval(seed, table, row, env);
            let base = match v {
                EvalValue::Rid { rid, .. } => rid.raw(),
                EvalValue::Int(i) => i as u64,
                _ => 0,
            };
            EvalValue::Rid { rid: Rid::from_raw(base ^ (row as u64) ^ 0x8000_0000_0000_0000), attr: None }
        }
    }
}

/// SPARQL's three-valued AND: `false` on either side short-circuits even
/// past a type error on the other side.
fn eval_and(l: &FilterExpr, r: &FilterExpr, table: &BindingTable, row: usize, env: &ResolvedEnv) -> EvalValue {
    let lv = eval(l, table, row, env).ebv();
    if lv == Ok(false) {
        return EvalValue::Bool(false);
    }
    let rv = eval(r, table, row, env).ebv();
    match (lv, rv) {
        (Ok(true), Ok(b)) => EvalValue::Bool(b),
        (_, Ok(false)) => EvalValue::Bool(false),
        (Err(k), _) | (_, Err(k)) => EvalValue::Error(k, "AND operand error".into()),
        _ => EvalValue::Bool(true),
    }
}

fn eval_or(l: &FilterExpr, r: &FilterExpr, table: &BindingTable, row: usize, env: &ResolvedEnv) -> EvalValue {
    let lv = eval(l, table, row, env).ebv();
    if lv == Ok(true) {
        return EvalValue::Bool(true);
    }
    let rv = eval(r, table, row, env).ebv();
    match (lv, rv) {
        (Ok(false), Ok(b)) => EvalValue::Bool(b),
        (_, Ok(true)) => EvalValue::Bool(true),
        (Err(k), _) | (_, Err(k)) => EvalValue::Error(k, "OR operand error".into()),
        _ => EvalValue::Bool(false),
    }
}

fn eval_compare(
    l: &FilterExpr,
    op: ComparisonOp,
    r: &FilterExpr,
    table: &BindingTable,
    row: usize,
    env: &ResolvedEnv,
) -> EvalValue {
    let lv = eval(l, table, row, env);
    let rv = eval(r, table, row, env);
    if lv.is_error() || rv.is_error() {
        return EvalValue::type_error("comparison over an error value");
    }
    let result = match (&lv, &rv) {
        (EvalValue::Str(a), EvalValue::Str(b)) => Some(compare_ord(a.as_ref().cmp(b.as_ref()), op)),
        (EvalValue::Rid { rid: a, .. }, EvalValue::Rid { rid: b, .. }) if matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) => {
            Some(compare_ord(a.cmp(b), op))
        }
        _ => match promote(&lv, &rv) {
            Ok((a, b, _)) => a.partial_cmp(&b).map(|o| compare_ord(o, op)),
            Err(_) => None,
        },
    };
    match result {
        Some(b) => EvalValue::Bool(b),
        None => EvalValue::type_error("incomparable operand types"),
    }
}

fn compare_ord(ord: std::cmp::Ordering, op: ComparisonOp) -> bool {
    use std::cmp::Ordering::*;
    match op {
        ComparisonOp::Eq => ord == Equal,
        ComparisonOp::Ne => ord != Equal,
        ComparisonOp::Lt => ord == Less,
        ComparisonOp::Gt => ord == Greater,
        ComparisonOp::Le => ord != Greater,
        ComparisonOp::Ge => ord != Less,
    }
}

fn eval_arithmetic(op: ArithOp, l: &FilterExpr, r: &FilterExpr, table: &BindingTable, row: usize, env: &ResolvedEnv) -> EvalValue {
    let lv = eval(l, table, row, env);
    let rv = eval(r, table, row, env);
    if lv.is_error() || rv.is_error() {
        return EvalValue::type_error("arithmetic over an error value");
    }
    let (a, b, rank) = match promote(&lv, &rv) {
        Ok(t) => t,
        Err(k) => return EvalValue::Error(k, "non-numeric operand to arithmetic".into()),
    };
    if op == ArithOp::Div && b == 0.0 {
        return EvalValue::Error(EvalErrorKind::DivideByZero, "division by zero".into());
    }
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    };
    use crate::value::NumericRank;
    match rank {
        NumericRank::Integer if op != ArithOp::Div => EvalValue::Int(result as i64),
        _ => EvalValue::Double(result),
    }
}

fn eval_regex(text: &FilterExpr, pattern: &str, flags: &str, table: &BindingTable, row: usize, env: &ResolvedEnv) -> EvalValue {
    let v = eval(text, table, row, env);
    let s = match &v {
        EvalValue::Str(s) => s.to_string(),
        _ => return EvalValue::type_error("REGEX operand is not a string"),
    };
    let mut pat = String::new();
    if flags.contains('i') {
        pat.push_str("(?i)");
    }
    pat.push_str(pattern);
    match regex::Regex::new(&pat) {
        Ok(re) => EvalValue::Bool(re.is_match(&s)),
        Err(_) => EvalValue::Error(EvalErrorKind::RegexCompile, format!("invalid regex: {pattern}")),
    }
}

/// Lexical form used by ORDER BY tie-breaks alongside `eval`'s typed value.
pub fn eval_lex(expr: &FilterExpr, table: &BindingTable, row: usize, env: &ResolvedEnv) -> String {
    if let FilterExpr::Var(name) = expr {
        if let Some(col) = table.column(name) {
            let rid = col.vals[row];
            if !rid.is_null() {
                return env.value_of(rid).1;
            }
        }
    }
    String::new()
}

pub fn order_compare_rows(expr: &FilterExpr, table: &BindingTable, a: usize, b: usize, env: &ResolvedEnv) -> std::cmp::Ordering {
    let va = eval(expr, table, a, env);
    let vb = eval(expr, table, b, env);
    let la = eval_lex(expr, table, a, env);
    let lb = eval_lex(expr, table, b, env);
    order_compare(&va, &la, &vb, &lb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rid::NULL;
    use crate::storage::InMemoryHasher;

    fn empty_env<'a>(known: &'a KnownDatatypes, resolved: &'a HashMap<Rid, Resource>, hasher: &'a dyn RidHasher) -> ResolvedEnv<'a> {
        ResolvedEnv { resolved, known, hasher }
    }

    #[test]
    fn bound_reports_whether_column_has_a_non_null_value() {
        let mut table = BindingTable::new();
        table.ensure_column("x", 0);
        table.add("x", Rid::from_raw(0xC000_0000_0000_0001));
        let hasher = InMemoryHasher::default();
        let known = KnownDatatypes::from_hasher(&hasher);
        let resolved = HashMap::new();
        let env = empty_env(&known, &resolved, &hasher);
        let v = eval(&FilterExpr::Bound("x".into()), &table, 0, &env);
        assert_eq!(v, EvalValue::Bool(true));
    }

    #[test]
    fn unbound_variable_is_null() {
        let mut table = BindingTable::new();
        table.ensure_column("x", 0);
        table.new_row_all_null();
        let hasher = InMemoryHasher::default();
        let known = KnownDatatypes::from_hasher(&hasher);
        let resolved = HashMap::new();
        let env = empty_env(&known, &resolved, &hasher);
        let v = eval(&FilterExpr::Var("x".into()), &table, 0, &env);
        assert_eq!(v, EvalValue::Null);
    }

    #[test]
    fn integer_addition_promotes_and_computes() {
        let table = BindingTable::new();
        let hasher = InMemoryHasher::default();
        let known = KnownDatatypes::from_hasher(&hasher);
        let resolved = HashMap::new();
        let env = empty_env(&known, &resolved, &hasher);
        let expr = FilterExpr::Arithmetic(ArithOp::Add, Box::new(FilterExpr::IntConst(2)), Box::new(FilterExpr::IntConst(3)));
        assert_eq!(eval(&expr, &table, 0, &env), EvalValue::Int(5));
    }

    #[test]
    fn division_by_zero_is_a_filter_error() {
        let table = BindingTable::new();
        let hasher = InMemoryHasher::default();
        let known = KnownDatatypes::from_hasher(&hasher);
        let resolved = HashMap::new();
        let env = empty_env(&known, &resolved, &hasher);
        let expr = FilterExpr::Arithmetic(ArithOp::Div, Box::new(FilterExpr::IntConst(1)), Box::new(FilterExpr::IntConst(0)));
        assert!(eval(&expr, &table, 0, &env).is_error());
    }

    #[test]
    fn uri_const_compares_equal_to_a_bound_uri_variable() {
        let hasher = InMemoryHasher::default();
        let u = hasher.hash_uri("http://example/u1");
        let mut table = BindingTable::new();
        table.ensure_column("x", 0);
        table.add("x", u);
        let known = KnownDatatypes::from_hasher(&hasher);
        let mut resolved = HashMap::new();
        resolved.insert(u, Resource { rid: u, attr: NULL, lex: "http://example/u1".to_string() });
        let env = empty_env(&known, &resolved, &hasher);
        let expr = FilterExpr::Compare(
            Box::new(FilterExpr::Var("x".into())),
            ComparisonOp::Eq,
            Box::new(FilterExpr::UriConst("http://example/u1".into())),
        );
        assert_eq!(eval(&expr, &table, 0, &env), EvalValue::Bool(true));

        let expr_ne = FilterExpr::Compare(
            Box::new(FilterExpr::Var("x".into())),
            ComparisonOp::Eq,
            Box::new(FilterExpr::UriConst("http://example/u2".into())),
        );
        assert_eq!(eval(&expr_ne, &table, 0, &env), EvalValue::Bool(false));
    }

    #[test]
    fn typed_literal_const_compares_equal_to_a_bound_integer_variable() {
        let hasher = InMemoryHasher::default();
        let attr = hasher.hash_uri("http://www.w3.org/2001/XMLSchema#integer");
        let rid = hasher.hash_literal("5", attr);
        let mut table = BindingTable::new();
        table.ensure_column("x", 0);
        table.add("x", rid);
        let known = KnownDatatypes::from_hasher(&hasher);
        let mut resolved = HashMap::new();
        resolved.insert(rid, Resource { rid, attr, lex: "5".to_string() });
        let env = empty_env(&known, &resolved, &hasher);
        let expr = FilterExpr::Compare(
            Box::new(FilterExpr::Var("x".into())),
            ComparisonOp::Eq,
            Box::new(FilterExpr::LiteralConst {
                lex: "5".into(),
                datatype: Some("http://www.w3.org/2001/XMLSchema#integer".into()),
                lang: None,
            }),
        );
        assert_eq!(eval(&expr, &table, 0, &env), EvalValue::Bool(true));
    }
}
