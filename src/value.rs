//! The filter evaluator's tagged value type.
//!
//! Grounded in `src/frontend/filter-datatypes.{h,c}` and `src/frontend/filter.c`
//! (EBV rules, numeric promotion). The C source multiplexes all of this
//! through a bitmask-of-valid-slots struct; spec.md §9's redesign note asks
//! for a sum type instead, so `EvalValue` is a plain Rust enum.

use crate::decimal::Decimal;
use crate::rid::Rid;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvalErrorKind {
    TypeError,
    UnboundDatatype,
    RegexCompile,
    DivideByZero,
}

/// A value flowing through the filter evaluator.
///
/// `Rid` carries the resolved attribute RID alongside a literal/URI/bNode
/// value so a later cast or comparison can recover type without a second
/// resolve, per spec.md §4.9's "attr cached alongside rid" invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Null,
    Rid { rid: Rid, attr: Option<Rid> },
    Str(Arc<str>),
    Bool(bool),
    Int(i64),
    Double(f64),
    Decimal(Decimal),
    /// Epoch milliseconds.
    DateTime(i64),
    Error(EvalErrorKind, String),
}

impl EvalValue {
    pub fn is_error(&self) -> bool {
        matches!(self, EvalValue::Error(..))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EvalValue::Null)
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        EvalValue::Error(EvalErrorKind::TypeError, msg.into())
    }

    /// Effective Boolean Value coercion per spec.md §4.6.
    ///
    /// Booleans and integers as themselves; floats/decimals by `|v| != 0`;
    /// strings by length > 0; URIs and bNodes are an EBV error.
    pub fn ebv(&self) -> Result<bool, EvalErrorKind> {
        match self {
            EvalValue::Bool(b) => Ok(*b),
            EvalValue::Int(i) => Ok(*i != 0),
            EvalValue::Double(d) => Ok(*d != 0.0),
            EvalValue::Decimal(d) => Ok(!d.is_zero()),
            EvalValue::Str(s) => Ok(!s.is_empty()),
            EvalValue::DateTime(_) => Err(EvalErrorKind::TypeError),
            EvalValue::Rid { .. } => Err(EvalErrorKind::TypeError),
            EvalValue::Null => Err(EvalErrorKind::TypeError),
            EvalValue::Error(k, _) => Err(*k),
        }
    }
}

/// Numeric promotion ladder: `integer -> decimal -> float -> double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NumericRank {
    Integer,
    Decimal,
    Float,
    Double,
}

fn numeric_rank(v: &EvalValue) -> Option<NumericRank> {
    match v {
        EvalValue::Int(_) => Some(NumericRank::Integer),
        EvalValue::Decimal(_) => Some(NumericRank::Decimal),
        EvalValue::Double(_) => Some(NumericRank::Double),
        // xsd:boolean participates as integer only when paired with a numeric operand;
        // callers decide that pairing before calling `promote`.
        EvalValue::Bool(_) => Some(NumericRank::Integer),
        _ => None,
    }
}

/// Promote two operands to their highest shared numeric rank, or a type
/// error if either side is non-numeric.
pub fn promote(a: &EvalValue, b: &EvalValue) -> Result<(f64, f64, NumericRank), EvalErrorKind> {
    let (ra, rb) = match (numeric_rank(a), numeric_rank(b)) {
        (Some(ra), Some(rb)) => (ra, rb),
        _ => return Err(EvalErrorKind::TypeError),
    };
    let rank = ra.max(rb);
    let as_f64 = |v: &EvalValue| -> f64 {
        match v {
            EvalValue::Int(i) => *i as f64,
            EvalValue::Decimal(d) => d.to_f64(),
            EvalValue::Double(d) => *d,
            EvalValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        }
    };
    Ok((as_f64(a), as_f64(b), rank))
}

/// ORDER BY tie-break compare: `NULL < bNode < URI (lex) < literal (value-typed)`.
///
/// Falls back to lexical compare of raw lexical forms if a typed compare
/// errors, per spec.md §4.2.
pub fn order_compare(
    a: &EvalValue,
    a_lex: &str,
    b: &EvalValue,
    b_lex: &str,
) -> Ordering {
    fn rank(v: &EvalValue) -> u8 {
        match v {
            EvalValue::Null => 0,
            EvalValue::Rid { rid, .. } if rid.is_bnode() => 1,
            EvalValue::Rid { rid, .. } if rid.is_uri() => 2,
            _ => 3,
        }
    }
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match ra {
        0 => Ordering::Equal,
        1 | 2 => a_lex.cmp(b_lex),
        _ => typed_literal_compare(a, a_lex, b, b_lex),
    }
}

fn typed_literal_compare(a: &EvalValue, a_lex: &str, b: &EvalValue, b_lex: &str) -> Ordering {
    match (a, b) {
        (EvalValue::DateTime(x), EvalValue::DateTime(y)) => x.cmp(y),
        _ => {
            if let (Some(ra), Some(rb)) = (numeric_rank(a), numeric_rank(b)) {
                let _ = (ra, rb);
                if let Ok((x, y, _)) = promote(a, b) {
                    return x.partial_cmp(&y).unwrap_or_else(|| a_lex.cmp(b_lex));
                }
            }
            a_lex.cmp(b_lex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ebv_numeric_and_string_rules() {
        assert_eq!(EvalValue::Int(0).ebv(), Ok(false));
        assert_eq!(EvalValue::Int(5).ebv(), Ok(true));
        assert_eq!(EvalValue::Double(0.0).ebv(), Ok(false));
        assert_eq!(EvalValue::Str(Arc::from("")).ebv(), Ok(false));
        assert_eq!(EvalValue::Str(Arc::from("x")).ebv(), Ok(true));
    }

    #[test]
    fn ebv_uri_is_error() {
        let v = EvalValue::Rid { rid: crate::rid::Rid::from_raw(0xC000_0000_0000_0001), attr: None };
        assert!(v.ebv().is_err());
    }

    #[test]
    fn promotion_picks_highest_rank() {
        let (_, _, rank) = promote(&EvalValue::Int(1), &EvalValue::Double(2.0)).unwrap();
        assert_eq!(rank, NumericRank::Double);
    }

    #[test]
    fn promotion_rejects_non_numeric() {
        assert!(promote(&EvalValue::Int(1), &EvalValue::Str(Arc::from("x"))).is_err());
    }

    #[test]
    fn order_compare_null_before_bnode_before_uri_before_literal() {
        let null = EvalValue::Null;
        let bnode = EvalValue::Rid { rid: Rid::from_raw(0x8000_0000_0000_0001), attr: None };
        let uri = EvalValue::Rid { rid: Rid::from_raw(0xC000_0000_0000_0001), attr: None };
        let lit = EvalValue::Int(1);
        assert_eq!(order_compare(&null, "", &bnode, ""), Ordering::Less);
        assert_eq!(order_compare(&bnode, "", &uri, ""), Ordering::Less);
        assert_eq!(order_compare(&uri, "", &lit, ""), Ordering::Less);
    }
}
