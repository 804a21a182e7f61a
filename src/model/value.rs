//! Typed value carried by result records.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bound value after normalization.
///
/// Covers what the SPARQL JSON results format can carry for this graph:
/// - Scalars: Bool, Int, Float, String
/// - Resources: Iri (also blank nodes, as `_:label`)
/// - Temporal: Date
/// - Absence: Null (unbound optional variable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Iri(String),
    Date(NaiveDate),
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::Iri(_) => "IRI",
            Value::Date(_) => "DATE",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }
    pub fn is_numeric(&self) -> bool { matches!(self, Value::Int(_) | Value::Float(_)) }

    /// Attempt to extract as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Attempt to extract as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempt to extract as &str (plain literals and IRIs)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Iri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Canonical text used for grouping and distinct counting.
    /// Distinguishes kinds so that `"5"` and `5` never collide.
    pub(crate) fn group_key(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Bool(b) => format!("b:{b}"),
            Value::Int(i) => format!("d:{}", *i as f64),
            Value::Float(f) => format!("d:{f}"),
            Value::String(s) => format!("s:{s}"),
            Value::Iri(s) => format!("i:{s}"),
            Value::Date(d) => format!("t:{d}"),
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<NaiveDate> for Value { fn from(v: NaiveDate) -> Self { Value::Date(v) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Iri(iri) => write!(f, "<{iri}>"),
            Value::Date(d) => write!(f, "{d}"),
        }
    }
}

// ============================================================================
// Comparison (SPARQL operator semantics)
// ============================================================================

impl Value {
    /// SPARQL `<`/`>` comparison. Returns None for incompatible types,
    /// which makes the enclosing filter unknown (row dropped).
    pub fn sparql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Total order for ORDER BY. Kinds rank first (IRIs, numerics,
    /// strings, dates, booleans, then `Null`); values compare within their
    /// kind, numerics by `f64::total_cmp` so NaN has a fixed place.
    pub fn order_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Iri(a), Value::Iri(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.kind_rank().cmp(&other.kind_rank()),
            },
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Iri(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::String(_) => 2,
            Value::Date(_) => 3,
            Value::Bool(_) => 4,
            Value::Null => 5,
        }
    }

    /// SPARQL `=` semantics: numeric by value, IRIs by identity.
    /// None when either side is unbound.
    pub fn sparql_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Iri(a), Value::Iri(b)) => Some(a == b),
            _ if self.is_numeric() && other.is_numeric() => {
                self.sparql_cmp(other).map(|o| o == Ordering::Equal)
            }
            _ => Some(self == other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(0.8), Value::Float(0.8));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_null_comparison() {
        assert_eq!(Value::Null.sparql_cmp(&Value::Null), None);
        assert_eq!(Value::Null.sparql_eq(&Value::Int(1)), None);
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(
            Value::Int(1).sparql_cmp(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int(2).sparql_eq(&Value::Float(2.0)), Some(true));
    }

    #[test]
    fn test_string_vs_number_is_incomparable() {
        assert_eq!(Value::from("5").sparql_cmp(&Value::Int(5)), None);
    }

    #[test]
    fn test_order_cmp_ranks_kinds() {
        let iri = Value::Iri("http://example.org/health#A".into());
        assert_eq!(iri.order_cmp(&Value::Int(1)), Ordering::Less);
        assert_eq!(Value::Int(9).order_cmp(&Value::from("1")), Ordering::Less);
        assert_eq!(Value::from("z").order_cmp(&Value::Bool(false)), Ordering::Less);
        assert_eq!(Value::Bool(true).order_cmp(&Value::Null), Ordering::Less);
    }

    #[test]
    fn test_order_cmp_within_kind() {
        let a = Value::Iri("http://example.org/health#Patient_1".into());
        let b = Value::Iri("http://example.org/health#Patient_2".into());
        assert_eq!(a.order_cmp(&b), Ordering::Less);
        assert_eq!(Value::Int(2).order_cmp(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(Value::Int(2).order_cmp(&Value::Float(2.0)), Ordering::Equal);
        assert_eq!(Value::Float(f64::NAN).order_cmp(&Value::Float(f64::NAN)), Ordering::Equal);
        assert_eq!(Value::Float(1.0).order_cmp(&Value::Float(f64::NAN)), Ordering::Less);
    }

    #[test]
    fn test_group_key_distinguishes_kinds() {
        assert_ne!(Value::from("5").group_key(), Value::Int(5).group_key());
        assert_eq!(Value::Int(5).group_key(), Value::Float(5.0).group_key());
    }
}
