//! Result normalization.
//!
//! Converts a SPARQL JSON bindings document into typed records. Variables
//! that a row leaves unbound (unmatched OPTIONAL) become `Value::Null`.

use chrono::NaiveDate;

use crate::model::{Record, Value};
use crate::transport::{Bindings, RdfTerm, TermKind};
use crate::{Error, Result};

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

const INTEGER_TYPES: &[&str] = &[
    "integer", "int", "long", "short", "byte",
    "nonNegativeInteger", "positiveInteger", "negativeInteger", "nonPositiveInteger",
    "unsignedLong", "unsignedInt", "unsignedShort", "unsignedByte",
];
const FLOAT_TYPES: &[&str] = &["decimal", "double", "float"];

/// Normalize every row. `columns` lists the variables every record must
/// carry; when empty, the document's `head.vars` is used.
pub fn normalize(bindings: &Bindings, columns: &[String]) -> Result<Vec<Record>> {
    let columns = if columns.is_empty() { &bindings.head.vars[..] } else { columns };
    bindings
        .rows()
        .iter()
        .map(|row| {
            let mut record: Record = columns
                .iter()
                .map(|c| (c.clone(), Value::Null))
                .collect();
            for (var, term) in row {
                record.insert(var.clone(), term_value(term).map_err(|e| match e {
                    Error::Protocol(msg) => Error::Protocol(format!("?{var}: {msg}")),
                    other => other,
                })?);
            }
            Ok(record)
        })
        .collect()
}

/// Type one bound term.
pub fn term_value(term: &RdfTerm) -> Result<Value> {
    match term.kind {
        TermKind::Uri => Ok(Value::Iri(term.value.clone())),
        TermKind::Bnode => Ok(Value::Iri(format!("_:{}", term.value))),
        TermKind::Literal | TermKind::TypedLiteral => {
            let Some(local) = term.datatype.as_deref().and_then(|d| d.strip_prefix(XSD)) else {
                return Ok(Value::String(term.value.clone()));
            };
            literal_value(&term.value, local)
        }
    }
}

fn malformed(lexical: &str, datatype: &str) -> Error {
    Error::Protocol(format!("'{}' is not a valid xsd:{datatype}", lexical.escape_debug()))
}

fn literal_value(lexical: &str, datatype: &str) -> Result<Value> {
    let trimmed = lexical.trim();
    if INTEGER_TYPES.contains(&datatype) {
        // out-of-range integers still compare correctly as floats
        return match trimmed.parse::<i64>() {
            Ok(i) => Ok(Value::Int(i)),
            Err(_) => float(trimmed, datatype),
        };
    }
    if FLOAT_TYPES.contains(&datatype) {
        return float(trimmed, datatype);
    }
    match datatype {
        "boolean" => match trimmed {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(malformed(lexical, datatype)),
        },
        // xsd:date may carry a timezone suffix; the calendar date is the first 10 chars
        "date" => trimmed
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Value::Date)
            .ok_or_else(|| malformed(lexical, datatype)),
        _ => Ok(Value::String(lexical.to_owned())),
    }
}

fn float(lexical: &str, datatype: &str) -> Result<Value> {
    lexical
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| malformed(lexical, datatype))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_typed_coercions() {
        assert_eq!(term_value(&RdfTerm::decimal(0.8)).unwrap(), Value::Float(0.8));
        assert_eq!(term_value(&RdfTerm::integer(12)).unwrap(), Value::Int(12));
        assert_eq!(term_value(&RdfTerm::typed("1.5E2", "double")).unwrap(), Value::Float(150.0));
        assert_eq!(term_value(&RdfTerm::boolean(true)).unwrap(), Value::Bool(true));
        assert_eq!(term_value(&RdfTerm::typed("0", "boolean")).unwrap(), Value::Bool(false));
        assert_eq!(
            term_value(&RdfTerm::typed("1980-05-17Z", "date")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1980, 5, 17).unwrap())
        );
        assert_eq!(
            term_value(&RdfTerm::uri("http://example.org/health#T1")).unwrap(),
            Value::Iri("http://example.org/health#T1".into())
        );
        assert_eq!(term_value(&RdfTerm::literal("Marche")).unwrap(), Value::from("Marche"));
        assert_eq!(
            term_value(&RdfTerm::typed("x", "string")).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_huge_integer_falls_back_to_float() {
        let v = term_value(&RdfTerm::typed("99999999999999999999", "integer")).unwrap();
        assert!(matches!(v, Value::Float(_)));
    }

    #[test]
    fn test_unbound_optional_becomes_null() {
        let b = Bindings::from_rows(
            &["name", "carbon_score"],
            [
                vec![("name", RdfTerm::literal("Marche")), ("carbon_score", RdfTerm::decimal(0.8))],
                vec![("name", RdfTerm::literal("Chirurgie"))],
            ],
        );
        let records = normalize(&b, &cols(&["name", "carbon_score", "cost"])).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value("carbon_score"), &Value::Null);
        assert_eq!(records[0].value("cost"), &Value::Null);
        assert_eq!(records[0].values.len(), 3);
    }

    #[test]
    fn test_head_vars_used_when_no_columns() {
        let b = Bindings::from_rows(&["a", "b"], [vec![("a", RdfTerm::literal("x"))]]);
        let records = normalize(&b, &[]).unwrap();
        assert!(records[0].value("b").is_null());
        assert!(records[0].values.contains_key("b"));
    }

    #[test]
    fn test_malformed_numeric_is_protocol_error() {
        let b = Bindings::from_rows(&["score"], [vec![("score", RdfTerm::typed("high", "decimal"))]]);
        match normalize(&b, &[]) {
            Err(Error::Protocol(msg)) => assert!(msg.contains("?score")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
