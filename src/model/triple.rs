//! RDF triples emitted by ingestion.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A resource in the ontology namespace, named by its local part
/// (`Traitement_3` → `health:Traitement_3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalIri(String);

impl LocalIri {
    /// Local names are restricted to `[A-Za-z0-9_]` so they serialize as
    /// prefixed names without escaping.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.starts_with(|c: char| c.is_ascii_digit());
        if valid {
            Ok(Self(name))
        } else {
            Err(Error::Template(format!("invalid local name '{name}'")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Literal datatypes used by the health graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datatype {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
}

/// A typed literal. `lexical` is the raw, unescaped form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Datatype,
}

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Self { lexical: s.into(), datatype: Datatype::String }
    }

    pub fn integer(i: i64) -> Self {
        Self { lexical: i.to_string(), datatype: Datatype::Integer }
    }

    /// `xsd:decimal` has no exponent form and no NaN/INF, so non-finite
    /// input is a type error.
    pub fn decimal(f: f64) -> Result<Self> {
        if !f.is_finite() {
            return Err(Error::TypeError { expected: "finite decimal".into(), got: f.to_string() });
        }
        let mut lexical = format!("{f}");
        if !lexical.contains('.') {
            lexical.push_str(".0");
        }
        Ok(Self { lexical, datatype: Datatype::Decimal })
    }

    pub fn boolean(b: bool) -> Self {
        Self { lexical: b.to_string(), datatype: Datatype::Boolean }
    }

    pub fn date(d: chrono::NaiveDate) -> Self {
        Self { lexical: d.format("%Y-%m-%d").to_string(), datatype: Datatype::Date }
    }
}

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    Iri(LocalIri),
    Literal(Literal),
}

/// Predicate position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// `rdf:type`
    RdfType,
    /// `health:<local>`
    Local(LocalIri),
}

/// A single asserted fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: LocalIri,
    pub predicate: Predicate,
    pub object: Term,
}

impl Triple {
    pub fn typed(subject: &LocalIri, class: &str) -> Result<Self> {
        Ok(Self {
            subject: subject.clone(),
            predicate: Predicate::RdfType,
            object: Term::Iri(LocalIri::new(class)?),
        })
    }

    pub fn attribute(subject: &LocalIri, property: &str, literal: Literal) -> Result<Self> {
        Ok(Self {
            subject: subject.clone(),
            predicate: Predicate::Local(LocalIri::new(property)?),
            object: Term::Literal(literal),
        })
    }

    pub fn edge(subject: &LocalIri, property: &str, target: &LocalIri) -> Result<Self> {
        Ok(Self {
            subject: subject.clone(),
            predicate: Predicate::Local(LocalIri::new(property)?),
            object: Term::Iri(target.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_iri_rejects_syntax() {
        assert!(LocalIri::new("Patient_1").is_ok());
        assert!(LocalIri::new("Patient 1").is_err());
        assert!(LocalIri::new("a>b").is_err());
        assert!(LocalIri::new("").is_err());
        assert!(LocalIri::new("1abc").is_err());
    }

    #[test]
    fn test_decimal_lexical() {
        assert_eq!(Literal::decimal(5.0).unwrap().lexical, "5.0");
        assert_eq!(Literal::decimal(0.8).unwrap().lexical, "0.8");
    }

    #[test]
    fn test_decimal_rejects_non_finite() {
        assert!(matches!(Literal::decimal(f64::NAN), Err(Error::TypeError { .. })));
        assert!(Literal::decimal(f64::INFINITY).is_err());
        assert!(Literal::decimal(f64::NEG_INFINITY).is_err());
    }
}
