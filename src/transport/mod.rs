//! # Transport
//!
//! The contract between the engine and a remote triple store.
//!
//! ## Implementations
//!
//! | Transport | Module | Description |
//! |-----------|--------|-------------|
//! | `HttpTransport` | `http` | SPARQL 1.1 protocol over HTTP (feature `http`) |
//! | `MockTransport` | `mock` | In-process double for tests |
//!
//! [`StoreClient`] sits on top and applies the failure policy: reads never
//! fail (they degrade to empty bindings), mutations report failure upward.

pub mod mock;
#[cfg(feature = "http")]
pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use mock::{Failure, MockTransport};
#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Media type of SPARQL JSON results.
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Update endpoints answer 200 (synchronous) or 204 (no content) on success.
pub fn update_accepted(status: u16) -> bool {
    matches!(status, 200 | 204)
}

// ============================================================================
// SPARQL JSON results document
// ============================================================================

/// `{ "head": { "vars": [...] }, "results": { "bindings": [...] } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    #[serde(default)]
    pub head: Head,
    pub results: ResultSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Head {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub bindings: Vec<HashMap<String, RdfTerm>>,
}

/// One bound value: `{ "type": "literal", "value": "0.8", "datatype": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RdfTerm {
    #[serde(rename = "type")]
    pub kind: TermKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
    Uri,
    Literal,
    /// SPARQL 1.0 JSON results used a separate tag for typed literals.
    TypedLiteral,
    Bnode,
}

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

impl RdfTerm {
    pub fn uri(iri: impl Into<String>) -> Self {
        Self { kind: TermKind::Uri, value: iri.into(), datatype: None, lang: None }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self { kind: TermKind::Literal, value: value.into(), datatype: None, lang: None }
    }

    /// Literal typed with an `xsd:` datatype, e.g. `typed("0.8", "decimal")`.
    pub fn typed(value: impl Into<String>, xsd_local: &str) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            datatype: Some(format!("{XSD}{xsd_local}")),
            lang: None,
        }
    }

    pub fn decimal(v: f64) -> Self { Self::typed(v.to_string(), "decimal") }
    pub fn integer(v: i64) -> Self { Self::typed(v.to_string(), "integer") }
    pub fn boolean(v: bool) -> Self { Self::typed(v.to_string(), "boolean") }
}

impl Bindings {
    /// The well-formed empty result every degraded read returns.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.bindings.len()
    }

    pub fn rows(&self) -> &[HashMap<String, RdfTerm>] {
        &self.results.bindings
    }

    /// Build a document from rows of `(variable, term)` pairs.
    pub fn from_rows<'a, R>(vars: &[&str], rows: R) -> Self
    where
        R: IntoIterator<Item = Vec<(&'a str, RdfTerm)>>,
    {
        Self {
            head: Head { vars: vars.iter().map(|v| (*v).to_owned()).collect() },
            results: ResultSet {
                bindings: rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
                    .collect(),
            },
        }
    }

    /// Parse a response body. Anything that is not a results document is a
    /// protocol error.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::Protocol(format!("unparsable bindings document: {e}")))
    }
}

// ============================================================================
// Transport trait
// ============================================================================

/// Read or mutate round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    Read,
    Mutate,
}

/// One bounded round-trip to the store. Implementations classify failures
/// as `Error::Transport` (never reached the store / no answer) or
/// `Error::Protocol` (the store answered, but not with success).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Run a SELECT query against the read endpoint.
    async fn select(&self, query: &str) -> Result<Bindings>;

    /// Send an update payload to the update endpoint.
    async fn update(&self, payload: &str) -> Result<()>;
}

// ============================================================================
// StoreClient
// ============================================================================

/// Transport plus failure policy.
#[derive(Debug, Clone)]
pub struct StoreClient<T: Transport> {
    transport: T,
}

impl<T: Transport> StoreClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Raw read; the caller decides what a failure means.
    pub async fn try_select(&self, query: &str) -> Result<Bindings> {
        self.transport.select(query).await
    }

    /// Read mode: failures are logged and absorbed into empty bindings.
    pub async fn read(&self, query: &str) -> Bindings {
        match self.transport.select(query).await {
            Ok(bindings) => bindings,
            Err(e) => {
                tracing::warn!(error_class = e.class(), error = %e, "store read failed; returning empty bindings");
                Bindings::empty()
            }
        }
    }

    /// Mutate mode: any failure is returned to the caller. No retry.
    pub async fn mutate(&self, payload: &str) -> Result<()> {
        self.transport.update(payload).await.inspect_err(|e| {
            tracing::warn!(error_class = e.class(), error = %e, "store update rejected");
        })
    }

    /// `execute(query, mode)`: read mode always yields bindings;
    /// mutate mode yields empty bindings on success or the failure.
    pub async fn execute(&self, query: &str, mode: QueryMode) -> Result<Bindings> {
        match mode {
            QueryMode::Read => Ok(self.read(query).await),
            QueryMode::Mutate => self.mutate(query).await.map(|()| Bindings::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_document() {
        let body = r#"{
            "head": {"vars": ["name", "score"]},
            "results": {"bindings": [
                {"name": {"type": "literal", "value": "Marche", "xml:lang": "fr"},
                 "score": {"type": "literal", "value": "0.8",
                           "datatype": "http://www.w3.org/2001/XMLSchema#decimal"}},
                {"name": {"type": "typed-literal", "value": "x",
                          "datatype": "http://www.w3.org/2001/XMLSchema#string"}}
            ]}
        }"#;
        let b = Bindings::from_json(body).unwrap();
        assert_eq!(b.head.vars, vec!["name", "score"]);
        assert_eq!(b.len(), 2);
        assert_eq!(b.rows()[0]["score"], RdfTerm::decimal(0.8));
        assert_eq!(b.rows()[0]["name"].lang.as_deref(), Some("fr"));
        assert_eq!(b.rows()[1]["name"].kind, TermKind::TypedLiteral);
    }

    #[test]
    fn test_missing_head_is_tolerated() {
        let b = Bindings::from_json(r#"{"results": {"bindings": []}}"#).unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn test_garbage_is_protocol_error() {
        for body in ["<html>oops</html>", r#"{"boolean": true}"#, r#"{"results": {"bindings": [{"x": {"type": "weird", "value": "1"}}]}}"#] {
            assert!(matches!(Bindings::from_json(body), Err(Error::Protocol(_))), "{body}");
        }
    }

    #[test]
    fn test_update_status_policy() {
        assert!(update_accepted(200));
        assert!(update_accepted(204));
        for status in [201, 202, 301, 400, 500] {
            assert!(!update_accepted(status), "{status}");
        }
    }
}
