//! Store configuration.
//!
//! Fixed at construction and never mutated afterwards. Every `Engine` and
//! transport is built from one of these.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_QUERY_ENDPOINT: &str = "http://localhost:3030/health_env/query";
pub const DEFAULT_UPDATE_ENDPOINT: &str = "http://localhost:3030/health_env/update";
pub const DEFAULT_NAMESPACE: &str = "http://example.org/health#";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint addresses, timeout and ontology namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SPARQL query endpoint (read mode).
    pub query_endpoint: String,
    /// SPARQL update endpoint (mutate mode).
    pub update_endpoint: String,
    /// Per-request timeout applied by the transport.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// IRI bound to the `health:` prefix.
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_endpoint: DEFAULT_QUERY_ENDPOINT.into(),
            update_endpoint: DEFAULT_UPDATE_ENDPOINT.into(),
            timeout: DEFAULT_TIMEOUT,
            namespace: DEFAULT_NAMESPACE.into(),
        }
    }
}

impl StoreConfig {
    pub fn with_query_endpoint(mut self, url: impl Into<String>) -> Self {
        self.query_endpoint = url.into();
        self
    }

    pub fn with_update_endpoint(mut self, url: impl Into<String>) -> Self {
        self.update_endpoint = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Defaults overridden by `FUSEKI_ENDPOINT`, `FUSEKI_UPDATE_ENDPOINT`,
    /// `FUSEKI_TIMEOUT_SECS` and `ONTOLOGY_NAMESPACE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `from_env` over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup("FUSEKI_ENDPOINT") {
            config.query_endpoint = v;
        }
        if let Some(v) = lookup("FUSEKI_UPDATE_ENDPOINT") {
            config.update_endpoint = v;
        }
        if let Some(v) = lookup("FUSEKI_TIMEOUT_SECS") {
            let secs: u64 = v.trim().parse().map_err(|_| {
                Error::Config(format!("FUSEKI_TIMEOUT_SECS must be whole seconds, got '{v}'"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("ONTOLOGY_NAMESPACE") {
            config.namespace = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("query_endpoint", &self.query_endpoint), ("update_endpoint", &self.update_endpoint)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{name} must be an http(s) URL, got '{url}'")));
            }
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".into()));
        }
        Namespace::new(&self.namespace)?;
        Ok(())
    }

    pub fn namespace(&self) -> Result<Namespace> {
        Namespace::new(&self.namespace)
    }
}

/// A namespace IRI that is safe to place inside `<...>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(iri: &str) -> Result<Self> {
        let forbidden = |c: char| {
            c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
        };
        if iri.is_empty() || !iri.contains(':') || iri.chars().any(forbidden) {
            return Err(Error::Config(format!("invalid namespace IRI '{}'", iri.escape_debug())));
        }
        Ok(Self(iri.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
