//! # ecograph: eco-aware query layer over a health triple store
//!
//! Builds parameterized SPARQL SELECT queries from a fixed repertoire of
//! templates, sends them to a SPARQL 1.1 endpoint, normalizes the JSON
//! bindings into typed records and ranks them by environmental impact.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `Transport` is the contract between engine and store
//! 2. **Escaping in one place**: queries are an AST; text reaches SPARQL only
//!    through the serializer
//! 3. **Reads never fail**: a broken store degrades to an empty result;
//!    only bad parameters are reported to the caller
//! 4. **Deterministic ranking**: derived values, grouping, ordering and top-K
//!    are recomputed locally, whatever order the store answered in
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ecograph::{Engine, StoreConfig};
//!
//! # async fn example() -> ecograph::Result<()> {
//! let engine = Engine::connect(StoreConfig::from_env()?)?;
//!
//! for t in engine.recommend("Hypertension Artérielle", None, None).await? {
//!     println!("{} (ratio {:.1})", t.name, t.ratio);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! | Transport | Feature | Description |
//! |-----------|---------|-------------|
//! | Http | `http` (default) | SPARQL 1.1 protocol via reqwest |
//! | Mock | (always) | Scriptable in-process double for tests |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod sparql;
pub mod transport;
pub mod normalize;
pub mod ranking;
pub mod ingest;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    Value, Record, FromValue, FromRecord,
    PatientSummary, PractitionerSummary, TreatmentOption, EcoTreatment,
    ProfileEntry, RankedTreatment, TreatmentPair, EcoPractitioner,
};
pub use config::{StoreConfig, Namespace};
pub use sparql::params::{Param, ParamSet};
pub use sparql::templates::{EntityClass, Template, TemplateKind};
pub use transport::{
    Bindings, RdfTerm, Transport, StoreClient, QueryMode,
    MockTransport, Failure,
};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use ingest::{Snapshot, IngestReport};

// ============================================================================
// Engine
// ============================================================================

/// The primary entry point. An `Engine` wraps a transport and runs
/// templates against it.
///
/// Immutable after construction; share it behind an `Arc` and call it from
/// as many tasks as needed.
#[derive(Debug)]
pub struct Engine<T: Transport> {
    config: StoreConfig,
    namespace: Namespace,
    client: StoreClient<T>,
}

/// Three eco views of one disease, fetched concurrently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcoOverview {
    pub recommendations: Vec<RankedTreatment>,
    pub alternatives: Vec<TreatmentPair>,
    pub eco_treatments: Vec<EcoTreatment>,
}

impl<T: Transport> Engine<T> {
    /// Create an Engine over the given transport.
    pub fn with_transport(config: StoreConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let namespace = config.namespace()?;
        Ok(Self { config, namespace, client: StoreClient::new(transport) })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Access the store client (raw reads, updates).
    pub fn client(&self) -> &StoreClient<T> {
        &self.client
    }

    /// The query text `run` would send, without sending it.
    pub fn render(&self, kind: TemplateKind, params: &ParamSet) -> Result<String> {
        sparql::render(kind, params, &self.namespace)
    }

    /// Run a template.
    ///
    /// Invalid parameters are returned as `Error::ParameterValidation`
    /// before anything is sent. Every other failure yields an empty result.
    pub async fn run(&self, kind: TemplateKind, params: &ParamSet) -> Result<Vec<Record>> {
        let Some(template) = self.prepare(kind, params)? else {
            return Ok(Vec::new());
        };
        match self.fetch(&template).await {
            Ok(rows) => Ok(rows),
            Err(e) => Ok(degraded(kind, params, &e)),
        }
    }

    /// Like [`run`](Self::run), but gives up after `budget`. The in-flight
    /// request is dropped and the result is empty.
    pub async fn run_within(
        &self,
        kind: TemplateKind,
        params: &ParamSet,
        budget: Duration,
    ) -> Result<Vec<Record>> {
        let Some(template) = self.prepare(kind, params)? else {
            return Ok(Vec::new());
        };
        match tokio::time::timeout(budget, self.fetch(&template)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => Ok(degraded(kind, params, &e)),
            Err(_) => Ok(degraded(kind, params, &Error::Timeout(budget))),
        }
    }

    /// Run a template and convert each record into `V`. A record that does
    /// not fit `V` degrades the whole result.
    pub async fn run_as<V: FromRecord>(&self, kind: TemplateKind, params: &ParamSet) -> Result<Vec<V>> {
        let rows = self.run(kind, params).await?;
        match rows.iter().map(V::from_record).collect::<Result<Vec<V>>>() {
            Ok(views) => Ok(views),
            Err(e) => Ok(degraded(kind, params, &e)),
        }
    }

    /// Validate and build. Only validation errors escape.
    fn prepare(&self, kind: TemplateKind, params: &ParamSet) -> Result<Option<Template>> {
        match sparql::prepare(kind, params) {
            Ok(template) => Ok(Some(template)),
            Err(e) if e.is_validation() => Err(e),
            Err(e) => {
                degraded::<()>(kind, params, &e);
                Ok(None)
            }
        }
    }

    /// Render, send, normalize, rank.
    async fn fetch(&self, template: &Template) -> Result<Vec<Record>> {
        let query = sparql::render::render_query(&template.query, &self.namespace);
        debug!(template = %template.kind, %query, "sending query");

        let bindings = self.client.try_select(&query).await?;
        let rows = normalize::normalize(&bindings, &template.columns())?;
        let ranked = ranking::apply(&template.derivation, rows);

        debug!(template = %template.kind, received = bindings.len(), returned = ranked.len(), "query answered");
        Ok(ranked)
    }

    // ------------------------------------------------------------------------
    // Typed shortcuts
    // ------------------------------------------------------------------------

    pub async fn patients(&self) -> Result<Vec<PatientSummary>> {
        self.run_as(TemplateKind::ListAll(EntityClass::Patient), &ParamSet::new()).await
    }

    pub async fn practitioners_by_specialty(&self, specialty: &str) -> Result<Vec<PractitionerSummary>> {
        let params = ParamSet::new().with("specialty", specialty);
        self.run_as(TemplateKind::PractitionersBySpecialty, &params).await
    }

    pub async fn treatments_for_disease(&self, disease: &str) -> Result<Vec<TreatmentOption>> {
        let params = ParamSet::new().with("disease", disease);
        self.run_as(TemplateKind::TreatmentsForDisease, &params).await
    }

    /// Treatments with carbon score at most `max_score` (default 5).
    pub async fn eco_treatments(&self, max_score: Option<f64>) -> Result<Vec<EcoTreatment>> {
        let params = with_optional(ParamSet::new(), "max_score", max_score);
        self.run_as(TemplateKind::EcoTreatments, &params).await
    }

    pub async fn patient_profile(&self, email: &str) -> Result<Vec<ProfileEntry>> {
        let params = ParamSet::new().with("email", email);
        self.run_as(TemplateKind::PatientProfile, &params).await
    }

    pub async fn eco_efficiency(&self, disease: &str) -> Result<Vec<RankedTreatment>> {
        let params = ParamSet::new().with("disease", disease);
        self.run_as(TemplateKind::EcoEfficiency, &params).await
    }

    pub async fn treatment_alternatives(&self, disease: &str) -> Result<Vec<TreatmentPair>> {
        let params = ParamSet::new().with("disease", disease);
        self.run_as(TemplateKind::TreatmentAlternatives, &params).await
    }

    /// Top five treatments of `disease` by efficacy per carbon unit, bounded
    /// by `max_score` (default 10) and `min_efficacy` (default 70).
    pub async fn recommend(
        &self,
        disease: &str,
        max_score: Option<f64>,
        min_efficacy: Option<f64>,
    ) -> Result<Vec<RankedTreatment>> {
        let params = recommendation_params(disease, max_score, min_efficacy);
        self.run_as(TemplateKind::Recommendation, &params).await
    }

    pub async fn eco_practitioners(
        &self,
        min_experience: Option<f64>,
        max_impact: Option<f64>,
    ) -> Result<Vec<EcoPractitioner>> {
        let params = with_optional(ParamSet::new(), "min_experience", min_experience);
        let params = with_optional(params, "max_impact", max_impact);
        self.run_as(TemplateKind::EcoPractitioners, &params).await
    }

    /// Recommendations, alternatives and eco listing for one disease, issued
    /// concurrently. Parameters are checked up front so that no query is
    /// sent when any of them is invalid.
    pub async fn eco_overview(&self, disease: &str, max_score: Option<f64>) -> Result<EcoOverview> {
        let recommendation = recommendation_params(disease, max_score, None);
        let alternatives = ParamSet::new().with("disease", disease);
        let eco = with_optional(ParamSet::new(), "max_score", max_score);

        for (kind, params) in [
            (TemplateKind::Recommendation, &recommendation),
            (TemplateKind::TreatmentAlternatives, &alternatives),
            (TemplateKind::EcoTreatments, &eco),
        ] {
            sparql::params::validate(kind.params(), params)?;
        }

        let (recommendations, alternatives, eco_treatments) = tokio::join!(
            self.run_as(TemplateKind::Recommendation, &recommendation),
            self.run_as(TemplateKind::TreatmentAlternatives, &alternatives),
            self.run_as(TemplateKind::EcoTreatments, &eco),
        );
        Ok(EcoOverview {
            recommendations: recommendations?,
            alternatives: alternatives?,
            eco_treatments: eco_treatments?,
        })
    }

    /// Replace the store contents with `snapshot`.
    pub async fn ingest(&self, snapshot: &Snapshot) -> Result<IngestReport> {
        ingest::ingest(&self.client, snapshot, &self.namespace).await
    }
}

/// Engine over the SPARQL HTTP protocol.
#[cfg(feature = "http")]
impl Engine<HttpTransport> {
    pub fn connect(config: StoreConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }
}

fn with_optional(params: ParamSet, name: &str, value: Option<f64>) -> ParamSet {
    match value {
        Some(v) => params.with(name, v),
        None => params,
    }
}

fn recommendation_params(disease: &str, max_score: Option<f64>, min_efficacy: Option<f64>) -> ParamSet {
    let params = ParamSet::new().with("disease", disease);
    let params = with_optional(params, "max_score", max_score);
    with_optional(params, "min_efficacy", min_efficacy)
}

fn degraded<R>(kind: TemplateKind, params: &ParamSet, error: &Error) -> Vec<R> {
    warn!(
        error_class = error.class(),
        template = %kind,
        params = %params.sanitized(),
        error = %error,
        "query degraded to empty result"
    );
    Vec::new()
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid parameter '{parameter}': {reason}")]
    ParameterValidation { parameter: String, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Parameter validation is the one failure reads report to the caller.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::ParameterValidation { .. })
    }

    /// Stable label for logs.
    pub fn class(&self) -> &'static str {
        match self {
            Error::ParameterValidation { .. } => "parameter_validation",
            Error::Template(_) => "template",
            Error::Transport(_) => "transport",
            Error::Protocol(_) => "protocol",
            Error::TypeError { .. } => "type_error",
            Error::NotFound(_) => "not_found",
            Error::Config(_) => "config",
            Error::Timeout(_) => "timeout",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RdfTerm;

    fn engine(mock: MockTransport) -> Engine<MockTransport> {
        Engine::with_transport(StoreConfig::default(), mock).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StoreConfig::default().with_query_endpoint("localhost:3030");
        assert!(matches!(
            Engine::with_transport(config, MockTransport::new()),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_error_propagates() {
        let mock = MockTransport::new();
        let e = engine(mock.clone());
        let params = ParamSet::new().numeric("max_score", "abc");
        let err = e.run(TemplateKind::EcoTreatments, &params).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_view_mismatch_degrades() {
        let mock = MockTransport::new().with_bindings(Bindings::from_rows(
            &["treatment", "name", "carbon_score", "efficacy"],
            [vec![
                ("treatment", RdfTerm::uri("http://example.org/health#T1")),
                ("name", RdfTerm::literal("Marche")),
                ("carbon_score", RdfTerm::decimal(0.8)),
                ("efficacy", RdfTerm::literal("high")),
            ]],
        ));
        assert!(engine(mock).eco_treatments(None).await.unwrap().is_empty());
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::Timeout(Duration::from_secs(1)).class(), "timeout");
        assert!(!Error::Transport("x".into()).is_validation());
    }
}
