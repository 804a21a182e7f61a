//! The fixed template repertoire.
//!
//! Each [`TemplateKind`] declares its parameters and composes a
//! [`SelectQuery`] from the fragment builders in [`super::ast`], together
//! with the [`Derivation`] the ranking engine applies to the rows.
//!
//! Predicates follow the health ontology (`health:nomTraitement`,
//! `health:scoreCarbone`, ...). Projected variable names are the record
//! field names callers see.

use serde::{Deserialize, Serialize};

use super::ast::{class, text, var, Expr, GroupPattern, IriRef, SelectQuery};
use super::params::{ParamSpec, ValidatedParams};
use crate::ranking::{Aggregate, AggregateSpec, Derivation};
use crate::Result;

/// Top-K for [`TemplateKind::Recommendation`].
pub const RECOMMENDATION_TOP_K: usize = 5;

pub const DEFAULT_ECO_MAX_SCORE: f64 = 5.0;
pub const DEFAULT_RECOMMENDATION_MAX_SCORE: f64 = 10.0;
pub const DEFAULT_MIN_EFFICACY: f64 = 70.0;
pub const DEFAULT_MIN_EXPERIENCE: f64 = 5.0;
pub const DEFAULT_MAX_IMPACT: f64 = 5.0;

/// Entity classes that can be listed wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Patient,
    Practitioner,
    Disease,
    Treatment,
}

impl EntityClass {
    /// (class, subject variable, optional attributes as (predicate, variable))
    fn shape(self) -> (&'static str, &'static str, &'static [(&'static str, &'static str)]) {
        match self {
            EntityClass::Patient => ("Patient", "patient", &[
                ("nom", "last_name"),
                ("prenom", "first_name"),
                ("email", "email"),
            ]),
            EntityClass::Practitioner => ("Medecin", "practitioner", &[
                ("nom", "last_name"),
                ("prenom", "first_name"),
                ("specialite", "specialty"),
                ("anneesExperience", "experience"),
            ]),
            EntityClass::Disease => ("Maladie", "disease", &[
                ("nomMaladie", "name"),
                ("codeCIM10", "icd10"),
                ("gravite", "severity"),
                ("contagieuse", "contagious"),
            ]),
            EntityClass::Treatment => ("Traitement", "treatment", &[
                ("nomTraitement", "name"),
                ("cout", "cost"),
                ("efficacite", "efficacy"),
                ("duree", "duration"),
            ]),
        }
    }
}

/// Template kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    /// All entities of a class with their optional attributes.
    ListAll(EntityClass),
    /// Practitioners whose specialty equals `specialty`, most experienced first.
    PractitionersBySpecialty,
    /// Treatments of `disease`, optional cost/efficacy/carbon score, greenest first.
    TreatmentsForDisease,
    /// Treatments with carbon score ≤ `max_score`, greenest first.
    EcoTreatments,
    /// Patient identified by `email` with optional diagnoses and treatments.
    PatientProfile,
    /// Every treatment of `disease` ranked by efficacy / carbon score.
    EcoEfficiency,
    /// Pairs of treatments of `disease`, higher score first in each pair.
    TreatmentAlternatives,
    /// Top-K eco-efficiency ratio under score and efficacy bounds.
    Recommendation,
    /// Experienced practitioners grouped with their low-impact prescriptions.
    EcoPractitioners,
}

const NO_PARAMS: &[ParamSpec] = &[];
const DISEASE: &[ParamSpec] = &[ParamSpec::text("disease")];
const SPECIALTY: &[ParamSpec] = &[ParamSpec::text("specialty")];
const EMAIL: &[ParamSpec] = &[ParamSpec::text("email")];
const ECO: &[ParamSpec] = &[ParamSpec::numeric("max_score", Some(DEFAULT_ECO_MAX_SCORE))];
const RECOMMENDATION: &[ParamSpec] = &[
    ParamSpec::text("disease"),
    ParamSpec::numeric("max_score", Some(DEFAULT_RECOMMENDATION_MAX_SCORE)),
    ParamSpec::numeric("min_efficacy", Some(DEFAULT_MIN_EFFICACY)),
];
const ECO_PRACTITIONERS: &[ParamSpec] = &[
    ParamSpec::numeric("min_experience", Some(DEFAULT_MIN_EXPERIENCE)),
    ParamSpec::numeric("max_impact", Some(DEFAULT_MAX_IMPACT)),
];

impl TemplateKind {
    pub fn name(&self) -> &'static str {
        match self {
            TemplateKind::ListAll(EntityClass::Patient) => "list_patients",
            TemplateKind::ListAll(EntityClass::Practitioner) => "list_practitioners",
            TemplateKind::ListAll(EntityClass::Disease) => "list_diseases",
            TemplateKind::ListAll(EntityClass::Treatment) => "list_treatments",
            TemplateKind::PractitionersBySpecialty => "practitioners_by_specialty",
            TemplateKind::TreatmentsForDisease => "treatments_for_disease",
            TemplateKind::EcoTreatments => "eco_treatments",
            TemplateKind::PatientProfile => "patient_profile",
            TemplateKind::EcoEfficiency => "eco_efficiency",
            TemplateKind::TreatmentAlternatives => "treatment_alternatives",
            TemplateKind::Recommendation => "recommendation",
            TemplateKind::EcoPractitioners => "eco_practitioners",
        }
    }

    /// Parameters this template reads.
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            TemplateKind::ListAll(_) => NO_PARAMS,
            TemplateKind::PractitionersBySpecialty => SPECIALTY,
            TemplateKind::TreatmentsForDisease
            | TemplateKind::EcoEfficiency
            | TemplateKind::TreatmentAlternatives => DISEASE,
            TemplateKind::EcoTreatments => ECO,
            TemplateKind::PatientProfile => EMAIL,
            TemplateKind::Recommendation => RECOMMENDATION,
            TemplateKind::EcoPractitioners => ECO_PRACTITIONERS,
        }
    }

    pub fn all() -> Vec<TemplateKind> {
        vec![
            TemplateKind::ListAll(EntityClass::Patient),
            TemplateKind::ListAll(EntityClass::Practitioner),
            TemplateKind::ListAll(EntityClass::Disease),
            TemplateKind::ListAll(EntityClass::Treatment),
            TemplateKind::PractitionersBySpecialty,
            TemplateKind::TreatmentsForDisease,
            TemplateKind::EcoTreatments,
            TemplateKind::PatientProfile,
            TemplateKind::EcoEfficiency,
            TemplateKind::TreatmentAlternatives,
            TemplateKind::Recommendation,
            TemplateKind::EcoPractitioners,
        ]
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A built template: the query to send and what to do with its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub kind: TemplateKind,
    pub query: SelectQuery,
    pub derivation: Derivation,
}

impl Template {
    /// Record fields the normalizer must fill (absent ones become `Null`).
    pub fn columns(&self) -> Vec<String> {
        self.query.columns()
    }
}

/// Build a template from validated parameters.
pub fn build(kind: TemplateKind, params: &ValidatedParams) -> Result<Template> {
    let (query, derivation) = match kind {
        TemplateKind::ListAll(entity) => plain(list_all(entity)),
        TemplateKind::PractitionersBySpecialty => {
            plain(practitioners_by_specialty(params.text("specialty")?))
        }
        TemplateKind::TreatmentsForDisease => plain(treatments_for_disease(params.text("disease")?)),
        TemplateKind::EcoTreatments => plain(eco_treatments(params.number("max_score")?)),
        TemplateKind::PatientProfile => plain(patient_profile(params.text("email")?)),
        TemplateKind::EcoEfficiency => plain(eco_efficiency(params.text("disease")?)),
        TemplateKind::TreatmentAlternatives => {
            plain(treatment_alternatives(params.text("disease")?))
        }
        TemplateKind::Recommendation => plain(recommendation(
            params.text("disease")?,
            params.number("max_score")?,
            params.number("min_efficacy")?,
        )),
        TemplateKind::EcoPractitioners => eco_practitioners(
            params.number("min_experience")?,
            params.number("max_impact")?,
        ),
    };

    query.check_variables()?;
    if let Some(spec) = &derivation.aggregate {
        check_aggregate(&query, spec)?;
    }
    Ok(Template { kind, query, derivation })
}

/// Templates whose ranking mirrors the query itself.
fn plain(query: SelectQuery) -> (SelectQuery, Derivation) {
    let derivation = Derivation::from_query(&query);
    (query, derivation)
}

fn check_aggregate(query: &SelectQuery, spec: &AggregateSpec) -> Result<()> {
    let columns = query.columns();
    let inputs = spec
        .group_by
        .iter()
        .map(String::as_str)
        .chain(spec.aggregates.iter().map(Aggregate::input));
    for v in inputs {
        if !columns.iter().any(|c| c == v) {
            return Err(crate::Error::Template(format!("aggregate uses unprojected variable ?{v}")));
        }
    }
    Ok(())
}

// ============================================================================
// Shared fragments
// ============================================================================

/// `?disease health:nomMaladie "<name>" . ?treatment health:traite ?disease .`
fn treatments_of(disease: &str, treatment: &str) -> GroupPattern {
    GroupPattern::new()
        .triple(var("disease"), IriRef::Health("nomMaladie"), text(disease))
        .attr(treatment, "traite", "disease")
}

/// `?t health:aImpact ?i . ?i health:scoreCarbone ?score .`
fn with_impact(g: GroupPattern, treatment: &str, impact: &str, score: &str) -> GroupPattern {
    g.attr(treatment, "aImpact", impact).attr(impact, "scoreCarbone", score)
}

fn eco_ratio() -> Expr {
    Expr::var("efficacy").divided_by(Expr::var("carbon_score"))
}

// ============================================================================
// Templates
// ============================================================================

fn list_all(entity: EntityClass) -> SelectQuery {
    let (class_name, subject, attributes) = entity.shape();
    let mut pattern = GroupPattern::new().triple(var(subject), IriRef::RdfType, class(class_name));
    let mut columns = vec![subject];
    for &(predicate, variable) in attributes {
        pattern = pattern.optional_attr(subject, predicate, variable);
        columns.push(variable);
    }
    SelectQuery::new(pattern).select(&columns).order_asc(subject)
}

fn practitioners_by_specialty(specialty: &str) -> SelectQuery {
    let pattern = GroupPattern::new()
        .triple(var("practitioner"), IriRef::RdfType, class("Medecin"))
        .attr("practitioner", "specialite", "specialty")
        .attr("practitioner", "nom", "last_name")
        .attr("practitioner", "prenom", "first_name")
        .optional_attr("practitioner", "anneesExperience", "experience")
        .filter(Expr::var("specialty").equals(Expr::text(specialty)));
    SelectQuery::new(pattern)
        .select(&["practitioner", "last_name", "first_name", "specialty", "experience"])
        .order_desc("experience")
        .order_asc("last_name")
}

fn treatments_for_disease(disease: &str) -> SelectQuery {
    let pattern = GroupPattern::new()
        .triple(var("disease"), IriRef::RdfType, class("Maladie"))
        .triple(var("disease"), IriRef::Health("nomMaladie"), text(disease))
        .attr("treatment", "traite", "disease")
        .attr("treatment", "nomTraitement", "name")
        .optional_attr("treatment", "cout", "cost")
        .optional_attr("treatment", "efficacite", "efficacy")
        .optional(with_impact(GroupPattern::new(), "treatment", "impact", "carbon_score"));
    SelectQuery::new(pattern)
        .select(&["treatment", "name", "cost", "efficacy", "carbon_score"])
        .order_asc("carbon_score")
        .order_asc("name")
}

fn eco_treatments(max_score: f64) -> SelectQuery {
    let pattern = with_impact(
        GroupPattern::new()
            .attr("treatment", "nomTraitement", "name")
            .attr("treatment", "efficacite", "efficacy"),
        "treatment",
        "impact",
        "carbon_score",
    )
    .optional_attr("impact", "consommationEau", "water_use")
    .optional_attr("impact", "recyclable", "recyclable")
    .filter(Expr::var("carbon_score").at_most(Expr::number(max_score)));
    SelectQuery::new(pattern)
        .select(&["treatment", "name", "carbon_score", "efficacy", "water_use", "recyclable"])
        .order_asc("carbon_score")
        .order_asc("name")
}

fn patient_profile(email: &str) -> SelectQuery {
    let pattern = GroupPattern::new()
        .triple(var("patient"), IriRef::RdfType, class("Patient"))
        .triple(var("patient"), IriRef::Health("email"), text(email))
        .optional_attr("patient", "nom", "last_name")
        .optional_attr("patient", "prenom", "first_name")
        .optional(
            GroupPattern::new()
                .attr("patient", "diagnostiquePour", "disease")
                .attr("disease", "nomMaladie", "disease_name"),
        )
        .optional(
            GroupPattern::new()
                .attr("patient", "recoit", "treatment")
                .attr("treatment", "nomTraitement", "treatment_name")
                .optional_attr("practitioner", "prescrit", "treatment"),
        );
    SelectQuery::new(pattern)
        .select(&[
            "patient",
            "last_name",
            "first_name",
            "disease",
            "disease_name",
            "treatment",
            "treatment_name",
            "practitioner",
        ])
        .order_asc("disease_name")
        .order_asc("treatment_name")
}

fn eco_efficiency(disease: &str) -> SelectQuery {
    let pattern = with_impact(
        treatments_of(disease, "treatment")
            .attr("treatment", "nomTraitement", "name")
            .attr("treatment", "efficacite", "efficacy")
            .attr("treatment", "cout", "cost"),
        "treatment",
        "impact",
        "carbon_score",
    )
    .filter(Expr::var("carbon_score").greater_than(Expr::number(0.0)));
    SelectQuery::new(pattern)
        .select(&["treatment", "name", "carbon_score", "efficacy", "cost"])
        .select_expr(eco_ratio(), "ratio")
        .order_desc("ratio")
        .order_asc("name")
}

fn treatment_alternatives(disease: &str) -> SelectQuery {
    let side = |g: GroupPattern, n: &str| {
        let t = format!("t{n}");
        let i = format!("i{n}");
        with_impact(
            g.attr(&t, "nomTraitement", &format!("name{n}"))
                .attr(&t, "traite", "disease")
                .attr(&t, "efficacite", &format!("efficacy{n}")),
            &t,
            &i,
            &format!("score{n}"),
        )
    };
    let pattern = GroupPattern::new()
        .triple(var("disease"), IriRef::Health("nomMaladie"), text(disease))
        .attr("disease", "nomMaladie", "disease_name");
    let pattern = side(side(pattern, "1"), "2")
        .filter(Expr::var("t1").not_equals(Expr::var("t2")))
        .filter(Expr::var("score1").greater_than(Expr::var("score2")));
    SelectQuery::new(pattern)
        .select(&[
            "disease_name",
            "t1", "name1", "score1", "efficacy1",
            "t2", "name2", "score2", "efficacy2",
        ])
        .select_expr(Expr::var("score1").minus(Expr::var("score2")), "score_diff")
        .select_expr(Expr::var("efficacy1").minus(Expr::var("efficacy2")), "efficacy_diff")
        .order_desc("score_diff")
        .order_asc("name1")
        .order_asc("name2")
}

fn recommendation(disease: &str, max_score: f64, min_efficacy: f64) -> SelectQuery {
    let pattern = with_impact(
        treatments_of(disease, "treatment")
            .attr("treatment", "nomTraitement", "name")
            .attr("treatment", "efficacite", "efficacy")
            .attr("treatment", "cout", "cost"),
        "treatment",
        "impact",
        "carbon_score",
    )
    .filter(Expr::var("carbon_score").not_equals(Expr::number(0.0)))
    .filter(Expr::var("carbon_score").at_most(Expr::number(max_score)))
    .filter(Expr::var("efficacy").at_least(Expr::number(min_efficacy)));
    SelectQuery::new(pattern)
        .select(&["treatment", "name", "carbon_score", "efficacy", "cost"])
        .select_expr(eco_ratio(), "ratio")
        .order_desc("ratio")
        .order_asc("name")
        .limit(RECOMMENDATION_TOP_K)
}

/// Grouping, ordering and limit run in the ranking engine, so the store
/// returns filtered source rows.
fn eco_practitioners(min_experience: f64, max_impact: f64) -> (SelectQuery, Derivation) {
    let pattern = with_impact(
        GroupPattern::new()
            .attr("practitioner", "nom", "last_name")
            .attr("practitioner", "prenom", "first_name")
            .attr("practitioner", "specialite", "specialty")
            .attr("practitioner", "anneesExperience", "experience")
            .attr("practitioner", "prescrit", "treatment"),
        "treatment",
        "impact",
        "carbon_score",
    )
    .filter(Expr::var("experience").at_least(Expr::number(min_experience)))
    .filter(Expr::var("carbon_score").at_most(Expr::number(max_impact)));
    let query = SelectQuery::new(pattern).select(&[
        "practitioner",
        "last_name",
        "first_name",
        "specialty",
        "experience",
        "treatment",
        "carbon_score",
    ]);
    let derivation = Derivation::from_query(&query)
        .with_aggregate(AggregateSpec {
            group_by: ["practitioner", "last_name", "first_name", "specialty", "experience"]
                .map(String::from)
                .to_vec(),
            aggregates: vec![
                Aggregate::CountDistinct {
                    var: "treatment".into(),
                    alias: "eco_treatment_count".into(),
                },
                Aggregate::Avg { var: "carbon_score".into(), alias: "avg_score".into() },
            ],
        })
        .order_desc("eco_treatment_count")
        .order_asc("avg_score")
        .order_asc("last_name");
    (query, derivation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Namespace;
    use crate::sparql::params::{validate, ParamSet};
    use crate::sparql::render::render_query;

    fn sample_params() -> ParamSet {
        ParamSet::new()
            .with("disease", "Hypertension Artérielle")
            .with("specialty", "cardiologue")
            .with("email", "marie@example.org")
    }

    fn built(kind: TemplateKind) -> Template {
        let v = validate(kind.params(), &sample_params()).unwrap();
        build(kind, &v).unwrap()
    }

    fn rendered(kind: TemplateKind) -> String {
        let ns = Namespace::new("http://example.org/health#").unwrap();
        render_query(&built(kind).query, &ns)
    }

    #[test]
    fn test_every_template_binds_what_it_uses() {
        for kind in TemplateKind::all() {
            let v = validate(kind.params(), &sample_params()).unwrap();
            assert!(build(kind, &v).is_ok(), "{kind}");
        }
    }

    #[test]
    fn test_eco_treatments_threshold() {
        let q = rendered(TemplateKind::EcoTreatments);
        assert!(q.contains("FILTER ((?carbon_score <= 5))"));
        assert!(q.contains("ORDER BY ASC(?carbon_score) ASC(?name)"));
    }

    #[test]
    fn test_treatments_for_disease_keeps_impact_optional() {
        let q = rendered(TemplateKind::TreatmentsForDisease);
        assert!(q.contains("?disease health:nomMaladie \"Hypertension Artérielle\" ."));
        assert!(q.contains(
            "    OPTIONAL {\n        ?treatment health:aImpact ?impact .\n        ?impact health:scoreCarbone ?carbon_score .\n    }"
        ));
    }

    #[test]
    fn test_alternatives_filters_both_directions_out() {
        let q = rendered(TemplateKind::TreatmentAlternatives);
        assert!(q.contains("FILTER ((?t1 != ?t2))"));
        assert!(q.contains("FILTER ((?score1 > ?score2))"));
        assert!(q.contains("((?score1 - ?score2) AS ?score_diff)"));
    }

    #[test]
    fn test_recommendation_bounds_and_limit() {
        let q = rendered(TemplateKind::Recommendation);
        assert!(q.contains("FILTER ((?carbon_score != 0))"));
        assert!(q.contains("FILTER ((?carbon_score <= 10))"));
        assert!(q.contains("FILTER ((?efficacy >= 70))"));
        assert!(q.contains("ORDER BY DESC(?ratio) ASC(?name)"));
        assert!(q.ends_with("LIMIT 5\n"));
    }

    #[test]
    fn test_eco_practitioners_aggregates_in_engine() {
        let t = built(TemplateKind::EcoPractitioners);
        let q = render_query(&t.query, &Namespace::new("http://example.org/health#").unwrap());
        assert!(!q.contains("GROUP BY"));
        assert!(!q.contains("ORDER BY"));
        assert!(q.contains("FILTER ((?experience >= 5))"));
        assert!(q.contains("FILTER ((?carbon_score <= 5))"));
        assert!(t.derivation.aggregate.is_some());
        assert_eq!(t.derivation.filters.len(), 2);
    }

    #[test]
    fn test_patient_profile_nests_optionals() {
        let q = rendered(TemplateKind::PatientProfile);
        assert!(q.contains("?patient health:email \"marie@example.org\" ."));
        assert!(q.contains("        OPTIONAL {\n            ?practitioner health:prescrit ?treatment .\n        }"));
    }

    #[test]
    fn test_specialty_is_an_escaped_filter() {
        let v = validate(
            TemplateKind::PractitionersBySpecialty.params(),
            &ParamSet::new().with("specialty", "x\") } ; DELETE WHERE { ?s ?p ?o"),
        )
        .unwrap();
        let t = build(TemplateKind::PractitionersBySpecialty, &v).unwrap();
        let q = render_query(&t.query, &Namespace::new("http://example.org/health#").unwrap());
        assert!(q.contains(r#"FILTER ((?specialty = "x\") } ; DELETE WHERE { ?s ?p ?o"))"#));
    }

    #[test]
    fn test_list_all_has_no_params() {
        for entity in [EntityClass::Patient, EntityClass::Disease] {
            assert!(TemplateKind::ListAll(entity).params().is_empty());
        }
        let q = rendered(TemplateKind::ListAll(EntityClass::Patient));
        assert!(q.contains("?patient rdf:type health:Patient ."));
        assert!(q.contains("OPTIONAL {\n        ?patient health:email ?email .\n    }"));
    }
}
