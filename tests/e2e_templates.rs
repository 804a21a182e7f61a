//! End-to-end tests for parameter validation and query rendering.
//!
//! Nothing here touches a store: every test goes through `Engine::render`
//! or the `sparql` module and inspects the query text.

use ecograph::sparql::{self, render::escape_literal};
use ecograph::{Engine, EntityClass, Error, MockTransport, ParamSet, StoreConfig, TemplateKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn engine() -> Engine<MockTransport> {
    Engine::with_transport(StoreConfig::default(), MockTransport::new()).unwrap()
}

/// Inverse of `escape_literal` for the four escapes it produces.
fn unescape(s: &str) -> String {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            other => panic!("unexpected escape {other:?}"),
        }
    }
    out
}

/// The body of the first quoted literal after `marker`, still escaped.
fn literal_after<'q>(query: &'q str, marker: &str) -> &'q str {
    let start = query.find(marker).expect("marker present") + marker.len();
    let rest = &query[start..];
    assert!(rest.starts_with('"'), "literal expected after {marker}");
    let body = &rest[1..];
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match (escaped, c) {
            (true, _) => escaped = false,
            (false, '\\') => escaped = true,
            (false, '"') => return &body[..i],
            _ => {}
        }
    }
    panic!("unterminated literal");
}

// ============================================================================
// 1. Escaping
// ============================================================================

#[test]
fn test_hostile_disease_name_stays_inside_its_literal() {
    let hostile = "x\" . ?s ?p ?o } DROP ALL ; #";
    let params = ParamSet::new().with("disease", hostile);
    let query = engine().render(TemplateKind::TreatmentsForDisease, &params).unwrap();

    let body = literal_after(&query, "health:nomMaladie ");
    assert_eq!(unescape(body), hostile);
    assert!(!query.contains("DROP ALL ;\n"));
}

#[test]
fn test_specialty_is_a_filter_constant_not_a_class_name() {
    let params = ParamSet::new().with("specialty", "cardiologue> } ; <x");
    let query = engine().render(TemplateKind::PractitionersBySpecialty, &params).unwrap();
    assert!(query.contains("FILTER ((?specialty = \"cardiologue> } ; <x\"))"));
    assert!(query.contains("?practitioner rdf:type health:Medecin ."));
}

#[test]
fn test_escape_order() {
    assert_eq!(escape_literal(r#"a\"b"#), r#"a\\\"b"#);
    assert_eq!(escape_literal("l1\r\nl2"), "l1\\r\\nl2");
}

proptest! {
    #[test]
    fn prop_text_parameters_round_trip(name in "[a-zA-Zé \"\\\\\n\r{}.;#?<>]{1,40}") {
        prop_assume!(!name.trim().is_empty());
        let params = ParamSet::new().with("disease", name.as_str());
        let query = engine().render(TemplateKind::EcoEfficiency, &params).unwrap();

        let body = literal_after(&query, "health:nomMaladie ");
        prop_assert!(!body.contains('\n') && !body.contains('\r'));
        prop_assert_eq!(unescape(body), name);
    }
}

// ============================================================================
// 2. Validation
// ============================================================================

#[test]
fn test_numeric_parameters_reject_text() {
    for raw in ["abc", "", "NaN", "inf", "5; DROP"] {
        let params = ParamSet::new().numeric("max_score", raw);
        match engine().render(TemplateKind::EcoTreatments, &params) {
            Err(Error::ParameterValidation { parameter, .. }) => assert_eq!(parameter, "max_score"),
            other => panic!("{raw:?}: expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn test_missing_and_empty_text_rejected() {
    let e = engine();
    assert!(e.render(TemplateKind::PatientProfile, &ParamSet::new()).unwrap_err().is_validation());
    let blank = ParamSet::new().with("email", "   ");
    assert!(e.render(TemplateKind::PatientProfile, &blank).unwrap_err().is_validation());
}

#[test]
fn test_numeric_defaults_apply() {
    let e = engine();
    let q = e.render(TemplateKind::EcoPractitioners, &ParamSet::new()).unwrap();
    assert!(q.contains("FILTER ((?experience >= 5))"));
    assert!(q.contains("FILTER ((?carbon_score <= 5))"));

    let q = e
        .render(TemplateKind::EcoTreatments, &ParamSet::new().numeric("max_score", " 2.5 "))
        .unwrap();
    assert!(q.contains("FILTER ((?carbon_score <= 2.5))"));
}

// ============================================================================
// 3. Shape
// ============================================================================

#[test]
fn test_every_template_renders_with_prologue() {
    let params = ParamSet::new()
        .with("disease", "Diabète Type 2")
        .with("specialty", "generaliste")
        .with("email", "jean@example.org");
    for kind in TemplateKind::all() {
        let q = sparql::render(kind, &params, &StoreConfig::default().namespace().unwrap()).unwrap();
        assert!(q.starts_with("PREFIX rdf: <"), "{kind}");
        assert!(q.contains("PREFIX health: <http://example.org/health#>"), "{kind}");
        assert!(q.contains("SELECT "), "{kind}");
        assert!(q.contains("WHERE {"), "{kind}");
    }
}

#[test]
fn test_custom_namespace_is_used() {
    let config = StoreConfig::default().with_namespace("urn:eco:");
    let e = Engine::with_transport(config, MockTransport::new()).unwrap();
    let q = e.render(TemplateKind::ListAll(EntityClass::Disease), &ParamSet::new()).unwrap();
    assert!(q.contains("PREFIX health: <urn:eco:>"));
    assert!(q.contains("OPTIONAL {"));
}

#[test]
fn test_recommendation_has_top_k() {
    let params = ParamSet::new().with("disease", "Hypertension");
    let q = engine().render(TemplateKind::Recommendation, &params).unwrap();
    assert!(q.trim_end().ends_with("LIMIT 5"));
    assert!(q.contains("ORDER BY DESC(?ratio) ASC(?name)"));
}
