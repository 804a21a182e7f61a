//! SPARQL Update payloads for the ingestion path.

use std::fmt::Write;

use super::render::{prologue, quote};
use crate::config::Namespace;
use crate::model::{Datatype, Literal, LocalIri, Predicate, Term, Triple};

/// `INSERT DATA { ... }` for a batch of triples, grouped by subject.
pub fn insert_data(ns: &Namespace, triples: &[Triple]) -> String {
    let mut out = String::new();
    prologue(&mut out, ns);
    out.push_str("\nINSERT DATA {\n");
    for triple in triples {
        let _ = writeln!(
            out,
            "    health:{} {} {} .",
            triple.subject.as_str(),
            predicate(&triple.predicate),
            term(&triple.object)
        );
    }
    out.push_str("}\n");
    out
}

/// Remove every fact from the default graph.
pub fn clear_all(ns: &Namespace) -> String {
    let mut out = String::new();
    prologue(&mut out, ns);
    out.push_str("\nDELETE WHERE { ?s ?p ?o }\n");
    out
}

/// Remove every fact about one subject.
pub fn delete_subject(ns: &Namespace, subject: &LocalIri) -> String {
    let mut out = String::new();
    prologue(&mut out, ns);
    let _ = writeln!(out, "\nDELETE WHERE {{ health:{} ?p ?o }}", subject.as_str());
    out
}

fn predicate(p: &Predicate) -> String {
    match p {
        Predicate::RdfType => "rdf:type".to_string(),
        Predicate::Local(iri) => format!("health:{}", iri.as_str()),
    }
}

fn term(t: &Term) -> String {
    match t {
        Term::Iri(iri) => format!("health:{}", iri.as_str()),
        Term::Literal(lit) => literal(lit),
    }
}

fn literal(lit: &Literal) -> String {
    match lit.datatype {
        Datatype::String => quote(&lit.lexical),
        // bare tokens; lexical forms come from typed constructors
        Datatype::Integer | Datatype::Boolean => lit.lexical.clone(),
        Datatype::Decimal => format!("{}^^xsd:decimal", quote(&lit.lexical)),
        Datatype::Date => format!("{}^^xsd:date", quote(&lit.lexical)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ns() -> Namespace {
        Namespace::new("http://example.org/health#").unwrap()
    }

    #[test]
    fn test_insert_data_literals() {
        let s = LocalIri::new("Traitement_1").unwrap();
        let triples = vec![
            Triple::typed(&s, "Traitement").unwrap(),
            Triple::attribute(&s, "nomTraitement", Literal::string("Régime \"DASH\"")).unwrap(),
            Triple::attribute(&s, "cout", Literal::decimal(12.5).unwrap()).unwrap(),
            Triple::attribute(&s, "duree", Literal::integer(30)).unwrap(),
            Triple::attribute(&s, "recyclable", Literal::boolean(true)).unwrap(),
            Triple::attribute(
                &s,
                "dateDebut",
                Literal::date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            )
            .unwrap(),
            Triple::edge(&s, "traite", &LocalIri::new("Maladie_2").unwrap()).unwrap(),
        ];
        let payload = insert_data(&ns(), &triples);
        assert!(payload.contains("PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>"));
        assert!(payload.contains("INSERT DATA {\n"));
        assert!(payload.contains("    health:Traitement_1 rdf:type health:Traitement .\n"));
        assert!(payload.contains(r#"health:Traitement_1 health:nomTraitement "Régime \"DASH\"" ."#));
        assert!(payload.contains(r#"health:cout "12.5"^^xsd:decimal ."#));
        assert!(payload.contains("health:duree 30 ."));
        assert!(payload.contains("health:recyclable true ."));
        assert!(payload.contains(r#"health:dateDebut "2024-03-01"^^xsd:date ."#));
        assert!(payload.contains("health:traite health:Maladie_2 ."));
    }

    #[test]
    fn test_clear_and_delete_subject() {
        assert!(clear_all(&ns()).ends_with("DELETE WHERE { ?s ?p ?o }\n"));
        let d = delete_subject(&ns(), &LocalIri::new("Patient_9").unwrap());
        assert!(d.contains("DELETE WHERE { health:Patient_9 ?p ?o }"));
    }
}
