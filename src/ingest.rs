//! Snapshot ingestion: load relational records into the triple store.
//!
//! ```text
//! Snapshot (serde) → triples per entity → INSERT DATA per entity
//!   → update endpoint, clear first, failures collected in IngestReport
//! ```
//!
//! Every entity becomes `health:<Kind>_<id>`. Subclass-typed entities carry
//! both their subclass and base class.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Namespace;
use crate::model::{Literal, LocalIri, Triple};
use crate::sparql::update;
use crate::transport::{StoreClient, Transport};
use crate::Result;

// ============================================================================
// Source records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: u64,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub sex: String,
    pub social_security_number: String,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub bmi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: u64,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub sex: String,
    pub licence_number: String,
    /// `generaliste`, `cardiologue`, `pneumologue`, ...
    pub specialty: String,
    pub years_experience: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disease {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub icd10: Option<String>,
    /// `chronique`, `aigue`, `infectieuse`, `cardiovasculaire`, `respiratoire`
    pub category: String,
    pub severity: String,
    pub contagious: bool,
    pub mortality_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub id: u64,
    /// kg CO2 equivalent
    pub carbon_score: f64,
    pub water_use: f64,
    pub waste: f64,
    pub recyclable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: u64,
    pub name: String,
    /// `medicamenteux`, `chirurgie`, `physiotherapie`, ...
    pub category: String,
    pub cost: f64,
    /// days
    pub duration: i64,
    /// percent
    pub efficacy: f64,
    pub disease_id: u64,
    #[serde(default)]
    pub impact_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub patient_id: u64,
    pub disease_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub practitioner_id: u64,
    pub patient_id: u64,
    pub treatment_id: u64,
}

/// Everything the relational side hands over for one load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub patients: Vec<Patient>,
    pub practitioners: Vec<Practitioner>,
    pub diseases: Vec<Disease>,
    pub impacts: Vec<Impact>,
    pub treatments: Vec<Treatment>,
    pub diagnoses: Vec<Diagnosis>,
    pub prescriptions: Vec<Prescription>,
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Subject (or `clear`) whose payload was rejected.
    pub entity: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub cleared: bool,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.cleared && self.failures.is_empty()
    }
}

// ============================================================================
// Triples
// ============================================================================

fn subject(kind: &str, id: u64) -> Result<LocalIri> {
    LocalIri::new(format!("{kind}_{id}"))
}

fn specialty_class(specialty: &str) -> &'static str {
    match specialty {
        "generaliste" => "Generaliste",
        "cardiologue" => "Cardiologue",
        "pneumologue" => "Pneumologue",
        _ => "Medecin",
    }
}

fn disease_class(category: &str) -> &'static str {
    match category {
        "chronique" => "MaladieChronique",
        "aigue" => "MaladieAigue",
        "infectieuse" => "MaladieInfectieuse",
        "cardiovasculaire" => "MaladieCardiovasculaire",
        "respiratoire" => "MaladieRespiratoire",
        _ => "Maladie",
    }
}

fn treatment_class(category: &str) -> &'static str {
    match category {
        "medicamenteux" => "TraitementMedicamenteux",
        "chirurgie" => "Chirurgie",
        "physiotherapie" => "Physiotherapie",
        "radiotherapie" => "Radiotherapie",
        "psychotherapie" => "Psychotherapie",
        _ => "Traitement",
    }
}

/// `rdf:type` for the subclass (if any) and the base class.
fn typed(s: &LocalIri, subclass: &str, base: &str) -> Result<Vec<Triple>> {
    let mut triples = Vec::with_capacity(2);
    if subclass != base {
        triples.push(Triple::typed(s, subclass)?);
    }
    triples.push(Triple::typed(s, base)?);
    Ok(triples)
}

pub fn patient_triples(p: &Patient) -> Result<Vec<Triple>> {
    let s = subject("Patient", p.id)?;
    let mut t = typed(&s, "Patient", "Patient")?;
    t.push(Triple::attribute(&s, "nom", Literal::string(&p.last_name))?);
    t.push(Triple::attribute(&s, "prenom", Literal::string(&p.first_name))?);
    t.push(Triple::attribute(&s, "email", Literal::string(&p.email))?);
    if let Some(d) = p.birth_date {
        t.push(Triple::attribute(&s, "dateNaissance", Literal::date(d))?);
    }
    t.push(Triple::attribute(&s, "sexe", Literal::string(&p.sex))?);
    t.push(Triple::attribute(&s, "numeroSecuriteSociale", Literal::string(&p.social_security_number))?);
    if let Some(g) = &p.blood_group {
        t.push(Triple::attribute(&s, "groupeSanguin", Literal::string(g))?);
    }
    if let Some(bmi) = p.bmi {
        t.push(Triple::attribute(&s, "IMC", Literal::decimal(bmi)?)?);
    }
    Ok(t)
}

pub fn practitioner_triples(p: &Practitioner) -> Result<Vec<Triple>> {
    let s = subject("Medecin", p.id)?;
    let mut t = typed(&s, specialty_class(&p.specialty), "Medecin")?;
    t.push(Triple::attribute(&s, "nom", Literal::string(&p.last_name))?);
    t.push(Triple::attribute(&s, "prenom", Literal::string(&p.first_name))?);
    t.push(Triple::attribute(&s, "email", Literal::string(&p.email))?);
    if let Some(d) = p.birth_date {
        t.push(Triple::attribute(&s, "dateNaissance", Literal::date(d))?);
    }
    t.push(Triple::attribute(&s, "sexe", Literal::string(&p.sex))?);
    t.push(Triple::attribute(&s, "numeroOrdre", Literal::string(&p.licence_number))?);
    t.push(Triple::attribute(&s, "specialite", Literal::string(&p.specialty))?);
    t.push(Triple::attribute(&s, "anneesExperience", Literal::integer(p.years_experience))?);
    Ok(t)
}

pub fn disease_triples(d: &Disease) -> Result<Vec<Triple>> {
    let s = subject("Maladie", d.id)?;
    let mut t = typed(&s, disease_class(&d.category), "Maladie")?;
    t.push(Triple::attribute(&s, "nomMaladie", Literal::string(&d.name))?);
    t.push(Triple::attribute(&s, "codeCIM10", Literal::string(d.icd10.as_deref().unwrap_or_default()))?);
    t.push(Triple::attribute(&s, "gravite", Literal::string(&d.severity))?);
    t.push(Triple::attribute(&s, "contagieuse", Literal::boolean(d.contagious))?);
    t.push(Triple::attribute(&s, "tauxMortalite", Literal::decimal(d.mortality_rate)?)?);
    Ok(t)
}

pub fn impact_triples(i: &Impact) -> Result<Vec<Triple>> {
    let s = subject("Impact", i.id)?;
    let mut t = typed(&s, "ImpactEnvironnemental", "ImpactEnvironnemental")?;
    t.push(Triple::attribute(&s, "scoreCarbone", Literal::decimal(i.carbon_score)?)?);
    t.push(Triple::attribute(&s, "consommationEau", Literal::decimal(i.water_use)?)?);
    t.push(Triple::attribute(&s, "dechets", Literal::decimal(i.waste)?)?);
    t.push(Triple::attribute(&s, "recyclable", Literal::boolean(i.recyclable))?);
    Ok(t)
}

pub fn treatment_triples(tr: &Treatment) -> Result<Vec<Triple>> {
    let s = subject("Traitement", tr.id)?;
    let mut t = typed(&s, treatment_class(&tr.category), "Traitement")?;
    t.push(Triple::attribute(&s, "nomTraitement", Literal::string(&tr.name))?);
    t.push(Triple::attribute(&s, "cout", Literal::decimal(tr.cost)?)?);
    t.push(Triple::attribute(&s, "duree", Literal::integer(tr.duration))?);
    t.push(Triple::attribute(&s, "efficacite", Literal::decimal(tr.efficacy)?)?);
    t.push(Triple::edge(&s, "traite", &subject("Maladie", tr.disease_id)?)?);
    if let Some(impact) = tr.impact_id {
        t.push(Triple::edge(&s, "aImpact", &subject("Impact", impact)?)?);
    }
    Ok(t)
}

pub fn diagnosis_triples(d: &Diagnosis) -> Result<Vec<Triple>> {
    let patient = subject("Patient", d.patient_id)?;
    Ok(vec![Triple::edge(&patient, "diagnostiquePour", &subject("Maladie", d.disease_id)?)?])
}

pub fn prescription_triples(p: &Prescription) -> Result<Vec<Triple>> {
    let treatment = subject("Traitement", p.treatment_id)?;
    Ok(vec![
        Triple::edge(&subject("Medecin", p.practitioner_id)?, "prescrit", &treatment)?,
        Triple::edge(&subject("Patient", p.patient_id)?, "recoit", &treatment)?,
    ])
}

impl Snapshot {
    /// One `(label, triples)` batch per entity, in dependency order. An
    /// entity whose triples cannot be built keeps its slot with the error.
    pub fn batches(&self) -> Vec<(String, Result<Vec<Triple>>)> {
        let mut out = Vec::new();
        for p in &self.patients {
            out.push((format!("Patient_{}", p.id), patient_triples(p)));
        }
        for p in &self.practitioners {
            out.push((format!("Medecin_{}", p.id), practitioner_triples(p)));
        }
        for d in &self.diseases {
            out.push((format!("Maladie_{}", d.id), disease_triples(d)));
        }
        for i in &self.impacts {
            out.push((format!("Impact_{}", i.id), impact_triples(i)));
        }
        for t in &self.treatments {
            out.push((format!("Traitement_{}", t.id), treatment_triples(t)));
        }
        for d in &self.diagnoses {
            out.push((format!("Patient_{} -> Maladie_{}", d.patient_id, d.disease_id), diagnosis_triples(d)));
        }
        for p in &self.prescriptions {
            out.push((
                format!("Medecin_{} -> Traitement_{}", p.practitioner_id, p.treatment_id),
                prescription_triples(p),
            ));
        }
        out
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Clear the store, then insert `snapshot` one entity at a time.
///
/// Rejected payloads are collected in the report; loading carries on with
/// the next entity.
pub async fn ingest<T: Transport>(
    client: &StoreClient<T>,
    snapshot: &Snapshot,
    ns: &Namespace,
) -> Result<IngestReport> {
    let batches = snapshot.batches();
    let mut report = IngestReport::default();

    match client.mutate(&update::clear_all(ns)).await {
        Ok(()) => report.cleared = true,
        Err(e) => report.failures.push(IngestFailure { entity: "clear".into(), error: e.to_string() }),
    }

    for (label, triples) in batches {
        report.attempted += 1;
        let triples = match triples {
            Ok(triples) => triples,
            Err(e) => {
                report.failures.push(IngestFailure { entity: label, error: e.to_string() });
                continue;
            }
        };
        match client.mutate(&update::insert_data(ns, &triples)).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => report.failures.push(IngestFailure { entity: label, error: e.to_string() }),
        }
    }

    if report.failures.is_empty() {
        info!(attempted = report.attempted, succeeded = report.succeeded, "snapshot ingested");
    } else {
        warn!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "snapshot ingested with failures"
        );
    }
    Ok(report)
}

/// Remove every fact about one entity.
pub async fn retract<T: Transport>(client: &StoreClient<T>, ns: &Namespace, entity: &LocalIri) -> Result<()> {
    client.mutate(&update::delete_subject(ns, entity)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Predicate, Term};

    fn treatment(id: u64, impact_id: Option<u64>) -> Treatment {
        Treatment {
            id,
            name: "Marche quotidienne".into(),
            category: "physiotherapie".into(),
            cost: 0.0,
            duration: 90,
            efficacy: 72.0,
            disease_id: 1,
            impact_id,
        }
    }

    #[test]
    fn test_subclass_and_base_class() {
        let t = treatment_triples(&treatment(3, Some(7))).unwrap();
        let types: Vec<&str> = t
            .iter()
            .filter(|tr| tr.predicate == Predicate::RdfType)
            .filter_map(|tr| match &tr.object {
                Term::Iri(iri) => Some(iri.as_str()),
                Term::Literal(_) => None,
            })
            .collect();
        assert_eq!(types, vec!["Physiotherapie", "Traitement"]);
        assert!(t.iter().any(|tr| tr.object == Term::Iri(LocalIri::new("Impact_7").unwrap())));
    }

    #[test]
    fn test_unknown_category_types_once() {
        let mut tr = treatment(3, None);
        tr.category = "autre".into();
        let t = treatment_triples(&tr).unwrap();
        assert_eq!(t.iter().filter(|tr| tr.predicate == Predicate::RdfType).count(), 1);
        assert!(!t.iter().any(|tr| matches!(&tr.predicate, Predicate::Local(p) if p.as_str() == "aImpact")));
    }

    #[test]
    fn test_prescription_links_both_sides() {
        let t = prescription_triples(&Prescription { practitioner_id: 2, patient_id: 5, treatment_id: 3 }).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].subject.as_str(), "Medecin_2");
        assert_eq!(t[1].subject.as_str(), "Patient_5");
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "impacts": [{"id": 1, "carbon_score": 0.8, "water_use": 0.0, "waste": 0.0, "recyclable": true}],
            "treatments": [{"id": 1, "name": "Marche", "category": "physiotherapie", "cost": 0,
                            "duration": 90, "efficacy": 72, "disease_id": 1, "impact_id": 1}]
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let labels: Vec<String> = snapshot.batches().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Impact_1", "Traitement_1"]);
    }

    #[test]
    fn test_non_finite_measure_fails_its_batch_only() {
        let snapshot = Snapshot {
            impacts: vec![Impact { id: 1, carbon_score: f64::NAN, water_use: 0.0, waste: 0.0, recyclable: true }],
            treatments: vec![treatment(1, Some(1))],
            ..Default::default()
        };
        let batches = snapshot.batches();
        assert!(matches!(batches[0].1, Err(crate::Error::TypeError { .. })));
        assert!(batches[1].1.is_ok());
    }
}
