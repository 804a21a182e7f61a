//! Typed views over template records.
//!
//! Each view reads the fields its template projects. Optional-clause fields
//! are `Option`s; everything else is required and a mismatch is a
//! `TypeError`.

use serde::{Deserialize, Serialize};

use super::Record;
use crate::Result;

/// Convert a whole record into a typed view.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> Result<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> Result<Self> {
        Ok(record.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub iri: String,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub email: Option<String>,
}

impl FromRecord for PatientSummary {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            iri: r.get("patient")?,
            last_name: r.get_opt("last_name")?,
            first_name: r.get_opt("first_name")?,
            email: r.get_opt("email")?,
        })
    }
}

/// Row of `PractitionersBySpecialty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerSummary {
    pub iri: String,
    pub last_name: String,
    pub first_name: String,
    pub specialty: String,
    pub experience: Option<i64>,
}

impl FromRecord for PractitionerSummary {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            iri: r.get("practitioner")?,
            last_name: r.get("last_name")?,
            first_name: r.get("first_name")?,
            specialty: r.get("specialty")?,
            experience: r.get_opt("experience")?,
        })
    }
}

/// Row of `TreatmentsForDisease`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentOption {
    pub iri: String,
    pub name: String,
    pub cost: Option<f64>,
    pub efficacy: Option<f64>,
    pub carbon_score: Option<f64>,
}

impl FromRecord for TreatmentOption {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            iri: r.get("treatment")?,
            name: r.get("name")?,
            cost: r.get_opt("cost")?,
            efficacy: r.get_opt("efficacy")?,
            carbon_score: r.get_opt("carbon_score")?,
        })
    }
}

/// Row of `EcoTreatments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcoTreatment {
    pub iri: String,
    pub name: String,
    pub carbon_score: f64,
    pub efficacy: f64,
    pub water_use: Option<f64>,
    pub recyclable: Option<bool>,
}

impl FromRecord for EcoTreatment {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            iri: r.get("treatment")?,
            name: r.get("name")?,
            carbon_score: r.get("carbon_score")?,
            efficacy: r.get("efficacy")?,
            water_use: r.get_opt("water_use")?,
            recyclable: r.get_opt("recyclable")?,
        })
    }
}

/// Row of `PatientProfile`: one diagnosis × treatment combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub patient: String,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub disease: Option<String>,
    pub disease_name: Option<String>,
    pub treatment: Option<String>,
    pub treatment_name: Option<String>,
    pub practitioner: Option<String>,
}

impl FromRecord for ProfileEntry {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            patient: r.get("patient")?,
            last_name: r.get_opt("last_name")?,
            first_name: r.get_opt("first_name")?,
            disease: r.get_opt("disease")?,
            disease_name: r.get_opt("disease_name")?,
            treatment: r.get_opt("treatment")?,
            treatment_name: r.get_opt("treatment_name")?,
            practitioner: r.get_opt("practitioner")?,
        })
    }
}

/// Row of `EcoEfficiency` and `Recommendation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTreatment {
    pub iri: String,
    pub name: String,
    pub carbon_score: f64,
    pub efficacy: f64,
    pub cost: f64,
    /// efficacy / carbon_score
    pub ratio: f64,
}

impl FromRecord for RankedTreatment {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            iri: r.get("treatment")?,
            name: r.get("name")?,
            carbon_score: r.get("carbon_score")?,
            efficacy: r.get("efficacy")?,
            cost: r.get("cost")?,
            ratio: r.get("ratio")?,
        })
    }
}

/// Row of `TreatmentAlternatives`. `score1 > score2` always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPair {
    pub disease_name: String,
    pub name1: String,
    pub score1: f64,
    pub efficacy1: f64,
    pub name2: String,
    pub score2: f64,
    pub efficacy2: f64,
    pub score_diff: f64,
    pub efficacy_diff: f64,
}

impl FromRecord for TreatmentPair {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            disease_name: r.get("disease_name")?,
            name1: r.get("name1")?,
            score1: r.get("score1")?,
            efficacy1: r.get("efficacy1")?,
            name2: r.get("name2")?,
            score2: r.get("score2")?,
            efficacy2: r.get("efficacy2")?,
            score_diff: r.get("score_diff")?,
            efficacy_diff: r.get("efficacy_diff")?,
        })
    }
}

/// Row of `EcoPractitioners`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcoPractitioner {
    pub iri: String,
    pub last_name: String,
    pub first_name: String,
    pub specialty: String,
    pub experience: i64,
    pub eco_treatment_count: i64,
    pub avg_score: Option<f64>,
}

impl FromRecord for EcoPractitioner {
    fn from_record(r: &Record) -> Result<Self> {
        Ok(Self {
            iri: r.get("practitioner")?,
            last_name: r.get("last_name")?,
            first_name: r.get("first_name")?,
            specialty: r.get("specialty")?,
            experience: r.get("experience")?,
            eco_treatment_count: r.get("eco_treatment_count")?,
            avg_score: r.get_opt("avg_score")?,
        })
    }
}
