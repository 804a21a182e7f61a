//! # Data Model
//!
//! Plain data shared by every layer: typed values and records coming out of
//! the store, triples going into it, and typed views for callers.
//!
//! Pure data. Nothing in here does I/O.

pub mod value;
pub mod record;
pub mod triple;
pub mod views;

pub use value::Value;
pub use record::{Record, FromValue};
pub use triple::{Datatype, Literal, LocalIri, Predicate, Term, Triple};
pub use views::{
    FromRecord, PatientSummary, PractitionerSummary, TreatmentOption, EcoTreatment,
    ProfileEntry, RankedTreatment, TreatmentPair, EcoPractitioner,
};
