//! # ACE Store
//!
//! The clinical data model and query-gateway contract for the ACE cohort
//! analytics workspace.
//!
//! This crate contains:
//! - Record types mirroring the host platform's clinical model (patients,
//!   program enrollments, observations, visits, processed drug orders)
//! - The [`ClinicalStore`] trait: the read-mostly query gateway the engine
//!   computes against, plus the two processed-cache upserts
//! - [`MemoryStore`], a hash-map reference implementation
//! - JSON snapshot loading for fixtures and tests
//!
//! **No cohort logic**: classification, set algebra, and metrics belong in
//! `ace-engine`.

pub mod gateway;
pub mod memory;
pub mod records;
pub mod snapshot;

pub use gateway::{
    ClinicalStore, DrugOrderFilter, ObservationFilter, PatientFilter,
    StoreError, StoreResult,
};
pub use memory::MemoryStore;
pub use records::{
    DrugObsProcessed, DrugOrderProcessed, Observation, Patient, ProgramEnrollment,
    RegimenChangeType, RegimenLine, Visit,
};
