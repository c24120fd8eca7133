//! Engine errors and reviewable classification flags.

use ace_store::StoreError;
use ace_types::{PatientId, PeriodError, ProgramUuid};

/// Errors a cohort or metric computation can fail with.
///
/// A failed metric is surfaced as an error, never as a silently wrong
/// number: a malformed period or an unreachable store aborts that one
/// computation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("clinical store failure: {0}")]
    Store(#[from] StoreError),
    #[error("invalid reporting period: {0}")]
    Period(#[from] PeriodError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A data-quality condition noticed during classification.
///
/// These do not abort a computation. They are collected on the report
/// context (and logged) so a reporting page can show them for review
/// instead of crashing or silently mis-counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationFlag {
    /// A patient held more than one concurrently-active enrollment in the
    /// same program; the most recent one was used.
    MultipleActiveEnrollments {
        patient: PatientId,
        program: ProgramUuid,
        count: usize,
    },
    /// The current-regimen-state lookup came back empty while the patient
    /// had matching in-period regimen events; the patient was skipped by
    /// the exclusion check.
    MissingRegimenState { patient: PatientId },
}
