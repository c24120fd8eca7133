//! The query-gateway contract.
//!
//! [`ClinicalStore`] is the seam between the cohort engine and whatever
//! actually holds the clinical data. All date filters are inclusive
//! datetime ranges (callers widen calendar dates to
//! `[start 00:00:00, end 23:59:59]` via `ace_types::Period`), and every
//! query excludes voided records unless a filter explicitly includes them.
//!
//! Failures are [`StoreError`]; the engine never retries a gateway call,
//! it propagates the error to whoever invoked the metric.

use crate::records::{
    DrugObsProcessed, DrugOrderProcessed, Observation, Patient, ProgramEnrollment,
    RegimenChangeType, RegimenLine, Visit,
};
use ace_types::{ConceptCode, DateTimeRange, Gender, PatientId, ProgramUuid, VisitId};
use std::collections::HashSet;

/// Errors raised by a clinical store.
///
/// `Unavailable` is the catch-all for connectivity/backing-store failures;
/// `SnapshotRead` carries the cause of a fixture file that could not be
/// read at all (an unreadable file is an error, an undecodable one is
/// skipped with a warning).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("clinical data store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read snapshot file: {0}")]
    SnapshotRead(std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Demographics lookup filter.
#[derive(Debug, Clone, PartialEq)]
pub enum PatientFilter {
    All,
    ByGender(Gender),
    /// Patients with `dead == true` and a `death_date` inside the range.
    DiedWithin(DateTimeRange),
}

/// Filter over coded/numeric observations.
///
/// `concept` matches the observation's question; `value_coded_any` matches
/// its coded answer against any of the listed codes. Either may be omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFilter {
    pub concept: Option<ConceptCode>,
    pub value_coded_any: Vec<ConceptCode>,
    /// Exact match on the free-text answer (adherence levels are recorded
    /// as text like `>95%` in the source data).
    pub value_text: Option<String>,
    pub within: DateTimeRange,
    pub person: Option<PatientId>,
    pub include_voided: bool,
}

impl ObservationFilter {
    /// Observations whose coded answer is any of `codes`, within `range`.
    pub fn coded_answer(codes: impl Into<Vec<ConceptCode>>, within: DateTimeRange) -> Self {
        Self {
            concept: None,
            value_coded_any: codes.into(),
            value_text: None,
            within,
            person: None,
            include_voided: false,
        }
    }

    /// Observations answering `concept`, within `range`.
    pub fn question(concept: ConceptCode, within: DateTimeRange) -> Self {
        Self {
            concept: Some(concept),
            value_coded_any: Vec::new(),
            value_text: None,
            within,
            person: None,
            include_voided: false,
        }
    }

    pub fn for_person(mut self, person: PatientId) -> Self {
        self.person = Some(person);
        self
    }

    pub fn with_coded_answer(mut self, code: ConceptCode) -> Self {
        self.value_coded_any.push(code);
        self
    }

    pub fn with_text_answer(mut self, text: impl Into<String>) -> Self {
        self.value_text = Some(text.into());
        self
    }
}

/// Filter over materialized drug-order-processed records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrugOrderFilter {
    pub change_type: Option<RegimenChangeType>,
    /// Match any of the listed regimen lines; empty means all lines.
    pub lines: Vec<RegimenLine>,
    pub started_in: Option<DateTimeRange>,
    /// `Some(false)` restricts to current (non-discontinued) records.
    pub discontinued: Option<bool>,
    pub drug_regimen: Option<String>,
    pub dose_regimen: Option<String>,
}

impl DrugOrderFilter {
    pub fn change(change_type: RegimenChangeType, lines: impl Into<Vec<RegimenLine>>) -> Self {
        Self {
            change_type: Some(change_type),
            lines: lines.into(),
            ..Self::default()
        }
    }

    pub fn started_in(mut self, range: DateTimeRange) -> Self {
        self.started_in = Some(range);
        self
    }

    pub fn current_only(mut self) -> Self {
        self.discontinued = Some(false);
        self
    }
}

/// Read-mostly gateway to the clinical data store.
///
/// The two `save_*` operations are the engine's only writes: single-record
/// upserts into the processed caches. Concurrent upserts on the same key
/// are resolved by the backing store (last write wins in [`MemoryStore`]);
/// the engine does not coordinate them.
///
/// [`MemoryStore`]: crate::memory::MemoryStore
pub trait ClinicalStore {
    /// Enrollments in `program` with `date_enrolled` inside `enrolled_in`.
    fn find_program_enrollments(
        &self,
        program: ProgramUuid,
        enrolled_in: DateTimeRange,
    ) -> StoreResult<Vec<ProgramEnrollment>>;

    /// Enrollments in `program` with a non-null `date_completed` inside
    /// `completed_in`.
    fn find_program_enrollments_completed(
        &self,
        program: ProgramUuid,
        completed_in: DateTimeRange,
    ) -> StoreResult<Vec<ProgramEnrollment>>;

    /// Enrollments in `program` that are still active (`date_completed`
    /// null), regardless of when they began.
    fn find_active_program_enrollments(
        &self,
        program: ProgramUuid,
    ) -> StoreResult<Vec<ProgramEnrollment>>;

    fn find_observations(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>>;

    /// All visits for a patient, ascending by `start_datetime`.
    fn find_visits_by_patient(&self, patient: PatientId) -> StoreResult<Vec<Visit>>;

    /// Patients with a visit starting inside `range`.
    fn find_visited_patients(&self, range: DateTimeRange) -> StoreResult<HashSet<PatientId>>;

    fn find_drug_orders_processed_by_patient(
        &self,
        patient: PatientId,
    ) -> StoreResult<Vec<DrugOrderProcessed>>;

    /// The patient's most recent processed record by `created_date`, or
    /// `None` when the patient has no processed history.
    fn find_last_drug_order_processed_by_patient(
        &self,
        patient: PatientId,
    ) -> StoreResult<Option<DrugOrderProcessed>>;

    fn find_drug_orders_processed_by_visit(
        &self,
        visit: VisitId,
    ) -> StoreResult<Vec<DrugOrderProcessed>>;

    fn find_drug_orders_processed(
        &self,
        filter: &DrugOrderFilter,
    ) -> StoreResult<Vec<DrugOrderProcessed>>;

    fn find_patients(&self, filter: &PatientFilter) -> StoreResult<Vec<Patient>>;

    fn load_patient(&self, id: PatientId) -> StoreResult<Option<Patient>>;

    /// Upserts one drug-order-processed record, keyed by its id.
    fn save_drug_order_processed(&mut self, record: DrugOrderProcessed) -> StoreResult<()>;

    /// Upserts one drug-observation-processed record, keyed by its id.
    fn save_drug_obs_processed(&mut self, record: DrugObsProcessed) -> StoreResult<()>;
}
