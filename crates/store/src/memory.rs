//! Hash-map reference implementation of the query gateway.
//!
//! `MemoryStore` backs tests and fixtures, and doubles as the executable
//! definition of the gateway's filter semantics (inclusive date ranges,
//! voided exclusion, last-write-wins upserts).

use crate::gateway::{
    ClinicalStore, DrugOrderFilter, ObservationFilter, PatientFilter, StoreResult,
};
use crate::records::{
    DrugObsProcessed, DrugOrderProcessed, Observation, Patient, ProgramEnrollment, Visit,
};
use ace_types::{DateTimeRange, DrugObsProcessedId, DrugOrderProcessedId, PatientId, ProgramUuid, VisitId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// In-memory clinical store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    patients: HashMap<PatientId, Patient>,
    enrollments: Vec<ProgramEnrollment>,
    observations: Vec<Observation>,
    visits: Vec<Visit>,
    drug_orders: BTreeMap<DrugOrderProcessedId, DrugOrderProcessed>,
    drug_obs: BTreeMap<DrugObsProcessedId, DrugObsProcessed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_patient(&mut self, patient: Patient) {
        self.patients.insert(patient.id, patient);
    }

    pub fn insert_enrollment(&mut self, enrollment: ProgramEnrollment) {
        self.enrollments.push(enrollment);
    }

    pub fn insert_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn insert_visit(&mut self, visit: Visit) {
        self.visits.push(visit);
    }

    pub fn insert_drug_order_processed(&mut self, record: DrugOrderProcessed) {
        self.drug_orders.insert(record.id, record);
    }

    pub fn insert_drug_obs_processed(&mut self, record: DrugObsProcessed) {
        self.drug_obs.insert(record.id, record);
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn drug_order_processed(&self, id: DrugOrderProcessedId) -> Option<&DrugOrderProcessed> {
        self.drug_orders.get(&id)
    }

    pub fn drug_obs_processed(&self, id: DrugObsProcessedId) -> Option<&DrugObsProcessed> {
        self.drug_obs.get(&id)
    }

    fn matches_observation(filter: &ObservationFilter, obs: &Observation) -> bool {
        if !filter.include_voided && obs.voided {
            return false;
        }
        if !filter.within.contains(obs.obs_datetime) {
            return false;
        }
        if let Some(person) = filter.person {
            if obs.person != person {
                return false;
            }
        }
        if let Some(concept) = &filter.concept {
            if &obs.concept != concept {
                return false;
            }
        }
        if !filter.value_coded_any.is_empty() {
            match &obs.value_coded {
                Some(coded) if filter.value_coded_any.contains(coded) => {}
                _ => return false,
            }
        }
        if let Some(text) = &filter.value_text {
            match &obs.value_text {
                Some(actual) if actual == text => {}
                _ => return false,
            }
        }
        true
    }

    fn matches_drug_order(filter: &DrugOrderFilter, record: &DrugOrderProcessed) -> bool {
        if let Some(change_type) = filter.change_type {
            if record.change_type != change_type {
                return false;
            }
        }
        if !filter.lines.is_empty() && !filter.lines.contains(&record.regimen_line) {
            return false;
        }
        if let Some(range) = filter.started_in {
            if !range.contains(record.start_date) {
                return false;
            }
        }
        if let Some(discontinued) = filter.discontinued {
            if record.is_discontinued() != discontinued {
                return false;
            }
        }
        if let Some(drug_regimen) = &filter.drug_regimen {
            if &record.drug_regimen != drug_regimen {
                return false;
            }
        }
        if let Some(dose_regimen) = &filter.dose_regimen {
            if &record.dose_regimen != dose_regimen {
                return false;
            }
        }
        true
    }
}

impl ClinicalStore for MemoryStore {
    fn find_program_enrollments(
        &self,
        program: ProgramUuid,
        enrolled_in: DateTimeRange,
    ) -> StoreResult<Vec<ProgramEnrollment>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| e.program == program && enrolled_in.contains(e.date_enrolled))
            .cloned()
            .collect())
    }

    fn find_program_enrollments_completed(
        &self,
        program: ProgramUuid,
        completed_in: DateTimeRange,
    ) -> StoreResult<Vec<ProgramEnrollment>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| {
                e.program == program
                    && e.date_completed
                        .map(|completed| completed_in.contains(completed))
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn find_active_program_enrollments(
        &self,
        program: ProgramUuid,
    ) -> StoreResult<Vec<ProgramEnrollment>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| e.program == program && e.is_active())
            .cloned()
            .collect())
    }

    fn find_observations(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>> {
        Ok(self
            .observations
            .iter()
            .filter(|obs| Self::matches_observation(filter, obs))
            .cloned()
            .collect())
    }

    fn find_visits_by_patient(&self, patient: PatientId) -> StoreResult<Vec<Visit>> {
        let mut visits: Vec<Visit> = self
            .visits
            .iter()
            .filter(|v| v.patient == patient)
            .cloned()
            .collect();
        visits.sort_by_key(|v| v.start_datetime);
        Ok(visits)
    }

    fn find_visited_patients(&self, range: DateTimeRange) -> StoreResult<HashSet<PatientId>> {
        Ok(self
            .visits
            .iter()
            .filter(|v| range.contains(v.start_datetime))
            .map(|v| v.patient)
            .collect())
    }

    fn find_drug_orders_processed_by_patient(
        &self,
        patient: PatientId,
    ) -> StoreResult<Vec<DrugOrderProcessed>> {
        Ok(self
            .drug_orders
            .values()
            .filter(|d| d.patient == patient)
            .cloned()
            .collect())
    }

    fn find_last_drug_order_processed_by_patient(
        &self,
        patient: PatientId,
    ) -> StoreResult<Option<DrugOrderProcessed>> {
        Ok(self
            .drug_orders
            .values()
            .filter(|d| d.patient == patient)
            .max_by_key(|d| d.created_date)
            .cloned())
    }

    fn find_drug_orders_processed_by_visit(
        &self,
        visit: VisitId,
    ) -> StoreResult<Vec<DrugOrderProcessed>> {
        Ok(self
            .drug_orders
            .values()
            .filter(|d| d.visit == Some(visit))
            .cloned()
            .collect())
    }

    fn find_drug_orders_processed(
        &self,
        filter: &DrugOrderFilter,
    ) -> StoreResult<Vec<DrugOrderProcessed>> {
        Ok(self
            .drug_orders
            .values()
            .filter(|d| Self::matches_drug_order(filter, d))
            .cloned()
            .collect())
    }

    fn find_patients(&self, filter: &PatientFilter) -> StoreResult<Vec<Patient>> {
        Ok(self
            .patients
            .values()
            .filter(|p| match filter {
                PatientFilter::All => true,
                PatientFilter::ByGender(gender) => p.gender == *gender,
                PatientFilter::DiedWithin(range) => {
                    p.dead
                        && p.death_date
                            .map(|died| range.contains(died))
                            .unwrap_or(false)
                }
            })
            .cloned()
            .collect())
    }

    fn load_patient(&self, id: PatientId) -> StoreResult<Option<Patient>> {
        Ok(self.patients.get(&id).cloned())
    }

    fn save_drug_order_processed(&mut self, record: DrugOrderProcessed) -> StoreResult<()> {
        self.drug_orders.insert(record.id, record);
        Ok(())
    }

    fn save_drug_obs_processed(&mut self, record: DrugObsProcessed) -> StoreResult<()> {
        self.drug_obs.insert(record.id, record);
        Ok(())
    }
}
