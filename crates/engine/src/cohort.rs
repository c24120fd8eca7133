//! Cohort set builder.
//!
//! Each operation returns a set of patient identifiers for one exit or
//! outcome category within the context's reporting period. The recurring
//! five-way exit union (stopped, died, lost to follow-up, transferred out,
//! HIV-stopped) is memoized on the [`ReportContext`] so the many cohorts
//! that subtract it share one computation.

use crate::demographics;
use crate::error::{ClassificationFlag, EngineResult};
use crate::report::ReportContext;
use ace_store::{ClinicalStore, Observation, ObservationFilter};
use ace_types::{ConceptCode, Gender, PatientId, ProgramUuid};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub(crate) fn minus(base: HashSet<PatientId>, remove: &HashSet<PatientId>) -> HashSet<PatientId> {
    base.into_iter().filter(|p| !remove.contains(p)).collect()
}

impl<'a, S: ClinicalStore> ReportContext<'a, S> {
    /// Patients enrolled in `program` during the period.
    pub fn enrolled_in_program(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        let enrollments = self
            .store()
            .find_program_enrollments(program, self.period().datetime_range())?;
        Ok(enrollments.into_iter().map(|e| e.patient).collect())
    }

    /// Patients with a transfer-in observation during the period.
    pub fn transferred_in(&self) -> EngineResult<HashSet<PatientId>> {
        let codes: Vec<ConceptCode> = self.config().outcomes().transfer_in.to_vec();
        self.patients_with_coded_answer(codes)
    }

    /// Patients with a transferred-out observation during the period.
    pub fn transferred_out(&self) -> EngineResult<HashSet<PatientId>> {
        let code = self.config().outcomes().transferred_out.clone();
        self.patients_with_coded_answer(vec![code])
    }

    /// Patients with a lost-to-follow-up observation during the period.
    pub fn lost_to_follow_up(&self) -> EngineResult<HashSet<PatientId>> {
        let code = self.config().outcomes().lost_to_follow_up.clone();
        self.patients_with_coded_answer(vec![code])
    }

    /// Patients whose `program` enrollment was completed during the period
    /// and whose completion is attributed to stopping treatment.
    ///
    /// A completion preceded by a qualifying outcome observation (died,
    /// lost to follow-up, transferred out) is excluded: that outcome
    /// already accounts for the completion, so the patient belongs to the
    /// outcome's category, not to "stopped".
    pub fn art_stopped(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        let completed = self
            .store()
            .find_program_enrollments_completed(program, self.period().datetime_range())?;

        let mut stopped = HashSet::new();
        for enrollment in completed {
            let Some(date_completed) = enrollment.date_completed else {
                continue;
            };
            match self.last_outcome_observation(enrollment.patient)? {
                Some(outcome) if outcome.obs_datetime < date_completed => {
                    // Explained by the earlier outcome event.
                }
                _ => {
                    stopped.insert(enrollment.patient);
                }
            }
        }
        Ok(stopped)
    }

    /// Patients still formally active in `program` who died during the
    /// period.
    pub fn art_died(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        let active = self.store().find_active_program_enrollments(program)?;

        let mut active_counts: HashMap<PatientId, usize> = HashMap::new();
        for enrollment in &active {
            *active_counts.entry(enrollment.patient).or_insert(0) += 1;
        }
        for (patient, count) in &active_counts {
            if *count > 1 {
                tracing::warn!(
                    %patient, %program, count = *count,
                    "patient has multiple concurrently-active enrollments"
                );
                self.push_flag(ClassificationFlag::MultipleActiveEnrollments {
                    patient: *patient,
                    program,
                    count: *count,
                });
            }
        }

        let died = demographics::died_patient_ids(self.store(), self.period().datetime_range())?;
        Ok(active_counts
            .into_keys()
            .filter(|p| died.contains(p))
            .collect())
    }

    /// [`art_stopped`](Self::art_stopped) against the fixed HIV program:
    /// completions attributed to stopping, with the same outcome-precedence
    /// exclusion.
    pub fn hiv_stopped(&self) -> EngineResult<HashSet<PatientId>> {
        self.art_stopped(self.config().hiv_program())
    }

    /// The period's ART enrollments minus patients transferred out.
    pub fn total_cohort(&self) -> EngineResult<HashSet<PatientId>> {
        let enrolled = self.enrolled_in_program(self.config().art_program())?;
        let transferred_out = self.transferred_out()?;
        Ok(minus(enrolled, &transferred_out))
    }

    /// The five-way exit union for `program`, memoized per context.
    pub fn exited_patients(&self, program: ProgramUuid) -> EngineResult<Rc<HashSet<PatientId>>> {
        self.exited_cached(program, || {
            let mut exited = self.art_stopped(program)?;
            exited.extend(self.art_died(program)?);
            exited.extend(self.lost_to_follow_up()?);
            exited.extend(self.transferred_out()?);
            exited.extend(self.hiv_stopped()?);
            Ok(exited)
        })
    }

    /// The total cohort minus every exit category.
    pub fn alive_and_on_art(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        let total = self.total_cohort()?;
        let exited = self.exited_patients(program)?;
        Ok(minus(total, &exited))
    }

    /// The surviving cohort restricted to one gender.
    pub fn cohort_by_gender(&self, gender: Gender) -> EngineResult<HashSet<PatientId>> {
        let base = self.alive_and_on_art(self.config().art_program())?;
        let matching = demographics::patient_ids_by_gender(self.store(), gender)?;
        Ok(base.into_iter().filter(|p| matching.contains(p)).collect())
    }

    /// The surviving cohort restricted to ages `min..=max` (in completed
    /// years on the period's end date).
    pub fn cohort_by_age(&self, min: u32, max: u32) -> EngineResult<HashSet<PatientId>> {
        let base = self.alive_and_on_art(self.config().art_program())?;
        let matching =
            demographics::patient_ids_in_age_range(self.store(), min, max, self.period().end())?;
        Ok(base.into_iter().filter(|p| matching.contains(p)).collect())
    }

    fn patients_with_coded_answer(
        &self,
        codes: Vec<ConceptCode>,
    ) -> EngineResult<HashSet<PatientId>> {
        let filter = ObservationFilter::coded_answer(codes, self.period().datetime_range());
        let observations = self.store().find_observations(&filter)?;
        Ok(observations.into_iter().map(|o| o.person).collect())
    }

    /// The patient's latest qualifying outcome observation in the period,
    /// if any (died, lost to follow-up, or transferred out).
    fn last_outcome_observation(&self, patient: PatientId) -> EngineResult<Option<Observation>> {
        let filter = ObservationFilter::coded_answer(
            self.config().outcomes().terminal(),
            self.period().datetime_range(),
        )
        .for_person(patient);
        let observations = self.store().find_observations(&filter)?;
        Ok(observations.into_iter().max_by_key(|o| o.obs_datetime))
    }
}
