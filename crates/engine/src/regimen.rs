//! Regimen lineage classification.
//!
//! The four tier sets are mutually adjusted: a patient who has progressed
//! to a later tier is excluded from the earlier one. The exclusion checks
//! consult the patient's *globally* most recent processed record — not one
//! scoped to the reporting period — so a later, out-of-period event removes
//! a patient from an in-period tier. That is deliberate fidelity to the
//! deployed behaviour; see the tests pinning it.

use crate::cohort::minus;
use crate::error::{ClassificationFlag, EngineResult};
use crate::report::ReportContext;
use ace_store::{ClinicalStore, DrugOrderFilter, DrugOrderProcessed, RegimenChangeType, RegimenLine};
use ace_types::{PatientId, ProgramUuid};
use std::collections::{HashMap, HashSet};

impl<'a, S: ClinicalStore> ReportContext<'a, S> {
    /// Patients still on the regimen they originally started: the earliest
    /// in-period processed record is a first-line (or FDC/child) `Start`,
    /// and no substitution or switch tier claims them.
    pub fn original_first_line(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        let range = self.period().datetime_range();
        let in_period = self
            .store()
            .find_drug_orders_processed(&DrugOrderFilter::default().started_in(range))?;

        let mut earliest: HashMap<PatientId, &DrugOrderProcessed> = HashMap::new();
        for record in &in_period {
            earliest
                .entry(record.patient)
                .and_modify(|current| {
                    if (record.start_date, record.created_date)
                        < (current.start_date, current.created_date)
                    {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        let started: Vec<PatientId> = earliest
            .into_iter()
            .filter(|(_, record)| {
                record.change_type == RegimenChangeType::Start
                    && matches!(
                        record.regimen_line,
                        RegimenLine::FirstLine
                            | RegimenLine::FixedDoseCombination
                            | RegimenLine::ChildArv
                    )
            })
            .map(|(patient, _)| patient)
            .collect();

        // A patient who has since substituted or switched is no longer "on
        // original". "Since" is global: the current-state lookup is not
        // scoped to the period, so a later out-of-period event removes the
        // patient from this period's set.
        let mut original = HashSet::new();
        for patient in started {
            match self.store().find_last_drug_order_processed_by_patient(patient)? {
                Some(current)
                    if matches!(
                        current.change_type,
                        RegimenChangeType::Substitute | RegimenChangeType::Switch
                    ) => {}
                Some(_) => {
                    original.insert(patient);
                }
                None => {
                    tracing::warn!(
                        %patient,
                        "no current regimen state for patient with in-period regimen events"
                    );
                    self.push_flag(ClassificationFlag::MissingRegimenState { patient });
                }
            }
        }

        let mut progressed = self.alternate_first_line(program)?;
        progressed.extend(self.second_line(program)?);

        let exited = self.exited_patients(program)?;
        Ok(minus(minus(original, &progressed), &exited))
    }

    /// Patients on a substituted first-line regimen.
    pub fn alternate_first_line(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        self.lineage_tier(
            program,
            RegimenChangeType::Substitute,
            vec![RegimenLine::FirstLine, RegimenLine::FixedDoseCombination],
            RegimenChangeType::Switch,
        )
    }

    /// Patients switched to a second-line regimen.
    pub fn second_line(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        self.lineage_tier(
            program,
            RegimenChangeType::Switch,
            vec![RegimenLine::SecondLine, RegimenLine::FixedDoseCombination],
            RegimenChangeType::Substitute,
        )
    }

    /// Patients switched to a third-line regimen.
    pub fn third_line(&self, program: ProgramUuid) -> EngineResult<HashSet<PatientId>> {
        self.lineage_tier(
            program,
            RegimenChangeType::Switch,
            vec![RegimenLine::ThirdLine],
            RegimenChangeType::Substitute,
        )
    }

    /// Shared tier computation: in-period events of `change_type` on the
    /// given lines, minus patients whose current state is
    /// `excluded_current`, minus the exit union.
    fn lineage_tier(
        &self,
        program: ProgramUuid,
        change_type: RegimenChangeType,
        lines: Vec<RegimenLine>,
        excluded_current: RegimenChangeType,
    ) -> EngineResult<HashSet<PatientId>> {
        let filter = DrugOrderFilter::change(change_type, lines)
            .started_in(self.period().datetime_range());
        let records = self.store().find_drug_orders_processed(&filter)?;

        let mut tier = HashSet::new();
        for record in records {
            match self
                .store()
                .find_last_drug_order_processed_by_patient(record.patient)?
            {
                Some(current) if current.change_type == excluded_current => {
                    // Already progressed past (or reverted from) this tier.
                }
                Some(_) => {
                    tier.insert(record.patient);
                }
                None => {
                    tracing::warn!(
                        patient = %record.patient,
                        "no current regimen state for patient with in-period regimen events"
                    );
                    self.push_flag(ClassificationFlag::MissingRegimenState {
                        patient: record.patient,
                    });
                }
            }
        }

        let exited = self.exited_patients(program)?;
        Ok(minus(tier, &exited))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportingConfig;
    use crate::testutil::{art_program, drug_order, dt, enrollment, observation, patient, period_jan_2020};
    use ace_store::{
        gateway::{ObservationFilter, PatientFilter, StoreResult},
        DrugObsProcessed, MemoryStore, Observation, Patient, ProgramEnrollment, Visit,
    };
    use ace_types::{DateTimeRange, Period, VisitId};

    fn context<'a>(
        store: &'a MemoryStore,
        config: &'a ReportingConfig,
        period: Period,
    ) -> ReportContext<'a, MemoryStore> {
        ReportContext::new(store, config, period, dt("2020-06-01 12:00:00"))
    }

    #[test]
    fn test_original_first_line_counts_untouched_starters() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            "2020-01-05 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        assert!(ctx
            .original_first_line(art_program())
            .expect("original first line")
            .contains(&PatientId(1)));
    }

    #[test]
    fn test_switch_after_period_still_excludes_from_original_first_line() {
        // Scenario: Start/FirstLine in January, Switch/SecondLine in March.
        // The March switch is outside the reporting window, but the
        // exclusion consults the patient's globally latest record, so the
        // patient is removed from January's "original first line" set.
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            "2020-01-01 09:00:00",
        ));
        store.insert_drug_order_processed(drug_order(
            2,
            1,
            RegimenChangeType::Switch,
            RegimenLine::SecondLine,
            "2020-03-01 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        let original = ctx
            .original_first_line(art_program())
            .expect("original first line");
        assert!(
            !original.contains(&PatientId(1)),
            "global lookahead removes the patient despite the out-of-period switch"
        );
    }

    #[test]
    fn test_alternate_first_line_excludes_patients_whose_current_state_is_switch() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        // Substituted in January and stayed there.
        store.insert_patient(patient(1, "F", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Substitute,
            RegimenLine::FirstLine,
            "2020-01-10 09:00:00",
        ));
        // Substituted in January, later switched.
        store.insert_patient(patient(2, "F", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            2,
            2,
            RegimenChangeType::Substitute,
            RegimenLine::FirstLine,
            "2020-01-12 09:00:00",
        ));
        store.insert_drug_order_processed(drug_order(
            3,
            2,
            RegimenChangeType::Switch,
            RegimenLine::SecondLine,
            "2020-02-20 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        let alternate = ctx
            .alternate_first_line(art_program())
            .expect("alternate first line");
        assert!(alternate.contains(&PatientId(1)));
        assert!(!alternate.contains(&PatientId(2)));
    }

    #[test]
    fn test_second_line_excludes_patients_who_reverted_to_substitution() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Switch,
            RegimenLine::SecondLine,
            "2020-01-08 09:00:00",
        ));
        store.insert_drug_order_processed(drug_order(
            2,
            1,
            RegimenChangeType::Substitute,
            RegimenLine::FirstLine,
            "2020-02-15 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        assert!(
            ctx.second_line(art_program())
                .expect("second line")
                .is_empty(),
            "a later substitution means not-yet-switched for counting purposes"
        );
    }

    #[test]
    fn test_third_line_switches_are_their_own_tier() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1980-01-01")));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Switch,
            RegimenLine::ThirdLine,
            "2020-01-20 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        assert!(ctx
            .third_line(art_program())
            .expect("third line")
            .contains(&PatientId(1)));
        assert!(
            !ctx.second_line(art_program())
                .expect("second line")
                .contains(&PatientId(1)),
            "third-line switches do not count as second-line"
        );
    }

    #[test]
    fn test_tiers_are_disjoint_after_exclusion() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        // One patient per lifecycle stage, all within January.
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            "2020-01-02 09:00:00",
        ));
        store.insert_patient(patient(2, "M", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            2,
            2,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            "2020-01-02 09:00:00",
        ));
        store.insert_drug_order_processed(drug_order(
            3,
            2,
            RegimenChangeType::Substitute,
            RegimenLine::FirstLine,
            "2020-01-15 09:00:00",
        ));
        store.insert_patient(patient(3, "M", Some("1990-01-01")));
        store.insert_drug_order_processed(drug_order(
            4,
            3,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            "2020-01-02 09:00:00",
        ));
        store.insert_drug_order_processed(drug_order(
            5,
            3,
            RegimenChangeType::Switch,
            RegimenLine::SecondLine,
            "2020-01-20 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        let original = ctx.original_first_line(art_program()).expect("original");
        let alternate = ctx.alternate_first_line(art_program()).expect("alternate");
        let second = ctx.second_line(art_program()).expect("second");

        assert!(original.is_disjoint(&alternate));
        assert!(alternate.is_disjoint(&second));
        assert!(original.contains(&PatientId(1)));
        assert!(alternate.contains(&PatientId(2)));
        assert!(second.contains(&PatientId(3)));
    }

    #[test]
    fn test_exited_patients_are_subtracted_from_all_tiers() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "F", Some("1990-01-01")));
        store.insert_enrollment(enrollment(1, "2020-01-02 09:00:00", None));
        store.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            "2020-01-05 09:00:00",
        ));
        store.insert_observation(observation(
            1,
            config.outcomes().transferred_out.clone(),
            "2020-01-25 09:00:00",
        ));

        let ctx = context(&store, &config, period_jan_2020());
        assert!(
            ctx.original_first_line(art_program())
                .expect("original first line")
                .is_empty(),
            "a transferred-out patient is not counted on any tier"
        );
    }

    /// Delegates to a `MemoryStore` but pretends the current-regimen-state
    /// lookup finds nothing, reproducing the inconsistency the deployed
    /// system crashed on.
    struct AmnesicStore(MemoryStore);

    impl ClinicalStore for AmnesicStore {
        fn find_program_enrollments(
            &self,
            program: ace_types::ProgramUuid,
            enrolled_in: DateTimeRange,
        ) -> StoreResult<Vec<ProgramEnrollment>> {
            self.0.find_program_enrollments(program, enrolled_in)
        }

        fn find_program_enrollments_completed(
            &self,
            program: ace_types::ProgramUuid,
            completed_in: DateTimeRange,
        ) -> StoreResult<Vec<ProgramEnrollment>> {
            self.0
                .find_program_enrollments_completed(program, completed_in)
        }

        fn find_active_program_enrollments(
            &self,
            program: ace_types::ProgramUuid,
        ) -> StoreResult<Vec<ProgramEnrollment>> {
            self.0.find_active_program_enrollments(program)
        }

        fn find_observations(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>> {
            self.0.find_observations(filter)
        }

        fn find_visits_by_patient(&self, patient: PatientId) -> StoreResult<Vec<Visit>> {
            self.0.find_visits_by_patient(patient)
        }

        fn find_visited_patients(
            &self,
            range: DateTimeRange,
        ) -> StoreResult<std::collections::HashSet<PatientId>> {
            self.0.find_visited_patients(range)
        }

        fn find_drug_orders_processed_by_patient(
            &self,
            patient: PatientId,
        ) -> StoreResult<Vec<DrugOrderProcessed>> {
            self.0.find_drug_orders_processed_by_patient(patient)
        }

        fn find_last_drug_order_processed_by_patient(
            &self,
            _patient: PatientId,
        ) -> StoreResult<Option<DrugOrderProcessed>> {
            Ok(None)
        }

        fn find_drug_orders_processed_by_visit(
            &self,
            visit: VisitId,
        ) -> StoreResult<Vec<DrugOrderProcessed>> {
            self.0.find_drug_orders_processed_by_visit(visit)
        }

        fn find_drug_orders_processed(
            &self,
            filter: &DrugOrderFilter,
        ) -> StoreResult<Vec<DrugOrderProcessed>> {
            self.0.find_drug_orders_processed(filter)
        }

        fn find_patients(&self, filter: &PatientFilter) -> StoreResult<Vec<Patient>> {
            self.0.find_patients(filter)
        }

        fn load_patient(&self, id: PatientId) -> StoreResult<Option<Patient>> {
            self.0.load_patient(id)
        }

        fn save_drug_order_processed(&mut self, record: DrugOrderProcessed) -> StoreResult<()> {
            self.0.save_drug_order_processed(record)
        }

        fn save_drug_obs_processed(&mut self, record: DrugObsProcessed) -> StoreResult<()> {
            self.0.save_drug_obs_processed(record)
        }
    }

    #[test]
    fn test_missing_regimen_state_is_skipped_and_flagged() {
        let config = ReportingConfig::kenya_defaults();
        let mut inner = MemoryStore::new();
        inner.insert_patient(patient(1, "M", Some("1990-01-01")));
        inner.insert_drug_order_processed(drug_order(
            1,
            1,
            RegimenChangeType::Substitute,
            RegimenLine::FirstLine,
            "2020-01-10 09:00:00",
        ));
        let store = AmnesicStore(inner);

        let ctx = ReportContext::new(&store, &config, period_jan_2020(), dt("2020-06-01 12:00:00"));
        let alternate = ctx
            .alternate_first_line(art_program())
            .expect("classification continues instead of crashing");

        assert!(alternate.is_empty(), "the patient is skipped");
        assert!(
            ctx.flags().iter().any(|f| matches!(
                f,
                ClassificationFlag::MissingRegimenState { patient } if *patient == PatientId(1)
            )),
            "the skip is surfaced for review"
        );
    }
}
