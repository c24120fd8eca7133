//! Visit-streak ARV pickup cohorts.
//!
//! A patient qualifies for the N-month pickup set when their visit history
//! shows an unbroken streak of N qualifying visits inside the reporting
//! window, the Nth visit dispensed medication, and no lost-to-follow-up
//! observation falls within the Nth visit's span. An (N+1)th qualifying
//! visit that itself dispensed medication vetoes the patient: the streak
//! overran the window.

use crate::error::EngineResult;
use crate::report::ReportContext;
use ace_store::{ClinicalStore, ObservationFilter, Visit};
use ace_types::{DateTimeRange, PatientId};
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Streak length of a pickup cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickupStreak {
    SixMonths,
    TwelveMonths,
}

impl PickupStreak {
    /// Number of qualifying visits the streak requires.
    pub fn required_visits(&self) -> usize {
        match self {
            PickupStreak::SixMonths => 6,
            PickupStreak::TwelveMonths => 12,
        }
    }
}

impl<'a, S: ClinicalStore> ReportContext<'a, S> {
    /// Patients who picked up ARVs for the full streak during the period.
    pub fn picked_up_arv(&self, streak: PickupStreak) -> EngineResult<HashSet<PatientId>> {
        let visited = self
            .store()
            .find_visited_patients(self.period().datetime_range())?;

        let mut qualified = HashSet::new();
        for patient in visited {
            if self.streak_qualifies(patient, streak.required_visits())? {
                qualified.insert(patient);
            }
        }
        Ok(qualified)
    }

    fn streak_qualifies(&self, patient: PatientId, n: usize) -> EngineResult<bool> {
        let range = self.period().datetime_range();
        let visits = self.store().find_visits_by_patient(patient)?;

        // Capped window: the first n+1 qualifying visits in ascending
        // start order. A visit qualifies when it closed before the end
        // boundary, or is still open and started inside [start, end).
        let mut window: Vec<&Visit> = Vec::new();
        for visit in &visits {
            if window.len() > n {
                break;
            }
            let qualifies = match visit.stop_datetime {
                Some(stop) => stop < range.end,
                None => range.start <= visit.start_datetime && visit.start_datetime < range.end,
            };
            if qualifies {
                window.push(visit);
            }
        }

        if window.len() < n {
            return Ok(false);
        }

        let nth = window[n - 1];
        let window_end = nth.stop_datetime.unwrap_or_else(|| self.now());

        // The Nth visit must have dispensed medication.
        if self
            .store()
            .find_drug_orders_processed_by_visit(nth.id)?
            .is_empty()
        {
            return Ok(false);
        }

        // No lost-to-follow-up observation inside the window.
        if self
            .ltfu_observations(patient, nth.start_datetime, window_end)?
            != 0
        {
            return Ok(false);
        }

        // Extra-visit override: a qualifying (N+1)th visit that itself
        // dispensed and shows no LTFU means the streak overran the window.
        if let Some(extra) = window.get(n) {
            let extra_end = extra.stop_datetime.unwrap_or_else(|| self.now());
            let extra_dispensed = !self
                .store()
                .find_drug_orders_processed_by_visit(extra.id)?
                .is_empty();
            let extra_ltfu = self
                .ltfu_observations(patient, extra.start_datetime, extra_end)?
                != 0;
            if extra_dispensed && !extra_ltfu {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn ltfu_observations(
        &self,
        patient: PatientId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> EngineResult<usize> {
        let filter = ObservationFilter::coded_answer(
            vec![self.config().outcomes().lost_to_follow_up.clone()],
            DateTimeRange::new(from, to),
        )
        .for_person(patient);
        Ok(self.store().find_observations(&filter)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportingConfig;
    use crate::testutil::{drug_order, dt, observation, patient, period_jan_2020, visit};
    use ace_store::{MemoryStore, RegimenChangeType, RegimenLine};
    use ace_types::VisitId;

    const NOW: &str = "2020-02-15 12:00:00";

    fn context<'a>(store: &'a MemoryStore, config: &'a ReportingConfig) -> ReportContext<'a, MemoryStore> {
        ReportContext::new(store, config, period_jan_2020(), dt(NOW))
    }

    /// Six closed monthly visits, Aug 2019 - Jan 2020, each two hours long.
    fn insert_monthly_visits(store: &mut MemoryStore, patient_id: i64, count: usize) {
        let months = [
            ("2019-08-03", 1),
            ("2019-09-03", 2),
            ("2019-10-03", 3),
            ("2019-11-03", 4),
            ("2019-12-03", 5),
            ("2020-01-03", 6),
            ("2020-01-24", 7),
        ];
        for (day, id) in months.iter().take(count) {
            store.insert_visit(visit(
                *id,
                patient_id,
                &format!("{day} 08:00:00"),
                Some(&format!("{day} 10:00:00")),
            ));
        }
    }

    fn dispense_at_visit(store: &mut MemoryStore, order_id: i64, patient_id: i64, visit_id: i64, at: &str) {
        let mut order = drug_order(
            order_id,
            patient_id,
            RegimenChangeType::Start,
            RegimenLine::FirstLine,
            at,
        );
        order.visit = Some(VisitId(visit_id));
        store.insert_drug_order_processed(order);
    }

    #[test]
    fn test_six_visit_streak_with_dispense_at_sixth_qualifies() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        insert_monthly_visits(&mut store, 1, 6);
        dispense_at_visit(&mut store, 1, 1, 6, "2020-01-03 09:00:00");

        let ctx = context(&store, &config);
        let picked = ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set");
        assert!(picked.contains(&PatientId(1)));
    }

    #[test]
    fn test_five_visits_are_not_enough() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        // Five closed visits, the last one inside the period so the
        // patient is scanned at all.
        for (id, day) in ["2019-09-03", "2019-10-03", "2019-11-03", "2019-12-03", "2020-01-03"]
            .iter()
            .enumerate()
        {
            store.insert_visit(visit(
                id as i64 + 1,
                1,
                &format!("{day} 08:00:00"),
                Some(&format!("{day} 10:00:00")),
            ));
        }
        dispense_at_visit(&mut store, 1, 1, 5, "2020-01-03 09:00:00");

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set")
            .is_empty());
    }

    #[test]
    fn test_no_dispense_at_sixth_visit_disqualifies() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        insert_monthly_visits(&mut store, 1, 6);
        // Dispensed at the fifth visit, not the sixth.
        dispense_at_visit(&mut store, 1, 1, 5, "2019-12-03 09:00:00");

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set")
            .is_empty());
    }

    #[test]
    fn test_ltfu_observation_inside_window_disqualifies() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        insert_monthly_visits(&mut store, 1, 6);
        dispense_at_visit(&mut store, 1, 1, 6, "2020-01-03 09:00:00");
        store.insert_observation(observation(
            1,
            config.outcomes().lost_to_follow_up.clone(),
            "2020-01-03 09:30:00",
        ));

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set")
            .is_empty());
    }

    #[test]
    fn test_scenario_seventh_visit_without_dispense_does_not_veto() {
        // Seven qualifying visits, medication at the sixth, none at the
        // seventh: the streak ends where the window does.
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "F", Some("1990-01-01")));
        insert_monthly_visits(&mut store, 1, 7);
        dispense_at_visit(&mut store, 1, 1, 6, "2020-01-03 09:00:00");

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set")
            .contains(&PatientId(1)));
    }

    #[test]
    fn test_scenario_qualifying_extra_visit_vetoes() {
        // The seventh visit also dispensed: the streak overran the window
        // and the patient is excluded.
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "F", Some("1990-01-01")));
        insert_monthly_visits(&mut store, 1, 7);
        dispense_at_visit(&mut store, 1, 1, 6, "2020-01-03 09:00:00");
        dispense_at_visit(&mut store, 2, 1, 7, "2020-01-24 09:00:00");

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set")
            .is_empty());
    }

    #[test]
    fn test_open_visit_started_in_period_counts_with_synthesized_end() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1990-01-01")));
        insert_monthly_visits(&mut store, 1, 5);
        // Sixth visit still open, started inside the period.
        store.insert_visit(visit(6, 1, "2020-01-20 08:00:00", None));
        dispense_at_visit(&mut store, 1, 1, 6, "2020-01-20 09:00:00");

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::SixMonths)
            .expect("pickup set")
            .contains(&PatientId(1)));
    }

    #[test]
    fn test_twelve_month_streak_requires_twelve_visits() {
        let config = ReportingConfig::kenya_defaults();
        let mut store = MemoryStore::new();
        store.insert_patient(patient(1, "M", Some("1985-01-01")));
        // Twelve closed monthly visits, Feb 2019 - Jan 2020.
        for (i, month) in (2..=12).chain(1..=1).enumerate() {
            let year = if i < 11 { 2019 } else { 2020 };
            let day = format!("{year}-{month:02}-03");
            store.insert_visit(visit(
                i as i64 + 1,
                1,
                &format!("{day} 08:00:00"),
                Some(&format!("{day} 10:00:00")),
            ));
        }
        dispense_at_visit(&mut store, 1, 1, 12, "2020-01-03 09:00:00");

        let ctx = context(&store, &config);
        assert!(ctx
            .picked_up_arv(PickupStreak::TwelveMonths)
            .expect("pickup set")
            .contains(&PatientId(1)));
        assert!(
            ctx.picked_up_arv(PickupStreak::SixMonths)
                .expect("pickup set")
                .is_empty(),
            "the sixth visit of the longer streak did not dispense"
        );
    }
}
