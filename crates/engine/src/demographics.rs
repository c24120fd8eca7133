//! Demographic filter sets.
//!
//! Cohorts and metrics intersect with these sets rather than re-querying
//! demographics per patient. Age is always computed in completed years on
//! an explicit reference date (normally the period's end) — never against
//! a wall clock.

use crate::error::EngineResult;
use ace_store::{ClinicalStore, PatientFilter};
use ace_types::{AgeSelector, DateTimeRange, Gender, PatientId};
use chrono::NaiveDate;
use std::collections::HashSet;

pub fn patient_ids_by_gender<S: ClinicalStore>(
    store: &S,
    gender: Gender,
) -> EngineResult<HashSet<PatientId>> {
    let patients = store.find_patients(&PatientFilter::ByGender(gender))?;
    Ok(patients.into_iter().map(|p| p.id).collect())
}

pub fn patient_ids_in_age_range<S: ClinicalStore>(
    store: &S,
    min: u32,
    max: u32,
    on: NaiveDate,
) -> EngineResult<HashSet<PatientId>> {
    let patients = store.find_patients(&PatientFilter::All)?;
    Ok(patients
        .into_iter()
        .filter(|p| {
            p.age_on(on)
                .map(|age| age >= min && age <= max)
                .unwrap_or(false)
        })
        .map(|p| p.id)
        .collect())
}

pub fn died_patient_ids<S: ClinicalStore>(
    store: &S,
    range: DateTimeRange,
) -> EngineResult<HashSet<PatientId>> {
    let patients = store.find_patients(&PatientFilter::DiedWithin(range))?;
    Ok(patients.into_iter().map(|p| p.id).collect())
}

/// Restricts `base` to patients matching the optional gender and age
/// filters. Patients without demographics (or without a birthdate when an
/// age filter is present) drop out, mirroring an inner join on the person
/// table.
pub fn restrict<S: ClinicalStore>(
    store: &S,
    base: HashSet<PatientId>,
    gender: Option<Gender>,
    age: Option<AgeSelector>,
    age_on: NaiveDate,
) -> EngineResult<HashSet<PatientId>> {
    if gender.is_none() && age.is_none() {
        return Ok(base);
    }

    let mut restricted = HashSet::new();
    for id in base {
        let Some(patient) = store.load_patient(id)? else {
            continue;
        };
        if let Some(wanted) = gender {
            if patient.gender != wanted {
                continue;
            }
        }
        if let Some(selector) = age {
            match patient.age_on(age_on) {
                Some(years) if selector.matches(years) => {}
                _ => continue,
            }
        }
        restricted.insert(id);
    }
    Ok(restricted)
}
