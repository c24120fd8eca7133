//! Clinical record types.
//!
//! These mirror the host platform's data model closely enough for cohort
//! derivation. All of them are owned by the external data store; the engine
//! only ever reads them, except for the two processed caches
//! ([`DrugOrderProcessed`], [`DrugObsProcessed`]) which it writes back as
//! materialized facts.

use ace_types::{
    ConceptCode, DrugObsProcessedId, DrugOrderProcessedId, Gender, PatientId, ProgramUuid, VisitId,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A patient's demographic view, as the engine needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub gender: Gender,
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub death_date: Option<NaiveDateTime>,
}

impl Patient {
    /// Age in completed years on the given date, when a birthdate is known.
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        self.birthdate.and_then(|born| date.years_since(born))
    }
}

/// One enrollment of a patient in a care program.
///
/// `date_completed == None` means the enrollment is still active. A patient
/// may hold several enrollments in the same program over time; which one is
/// "current" is the engine's concern, not the store's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramEnrollment {
    pub patient: PatientId,
    pub program: ProgramUuid,
    pub date_enrolled: NaiveDateTime,
    #[serde(default)]
    pub date_completed: Option<NaiveDateTime>,
}

impl ProgramEnrollment {
    pub fn is_active(&self) -> bool {
        self.date_completed.is_none()
    }
}

/// A coded, numeric, or free-text clinical observation.
///
/// Voided observations are retracted data; every gateway query excludes them
/// unless a filter explicitly asks otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub person: PatientId,
    pub concept: ConceptCode,
    #[serde(default)]
    pub value_coded: Option<ConceptCode>,
    #[serde(default)]
    pub value_numeric: Option<f64>,
    #[serde(default)]
    pub value_text: Option<String>,
    pub obs_datetime: NaiveDateTime,
    #[serde(default)]
    pub voided: bool,
}

/// The kind of regimen-change event a processed drug order represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimenChangeType {
    Start,
    Restart,
    Substitute,
    Switch,
}

impl fmt::Display for RegimenChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RegimenChangeType::Start => "start",
            RegimenChangeType::Restart => "restart",
            RegimenChangeType::Substitute => "substitute",
            RegimenChangeType::Switch => "switch",
        };
        f.write_str(label)
    }
}

/// The regimen line a processed drug order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimenLine {
    FirstLine,
    FixedDoseCombination,
    SecondLine,
    ThirdLine,
    ChildArv,
}

impl fmt::Display for RegimenLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RegimenLine::FirstLine => "first-line",
            RegimenLine::FixedDoseCombination => "fixed-dose-combination",
            RegimenLine::SecondLine => "second-line",
            RegimenLine::ThirdLine => "third-line",
            RegimenLine::ChildArv => "child-arv",
        };
        f.write_str(label)
    }
}

/// One materialized step in a patient's regimen lineage.
///
/// Created when a raw drug order is reconciled; its `discontinued_date` is
/// set when a later event supersedes it; never deleted. The most recent
/// record per patient by `created_date` is the patient's current regimen
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugOrderProcessed {
    pub id: DrugOrderProcessedId,
    pub patient: PatientId,
    #[serde(default)]
    pub visit: Option<VisitId>,
    pub start_date: NaiveDateTime,
    #[serde(default)]
    pub discontinued_date: Option<NaiveDateTime>,
    pub change_type: RegimenChangeType,
    pub regimen_line: RegimenLine,
    pub drug_regimen: String,
    pub dose_regimen: String,
    pub created_date: NaiveDateTime,
}

impl DrugOrderProcessed {
    pub fn is_discontinued(&self) -> bool {
        self.discontinued_date.is_some()
    }
}

/// Observation-side counterpart of [`DrugOrderProcessed`]: a materialized
/// dispensing fact derived from drug observations rather than orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugObsProcessed {
    pub id: DrugObsProcessedId,
    pub patient: PatientId,
    #[serde(default)]
    pub visit: Option<VisitId>,
    pub concept: ConceptCode,
    pub obs_datetime: NaiveDateTime,
    pub created_date: NaiveDateTime,
}

/// A clinic visit. `stop_datetime == None` means the visit is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub patient: PatientId,
    pub start_datetime: NaiveDateTime,
    #[serde(default)]
    pub stop_datetime: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn patient_born(birthdate: &str) -> Patient {
        Patient {
            id: PatientId(1),
            gender: Gender::Female,
            birthdate: Some(
                NaiveDate::parse_from_str(birthdate, "%Y-%m-%d").expect("birthdate should parse"),
            ),
            dead: false,
            death_date: None,
        }
    }

    #[test]
    fn test_age_counts_completed_years_only() {
        let p = patient_born("1990-06-15");
        let day_before_birthday = NaiveDate::from_ymd_opt(2020, 6, 14).unwrap();
        let birthday = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();

        assert_eq!(p.age_on(day_before_birthday), Some(29));
        assert_eq!(p.age_on(birthday), Some(30));
    }

    #[test]
    fn test_age_is_none_without_birthdate() {
        let p = Patient {
            id: PatientId(2),
            gender: Gender::Male,
            birthdate: None,
            dead: false,
            death_date: None,
        };
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()), None);
    }
}
