//! Fixture builders shared by the engine's test modules.

use ace_store::{
    DrugOrderProcessed, Observation, Patient, ProgramEnrollment, RegimenChangeType, RegimenLine,
    Visit,
};
use ace_types::{
    ConceptCode, DrugOrderProcessedId, Gender, PatientId, Period, ProgramUuid, VisitId,
};
use chrono::{NaiveDate, NaiveDateTime};

pub(crate) fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("test datetime should parse")
}

pub(crate) fn art_program() -> ProgramUuid {
    ProgramUuid::parse("96ec813f-aaf0-45b2-add6-e661d5bf79d6").expect("ART program uuid")
}

pub(crate) fn hiv_program() -> ProgramUuid {
    ProgramUuid::parse("dfdc6d40-2f2f-463d-ba90-cc97350441a8").expect("HIV program uuid")
}

pub(crate) fn period_jan_2020() -> Period {
    Period::parse("2020-01-01", "2020-01-31").expect("test period")
}

pub(crate) fn patient(id: i64, gender: &str, birthdate: Option<&str>) -> Patient {
    Patient {
        id: PatientId(id),
        gender: gender.parse::<Gender>().expect("test gender"),
        birthdate: birthdate
            .map(|b| NaiveDate::parse_from_str(b, "%Y-%m-%d").expect("test birthdate")),
        dead: false,
        death_date: None,
    }
}

pub(crate) fn enrollment(
    patient: i64,
    enrolled: &str,
    completed: Option<&str>,
) -> ProgramEnrollment {
    ProgramEnrollment {
        patient: PatientId(patient),
        program: art_program(),
        date_enrolled: dt(enrolled),
        date_completed: completed.map(dt),
    }
}

pub(crate) fn hiv_enrollment(
    patient: i64,
    enrolled: &str,
    completed: Option<&str>,
) -> ProgramEnrollment {
    ProgramEnrollment {
        program: hiv_program(),
        ..enrollment(patient, enrolled, completed)
    }
}

pub(crate) fn observation(person: i64, value_coded: ConceptCode, at: &str) -> Observation {
    Observation {
        person: PatientId(person),
        concept: ConceptCode::new("1285").expect("outcome question concept"),
        value_coded: Some(value_coded),
        value_numeric: None,
        value_text: None,
        obs_datetime: dt(at),
        voided: false,
    }
}

pub(crate) fn drug_order(
    id: i64,
    patient: i64,
    change_type: RegimenChangeType,
    line: RegimenLine,
    start: &str,
) -> DrugOrderProcessed {
    DrugOrderProcessed {
        id: DrugOrderProcessedId(id),
        patient: PatientId(patient),
        visit: None,
        start_date: dt(start),
        discontinued_date: None,
        change_type,
        regimen_line: line,
        drug_regimen: "AZT/3TC/NVP".into(),
        dose_regimen: "300/150/200".into(),
        // Creation order follows id order in fixtures.
        created_date: dt(start),
    }
}

pub(crate) fn visit(id: i64, patient: i64, start: &str, stop: Option<&str>) -> Visit {
    Visit {
        id: VisitId(id),
        patient: PatientId(patient),
        start_datetime: dt(start),
        stop_datetime: stop.map(dt),
    }
}
