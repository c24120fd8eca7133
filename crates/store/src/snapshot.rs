//! JSON snapshot loading.
//!
//! A snapshot directory holds one JSON array per record kind:
//!
//! ```text
//! snapshot/
//!   patients.json
//!   enrollments.json
//!   observations.json
//!   visits.json
//!   drug_orders.json
//!   drug_obs.json
//! ```
//!
//! Missing files are fine (that record kind is simply empty). A file that
//! fails to decode is logged as a warning and skipped, so one corrupt
//! fixture does not take the whole snapshot down.

use crate::gateway::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::records::{
    DrugObsProcessed, DrugOrderProcessed, Observation, Patient, ProgramEnrollment, Visit,
};
use serde::de::DeserializeOwned;
use std::path::Path;

pub const PATIENTS_FILE: &str = "patients.json";
pub const ENROLLMENTS_FILE: &str = "enrollments.json";
pub const OBSERVATIONS_FILE: &str = "observations.json";
pub const VISITS_FILE: &str = "visits.json";
pub const DRUG_ORDERS_FILE: &str = "drug_orders.json";
pub const DRUG_OBS_FILE: &str = "drug_obs.json";

/// Loads a snapshot directory into a [`MemoryStore`].
///
/// # Errors
///
/// Returns [`StoreError::SnapshotRead`] when a present file cannot be read.
/// Decode failures are not errors: the file is skipped with a warning.
pub fn load_dir(dir: &Path) -> StoreResult<MemoryStore> {
    let mut store = MemoryStore::new();

    for patient in read_records::<Patient>(dir, PATIENTS_FILE)? {
        store.insert_patient(patient);
    }
    for enrollment in read_records::<ProgramEnrollment>(dir, ENROLLMENTS_FILE)? {
        store.insert_enrollment(enrollment);
    }
    for observation in read_records::<Observation>(dir, OBSERVATIONS_FILE)? {
        store.insert_observation(observation);
    }
    for visit in read_records::<Visit>(dir, VISITS_FILE)? {
        store.insert_visit(visit);
    }
    for record in read_records::<DrugOrderProcessed>(dir, DRUG_ORDERS_FILE)? {
        store.insert_drug_order_processed(record);
    }
    for record in read_records::<DrugObsProcessed>(dir, DRUG_OBS_FILE)? {
        store.insert_drug_obs_processed(record);
    }

    Ok(store)
}

fn read_records<T: DeserializeOwned>(dir: &Path, file: &str) -> StoreResult<Vec<T>> {
    let path = dir.join(file);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::SnapshotRead(e)),
    };

    match serde_json::from_str::<Vec<T>>(&contents) {
        Ok(records) => Ok(records),
        Err(e) => {
            tracing::warn!("failed to decode snapshot file, skipping: {} - {}", path.display(), e);
            Ok(Vec::new())
        }
    }
}
