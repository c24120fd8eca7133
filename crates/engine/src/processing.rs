//! Drug-order processing write-back.
//!
//! When a raw drug order is reconciled into a regimen event, the engine
//! materializes it as a `DrugOrderProcessed` record: the patient's current
//! (non-discontinued) record is closed with the new event's start date,
//! then the new record is upserted. Records are never deleted; the chain
//! of discontinued records *is* the regimen lineage.
//!
//! Each call touches one logical record at a time; concurrent upserts on
//! the same key are left to the backing store's own concurrency control.

use crate::error::EngineResult;
use ace_store::{ClinicalStore, DrugObsProcessed, DrugOrderProcessed};

/// Materializes regimen events into the processed caches.
pub struct RegimenProcessor<'a, S: ClinicalStore> {
    store: &'a mut S,
}

impl<'a, S: ClinicalStore> RegimenProcessor<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Records one regimen step, discontinuing the superseded record.
    pub fn record(&mut self, event: DrugOrderProcessed) -> EngineResult<()> {
        if let Some(mut current) = self
            .store
            .find_last_drug_order_processed_by_patient(event.patient)?
        {
            if !current.is_discontinued() && current.id != event.id {
                current.discontinued_date = Some(event.start_date);
                self.store.save_drug_order_processed(current)?;
            }
        }
        self.store.save_drug_order_processed(event)?;
        Ok(())
    }

    /// Records one dispensing fact on the observation-side cache.
    pub fn record_obs(&mut self, event: DrugObsProcessed) -> EngineResult<()> {
        self.store.save_drug_obs_processed(event)?;
        Ok(())
    }
}
