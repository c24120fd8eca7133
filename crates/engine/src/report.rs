//! Per-invocation report context.
//!
//! A `ReportContext` scopes one report computation: one store handle, one
//! configuration, one reporting period, one injected "now". It memoizes the
//! five-way exit union that nearly every derived cohort subtracts, and
//! collects reviewable [`ClassificationFlag`]s instead of failing on noisy
//! data.
//!
//! The context is deliberately single-threaded (`RefCell`, `Rc`): the
//! engine is synchronous per report request, and contexts are created per
//! request, never shared.

use crate::config::ReportingConfig;
use crate::error::{ClassificationFlag, EngineResult};
use ace_store::ClinicalStore;
use ace_types::{PatientId, Period, ProgramUuid};
use chrono::NaiveDateTime;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// One report invocation's scope and caches.
pub struct ReportContext<'a, S: ClinicalStore> {
    store: &'a S,
    config: &'a ReportingConfig,
    period: Period,
    now: NaiveDateTime,
    exited: RefCell<HashMap<ProgramUuid, Rc<HashSet<PatientId>>>>,
    flags: RefCell<Vec<ClassificationFlag>>,
}

impl<'a, S: ClinicalStore> ReportContext<'a, S> {
    /// Creates a context for one report computation.
    ///
    /// `now` is the timestamp substituted for the stop time of still-open
    /// visits; callers inject it rather than the engine reading a clock,
    /// so computations are reproducible.
    pub fn new(
        store: &'a S,
        config: &'a ReportingConfig,
        period: Period,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            store,
            config,
            period,
            now,
            exited: RefCell::new(HashMap::new()),
            flags: RefCell::new(Vec::new()),
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn config(&self) -> &ReportingConfig {
        self.config
    }

    pub(crate) fn store(&self) -> &S {
        self.store
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Flags collected so far by computations on this context.
    pub fn flags(&self) -> Vec<ClassificationFlag> {
        self.flags.borrow().clone()
    }

    pub(crate) fn push_flag(&self, flag: ClassificationFlag) {
        self.flags.borrow_mut().push(flag);
    }

    /// Memoizing accessor for the per-program exit union.
    ///
    /// The union is computed at most once per context; later callers get
    /// the cached set. `compute` is [`crate::cohort`]'s job — this method
    /// only owns the cache.
    pub(crate) fn exited_cached(
        &self,
        program: ProgramUuid,
        compute: impl FnOnce() -> EngineResult<HashSet<PatientId>>,
    ) -> EngineResult<Rc<HashSet<PatientId>>> {
        if let Some(cached) = self.exited.borrow().get(&program) {
            tracing::debug!(%program, "exit union served from cache");
            return Ok(Rc::clone(cached));
        }
        let computed = Rc::new(compute()?);
        self.exited
            .borrow_mut()
            .insert(program, Rc::clone(&computed));
        Ok(computed)
    }
}
