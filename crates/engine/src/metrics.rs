//! The named metric catalogue.
//!
//! Every metric a reporting page can request is a [`Metric`] value plus
//! optional demographic and regimen filters, evaluated against a
//! [`ReportContext`]. A metric either produces a cohort (and its count) or
//! fails with an [`EngineError`](crate::EngineError) — there is no path
//! that silently returns a number computed with a dropped filter.

use crate::demographics;
use crate::error::EngineResult;
use crate::pickup::PickupStreak;
use crate::report::ReportContext;
use ace_store::{ClinicalStore, DrugOrderFilter, ObservationFilter, RegimenLine};
use ace_types::{AgeSelector, Gender, PatientId};
use std::collections::HashSet;

/// Performance-scale assessment outcomes (ECOG-style A/B/C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceScale {
    A,
    B,
    C,
}

/// Adherence assessment levels, recorded as free text in the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdherenceLevel {
    One,
    Two,
    Three,
}

impl AdherenceLevel {
    /// The literal text the assessment observation carries.
    pub fn recorded_text(&self) -> &'static str {
        match self {
            AdherenceLevel::One => ">95%",
            AdherenceLevel::Two => "80-95 %",
            AdherenceLevel::Three => "<80%",
        }
    }
}

/// Risk-factor reporting codes 1 through 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskFactorCode {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
}

impl RiskFactorCode {
    pub const ALL: [RiskFactorCode; 7] = [
        RiskFactorCode::One,
        RiskFactorCode::Two,
        RiskFactorCode::Three,
        RiskFactorCode::Four,
        RiskFactorCode::Five,
        RiskFactorCode::Six,
        RiskFactorCode::Seven,
    ];

    fn index(&self) -> usize {
        match self {
            RiskFactorCode::One => 0,
            RiskFactorCode::Two => 1,
            RiskFactorCode::Three => 2,
            RiskFactorCode::Four => 3,
            RiskFactorCode::Five => 4,
            RiskFactorCode::Six => 5,
            RiskFactorCode::Seven => 6,
        }
    }
}

/// An independently invocable reporting metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    EnrolledInHivCare,
    StartedOnArt,
    TransferredIn,
    TransferredOut,
    LostToFollowUp,
    ArtStopped,
    ArtDied,
    HivStopped,
    TotalCohort,
    AliveAndOnArt,
    OnOriginalFirstLine,
    SubstitutedFirstLine,
    SwitchedToSecondLine,
    SwitchedToThirdLine,
    SixMonthArvPickup,
    TwelveMonthArvPickup,
    TreatedForOpportunisticInfections,
    OnPerformanceScale(PerformanceScale),
    AssessedAtAdherenceLevel(AdherenceLevel),
    WithRiskFactorCode(RiskFactorCode),
    TestedForCd4Count,
    TestedForViralLoad,
    /// Patients with a current (non-discontinued) regimen of the given
    /// line; combine with [`RegimenSelector`] for per-drug breakdowns.
    OnRegimen(RegimenLine),
}

impl Metric {
    /// Every concrete metric, with parameterized families expanded.
    pub fn all() -> Vec<Metric> {
        let mut metrics = vec![
            Metric::EnrolledInHivCare,
            Metric::StartedOnArt,
            Metric::TransferredIn,
            Metric::TransferredOut,
            Metric::LostToFollowUp,
            Metric::ArtStopped,
            Metric::ArtDied,
            Metric::HivStopped,
            Metric::TotalCohort,
            Metric::AliveAndOnArt,
            Metric::OnOriginalFirstLine,
            Metric::SubstitutedFirstLine,
            Metric::SwitchedToSecondLine,
            Metric::SwitchedToThirdLine,
            Metric::SixMonthArvPickup,
            Metric::TwelveMonthArvPickup,
            Metric::TreatedForOpportunisticInfections,
            Metric::TestedForCd4Count,
            Metric::TestedForViralLoad,
        ];
        metrics.extend([
            Metric::OnPerformanceScale(PerformanceScale::A),
            Metric::OnPerformanceScale(PerformanceScale::B),
            Metric::OnPerformanceScale(PerformanceScale::C),
            Metric::AssessedAtAdherenceLevel(AdherenceLevel::One),
            Metric::AssessedAtAdherenceLevel(AdherenceLevel::Two),
            Metric::AssessedAtAdherenceLevel(AdherenceLevel::Three),
        ]);
        metrics.extend(RiskFactorCode::ALL.map(Metric::WithRiskFactorCode));
        metrics.extend([
            Metric::OnRegimen(RegimenLine::FirstLine),
            Metric::OnRegimen(RegimenLine::FixedDoseCombination),
            Metric::OnRegimen(RegimenLine::SecondLine),
            Metric::OnRegimen(RegimenLine::ThirdLine),
            Metric::OnRegimen(RegimenLine::ChildArv),
        ]);
        metrics
    }
}

/// Exact-match drug/dose restriction for [`Metric::OnRegimen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegimenSelector {
    pub drug_regimen: String,
    /// `None` means "any dose" (the catalogue's without-dose variants).
    pub dose_regimen: Option<String>,
}

/// One metric invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRequest {
    pub metric: Metric,
    pub gender: Option<Gender>,
    pub age: Option<AgeSelector>,
    pub regimen: Option<RegimenSelector>,
}

impl MetricRequest {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            gender: None,
            age: None,
            regimen: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_age(mut self, age: AgeSelector) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_regimen(mut self, regimen: RegimenSelector) -> Self {
        self.regimen = Some(regimen);
        self
    }
}

impl<'a, S: ClinicalStore> ReportContext<'a, S> {
    /// The cohort behind a metric, demographic filters applied.
    pub fn metric_cohort(&self, request: &MetricRequest) -> EngineResult<HashSet<PatientId>> {
        let base = self.metric_base(request)?;
        demographics::restrict(
            self.store(),
            base,
            request.gender,
            request.age,
            self.period().end(),
        )
    }

    /// The count a reporting page displays for a metric.
    pub fn metric_count(&self, request: &MetricRequest) -> EngineResult<u64> {
        Ok(self.metric_cohort(request)?.len() as u64)
    }

    fn metric_base(&self, request: &MetricRequest) -> EngineResult<HashSet<PatientId>> {
        let art = self.config().art_program();
        let concepts = self.config().metric_concepts();

        match request.metric {
            Metric::EnrolledInHivCare => self.enrolled_in_program(self.config().hiv_program()),
            Metric::StartedOnArt => self.enrolled_in_program(art),
            Metric::TransferredIn => self.transferred_in(),
            Metric::TransferredOut => self.transferred_out(),
            Metric::LostToFollowUp => self.lost_to_follow_up(),
            Metric::ArtStopped => self.art_stopped(art),
            Metric::ArtDied => self.art_died(art),
            Metric::HivStopped => self.hiv_stopped(),
            Metric::TotalCohort => self.total_cohort(),
            Metric::AliveAndOnArt => self.alive_and_on_art(art),
            Metric::OnOriginalFirstLine => self.original_first_line(art),
            Metric::SubstitutedFirstLine => self.alternate_first_line(art),
            Metric::SwitchedToSecondLine => self.second_line(art),
            Metric::SwitchedToThirdLine => self.third_line(art),
            Metric::SixMonthArvPickup => self.picked_up_arv(PickupStreak::SixMonths),
            Metric::TwelveMonthArvPickup => self.picked_up_arv(PickupStreak::TwelveMonths),
            Metric::TreatedForOpportunisticInfections => self.patients_answering(
                ObservationFilter::question(
                    concepts.opportunistic_infection_treated.clone(),
                    self.period().datetime_range(),
                ),
            ),
            Metric::OnPerformanceScale(scale) => {
                let answer = match scale {
                    PerformanceScale::A => concepts.performance_scale_a.clone(),
                    PerformanceScale::B => concepts.performance_scale_b.clone(),
                    PerformanceScale::C => concepts.performance_scale_c.clone(),
                };
                self.patients_answering(
                    ObservationFilter::question(
                        concepts.performance_scale.clone(),
                        self.period().datetime_range(),
                    )
                    .with_coded_answer(answer),
                )
            }
            Metric::AssessedAtAdherenceLevel(level) => self.patients_answering(
                ObservationFilter::question(
                    concepts.adherence_assessment.clone(),
                    self.period().datetime_range(),
                )
                .with_text_answer(level.recorded_text()),
            ),
            Metric::WithRiskFactorCode(code) => self.patients_answering(
                ObservationFilter::question(
                    concepts.risk_factor.clone(),
                    self.period().datetime_range(),
                )
                .with_coded_answer(concepts.risk_factor_codes[code.index()].clone()),
            ),
            Metric::TestedForCd4Count => self.patients_answering(
                ObservationFilter::question(
                    concepts.test_ordered.clone(),
                    self.period().datetime_range(),
                )
                .with_coded_answer(concepts.cd4_count.clone()),
            ),
            Metric::TestedForViralLoad => self.patients_answering(
                ObservationFilter::question(
                    concepts.test_ordered.clone(),
                    self.period().datetime_range(),
                )
                .with_coded_answer(concepts.viral_load.clone()),
            ),
            Metric::OnRegimen(line) => {
                let mut filter = DrugOrderFilter {
                    lines: vec![line],
                    ..DrugOrderFilter::default()
                }
                .started_in(self.period().datetime_range())
                .current_only();
                if let Some(selector) = &request.regimen {
                    filter.drug_regimen = Some(selector.drug_regimen.clone());
                    filter.dose_regimen = selector.dose_regimen.clone();
                }
                let records = self.store().find_drug_orders_processed(&filter)?;
                Ok(records.into_iter().map(|r| r.patient).collect())
            }
        }
    }

    fn patients_answering(&self, filter: ObservationFilter) -> EngineResult<HashSet<PatientId>> {
        let observations = self.store().find_observations(&filter)?;
        Ok(observations.into_iter().map(|o| o.person).collect())
    }
}
