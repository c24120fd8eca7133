//! Reporting configuration.
//!
//! Program UUIDs and concept codes are facility metadata: the original
//! deployment resolved them through the host platform's metadata services
//! at every call site. Here they are resolved once into a `ReportingConfig`
//! at startup and passed into the engine, so no computation touches global
//! state (and tests can substitute their own dictionary).

use ace_types::{ConceptCode, ProgramUuid};

/// Coded outcome concepts used by the exit-category queries.
#[derive(Debug, Clone)]
pub struct OutcomeConcepts {
    pub died: ConceptCode,
    pub lost_to_follow_up: ConceptCode,
    pub transferred_out: ConceptCode,
    /// Two transfer-in concepts exist in the dictionary (facility transfer
    /// and programme transfer); both count.
    pub transfer_in: [ConceptCode; 2],
}

impl OutcomeConcepts {
    /// The concepts that qualify as a terminal outcome when attributing a
    /// program completion (died, lost to follow-up, transferred out).
    pub fn terminal(&self) -> Vec<ConceptCode> {
        vec![
            self.died.clone(),
            self.lost_to_follow_up.clone(),
            self.transferred_out.clone(),
        ]
    }
}

/// Question/answer concepts backing the coded-observation metrics.
#[derive(Debug, Clone)]
pub struct MetricConcepts {
    /// Question: treated for an opportunistic infection.
    pub opportunistic_infection_treated: ConceptCode,
    /// Question: performance scale assessment.
    pub performance_scale: ConceptCode,
    pub performance_scale_a: ConceptCode,
    pub performance_scale_b: ConceptCode,
    pub performance_scale_c: ConceptCode,
    /// Question: adherence assessment; levels are recorded as free text.
    pub adherence_assessment: ConceptCode,
    /// Question: risk factor; one coded answer per reporting code 1-7.
    pub risk_factor: ConceptCode,
    pub risk_factor_codes: [ConceptCode; 7],
    /// Question: laboratory test ordered.
    pub test_ordered: ConceptCode,
    pub cd4_count: ConceptCode,
    pub viral_load: ConceptCode,
}

/// Configuration for one reporting deployment, resolved at startup.
#[derive(Debug, Clone)]
pub struct ReportingConfig {
    art_program: ProgramUuid,
    hiv_program: ProgramUuid,
    outcomes: OutcomeConcepts,
    metric_concepts: MetricConcepts,
}

impl ReportingConfig {
    pub fn new(
        art_program: ProgramUuid,
        hiv_program: ProgramUuid,
        outcomes: OutcomeConcepts,
        metric_concepts: MetricConcepts,
    ) -> Self {
        Self {
            art_program,
            hiv_program,
            outcomes,
            metric_concepts,
        }
    }

    /// The dictionary the Kenyan national reporting deployment uses.
    pub fn kenya_defaults() -> Self {
        fn code(s: &str) -> ConceptCode {
            ConceptCode::new(s).expect("default concept codes are valid")
        }

        Self {
            art_program: ProgramUuid::parse("96ec813f-aaf0-45b2-add6-e661d5bf79d6")
                .expect("default ART program UUID is valid"),
            hiv_program: ProgramUuid::parse("dfdc6d40-2f2f-463d-ba90-cc97350441a8")
                .expect("default HIV program UUID is valid"),
            outcomes: OutcomeConcepts {
                died: code("160034AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
                lost_to_follow_up: code("5240AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
                transferred_out: code("159492AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
                transfer_in: [
                    code("4b73234a-15db-49a0-b089-c26c239fe90d"),
                    code("feee14d1-6cd6-4f5d-a3f6-056ed91526e5"),
                ],
            },
            metric_concepts: MetricConcepts {
                opportunistic_infection_treated: code("163079"),
                performance_scale: code("162886"),
                performance_scale_a: code("162887"),
                performance_scale_b: code("162888"),
                performance_scale_c: code("162889"),
                adherence_assessment: code("162945"),
                risk_factor: code("160581"),
                risk_factor_codes: [
                    code("162914"),
                    code("162915"),
                    code("162916"),
                    code("162917"),
                    code("162918"),
                    code("162919"),
                    code("162920"),
                ],
                test_ordered: code("1283"),
                cd4_count: code("5497"),
                viral_load: code("856"),
            },
        }
    }

    pub fn art_program(&self) -> ProgramUuid {
        self.art_program
    }

    pub fn hiv_program(&self) -> ProgramUuid {
        self.hiv_program
    }

    pub fn outcomes(&self) -> &OutcomeConcepts {
        &self.outcomes
    }

    pub fn metric_concepts(&self) -> &MetricConcepts {
        &self.metric_concepts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kenya_defaults_resolve() {
        let cfg = ReportingConfig::kenya_defaults();
        assert_ne!(cfg.art_program(), cfg.hiv_program());
        assert_eq!(cfg.outcomes().terminal().len(), 3);
        assert_eq!(cfg.metric_concepts().risk_factor_codes.len(), 7);
    }
}
