#![allow(dead_code)]

use cohort_saga::application::orchestrator::Orchestrator;
use cohort_saga::config::{SagaConfig, SessionContext};
use cohort_saga::domain::card::CardDetails;
use cohort_saga::infrastructure::sandbox::{FaultPlan, SandboxProvider};
use std::sync::Arc;

pub fn session() -> SessionContext {
    SessionContext::new("p_test_public", "m_test_private").unwrap()
}

pub fn card() -> CardDetails {
    CardDetails::new("4111111111111111", "3311", Some("AVA".into()), Some("111".into())).unwrap()
}

pub fn sandbox(faults: FaultPlan) -> Arc<SandboxProvider> {
    Arc::new(SandboxProvider::connect(&session()).with_faults(faults))
}

/// An orchestrator over `provider`, which the caller keeps for inspection.
pub fn orchestrator(provider: &Arc<SandboxProvider>, config: SagaConfig) -> Orchestrator {
    Orchestrator::new(provider.clone(), session(), config).unwrap()
}

pub const CARD_FORM: &str = r#"{"cardNo":"4111111111111111","CVC":"111","expire":"3311","year":"33","month":"11","holderName":"AVA","payTimes":"1","method":"1"}"#;
