mod common;

use cohort_saga::application::orchestrator::Orchestrator;
use cohort_saga::config::SagaConfig;
use cohort_saga::domain::customer::CustomerProfile;
use cohort_saga::domain::ports::ProviderBox;
use cohort_saga::infrastructure::sandbox::{FaultPlan, SandboxProvider};
use std::sync::Arc;

#[tokio::test]
async fn test_provider_as_trait_object() {
    let provider: ProviderBox = Arc::new(SandboxProvider::connect(&common::session()));

    // Verify Send + Sync by spawning tasks
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .register_customer(&CustomerProfile::placeholder())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_independent_runs_on_separate_tasks() {
    let provider = common::sandbox(FaultPlan::default());

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let orchestrator: Orchestrator = Orchestrator::new(
                provider.clone(),
                common::session(),
                SagaConfig::default(),
            )
            .unwrap();
            let card = common::card();
            tokio::spawn(async move { orchestrator.run(&card).await })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap();
        assert!(report.is_done(), "{:?}", report.error());
    }
}
