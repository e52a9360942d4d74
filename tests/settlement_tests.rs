mod common;

use cohort_saga::application::orchestrator::SagaState;
use cohort_saga::config::SagaConfig;
use cohort_saga::domain::customer::PaymentStatus;
use cohort_saga::domain::policy::{FirstWins, Selection, SelectionPolicy};
use cohort_saga::error::{SagaError, SettlementBatch, SettlementError, SettlementFailure};
use cohort_saga::infrastructure::sandbox::{FaultPlan, Operation};
use common::{card, orchestrator, sandbox};

#[tokio::test]
async fn test_transient_cancel_failure_is_retried() {
    let provider = sandbox(FaultPlan {
        failing_cancels: 1,
        ..Default::default()
    });
    let report = orchestrator(
        &provider,
        SagaConfig {
            cancel_retries: 1,
            ..Default::default()
        },
    )
    .run(&card())
    .await;

    assert!(report.is_done(), "{:?}", report.error());
    let settlement = report.settlement.as_ref().unwrap();
    let attempts: Vec<u32> = settlement.cancels.iter().map(|e| e.attempts).collect();
    assert_eq!(attempts, vec![2, 1]);
    assert_eq!(provider.call_count(Operation::Cancel).await, 3);
}

#[tokio::test]
async fn test_cancel_failure_still_reports_capture() {
    let provider = sandbox(FaultPlan {
        failing_cancels: 10,
        ..Default::default()
    });
    let report = orchestrator(
        &provider,
        SagaConfig {
            cancel_retries: 1,
            ..Default::default()
        },
    )
    .run(&card())
    .await;

    assert_eq!(report.aborted_stage(), Some(SagaState::Settling));
    match report.error() {
        Some(SagaError::Settlement(err @ SettlementError::Batch { batch, failures })) => {
            assert_eq!(*batch, SettlementBatch::Cancel);
            assert_eq!(err.indices(), vec![1, 2]);
            assert!(failures.iter().all(|f| f.detail.contains("connection reset")));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let settlement = report.settlement.as_ref().unwrap();
    assert_eq!(settlement.captures.len(), 1);
    assert!(settlement.captures[0].succeeded());
    assert!(settlement.cancels.iter().all(|e| e.attempts == 2 && e.error.is_some()));

    assert_eq!(
        report.statuses(),
        vec![
            Some(PaymentStatus::Captured),
            Some(PaymentStatus::Authorized),
            Some(PaymentStatus::Authorized),
        ]
    );
}

#[tokio::test]
async fn test_capture_failure_still_cancels_losers() {
    let provider = sandbox(FaultPlan {
        reject_captures: true,
        ..Default::default()
    });
    let report = orchestrator(&provider, SagaConfig::default())
        .run(&card())
        .await;

    assert_eq!(report.aborted_stage(), Some(SagaState::Settling));
    match report.error() {
        Some(SagaError::Settlement(SettlementError::Batch { batch, failures })) => {
            assert_eq!(*batch, SettlementBatch::Capture);
            assert_eq!(
                failures,
                &vec![SettlementFailure {
                    index: 0,
                    detail: "request rejected with status 402: capture declined".to_string(),
                }]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = report.error().unwrap().to_string();
    assert!(message.contains("customer 0"), "{message}");
    assert!(message.contains("402: capture declined"), "{message}");
    // Rejected captures are not retried.
    assert_eq!(provider.call_count(Operation::Capture).await, 1);
    assert_eq!(
        report.statuses(),
        vec![
            Some(PaymentStatus::Authorized),
            Some(PaymentStatus::Canceled),
            Some(PaymentStatus::Canceled),
        ]
    );
}

#[tokio::test]
async fn test_both_batches_failing_names_both() {
    let provider = sandbox(FaultPlan {
        reject_captures: true,
        failing_cancels: 10,
        ..Default::default()
    });
    let report = orchestrator(
        &provider,
        SagaConfig {
            cancel_retries: 0,
            ..Default::default()
        },
    )
    .run(&card())
    .await;

    match report.error() {
        Some(SagaError::Settlement(err @ SettlementError::BothBatches { capture, cancel })) => {
            assert_eq!(err.indices(), vec![0, 1, 2]);
            assert!(capture[0].detail.contains("402"));
            assert_eq!(cancel.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.call_count(Operation::Cancel).await, 2);
}

/// Lets every customer win.
struct EveryoneWins;

impl SelectionPolicy for EveryoneWins {
    fn select(&self, cohort: &[cohort_saga::domain::customer::CustomerRecord]) -> Vec<usize> {
        (0..cohort.len()).collect()
    }

    fn name(&self) -> &'static str {
        "everyone"
    }
}

/// Picks an index that does not exist.
struct OutOfRange;

impl SelectionPolicy for OutOfRange {
    fn select(&self, cohort: &[cohort_saga::domain::customer::CustomerRecord]) -> Vec<usize> {
        vec![cohort.len()]
    }

    fn name(&self) -> &'static str {
        "out-of-range"
    }
}

/// Picks the first two customers.
struct TwoWinners;

impl SelectionPolicy for TwoWinners {
    fn select(&self, _cohort: &[cohort_saga::domain::customer::CustomerRecord]) -> Vec<usize> {
        vec![0, 1]
    }

    fn name(&self) -> &'static str {
        "two"
    }
}

async fn assert_aborts_at_selection(policy: impl SelectionPolicy + 'static) {
    let provider = sandbox(FaultPlan::default());
    let report = orchestrator(&provider, SagaConfig::default())
        .with_policy(policy)
        .run(&card())
        .await;

    assert_eq!(report.aborted_stage(), Some(SagaState::Selecting));
    assert!(matches!(
        report.error(),
        Some(SagaError::Selection(message)) if message.contains("expected exactly one")
    ));
    assert!(report.selection.is_none());
    assert_eq!(provider.call_count(Operation::Capture).await, 0);
    assert_eq!(provider.call_count(Operation::Cancel).await, 0);
    assert!(
        report
            .statuses()
            .iter()
            .all(|s| *s == Some(PaymentStatus::Authorized))
    );
}

#[tokio::test]
async fn test_multi_winner_policy_aborts_at_selection() {
    assert_aborts_at_selection(TwoWinners).await;
    assert_aborts_at_selection(EveryoneWins).await;
}

#[tokio::test]
async fn test_invalid_policy_output_aborts_before_settlement() {
    let provider = sandbox(FaultPlan::default());
    let report = orchestrator(&provider, SagaConfig::default())
        .with_policy(OutOfRange)
        .run(&card())
        .await;

    assert_eq!(report.aborted_stage(), Some(SagaState::Selecting));
    assert!(matches!(report.error(), Some(SagaError::Selection(_))));
    assert_eq!(provider.call_count(Operation::Capture).await, 0);
    assert_eq!(provider.call_count(Operation::Cancel).await, 0);
}

#[tokio::test]
async fn test_selection_is_stable_across_calls() {
    let provider = sandbox(FaultPlan::default());
    let report = orchestrator(&provider, SagaConfig::default())
        .run(&card())
        .await;

    let first = Selection::apply(&FirstWins, &report.customers).unwrap();
    let second = Selection::apply(&FirstWins, &report.customers).unwrap();
    assert_eq!(first, second);
    assert_eq!(report.selection.as_ref(), Some(&first));
}
