use super::remote;
use crate::domain::customer::{CustomerRecord, PaymentStatus};
use crate::domain::order::SettleRequest;
use crate::domain::policy::Selection;
use crate::domain::ports::ProviderBox;
use crate::error::{ProviderError, SettlementBatch, SettlementError, SettlementFailure};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Result of settling one customer.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct SettlementEntry {
    pub index: usize,
    pub batch: SettlementBatch,
    pub attempts: u32,
    /// Raw provider status of the last reply, if any.
    pub status: Option<String>,
    pub error: Option<String>,
}

impl SettlementEntry {
    /// True when the provider answered with the batch's target status.
    pub fn succeeded(&self) -> bool {
        let expected = match self.batch {
            SettlementBatch::Capture => "CAPTURED",
            SettlementBatch::Cancel => "CANCELED",
        };
        self.error.is_none() && self.status.as_deref() == Some(expected)
    }

    fn failure(&self) -> SettlementFailure {
        let detail = match (&self.error, &self.status) {
            (Some(error), _) => error.clone(),
            (None, Some(status)) => format!("provider answered `{status}`"),
            (None, None) => "no reply".to_string(),
        };
        SettlementFailure {
            index: self.index,
            detail,
        }
    }
}

/// Per-customer outcomes of both batches.
#[derive(Debug, Serialize, PartialEq, Clone, Default)]
pub struct SettlementReport {
    pub captures: Vec<SettlementEntry>,
    pub cancels: Vec<SettlementEntry>,
}

impl SettlementReport {
    fn failed(entries: &[SettlementEntry]) -> Vec<SettlementFailure> {
        entries
            .iter()
            .filter(|e| !e.succeeded())
            .map(SettlementEntry::failure)
            .collect()
    }

    /// Fails when any capture did not end `CAPTURED` or any cancel did not end `CANCELED`.
    pub fn check(&self) -> Result<(), SettlementError> {
        let capture = Self::failed(&self.captures);
        let cancel = Self::failed(&self.cancels);
        match (capture.is_empty(), cancel.is_empty()) {
            (true, true) => Ok(()),
            (false, true) => Err(SettlementError::Batch {
                batch: SettlementBatch::Capture,
                failures: capture,
            }),
            (true, false) => Err(SettlementError::Batch {
                batch: SettlementBatch::Cancel,
                failures: cancel,
            }),
            (false, false) => Err(SettlementError::BothBatches { capture, cancel }),
        }
    }
}

/// Captures the winners and cancels the losers.
///
/// Both batches always run, so a failing capture still releases the losers'
/// holds. Cancels that fail on transport errors or timeouts are retried up to
/// `cancel_retries` times. Captures are never retried.
pub struct SettlementStep {
    provider: ProviderBox,
    timeout: Duration,
    cancel_retries: u32,
}

impl SettlementStep {
    /// # Arguments
    ///
    /// * `provider` - The provider to settle against.
    /// * `timeout` - Limit for each capture or cancel call.
    /// * `cancel_retries` - Extra attempts for a cancel that failed in transit.
    pub fn new(provider: ProviderBox, timeout: Duration, cancel_retries: u32) -> Self {
        Self {
            provider,
            timeout,
            cancel_retries,
        }
    }

    /// Captures `selection.winners` and cancels `selection.losers`.
    ///
    /// Fails up front, before any call, if a selected customer is not
    /// authorized. Otherwise returns one entry per customer; use
    /// [`SettlementReport::check`] to turn failed entries into an error.
    pub async fn settle(
        &self,
        records: &mut [CustomerRecord],
        selection: &Selection,
    ) -> Result<SettlementReport, SettlementError> {
        for &index in selection.winners.iter().chain(selection.losers.iter()) {
            let settleable = records
                .get(index)
                .is_some_and(|r| r.settlement_handle().is_some());
            if !settleable {
                return Err(SettlementError::NotSettleable { index });
            }
        }

        let mut report = SettlementReport::default();
        for &index in &selection.winners {
            let entry = self
                .settle_one(&mut records[index], index, SettlementBatch::Capture)
                .await;
            report.captures.push(entry);
        }
        for &index in &selection.losers {
            let entry = self
                .settle_one(&mut records[index], index, SettlementBatch::Cancel)
                .await;
            report.cancels.push(entry);
        }
        Ok(report)
    }

    async fn settle_one(
        &self,
        record: &mut CustomerRecord,
        index: usize,
        batch: SettlementBatch,
    ) -> SettlementEntry {
        let (order_id, request) = match record.settlement_handle() {
            Some((order_id, access_id)) => (order_id.to_string(), SettleRequest::card(access_id)),
            None => {
                return SettlementEntry {
                    index,
                    batch,
                    attempts: 0,
                    status: None,
                    error: Some("not settleable".to_string()),
                };
            }
        };
        let max_attempts = match batch {
            SettlementBatch::Capture => 1,
            SettlementBatch::Cancel => 1 + self.cancel_retries,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let reply = match batch {
                SettlementBatch::Capture => {
                    remote::call(
                        "capture",
                        self.timeout,
                        self.provider.capture(&order_id, &request),
                    )
                    .await
                }
                SettlementBatch::Cancel => {
                    remote::call(
                        "cancel",
                        self.timeout,
                        self.provider.cancel(&order_id, &request),
                    )
                    .await
                }
            };

            match reply {
                Ok(status) => {
                    let entry = SettlementEntry {
                        index,
                        batch,
                        attempts,
                        status: Some(status),
                        error: None,
                    };
                    if entry.succeeded() {
                        record.status = entry.status.as_deref().map(PaymentStatus::from_provider);
                        info!(index, %batch, %order_id, attempts, "settled");
                    } else {
                        warn!(index, %batch, %order_id, status = ?entry.status, "unexpected settlement status");
                    }
                    return entry;
                }
                Err(e) if attempts < max_attempts && is_retryable(&e) => {
                    warn!(index, %batch, %order_id, attempts, error = %e, "retrying settlement");
                }
                Err(e) => {
                    return SettlementEntry {
                        index,
                        batch,
                        attempts,
                        status: None,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }
}

fn is_retryable(error: &ProviderError) -> bool {
    matches!(error, ProviderError::Transport(_) | ProviderError::Timeout(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::Order;

    fn entry(batch: SettlementBatch, index: usize, status: &str) -> SettlementEntry {
        SettlementEntry {
            index,
            batch,
            attempts: 1,
            status: Some(status.to_string()),
            error: None,
        }
    }

    #[test]
    fn test_check_names_the_failing_batch() {
        let mut report = SettlementReport {
            captures: vec![entry(SettlementBatch::Capture, 0, "CAPTURED")],
            cancels: vec![
                entry(SettlementBatch::Cancel, 1, "CANCELED"),
                entry(SettlementBatch::Cancel, 2, "AUTHORIZED"),
            ],
        };
        assert_eq!(
            report.check(),
            Err(SettlementError::Batch {
                batch: SettlementBatch::Cancel,
                failures: vec![SettlementFailure {
                    index: 2,
                    detail: "provider answered `AUTHORIZED`".to_string()
                }]
            })
        );

        report.captures[0].status = None;
        report.captures[0].error = Some("request rejected with status 402: capture declined".into());
        let err = report.check().unwrap_err();
        assert!(matches!(err, SettlementError::BothBatches { .. }));
        assert_eq!(err.indices(), vec![0, 2]);
        assert_eq!(
            err.to_string(),
            "capture batch failed (customer 0: request rejected with status 402: capture declined) \
             and cancel batch failed (customer 2: provider answered `AUTHORIZED`)"
        );

        report.captures[0].error = None;
        report.captures[0].status = Some("CAPTURED".to_string());
        report.cancels[1].status = Some("CANCELED".to_string());
        assert_eq!(report.check(), Ok(()));
    }

    #[test]
    fn test_entry_with_error_never_succeeds() {
        let mut e = entry(SettlementBatch::Capture, 0, "CAPTURED");
        e.error = Some("boom".to_string());
        assert!(!e.succeeded());
    }

    #[tokio::test]
    async fn test_unauthorized_record_is_not_settleable() {
        use crate::config::SessionContext;
        use crate::infrastructure::sandbox::{Operation, SandboxProvider};
        use std::sync::Arc;

        let session = SessionContext::new("p_test", "m_test").unwrap();
        let provider = Arc::new(SandboxProvider::connect(&session));
        let step = SettlementStep::new(provider.clone(), Duration::from_secs(1), 1);

        let mut pending = CustomerRecord::new("c-0");
        pending.attach_order(Order {
            id: "o-0".into(),
            access_id: "a-0".into(),
        });
        let mut records = vec![pending, CustomerRecord::new("c-1")];
        let selection = Selection::partition(&[0], 2).unwrap();

        let err = step.settle(&mut records, &selection).await.unwrap_err();
        assert_eq!(err, SettlementError::NotSettleable { index: 0 });
        assert_eq!(provider.call_count(Operation::Capture).await, 0);
        assert_eq!(provider.call_count(Operation::Cancel).await, 0);
    }
}
