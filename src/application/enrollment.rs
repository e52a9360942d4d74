use super::remote;
use crate::domain::card::CardDetails;
use crate::domain::customer::CustomerRecord;
use crate::domain::ports::ProviderBox;
use crate::error::EnrollmentError;
use futures::future::join_all;
use std::time::Duration;
use tracing::info;

/// Registers a card and issues a payment token for each customer.
pub struct CardEnrollmentStep {
    provider: ProviderBox,
    timeout: Duration,
}

impl CardEnrollmentStep {
    /// # Arguments
    ///
    /// * `provider` - The provider cards and tokens are registered with.
    /// * `timeout` - Limit for each enrollment or token call.
    pub fn new(provider: ProviderBox, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Enrolls `card` for one customer.
    ///
    /// The record is only touched once both the card and the token calls
    /// succeed, so a failed enrollment leaves it as it was.
    pub async fn enroll(
        &self,
        index: usize,
        record: &mut CustomerRecord,
        card: &CardDetails,
    ) -> Result<(), EnrollmentError> {
        let card_id = remote::call(
            "enroll_card",
            self.timeout,
            self.provider.enroll_card(record.customer_id(), card),
        )
        .await
        .map_err(|source| EnrollmentError::Card { index, source })?;

        let tokens = remote::call("issue_token", self.timeout, self.provider.issue_token(card))
            .await
            .map_err(|source| EnrollmentError::Token { index, source })?;
        if tokens.is_empty() {
            return Err(EnrollmentError::NoToken { index });
        }

        info!(
            index,
            customer_id = record.customer_id(),
            %card_id,
            tokens = tokens.len(),
            last4 = card.last4(),
            "card enrolled"
        );
        record.enroll(card_id, tokens);
        Ok(())
    }

    /// Enrolls every record, stopping at the first failure.
    ///
    /// In parallel mode every enrollment runs to completion and the failure
    /// with the lowest index is reported.
    pub async fn enroll_cohort(
        &self,
        records: &mut [CustomerRecord],
        card: &CardDetails,
        parallel: bool,
    ) -> Result<(), EnrollmentError> {
        if parallel {
            let results = join_all(
                records
                    .iter_mut()
                    .enumerate()
                    .map(|(index, record)| self.enroll(index, record, card)),
            )
            .await;
            return results.into_iter().collect();
        }

        for (index, record) in records.iter_mut().enumerate() {
            self.enroll(index, record, card).await?;
        }
        Ok(())
    }
}
