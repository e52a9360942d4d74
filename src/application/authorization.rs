use super::remote;
use crate::domain::customer::{CustomerRecord, PaymentStatus};
use crate::domain::order::{AuthorizeRequest, Order, OrderParams, PayType, PaymentMethod};
use crate::domain::ports::ProviderBox;
use crate::error::AuthorizationError;
use futures::future::join_all;
use std::time::Duration;
use tracing::{info, warn};

/// Creates one pending order per customer and authorizes each against the
/// customer's first token.
pub struct OrderAuthorizationStep {
    provider: ProviderBox,
    timeout: Duration,
    params: OrderParams,
    method: PaymentMethod,
    pay_times: Option<String>,
}

impl OrderAuthorizationStep {
    /// # Arguments
    ///
    /// * `provider` - The provider orders are created and authorized with.
    /// * `timeout` - Limit for each order or authorization call.
    /// * `params` - Body shared by every order in the cohort.
    /// * `method` - Lump sum or installments.
    /// * `pay_times` - Installment count, sent only when set.
    pub fn new(
        provider: ProviderBox,
        timeout: Duration,
        params: OrderParams,
        method: PaymentMethod,
        pay_times: Option<String>,
    ) -> Self {
        Self {
            provider,
            timeout,
            params,
            method,
            pay_times,
        }
    }

    /// Creates up to `count` pending orders, stopping at the first failed call.
    pub async fn create_orders(&self, count: usize) -> Vec<Order> {
        let mut orders = Vec::with_capacity(count);
        for _ in 0..count {
            match remote::call(
                "create_order",
                self.timeout,
                self.provider.create_order(&self.params),
            )
            .await
            {
                Ok(order) => orders.push(order),
                Err(e) => {
                    warn!(created = orders.len(), error = %e, "order creation stopped");
                    break;
                }
            }
        }
        orders
    }

    /// Authorizes one customer whose order is already attached.
    ///
    /// The record's status reflects the attempt either way: the provider's
    /// status on a reply, `FAILED` on a transport error.
    pub async fn authorize(
        &self,
        index: usize,
        record: &mut CustomerRecord,
    ) -> Result<(), AuthorizationError> {
        let (Some(order_id), Some(access_id), Some(token)) =
            (&record.order_id, &record.access_id, record.first_token())
        else {
            return Err(AuthorizationError::NotEnrolled { index });
        };
        let request = AuthorizeRequest {
            id: order_id.clone(),
            pay_type: PayType::Card,
            access_id: access_id.clone(),
            token: token.token.clone(),
            method: self.method,
            pay_times: self.pay_times.clone(),
        };

        let reply = remote::call("authorize", self.timeout, self.provider.authorize(&request)).await;
        let status = match reply {
            Ok(status) => status,
            Err(source) => {
                record.status = Some(PaymentStatus::Failed);
                return Err(AuthorizationError::Provider { index, source });
            }
        };

        let parsed = PaymentStatus::from_provider(&status);
        record.status = Some(parsed);
        if parsed != PaymentStatus::Authorized {
            return Err(AuthorizationError::Declined { index, status });
        }
        info!(index, order_id = %request.id, "payment authorized");
        Ok(())
    }

    /// Runs the whole step over a cohort of enrolled customers.
    pub async fn run(
        &self,
        records: &mut [CustomerRecord],
        parallel: bool,
    ) -> Result<(), AuthorizationError> {
        if let Some(index) = records.iter().position(|r| !r.is_enrolled()) {
            return Err(AuthorizationError::NotEnrolled { index });
        }

        let orders = self.create_orders(records.len()).await;
        if orders.len() != records.len() {
            return Err(AuthorizationError::OrderCount {
                expected: records.len(),
                created: orders.len(),
            });
        }
        for (record, order) in records.iter_mut().zip(orders) {
            record.attach_order(order);
        }

        if parallel {
            let results = join_all(
                records
                    .iter_mut()
                    .enumerate()
                    .map(|(index, record)| self.authorize(index, record)),
            )
            .await;
            return results.into_iter().collect();
        }

        for (index, record) in records.iter_mut().enumerate() {
            self.authorize(index, record).await?;
        }
        Ok(())
    }
}
