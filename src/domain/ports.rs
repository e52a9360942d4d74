use super::card::{CardDetails, PaymentToken};
use super::customer::CustomerProfile;
use super::order::{AuthorizeRequest, Order, OrderParams, SettleRequest};
use crate::error::ProviderResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Remote payment provider the saga drives.
///
/// Each call is a single round trip returning the provider's reply or a
/// transport-level error. Status strings are returned raw; interpreting them
/// is the caller's job.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a customer and returns the id the provider assigned.
    async fn register_customer(&self, profile: &CustomerProfile) -> ProviderResult<String>;

    /// Registers `card` as the customer's default card and returns its card id.
    async fn enroll_card(&self, customer_id: &str, card: &CardDetails) -> ProviderResult<String>;

    /// Exchanges card details for payment tokens. The list may be empty.
    async fn issue_token(&self, card: &CardDetails) -> ProviderResult<Vec<PaymentToken>>;

    /// Creates a pending order and returns its id and access id.
    async fn create_order(&self, params: &OrderParams) -> ProviderResult<Order>;

    /// Pays a pending order with a token. Returns the raw status, `AUTHORIZED` on success.
    async fn authorize(&self, request: &AuthorizeRequest) -> ProviderResult<String>;

    /// Charges an authorized order. Returns the raw status, `CAPTURED` on success.
    async fn capture(&self, order_id: &str, request: &SettleRequest) -> ProviderResult<String>;

    /// Releases an authorized order. Returns the raw status, `CANCELED` on success.
    async fn cancel(&self, order_id: &str, request: &SettleRequest) -> ProviderResult<String>;
}

/// Shared handle to a provider, cloned into each step.
pub type ProviderBox = Arc<dyn PaymentProvider>;
