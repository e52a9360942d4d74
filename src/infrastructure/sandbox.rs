use crate::config::SessionContext;
use crate::domain::card::{CardDetails, PaymentToken};
use crate::domain::customer::{CustomerProfile, PaymentStatus};
use crate::domain::order::{AuthorizeRequest, Order, OrderParams, SettleRequest};
use crate::domain::ports::PaymentProvider;
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Provider operations, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterCustomer,
    EnrollCard,
    IssueToken,
    CreateOrder,
    Authorize,
    Capture,
    Cancel,
}

/// One call received by the sandbox, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub operation: Operation,
    /// Customer or order the call addressed, when it names one.
    pub target: Option<String>,
}

/// Faults the sandbox injects. Call indices count calls of that one
/// operation, starting at 0.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Registrations beyond this many are rejected.
    pub registration_limit: Option<usize>,
    /// Every registration after the first answers with the first customer's id.
    pub reuse_customer_id: bool,
    /// This card enrollment call fails with a connection error.
    pub fail_enrollment_call: Option<usize>,
    /// Token issuing succeeds but returns no tokens.
    pub empty_token_lists: bool,
    /// Orders beyond this many are rejected.
    pub order_limit: Option<usize>,
    /// This authorization call answers `FAILED`.
    pub decline_authorization_call: Option<usize>,
    /// Every capture is rejected.
    pub reject_captures: bool,
    /// The first this-many cancel calls fail with a connection error.
    pub failing_cancels: usize,
    /// Delay added to every call.
    pub latency: Option<Duration>,
}

#[derive(Debug)]
struct SandboxOrder {
    access_id: String,
    status: PaymentStatus,
}

/// A stored card. Only the last four digits and the expiry are kept.
#[derive(Debug)]
struct SandboxCard {
    customer_id: String,
    fingerprint: String,
}

fn fingerprint(card: &CardDetails) -> String {
    format!("{}/{}", card.last4(), card.expire())
}

#[derive(Debug, Default)]
struct SandboxState {
    customers: HashMap<String, CustomerProfile>,
    first_customer: Option<String>,
    /// card id -> stored card
    cards: HashMap<String, SandboxCard>,
    /// token -> card id
    tokens: HashMap<String, String>,
    orders: HashMap<String, SandboxOrder>,
    calls: Vec<CallRecord>,
}

enum KeySide {
    Public,
    Private,
}

/// In-memory stand-in for the payment provider.
///
/// Enforces the provider's order lifecycle (`UNPROCESSED` to `AUTHORIZED` to
/// `CAPTURED` or `CANCELED`), checks access ids and tokens, and accepts test
/// mode keys only (`p_test` public, `m_test` private prefixes). Clones share
/// state.
#[derive(Clone)]
pub struct SandboxProvider {
    state: Arc<RwLock<SandboxState>>,
    faults: Arc<FaultPlan>,
    public_key: String,
    private_key: String,
}

impl SandboxProvider {
    /// Opens an empty sandbox that authenticates with `session`'s keys.
    pub fn connect(session: &SessionContext) -> Self {
        Self {
            state: Arc::default(),
            faults: Arc::new(FaultPlan::default()),
            public_key: session.public_key().to_string(),
            private_key: session.private_key().to_string(),
        }
    }

    /// Replaces the fault plan. Clones made earlier keep the old plan.
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = Arc::new(faults);
        self
    }

    /// Registers a customer directly, bypassing the call log and faults.
    pub async fn seed_customer(&self, id: &str) -> String {
        let mut profile = CustomerProfile::placeholder();
        profile.id = id.to_string();
        let mut state = self.state.write().await;
        state.customers.insert(profile.id.clone(), profile);
        id.to_string()
    }

    /// Every call received so far, oldest first.
    pub async fn calls(&self) -> Vec<CallRecord> {
        self.state.read().await.calls.clone()
    }

    /// Number of calls received for `operation`.
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Current lifecycle status of an order, or `None` if it was never created.
    pub async fn order_status(&self, order_id: &str) -> Option<PaymentStatus> {
        self.state
            .read()
            .await
            .orders
            .get(order_id)
            .map(|o| o.status)
    }

    fn check_key(&self, side: KeySide) -> ProviderResult<()> {
        let (key, prefix) = match side {
            KeySide::Public => (&self.public_key, "p_test"),
            KeySide::Private => (&self.private_key, "m_test"),
        };
        if key.starts_with(prefix) {
            Ok(())
        } else {
            Err(ProviderError::Unauthorized(format!(
                "sandbox only accepts `{prefix}` keys"
            )))
        }
    }

    /// Logs the call, applies latency, and returns how many calls of this
    /// operation came before it.
    async fn begin(&self, operation: Operation, target: Option<&str>) -> usize {
        let nth = {
            let mut state = self.state.write().await;
            let nth = state
                .calls
                .iter()
                .filter(|c| c.operation == operation)
                .count();
            state.calls.push(CallRecord {
                operation,
                target: target.map(str::to_string),
            });
            nth
        };
        if let Some(latency) = self.faults.latency {
            tokio::time::sleep(latency).await;
        }
        nth
    }

    fn settle_target<'a>(
        state: &'a mut SandboxState,
        order_id: &str,
        request: &SettleRequest,
    ) -> ProviderResult<&'a mut SandboxOrder> {
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| not_found("order", order_id))?;
        if order.access_id != request.access_id {
            return Err(rejected(403, "access id does not match order"));
        }
        Ok(order)
    }
}

fn not_found(kind: &'static str, id: &str) -> ProviderError {
    ProviderError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn rejected(status: u16, message: impl Into<String>) -> ProviderError {
    ProviderError::Rejected {
        status,
        message: message.into(),
    }
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
    async fn register_customer(&self, profile: &CustomerProfile) -> ProviderResult<String> {
        let nth = self
            .begin(Operation::RegisterCustomer, Some(profile.id.as_str()))
            .await;
        self.check_key(KeySide::Private)?;
        if self.faults.registration_limit.is_some_and(|limit| nth >= limit) {
            return Err(rejected(400, "customer registration limit reached"));
        }

        let mut state = self.state.write().await;
        if self.faults.reuse_customer_id
            && let Some(first) = &state.first_customer
        {
            return Ok(first.clone());
        }
        if state.customers.contains_key(&profile.id) {
            return Err(rejected(409, format!("customer `{}` already exists", profile.id)));
        }
        state.customers.insert(profile.id.clone(), profile.clone());
        state.first_customer.get_or_insert_with(|| profile.id.clone());
        Ok(profile.id.clone())
    }

    async fn enroll_card(&self, customer_id: &str, card: &CardDetails) -> ProviderResult<String> {
        let nth = self.begin(Operation::EnrollCard, Some(customer_id)).await;
        self.check_key(KeySide::Public)?;
        if self.faults.fail_enrollment_call == Some(nth) {
            return Err(ProviderError::Transport("connection error".to_string()));
        }

        let request = card.enrollment_request(customer_id);
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&request.customer_id) {
            return Err(not_found("customer", customer_id));
        }
        let card_id = new_id("cs");
        state.cards.insert(
            card_id.clone(),
            SandboxCard {
                customer_id: request.customer_id,
                fingerprint: fingerprint(card),
            },
        );
        Ok(card_id)
    }

    async fn issue_token(&self, card: &CardDetails) -> ProviderResult<Vec<PaymentToken>> {
        self.begin(Operation::IssueToken, None).await;
        self.check_key(KeySide::Public)?;
        if self.faults.empty_token_lists {
            return Ok(Vec::new());
        }

        let mut state = self.state.write().await;
        let wanted = fingerprint(card);
        let card_id = state
            .cards
            .iter()
            .find(|(_, stored)| stored.fingerprint == wanted)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| not_found("card", &format!("****{}", card.last4())))?;
        let token = new_id("tok");
        state.tokens.insert(token.clone(), card_id);
        Ok(vec![PaymentToken::new(token)])
    }

    async fn create_order(&self, params: &OrderParams) -> ProviderResult<Order> {
        self.begin(Operation::CreateOrder, None).await;
        self.check_key(KeySide::Private)?;
        if params.amount <= rust_decimal::Decimal::ZERO {
            return Err(rejected(400, "amount must be positive"));
        }

        let mut state = self.state.write().await;
        if self
            .faults
            .order_limit
            .is_some_and(|limit| state.orders.len() >= limit)
        {
            return Err(rejected(400, "order limit reached"));
        }
        let order = Order {
            id: new_id("o"),
            access_id: new_id("a"),
        };
        state.orders.insert(
            order.id.clone(),
            SandboxOrder {
                access_id: order.access_id.clone(),
                status: PaymentStatus::Pending,
            },
        );
        Ok(order)
    }

    async fn authorize(&self, request: &AuthorizeRequest) -> ProviderResult<String> {
        let nth = self.begin(Operation::Authorize, Some(request.id.as_str())).await;
        self.check_key(KeySide::Public)?;

        let mut state = self.state.write().await;
        let card = state
            .tokens
            .get(&request.token)
            .and_then(|card_id| state.cards.get(card_id))
            .ok_or_else(|| not_found("token", &request.token))?;
        if !state.customers.contains_key(&card.customer_id) {
            return Err(not_found("customer", &card.customer_id));
        }
        let order = state
            .orders
            .get_mut(&request.id)
            .ok_or_else(|| not_found("order", &request.id))?;
        if order.access_id != request.access_id {
            return Err(rejected(403, "access id does not match order"));
        }
        if order.status != PaymentStatus::Pending {
            return Err(rejected(
                409,
                format!("order is already {}", order.status.as_str()),
            ));
        }
        order.status = if self.faults.decline_authorization_call == Some(nth) {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Authorized
        };
        Ok(order.status.as_str().to_string())
    }

    async fn capture(&self, order_id: &str, request: &SettleRequest) -> ProviderResult<String> {
        self.begin(Operation::Capture, Some(order_id)).await;
        self.check_key(KeySide::Private)?;
        if self.faults.reject_captures {
            return Err(rejected(402, "capture declined"));
        }

        let mut state = self.state.write().await;
        let order = Self::settle_target(&mut state, order_id, request)?;
        if order.status != PaymentStatus::Authorized {
            return Err(rejected(
                409,
                format!("cannot capture a {} order", order.status.as_str()),
            ));
        }
        order.status = PaymentStatus::Captured;
        Ok(order.status.as_str().to_string())
    }

    async fn cancel(&self, order_id: &str, request: &SettleRequest) -> ProviderResult<String> {
        let nth = self.begin(Operation::Cancel, Some(order_id)).await;
        self.check_key(KeySide::Private)?;
        if nth < self.faults.failing_cancels {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }

        let mut state = self.state.write().await;
        let order = Self::settle_target(&mut state, order_id, request)?;
        match order.status {
            PaymentStatus::Authorized | PaymentStatus::Canceled => {
                order.status = PaymentStatus::Canceled;
                Ok(order.status.as_str().to_string())
            }
            other => Err(rejected(
                409,
                format!("cannot cancel a {} order", other.as_str()),
            )),
        }
    }
}
