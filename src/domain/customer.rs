use super::card::PaymentToken;
use super::order::Order;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status of a customer's order as reported by the provider.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Captured,
    Canceled,
    Failed,
}

impl PaymentStatus {
    /// Interprets a raw provider status string.
    ///
    /// `UNPROCESSED` is an order that exists but has not been paid yet. Anything
    /// the saga does not consume is a failure.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "AUTHORIZED" => PaymentStatus::Authorized,
            "CAPTURED" => PaymentStatus::Captured,
            "CANCELED" => PaymentStatus::Canceled,
            "UNPROCESSED" => PaymentStatus::Pending,
            _ => PaymentStatus::Failed,
        }
    }

    /// Provider spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "UNPROCESSED",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Canceled => "CANCELED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

/// Profile sent to the provider when registering a customer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CustomerProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_cc: String,
    pub phone_no: String,
    pub addr_city: String,
    pub addr_country: String,
    pub addr_line_1: String,
    pub addr_line_2: String,
    pub addr_line_3: String,
    pub addr_post_code: String,
    pub addr_state: String,
}

impl CustomerProfile {
    /// Builds a throwaway profile with a fresh `customer-<uuid>` identifier.
    pub fn placeholder() -> Self {
        let id = format!("customer-{}", Uuid::new_v4());
        Self {
            email: format!("customer+{id}@localhost.localdomain"),
            id,
            name: "string".to_string(),
            phone_cc: "81".to_string(),
            phone_no: "09012341234".to_string(),
            addr_city: "Tokyo".to_string(),
            addr_country: "392".to_string(),
            addr_line_1: "Chiyoda-ku".to_string(),
            addr_line_2: "Chiyoda".to_string(),
            addr_line_3: "1-1".to_string(),
            addr_post_code: "1000001".to_string(),
            addr_state: String::new(),
        }
    }
}

/// One customer's progress through a saga run.
///
/// Created from a registered customer id and mutated in place by each step.
/// The customer id never changes after creation.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct CustomerRecord {
    customer_id: String,
    pub card_id: Option<String>,
    pub tokens: Vec<PaymentToken>,
    pub order_id: Option<String>,
    pub access_id: Option<String>,
    pub status: Option<PaymentStatus>,
}

impl CustomerRecord {
    /// A freshly registered customer with nothing enrolled.
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            card_id: None,
            tokens: Vec::new(),
            order_id: None,
            access_id: None,
            status: None,
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// Stores the card and tokens from a completed enrollment.
    pub fn enroll(&mut self, card_id: String, tokens: Vec<PaymentToken>) {
        self.card_id = Some(card_id);
        self.tokens = tokens;
    }

    /// A record may only be authorized once it has a card and a token.
    pub fn is_enrolled(&self) -> bool {
        self.card_id.is_some() && !self.tokens.is_empty()
    }

    /// Only the first issued token is used downstream.
    pub fn first_token(&self) -> Option<&PaymentToken> {
        self.tokens.first()
    }

    /// Links a created order to this customer and marks it pending.
    pub fn attach_order(&mut self, order: Order) {
        self.order_id = Some(order.id);
        self.access_id = Some(order.access_id);
        self.status = Some(PaymentStatus::Pending);
    }

    /// Order id and access id, but only when the record may be captured or canceled.
    pub fn settlement_handle(&self) -> Option<(&str, &str)> {
        match (&self.order_id, &self.access_id, self.status) {
            (Some(order_id), Some(access_id), Some(PaymentStatus::Authorized)) => {
                Some((order_id.as_str(), access_id.as_str()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            access_id: format!("a_{id}"),
        }
    }

    #[test]
    fn test_status_parsing_treats_unknown_as_failure() {
        assert_eq!(
            PaymentStatus::from_provider("AUTHORIZED"),
            PaymentStatus::Authorized
        );
        assert_eq!(PaymentStatus::from_provider("CAPTURED"), PaymentStatus::Captured);
        assert_eq!(PaymentStatus::from_provider("CANCELED"), PaymentStatus::Canceled);
        assert_eq!(PaymentStatus::from_provider("UNPROCESSED"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_provider("authorized"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_provider(""), PaymentStatus::Failed);
    }

    #[test]
    fn test_enrollment_requires_card_and_token() {
        let mut record = CustomerRecord::new("c-1");
        assert!(!record.is_enrolled());

        record.enroll("card-1".to_string(), Vec::new());
        assert!(!record.is_enrolled());

        record.enroll(
            "card-1".to_string(),
            vec![PaymentToken::new("tok-1"), PaymentToken::new("tok-2")],
        );
        assert!(record.is_enrolled());
        assert_eq!(record.first_token().unwrap().token, "tok-1");
    }

    #[test]
    fn test_settlement_handle_requires_authorization() {
        let mut record = CustomerRecord::new("c-1");
        assert!(record.settlement_handle().is_none());

        record.attach_order(order("o-1"));
        assert_eq!(record.status, Some(PaymentStatus::Pending));
        assert!(record.settlement_handle().is_none());

        record.status = Some(PaymentStatus::Authorized);
        assert_eq!(record.settlement_handle(), Some(("o-1", "a_o-1")));

        record.status = Some(PaymentStatus::Captured);
        assert!(record.settlement_handle().is_none());
    }

    #[test]
    fn test_placeholder_profiles_are_unique() {
        let a = CustomerProfile::placeholder();
        let b = CustomerProfile::placeholder();
        assert!(a.id.starts_with("customer-"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.email, format!("customer+{}@localhost.localdomain", a.id));
    }

    #[test]
    fn test_status_serializes_as_provider_spelling() {
        let json = serde_json::to_string(&PaymentStatus::Canceled).unwrap();
        assert_eq!(json, "\"CANCELED\"");
    }
}
