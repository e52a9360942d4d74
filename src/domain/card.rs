use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw card input, validated on construction.
#[derive(Clone, PartialEq)]
pub struct CardDetails {
    card_no: String,
    expire: String,
    holder_name: Option<String>,
    security_code: Option<String>,
}

impl CardDetails {
    /// `expire` is `yymm`.
    pub fn new(
        card_no: impl Into<String>,
        expire: impl Into<String>,
        holder_name: Option<String>,
        security_code: Option<String>,
    ) -> Result<Self> {
        let card_no: String = card_no.into().chars().filter(|c| *c != ' ').collect();
        let expire = expire.into();

        if !(12..=19).contains(&card_no.len()) || !all_digits(&card_no) {
            return Err(SagaError::Validation(
                "card number must be 12 to 19 digits".to_string(),
            ));
        }
        if expire.len() != 4 || !all_digits(&expire) {
            return Err(SagaError::Validation(
                "expiry must be four digits in yymm form".to_string(),
            ));
        }
        let month: u8 = expire[2..].parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return Err(SagaError::Validation(format!(
                "expiry month `{}` is out of range",
                &expire[2..]
            )));
        }
        if let Some(code) = &security_code
            && (!(3..=4).contains(&code.len()) || !all_digits(code))
        {
            return Err(SagaError::Validation(
                "security code must be 3 or 4 digits".to_string(),
            ));
        }

        Ok(Self {
            card_no,
            expire,
            holder_name: holder_name.filter(|name| !name.trim().is_empty()),
            security_code,
        })
    }

    pub fn card_no(&self) -> &str {
        &self.card_no
    }

    pub fn expire(&self) -> &str {
        &self.expire
    }

    pub fn holder_name(&self) -> Option<&str> {
        self.holder_name.as_deref()
    }

    pub fn security_code(&self) -> Option<&str> {
        self.security_code.as_deref()
    }

    /// Last four digits, for logs.
    pub fn last4(&self) -> &str {
        &self.card_no[self.card_no.len() - 4..]
    }

    /// Request body for registering this card to a customer as its default card.
    pub fn enrollment_request(&self, customer_id: &str) -> CardRequest {
        CardRequest {
            customer_id: customer_id.to_string(),
            default_flag: "1".to_string(),
            card_no: self.card_no.clone(),
            expire: self.expire.clone(),
            holder_name: self.holder_name.clone(),
            security_code: self.security_code.clone(),
        }
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_no", &format_args!("****{}", self.last4()))
            .field("expire", &self.expire)
            .field("holder_name", &self.holder_name)
            .field("security_code", &self.security_code.as_ref().map(|_| "***"))
            .finish()
    }
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Card registration body as sent to the provider.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CardRequest {
    pub customer_id: String,
    pub default_flag: String,
    pub card_no: String,
    pub expire: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_code: Option<String>,
}

/// Data captured by the payment form, in the form's own field names.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CardForm {
    pub card_no: Option<String>,
    #[serde(rename = "CVC")]
    pub cvc: Option<String>,
    pub expire: Option<String>,
    pub holder_name: Option<String>,
    pub pay_times: Option<String>,
    pub method: Option<String>,
}

impl TryFrom<CardForm> for CardDetails {
    type Error = SagaError;

    fn try_from(form: CardForm) -> Result<Self> {
        let card_no = form
            .card_no
            .ok_or_else(|| SagaError::Validation("card form is missing cardNo".to_string()))?;
        let expire = form
            .expire
            .ok_or_else(|| SagaError::Validation("card form is missing expire".to_string()))?;
        CardDetails::new(card_no, expire, form.holder_name, form.cvc)
    }
}

/// Provider-issued reference to card details.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PaymentToken {
    pub token: String,
}

impl PaymentToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}
