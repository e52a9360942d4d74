use crate::error::{Result, SagaError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum PayType {
    #[default]
    Card,
}

/// What the provider does when the order is paid.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobCode {
    /// Hold funds only; capture or cancel later.
    #[default]
    Auth,
    /// Charge immediately.
    Capture,
}

/// Lump sum or installments.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "1")]
    Lump,
    #[serde(rename = "2")]
    Installment,
}

impl PaymentMethod {
    /// Parses the payment form's method code.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "1" => Ok(PaymentMethod::Lump),
            "2" => Ok(PaymentMethod::Installment),
            other => Err(SagaError::Validation(format!(
                "unknown payment method `{other}`"
            ))),
        }
    }
}

/// Fixed fields of every pending order created for a cohort.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct OrderParams {
    #[serde(default)]
    pub pay_type: PayType,
    #[serde(default)]
    pub job_code: JobCode,
    pub amount: Decimal,
    pub tax: Decimal,
    /// Free-form merchant fields, echoed back by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_field_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_field_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_field_3: Option<String>,
    /// 3-D Secure mode code. `"0"` turns 3-D Secure off.
    #[serde(default = "default_tds_type")]
    pub tds_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub td_tenant_name: Option<String>,
    #[serde(default = "default_tds2_type")]
    pub tds2_type: String,
}

fn default_tds_type() -> String {
    "0".to_string()
}

fn default_tds2_type() -> String {
    "2".to_string()
}

impl Default for OrderParams {
    fn default() -> Self {
        Self {
            pay_type: PayType::Card,
            job_code: JobCode::Auth,
            amount: dec!(500),
            tax: dec!(550),
            client_field_1: None,
            client_field_2: None,
            client_field_3: None,
            tds_type: default_tds_type(),
            td_tenant_name: None,
            tds2_type: default_tds2_type(),
        }
    }
}

impl OrderParams {
    /// Orders must have a positive amount, a non-negative tax and `AUTH` job code.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(SagaError::Validation(
                "order amount must be positive".to_string(),
            ));
        }
        if self.tax < Decimal::ZERO {
            return Err(SagaError::Validation(
                "order tax must not be negative".to_string(),
            ));
        }
        if self.job_code != JobCode::Auth {
            return Err(SagaError::Validation(
                "orders must be created authorize-only so losers can be canceled".to_string(),
            ));
        }
        Ok(())
    }
}

/// A pending order created server-side.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Order {
    pub id: String,
    pub access_id: String,
}

/// Authorization body: pays order `id` with a card token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuthorizeRequest {
    pub id: String,
    pub pay_type: PayType,
    pub access_id: String,
    pub token: String,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_times: Option<String>,
}

/// Capture or cancel body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SettleRequest {
    pub pay_type: PayType,
    pub access_id: String,
}

impl SettleRequest {
    /// Settles a card order identified by its access id.
    pub fn card(access_id: &str) -> Self {
        Self {
            pay_type: PayType::Card,
            access_id: access_id.to_string(),
        }
    }
}
