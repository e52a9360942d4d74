use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single remote call to the payment provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("connection error: {0}")]
    Transport(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("unknown {kind} `{id}`")]
    NotFound { kind: &'static str, id: String },
    #[error("credentials rejected: {0}")]
    Unauthorized(String),
}

/// Result of one provider call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("registering customer {index} failed: {source}")]
    Provider {
        index: usize,
        #[source]
        source: ProviderError,
    },
    #[error("only {registered} of {expected} customers registered")]
    Incomplete { registered: usize, expected: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrollmentError {
    #[error("registering card for customer {index} failed: {source}")]
    Card {
        index: usize,
        #[source]
        source: ProviderError,
    },
    #[error("issuing token for customer {index} failed: {source}")]
    Token {
        index: usize,
        #[source]
        source: ProviderError,
    },
    #[error("provider issued no token for customer {index}")]
    NoToken { index: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthorizationError {
    #[error("customer {index} has no enrolled card or token")]
    NotEnrolled { index: usize },
    #[error("created {created} orders for {expected} customers")]
    OrderCount { expected: usize, created: usize },
    #[error("authorizing customer {index} failed: {source}")]
    Provider {
        index: usize,
        #[source]
        source: ProviderError,
    },
    #[error("customer {index} was not authorized (status `{status}`)")]
    Declined { index: usize, status: String },
}

/// The two halves of settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementBatch {
    Capture,
    Cancel,
}

impl fmt::Display for SettlementBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementBatch::Capture => f.write_str("capture"),
            SettlementBatch::Cancel => f.write_str("cancel"),
        }
    }
}

/// A customer left unsettled, with the provider's raw status or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementFailure {
    pub index: usize,
    pub detail: String,
}

impl fmt::Display for SettlementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "customer {}: {}", self.index, self.detail)
    }
}

fn list(failures: &[SettlementFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    #[error("customer {index} is not in a settleable state")]
    NotSettleable { index: usize },
    #[error("{batch} batch failed ({})", list(.failures))]
    Batch {
        batch: SettlementBatch,
        failures: Vec<SettlementFailure>,
    },
    #[error("capture batch failed ({}) and cancel batch failed ({})", list(.capture), list(.cancel))]
    BothBatches {
        capture: Vec<SettlementFailure>,
        cancel: Vec<SettlementFailure>,
    },
}

impl SettlementError {
    /// Indices of every customer the error names.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            SettlementError::NotSettleable { index } => vec![*index],
            SettlementError::Batch { failures, .. } => failures.iter().map(|f| f.index).collect(),
            SettlementError::BothBatches { capture, cancel } => {
                capture.iter().chain(cancel).map(|f| f.index).collect()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum SagaError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("Selection error: {0}")]
    Selection(String),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result.
pub type Result<T> = std::result::Result<T, SagaError>;
