use crate::domain::order::{OrderParams, PaymentMethod};
use crate::error::{Result, SagaError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Credentials for one provider session.
///
/// The public key authenticates client-side calls (card enrollment, token
/// issuing, authorization); the private key authenticates server-side calls.
#[derive(Clone, PartialEq)]
pub struct SessionContext {
    public_key: String,
    private_key: String,
}

impl SessionContext {
    /// Builds a session from trimmed keys. Both must be non-empty.
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Result<Self> {
        let public_key = public_key.into().trim().to_string();
        let private_key = private_key.into().trim().to_string();
        if public_key.is_empty() || private_key.is_empty() {
            return Err(SagaError::Config(
                "both a public and a private key are required".to_string(),
            ));
        }
        Ok(Self {
            public_key,
            private_key,
        })
    }

    /// Parses `public,private`. A leading `#` is ignored.
    pub fn from_key_pair(pair: &str) -> Result<Self> {
        let pair = pair.strip_prefix('#').unwrap_or(pair);
        match pair.split_once(',') {
            Some((public_key, private_key)) => Self::new(public_key, private_key),
            None => Err(SagaError::Config(
                "key pair must be given as `public,private`".to_string(),
            )),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Tunables for one saga run. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SagaConfig {
    pub cohort_size: usize,
    pub call_timeout_ms: u64,
    pub order: OrderParams,
    pub method: PaymentMethod,
    pub pay_times: Option<String>,
    pub parallel: bool,
    pub cancel_retries: u32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            cohort_size: 3,
            call_timeout_ms: 10_000,
            order: OrderParams::default(),
            method: PaymentMethod::Lump,
            pay_times: None,
            parallel: false,
            cancel_retries: 1,
        }
    }
}

impl SagaConfig {
    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        let config: SagaConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the config file at `path`, see [`SagaConfig::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    /// Rejects an empty cohort, a zero timeout and invalid order parameters.
    pub fn validate(&self) -> Result<()> {
        if self.cohort_size == 0 {
            return Err(SagaError::Config(
                "cohort_size must be at least 1".to_string(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(SagaError::Config(
                "call_timeout_ms must be positive".to_string(),
            ));
        }
        self.order.validate()
    }

    /// Limit applied to every remote call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}
