use crate::domain::card::{CardDetails, CardForm};
use crate::domain::order::PaymentMethod;
use crate::error::Result;
use std::io::Read;

/// Card details plus the payment options entered alongside them.
#[derive(Debug, Clone)]
pub struct CardInput {
    pub card: CardDetails,
    pub method: Option<PaymentMethod>,
    pub pay_times: Option<String>,
}

/// Reads payment form data (`cardNo`, `CVC`, `expire`, ...) from a JSON source.
pub struct CardReader<R: Read> {
    source: R,
}

impl<R: Read> CardReader<R> {
    /// Creates a new `CardReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Parses and validates the form.
    pub fn read(self) -> Result<CardInput> {
        let form: CardForm = serde_json::from_reader(self.source)?;
        let method = form
            .method
            .as_deref()
            .map(PaymentMethod::from_code)
            .transpose()?;
        let pay_times = form.pay_times.clone().filter(|t| !t.is_empty());
        let card = CardDetails::try_from(form)?;
        Ok(CardInput {
            card,
            method,
            pay_times,
        })
    }
}
