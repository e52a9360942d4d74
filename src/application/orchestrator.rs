use super::authorization::OrderAuthorizationStep;
use super::enrollment::CardEnrollmentStep;
use super::remote;
use super::settlement::{SettlementReport, SettlementStep};
use crate::config::{SagaConfig, SessionContext};
use crate::domain::card::CardDetails;
use crate::domain::customer::{CustomerProfile, CustomerRecord, PaymentStatus};
use crate::domain::policy::{FirstWins, Selection, SelectionPolicy};
use crate::domain::ports::ProviderBox;
use crate::error::{RegistrationError, Result, SagaError};
use serde::Serialize;
use std::fmt;
use tracing::{error, info, info_span, Instrument};

/// Stages of a saga run. No stage is ever revisited.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    Registering,
    EnrollingCards,
    Authorizing,
    Selecting,
    Settling,
    Done,
    Aborted,
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaState::Registering => "REGISTERING",
            SagaState::EnrollingCards => "ENROLLING_CARDS",
            SagaState::Authorizing => "AUTHORIZING",
            SagaState::Selecting => "SELECTING",
            SagaState::Settling => "SETTLING",
            SagaState::Done => "DONE",
            SagaState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Done,
    /// `stage` is the stage that was running when the error occurred.
    Aborted { stage: SagaState, error: SagaError },
}

/// Everything a finished run leaves behind, whether it completed or aborted.
#[derive(Debug)]
pub struct SagaReport {
    pub outcome: RunOutcome,
    pub history: Vec<SagaState>,
    pub customers: Vec<CustomerRecord>,
    pub selection: Option<Selection>,
    pub settlement: Option<SettlementReport>,
}

impl SagaReport {
    /// True when every stage completed.
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RunOutcome::Done)
    }

    /// The stage that failed, if the run aborted.
    pub fn aborted_stage(&self) -> Option<SagaState> {
        match &self.outcome {
            RunOutcome::Aborted { stage, .. } => Some(*stage),
            RunOutcome::Done => None,
        }
    }

    /// The error that aborted the run.
    pub fn error(&self) -> Option<&SagaError> {
        match &self.outcome {
            RunOutcome::Aborted { error, .. } => Some(error),
            RunOutcome::Done => None,
        }
    }

    /// Either [`SagaState::Done`] or [`SagaState::Aborted`].
    pub fn final_state(&self) -> SagaState {
        self.history.last().copied().unwrap_or(SagaState::Registering)
    }

    /// Payment status of each customer, in cohort order.
    pub fn statuses(&self) -> Vec<Option<PaymentStatus>> {
        self.customers.iter().map(|c| c.status).collect()
    }
}

struct SagaRun {
    history: Vec<SagaState>,
    customers: Vec<CustomerRecord>,
    selection: Option<Selection>,
    settlement: Option<SettlementReport>,
}

impl SagaRun {
    fn enter(&mut self, state: SagaState) {
        info!(from = ?self.history.last(), to = %state, "saga transition");
        self.history.push(state);
    }

    fn current(&self) -> SagaState {
        self.history.last().copied().unwrap_or(SagaState::Registering)
    }

    fn into_report(mut self, outcome: RunOutcome) -> SagaReport {
        let terminal = match outcome {
            RunOutcome::Done => SagaState::Done,
            RunOutcome::Aborted { .. } => SagaState::Aborted,
        };
        self.enter(terminal);
        SagaReport {
            outcome,
            history: self.history,
            customers: self.customers,
            selection: self.selection,
            settlement: self.settlement,
        }
    }
}

/// Drives one cohort through registration, card enrollment, authorization,
/// winner selection and settlement.
///
/// Any stage failure aborts the whole cohort. A run is not resumable: retrying
/// means calling [`Orchestrator::run`] again with a fresh cohort.
pub struct Orchestrator {
    provider: ProviderBox,
    session: SessionContext,
    config: SagaConfig,
    policy: Box<dyn SelectionPolicy>,
}

impl Orchestrator {
    /// Creates an orchestrator that picks the first customer as the winner.
    ///
    /// # Arguments
    ///
    /// * `provider` - The payment provider every remote call goes to.
    /// * `session` - Credentials the run is logged under.
    /// * `config` - Cohort size, timeouts and order parameters. Validated here.
    pub fn new(provider: ProviderBox, session: SessionContext, config: SagaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            session,
            config,
            policy: Box::new(FirstWins),
        })
    }

    /// Replaces the winner selection policy.
    pub fn with_policy(mut self, policy: impl SelectionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Runs one saga to `DONE` or `ABORTED`.
    ///
    /// Never returns an error: a failing stage is recorded in the report
    /// together with everything the cohort reached before it.
    ///
    /// # Arguments
    ///
    /// * `card` - The card enrolled for every customer in the cohort.
    pub async fn run(&self, card: &CardDetails) -> SagaReport {
        let span = info_span!(
            "saga",
            public_key = self.session.public_key(),
            cohort = self.config.cohort_size,
            policy = self.policy.name()
        );
        async {
            let mut run = SagaRun {
                history: Vec::new(),
                customers: Vec::new(),
                selection: None,
                settlement: None,
            };
            match self.drive(&mut run, card).await {
                Ok(()) => {
                    info!("all operations successful");
                    run.into_report(RunOutcome::Done)
                }
                Err(e) => {
                    let stage = run.current();
                    error!(%stage, error = %e, "saga aborted");
                    run.into_report(RunOutcome::Aborted { stage, error: e })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, run: &mut SagaRun, card: &CardDetails) -> Result<()> {
        let timeout = self.config.call_timeout();

        run.enter(SagaState::Registering);
        self.register(&mut run.customers).await?;

        run.enter(SagaState::EnrollingCards);
        CardEnrollmentStep::new(self.provider.clone(), timeout)
            .enroll_cohort(&mut run.customers, card, self.config.parallel)
            .await?;

        run.enter(SagaState::Authorizing);
        OrderAuthorizationStep::new(
            self.provider.clone(),
            timeout,
            self.config.order.clone(),
            self.config.method,
            self.config.pay_times.clone(),
        )
        .run(&mut run.customers, self.config.parallel)
        .await?;

        run.enter(SagaState::Selecting);
        let selection = Selection::apply(self.policy.as_ref(), &run.customers)?;
        info!(winners = ?selection.winners, losers = ?selection.losers, "winners selected");
        run.selection = Some(selection.clone());

        run.enter(SagaState::Settling);
        let report = SettlementStep::new(self.provider.clone(), timeout, self.config.cancel_retries)
            .settle(&mut run.customers, &selection)
            .await?;
        let checked = report.check();
        run.settlement = Some(report);
        checked?;
        Ok(())
    }

    /// Registers `cohort_size` customers, one at a time.
    async fn register(&self, customers: &mut Vec<CustomerRecord>) -> Result<()> {
        let expected = self.config.cohort_size;
        for index in 0..expected {
            let profile = CustomerProfile::placeholder();
            let customer_id = remote::call(
                "register_customer",
                self.config.call_timeout(),
                self.provider.register_customer(&profile),
            )
            .await
            .map_err(|source| RegistrationError::Provider { index, source })?;

            if customers.iter().any(|c| c.customer_id() == customer_id) {
                return Err(SagaError::from(RegistrationError::Incomplete {
                    registered: customers.len(),
                    expected,
                }));
            }
            info!(index, %customer_id, "customer registered");
            customers.push(CustomerRecord::new(customer_id));
        }
        Ok(())
    }
}
