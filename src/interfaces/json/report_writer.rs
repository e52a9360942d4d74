use crate::application::orchestrator::{RunOutcome, SagaReport, SagaState};
use crate::application::settlement::SettlementReport;
use crate::domain::customer::CustomerRecord;
use crate::domain::policy::Selection;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ReportView<'a> {
    outcome: SagaState,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted_at: Option<SagaState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    history: &'a [SagaState],
    customers: &'a [CustomerRecord],
    selection: Option<&'a Selection>,
    settlement: Option<&'a SettlementReport>,
}

impl<'a> From<&'a SagaReport> for ReportView<'a> {
    fn from(report: &'a SagaReport) -> Self {
        let (outcome, aborted_at, error) = match &report.outcome {
            RunOutcome::Done => (SagaState::Done, None, None),
            RunOutcome::Aborted { stage, error } => {
                (SagaState::Aborted, Some(*stage), Some(error.to_string()))
            }
        };
        Self {
            outcome,
            aborted_at,
            error,
            history: &report.history,
            customers: &report.customers,
            selection: report.selection.as_ref(),
            settlement: report.settlement.as_ref(),
        }
    }
}

/// Writes saga reports as pretty-printed JSON.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    /// Wraps `writer`. Nothing is written until [`ReportWriter::write_report`].
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes `report` as one pretty-printed JSON document followed by a newline.
    pub fn write_report(&mut self, report: &SagaReport) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, &ReportView::from(report))?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistrationError, SagaError};

    fn render(report: &SagaReport) -> serde_json::Value {
        let mut buffer = Vec::new();
        ReportWriter::new(&mut buffer).write_report(report).unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    #[test]
    fn test_aborted_report_names_stage_and_error() {
        let report = SagaReport {
            outcome: RunOutcome::Aborted {
                stage: SagaState::Registering,
                error: SagaError::from(RegistrationError::Incomplete {
                    registered: 1,
                    expected: 3,
                }),
            },
            history: vec![SagaState::Registering, SagaState::Aborted],
            customers: vec![CustomerRecord::new("customer-1")],
            selection: None,
            settlement: None,
        };

        let json = render(&report);
        assert_eq!(json["outcome"], "ABORTED");
        assert_eq!(json["aborted_at"], "REGISTERING");
        assert_eq!(json["error"], "only 1 of 3 customers registered");
        assert_eq!(json["customers"][0]["customer_id"], "customer-1");
        assert!(json["selection"].is_null());
    }

    #[test]
    fn test_done_report_omits_error_fields() {
        let report = SagaReport {
            outcome: RunOutcome::Done,
            history: vec![SagaState::Done],
            customers: Vec::new(),
            selection: Some(Selection::partition(&[0], 1).unwrap()),
            settlement: Some(SettlementReport::default()),
        };

        let json = render(&report);
        assert_eq!(json["outcome"], "DONE");
        assert!(json.get("error").is_none());
        assert!(json.get("aborted_at").is_none());
        assert_eq!(json["selection"]["winners"][0], 0);
    }
}
