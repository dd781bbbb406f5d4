//! Batch result and reporting
//!
//! A [`BatchResult`] lists every recipient of the run in input order with
//! its final outcome.

use super::job::JobOutcome;
use crate::domain::{InvoiceId, JobError};
use std::fmt::Write as _;
use std::time::Duration;

/// Outcome of one recipient
#[derive(Debug, Clone)]
pub struct RecipientReport {
    /// Position in the recipient list
    pub ordinal: usize,

    /// Recipient display name, as read from the name column
    pub name: String,

    /// Recipient address
    pub email: String,

    pub invoice_id: InvoiceId,

    pub outcome: JobOutcome,
}

/// Result of one invoice run
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// One report per recipient, in input order
    pub reports: Vec<RecipientReport>,

    /// Duration of the run
    pub duration: Duration,

    /// Set when cancellation stopped the run early
    pub interrupted: bool,

    /// Credential failure that stopped the run after in-flight jobs settled
    pub auth_failure: Option<String>,
}

impl BatchResult {
    /// Result of a run over zero recipients
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn delivered(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Cancelled))
            .count()
    }

    /// True when every recipient was delivered
    pub fn is_successful(&self) -> bool {
        self.delivered() == self.total() && self.auth_failure.is_none()
    }

    /// Failure causes in input order
    pub fn failures(&self) -> impl Iterator<Item = (&RecipientReport, &JobError)> {
        self.reports.iter().filter_map(|report| match &report.outcome {
            JobOutcome::FailedAt { cause, .. } => Some((report, cause)),
            _ => None,
        })
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total(),
            delivered = self.delivered(),
            failed = self.failed(),
            cancelled = self.cancelled(),
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            "Invoice run completed"
        );

        for (report, cause) in self.failures() {
            tracing::warn!(
                ordinal = report.ordinal,
                invoice_id = %report.invoice_id,
                recipient = %report.name,
                document_id = report.outcome.document().map(|d| d.as_str()).unwrap_or("-"),
                cause = %cause,
                "Recipient not delivered"
            );
        }

        if let Some(reason) = &self.auth_failure {
            tracing::error!(reason = %reason, "Run stopped by credential failure");
        }
    }

    /// Human-readable per-recipient table for the terminal
    pub fn render(&self) -> String {
        let mut out = String::new();
        for report in &self.reports {
            let status = match &report.outcome {
                JobOutcome::Delivered { receipt, .. } => {
                    format!("delivered (message {})", receipt.message_id)
                }
                JobOutcome::FailedAt {
                    stage,
                    cause,
                    document,
                } => match document {
                    Some(document) => format!("failed at {stage}: {cause} [document {document}]"),
                    None => format!("failed at {stage}: {cause}"),
                },
                JobOutcome::Cancelled => "cancelled".to_string(),
            };
            let _ = writeln!(
                out,
                "  {:>3}  {:<24} {:<32} {}",
                report.ordinal, report.invoice_id, report.email, status
            );
        }
        let _ = writeln!(
            out,
            "  {} delivered, {} failed, {} cancelled of {}",
            self.delivered(),
            self.failed(),
            self.cancelled(),
            self.total()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::invoice::job::JobStage;
    use crate::domain::{DispatchReceipt, DocumentId, InvoiceIdScheme, Period};
    use chrono::Utc;

    fn report(ordinal: usize, outcome: JobOutcome) -> RecipientReport {
        let period = Period::new("2025-01").unwrap();
        RecipientReport {
            ordinal,
            name: format!("R{ordinal}"),
            email: format!("r{ordinal}@x.com"),
            invoice_id: InvoiceIdScheme::Ordinal.derive("INV", &period, ordinal, Utc::now()),
            outcome,
        }
    }

    fn delivered() -> JobOutcome {
        JobOutcome::Delivered {
            document: DocumentId::new("doc").unwrap(),
            receipt: DispatchReceipt {
                message_id: "m1".into(),
            },
        }
    }

    #[test]
    fn test_counts() {
        let result = BatchResult {
            reports: vec![
                report(0, delivered()),
                report(
                    1,
                    JobOutcome::FailedAt {
                        stage: JobStage::Exported,
                        cause: JobError::NotFound("doc".into()),
                        document: Some(DocumentId::new("doc-1").unwrap()),
                    },
                ),
                report(2, JobOutcome::Cancelled),
            ],
            ..BatchResult::default()
        };

        assert_eq!(result.total(), 3);
        assert_eq!(result.delivered(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.cancelled(), 1);
        assert!(!result.is_successful());
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn test_empty_run_is_successful() {
        assert!(BatchResult::empty().is_successful());
        assert_eq!(BatchResult::empty().total(), 0);
    }

    #[test]
    fn test_render_names_document_of_failed_job() {
        let result = BatchResult {
            reports: vec![report(
                0,
                JobOutcome::FailedAt {
                    stage: JobStage::Delivered,
                    cause: JobError::DispatchFailure("rejected".into()),
                    document: Some(DocumentId::new("doc-9").unwrap()),
                },
            )],
            ..BatchResult::default()
        };
        let rendered = result.render();
        assert!(rendered.contains("failed at Delivered"));
        assert!(rendered.contains("doc-9"));
        assert!(rendered.contains("0 delivered, 1 failed, 0 cancelled of 1"));
    }
}
