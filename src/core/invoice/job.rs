//! Per-recipient invoice job and its stage machine

use crate::domain::{
    ComposedMessage, DispatchReceipt, DocumentId, InvoiceId, InvoicerError, JobError,
    RecipientRecord, Result, TargetLocation,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Pipeline stage of one job
///
/// Stages are totally ordered; a job only ever moves to the stage directly
/// after its current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobStage {
    Created,
    DocumentReady,
    Templated,
    Exported,
    Composed,
    Delivered,
}

impl JobStage {
    /// The stage after this one, `None` for [`JobStage::Delivered`]
    pub fn next(self) -> Option<JobStage> {
        match self {
            JobStage::Created => Some(JobStage::DocumentReady),
            JobStage::DocumentReady => Some(JobStage::Templated),
            JobStage::Templated => Some(JobStage::Exported),
            JobStage::Exported => Some(JobStage::Composed),
            JobStage::Composed => Some(JobStage::Delivered),
            JobStage::Delivered => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == JobStage::Delivered
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Created => "Created",
            JobStage::DocumentReady => "DocumentReady",
            JobStage::Templated => "Templated",
            JobStage::Exported => "Exported",
            JobStage::Composed => "Composed",
            JobStage::Delivered => "Delivered",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The message was accepted by the messaging backend
    Delivered {
        document: DocumentId,
        receipt: DispatchReceipt,
    },

    /// The job stopped while trying to reach `stage`
    ///
    /// `document` names the created copy, if one exists, for manual review.
    FailedAt {
        stage: JobStage,
        cause: JobError,
        document: Option<DocumentId>,
    },

    /// The job was never launched because the run was cancelled
    Cancelled,
}

impl JobOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, JobOutcome::Delivered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::FailedAt { .. })
    }

    /// Created document handle, whatever the outcome
    pub fn document(&self) -> Option<&DocumentId> {
        match self {
            JobOutcome::Delivered { document, .. } => Some(document),
            JobOutcome::FailedAt { document, .. } => document.as_ref(),
            JobOutcome::Cancelled => None,
        }
    }
}

/// One recipient's unit of work within a run
///
/// Lives only for the duration of the pipeline; the outcome is what
/// survives into the batch result.
#[derive(Debug)]
pub struct InvoiceJob {
    pub ordinal: usize,
    pub invoice_id: InvoiceId,
    pub recipient: Arc<RecipientRecord>,
    pub target: TargetLocation,
    stage: JobStage,
    pub document: Option<DocumentId>,
    pub artifact: Option<PathBuf>,
    pub message: Option<ComposedMessage>,
    pub receipt: Option<DispatchReceipt>,
}

impl InvoiceJob {
    pub fn new(
        ordinal: usize,
        invoice_id: InvoiceId,
        recipient: Arc<RecipientRecord>,
        target: TargetLocation,
    ) -> Self {
        Self {
            ordinal,
            invoice_id,
            recipient,
            target,
            stage: JobStage::Created,
            document: None,
            artifact: None,
            message: None,
            receipt: None,
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// The stage the job is working towards
    pub fn attempting(&self) -> JobStage {
        self.stage.next().unwrap_or(JobStage::Delivered)
    }

    /// Moves the job to `next`
    ///
    /// # Errors
    ///
    /// Rejects any transition other than to the immediate successor.
    pub fn advance(&mut self, next: JobStage) -> Result<()> {
        if self.stage.next() != Some(next) {
            return Err(InvoicerError::Other(format!(
                "Invalid job transition {} -> {} for {}",
                self.stage, next, self.invoice_id
            )));
        }
        self.stage = next;
        crate::log_job_stage!(self.ordinal, self.invoice_id, next);
        Ok(())
    }

    /// Terminal failure outcome at the stage being attempted
    pub fn fail(&self, cause: JobError) -> JobOutcome {
        JobOutcome::FailedAt {
            stage: self.attempting(),
            cause,
            document: self.document.clone(),
        }
    }

    /// Terminal success outcome
    ///
    /// # Errors
    ///
    /// Fails unless the job reached [`JobStage::Delivered`] with a document
    /// and a receipt.
    pub fn delivered(self) -> Result<JobOutcome> {
        match (self.stage, self.document, self.receipt) {
            (JobStage::Delivered, Some(document), Some(receipt)) => {
                Ok(JobOutcome::Delivered { document, receipt })
            }
            (stage, _, _) => Err(InvoicerError::Other(format!(
                "Job {} finished at {stage} without delivery",
                self.invoice_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InvoiceIdScheme, Period};
    use chrono::Utc;

    fn job() -> InvoiceJob {
        let period = Period::new("2025-01").unwrap();
        InvoiceJob::new(
            0,
            InvoiceIdScheme::Ordinal.derive("INV", &period, 0, Utc::now()),
            Arc::new(RecipientRecord::from_pairs([("Naam", "A")])),
            TargetLocation::new("folder").unwrap(),
        )
    }

    #[test]
    fn test_stages_advance_in_order() {
        let mut job = job();
        let mut stage = JobStage::Created;
        while let Some(next) = stage.next() {
            job.advance(next).unwrap();
            stage = next;
        }
        assert_eq!(job.stage(), JobStage::Delivered);
        assert!(job.stage().is_terminal());
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut job = job();
        assert!(job.advance(JobStage::Templated).is_err());
        assert_eq!(job.stage(), JobStage::Created);

        job.advance(JobStage::DocumentReady).unwrap();
        assert!(job.advance(JobStage::DocumentReady).is_err());
        assert!(job.advance(JobStage::Created).is_err());
    }

    #[test]
    fn test_failure_names_attempted_stage() {
        let mut job = job();
        job.advance(JobStage::DocumentReady).unwrap();
        job.document = Some(DocumentId::new("doc-1").unwrap());
        job.advance(JobStage::Templated).unwrap();

        let outcome = job.fail(JobError::Truncated {
            received: 10,
            reason: "closed".into(),
        });
        match &outcome {
            JobOutcome::FailedAt { stage, document, .. } => {
                assert_eq!(*stage, JobStage::Exported);
                assert_eq!(document.as_ref().map(|d| d.as_str()), Some("doc-1"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_delivered_requires_receipt() {
        let mut job = job();
        job.advance(JobStage::DocumentReady).unwrap();
        assert!(job.delivered().is_err());
    }

    #[test]
    fn test_stage_ordering() {
        assert!(JobStage::Created < JobStage::DocumentReady);
        assert!(JobStage::Composed < JobStage::Delivered);
        assert_eq!(JobStage::Exported.to_string(), "Exported");
    }
}
