//! Invoice orchestrator - drives the per-recipient pipeline for a whole run
//!
//! A run reads the recipient list once, checks the template and the target
//! location once, then pushes every recipient through
//! copy → substitute → export → compose → dispatch on a bounded worker pool.
//! Per-recipient failures are recorded, never propagated.

use super::job::{InvoiceJob, JobOutcome, JobStage};
use super::summary::{BatchResult, RecipientReport};
use crate::adapters::traits::{Backends, DocumentBackend, MessageDispatcher, RecipientSource};
use crate::config::{InvoicerConfig, RecipientColumns, RetryConfig};
use crate::core::composer::{interpolate, MessageComposer};
use crate::core::exporter::ArtifactExporter;
use crate::core::retry::retry_transient;
use crate::core::template::TemplateEngine;
use crate::domain::{
    build_substitution_map, FieldMapping, InvoiceId, InvoiceIdScheme, InvoicerError, JobError,
    Period, RecipientRecord, RecipientTable, Result, RunValues, TargetLocation, TemplateId,
};
use crate::log_job_failure;
use chrono::{DateTime, Local, Utc};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tracing::Instrument;

/// Run-wide settings taken from the configuration
#[derive(Debug, Clone)]
pub struct InvoiceSettings {
    pub id_scheme: InvoiceIdScheme,
    pub id_prefix: String,
    pub document_name: String,
    pub export_mime_type: String,
    pub attachment_name: String,
    pub date_format: String,
    pub concurrency: usize,
    pub max_export_chunks: usize,
    pub fields: Vec<FieldMapping>,
    pub columns: RecipientColumns,
    pub subject: String,
    pub body: String,
}

impl InvoiceSettings {
    pub fn from_config(config: &InvoicerConfig) -> Self {
        let invoice = &config.invoice;
        Self {
            id_scheme: invoice.id_scheme,
            id_prefix: invoice.id_prefix.clone(),
            document_name: invoice.document_name.clone(),
            export_mime_type: invoice.export_mime_type.clone(),
            attachment_name: invoice.attachment_name.clone(),
            date_format: invoice.date_format.clone(),
            concurrency: invoice.concurrency.max(1),
            max_export_chunks: invoice.max_export_chunks,
            fields: config.field_mappings(),
            columns: config.recipients.columns.clone(),
            subject: config.message.subject.clone(),
            body: config.message.body.clone(),
        }
    }

    /// Columns every recipient row must carry
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = self.columns.all();
        for column in self.fields.iter().filter_map(|f| f.column.clone()) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }
}

/// What a run would do for one recipient, computed without side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInvoice {
    pub ordinal: usize,
    pub name: String,
    pub email: String,
    pub invoice_id: InvoiceId,
    pub document_name: String,
}

/// Reads the recipient list from `source`
///
/// # Errors
///
/// - [`InvoicerError::EmptySource`] when the source has no data rows, with a
///   link to the source
/// - [`InvoicerError::Configuration`] when expected columns are missing or the
///   source cannot be read
pub async fn load_recipients(
    source: &dyn RecipientSource,
    required_columns: &[String],
    retry: &RetryConfig,
) -> Result<Vec<RecipientRecord>> {
    let rows = retry_transient(retry, "read_rows", || source.read_rows())
        .await
        .map_err(|e| as_setup_error(e, &format!("Recipient source {}", source.location())))?;

    let table = match RecipientTable::from_grid(rows) {
        Some(table) if !table.is_empty() => table,
        _ => {
            return Err(InvoicerError::EmptySource(format!(
                "No recipients found in {}",
                source.location()
            )))
        }
    };

    table.require_columns(required_columns.iter().map(String::as_str))?;

    tracing::info!(
        recipients = table.len(),
        source = %source.location(),
        "Recipients loaded"
    );
    Ok(table.into_records())
}

/// Run-level failures of backend reads become configuration errors, except
/// credential problems which keep their own exit path
fn as_setup_error(err: InvoicerError, what: &str) -> InvoicerError {
    match err {
        InvoicerError::Job(cause) => {
            InvoicerError::Configuration(format!("{what} is not usable: {cause}"))
        }
        other => other,
    }
}

/// Drives invoice runs over a set of backends
pub struct InvoiceOrchestrator {
    settings: InvoiceSettings,
    documents: Arc<dyn DocumentBackend>,
    dispatcher: Arc<dyn MessageDispatcher>,
    engine: TemplateEngine,
    exporter: ArtifactExporter,
    composer: MessageComposer,
    retry: RetryConfig,
    shutdown: watch::Receiver<bool>,
}

/// Read-only context shared by every job of one run
struct RunContext<'a> {
    template: &'a TemplateId,
    target: &'a TargetLocation,
    period: &'a Period,
    date: String,
    run_started: DateTime<Utc>,
}

impl InvoiceOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the sender or export MIME type is invalid.
    pub fn new(
        config: &InvoicerConfig,
        backends: Backends,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let settings = InvoiceSettings::from_config(config);
        let composer = MessageComposer::from_config(&config.message, &settings.export_mime_type)?;
        Ok(Self::with_settings(
            settings,
            composer,
            backends,
            config.retry.clone(),
            shutdown,
        ))
    }

    /// Creates an orchestrator from explicit settings
    pub fn with_settings(
        settings: InvoiceSettings,
        composer: MessageComposer,
        backends: Backends,
        retry: RetryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine: TemplateEngine::new(backends.documents.clone(), retry.clone()),
            exporter: ArtifactExporter::new(
                backends.exports.clone(),
                retry.clone(),
                settings.max_export_chunks,
            ),
            documents: backends.documents,
            dispatcher: backends.dispatcher,
            composer,
            settings,
            retry,
            shutdown,
        }
    }

    pub fn settings(&self) -> &InvoiceSettings {
        &self.settings
    }

    /// Template engine over this orchestrator's document backend
    pub fn template_engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Computes invoice IDs and document names without touching any backend
    pub fn plan(&self, recipients: &[RecipientRecord], period: &Period) -> Result<Vec<PlannedInvoice>> {
        let run_started = Utc::now();
        recipients
            .iter()
            .enumerate()
            .map(|(ordinal, record)| {
                let invoice_id = self.invoice_id(period, ordinal, run_started);
                let name = record.require(&self.settings.columns.name)?.to_string();
                Ok(PlannedInvoice {
                    ordinal,
                    email: record.require(&self.settings.columns.email)?.to_string(),
                    document_name: self.document_name(&invoice_id, &name),
                    name,
                    invoice_id,
                })
            })
            .collect()
    }

    /// Generates and delivers one invoice per recipient
    ///
    /// The template and target location are checked before any job starts.
    /// The returned result lists every recipient in input order.
    ///
    /// # Errors
    ///
    /// - [`InvoicerError::Configuration`] when the template is unreadable, the
    ///   target location does not exist, or expected columns are missing
    /// - [`InvoicerError::Authentication`] when the credential is rejected
    ///   during the checks
    pub async fn run(
        &self,
        recipients: Vec<RecipientRecord>,
        template: &TemplateId,
        target: &TargetLocation,
        period: &Period,
    ) -> Result<BatchResult> {
        let start_time = Instant::now();

        if recipients.is_empty() {
            tracing::info!("No recipients, nothing to do");
            return Ok(BatchResult::empty().with_duration(start_time.elapsed()));
        }

        self.check_recipient_columns(&recipients)?;
        self.check_template(template).await?;
        self.check_target(target).await?;

        let context = RunContext {
            template,
            target,
            period,
            date: Local::now().format(&self.settings.date_format).to_string(),
            run_started: Utc::now(),
        };

        tracing::info!(
            recipients = recipients.len(),
            template_id = %template,
            target = %target,
            period = %period,
            concurrency = self.settings.concurrency,
            "Starting invoice run"
        );

        let auth_failure: Mutex<Option<String>> = Mutex::new(None);
        let context = &context;
        let auth_failure_ref = &auth_failure;

        let jobs = recipients
            .into_iter()
            .enumerate()
            .map(|(ordinal, record)| async move {
                let record = Arc::new(record);
                let invoice_id = self.invoice_id(context.period, ordinal, context.run_started);

                let outcome = if self.should_stop(auth_failure_ref) {
                    JobOutcome::Cancelled
                } else {
                    let span = tracing::info_span!(
                        "invoice_job",
                        ordinal,
                        invoice_id = %invoice_id
                    );
                    self.run_job(ordinal, invoice_id.clone(), record.clone(), context, auth_failure_ref)
                        .instrument(span)
                        .await
                };

                RecipientReport {
                    ordinal,
                    name: record.get(&self.settings.columns.name).unwrap_or_default().to_string(),
                    email: record.get(&self.settings.columns.email).unwrap_or_default().to_string(),
                    invoice_id,
                    outcome,
                }
            });

        // `buffered` only polls a job once a pool slot frees up, so the
        // cancellation check above runs at launch time, not at construction.
        let reports: Vec<RecipientReport> = stream::iter(jobs)
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        let mut result = BatchResult {
            reports,
            auth_failure: auth_failure.lock().map(|g| g.clone()).unwrap_or(None),
            ..BatchResult::default()
        }
        .with_duration(start_time.elapsed());

        // A signal that arrives after the last launch cancels nothing
        result.interrupted = result.cancelled() > 0 && result.auth_failure.is_none();

        result.log_summary();
        Ok(result)
    }

    fn should_stop(&self, auth_failure: &Mutex<Option<String>>) -> bool {
        if *self.shutdown.borrow() {
            return true;
        }
        auth_failure.lock().map(|g| g.is_some()).unwrap_or(true)
    }

    fn invoice_id(&self, period: &Period, ordinal: usize, run_started: DateTime<Utc>) -> InvoiceId {
        self.settings
            .id_scheme
            .derive(&self.settings.id_prefix, period, ordinal, run_started)
    }

    fn document_name(&self, invoice_id: &InvoiceId, recipient_name: &str) -> String {
        interpolate(
            &self.settings.document_name,
            &[
                ("invoice_id", invoice_id.as_str()),
                ("recipient_name", recipient_name),
            ],
        )
    }

    fn check_recipient_columns(&self, recipients: &[RecipientRecord]) -> Result<()> {
        let Some(first) = recipients.first() else {
            return Ok(());
        };
        let missing: Vec<String> = self
            .settings
            .required_columns()
            .into_iter()
            .filter(|column| first.get(column).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(InvoicerError::Configuration(format!(
                "Recipient records are missing expected columns: {}",
                missing.join(", ")
            )))
        }
    }

    async fn check_template(&self, template: &TemplateId) -> Result<()> {
        self.engine
            .read_template(template)
            .await
            .map_err(|e| as_setup_error(e, &format!("Template {template}")))?;
        Ok(())
    }

    async fn check_target(&self, target: &TargetLocation) -> Result<()> {
        let exists = retry_transient(&self.retry, "folder_exists", || {
            self.documents.folder_exists(target)
        })
        .await
        .map_err(|e| as_setup_error(e, &format!("Target location {target}")))?;

        if !exists {
            return Err(InvoicerError::Configuration(format!(
                "Target location {target} does not exist; create it before running"
            )));
        }
        Ok(())
    }

    async fn run_job(
        &self,
        ordinal: usize,
        invoice_id: InvoiceId,
        record: Arc<RecipientRecord>,
        context: &RunContext<'_>,
        auth_failure: &Mutex<Option<String>>,
    ) -> JobOutcome {
        let mut job = InvoiceJob::new(ordinal, invoice_id, record, context.target.clone());

        match self.drive(&mut job, context).await {
            Ok(()) => {
                let document = job.document.clone();
                job.delivered().unwrap_or_else(|e| JobOutcome::FailedAt {
                    stage: JobStage::Delivered,
                    cause: e.into(),
                    document,
                })
            }
            Err(e) => {
                let cause = JobError::from(e);
                if let JobError::Unauthorized(reason) = &cause {
                    if let Ok(mut slot) = auth_failure.lock() {
                        slot.get_or_insert_with(|| reason.clone());
                    }
                }
                log_job_failure!(job.ordinal, job.invoice_id, job.attempting(), cause);
                job.fail(cause)
            }
        }
    }

    /// Pushes one job through every stage
    async fn drive(&self, job: &mut InvoiceJob, context: &RunContext<'_>) -> Result<()> {
        let columns = &self.settings.columns;
        let name = job.recipient.require(&columns.name)?.to_string();
        let email = job.recipient.require(&columns.email)?.to_string();

        let map = build_substitution_map(
            &self.settings.fields,
            &job.recipient,
            &RunValues {
                date: &context.date,
                period: context.period,
                invoice_id: &job.invoice_id,
            },
        )?;

        // Created -> DocumentReady
        let document_name = self.document_name(&job.invoice_id, &name);
        let document = self
            .engine
            .instantiate(context.template, &document_name, &job.target)
            .await?;
        job.document = Some(document.clone());
        job.advance(JobStage::DocumentReady)?;

        // DocumentReady -> Templated
        self.engine.substitute(&document, &map).await?;
        job.advance(JobStage::Templated)?;

        // Templated -> Exported
        let scratch = tempfile::tempdir()?;
        let artifact = self
            .exporter
            .export_to_file(
                &document,
                &self.settings.export_mime_type,
                scratch.path(),
                &self.settings.attachment_name,
            )
            .await?;
        job.artifact = Some(artifact.path);
        job.advance(JobStage::Exported)?;

        // Exported -> Composed
        let values = [
            ("recipient_name", name.as_str()),
            ("period", context.period.as_str()),
            ("invoice_id", job.invoice_id.as_str()),
            ("date", context.date.as_str()),
        ];
        let message = self.composer.compose(
            &email,
            &interpolate(&self.settings.subject, &values),
            &interpolate(&self.settings.body, &values),
            artifact.bytes,
            &self.settings.attachment_name,
        )?;
        job.message = Some(message);
        job.advance(JobStage::Composed)?;

        // Composed -> Delivered
        let receipt = match &job.message {
            Some(message) => {
                retry_transient(&self.retry, "send", || self.dispatcher.send(message)).await?
            }
            None => return Err(JobError::EncodingFailure("No composed message".into()).into()),
        };
        tracing::info!(
            recipient = %email,
            message_id = %receipt.message_id,
            document_id = %document,
            "Invoice delivered"
        );
        job.receipt = Some(receipt);
        job.advance(JobStage::Delivered)?;

        Ok(())
    }
}
