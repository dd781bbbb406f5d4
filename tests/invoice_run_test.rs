//! Integration tests for complete invoice runs
//!
//! These tests drive the orchestrator against the in-memory workspace and
//! verify that:
//! - Every recipient gets its own substituted document and message
//! - A failing recipient does not affect its siblings
//! - Setup problems fail the run before any document is created
//! - Cancellation and credential failures stop new jobs from launching

use fake::faker::name::en::Name;
use fake::Fake;
use invoicer::adapters::memory::{MemoryRecipients, MemoryWorkspace, Operation};
use invoicer::config::InvoicerConfig;
use invoicer::core::invoice::{load_recipients, BatchResult, InvoiceOrchestrator, JobOutcome, JobStage};
use invoicer::domain::{
    InvoiceIdScheme, InvoicerError, JobError, Period, RecipientRecord, TargetLocation, TemplateId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

const TEMPLATE: &str = "template-abc";
const FOLDER: &str = "folder-xyz";

fn config() -> InvoicerConfig {
    let yaml = r#"
recipients:
  sheet_id: sheet-123
  tab: Leden
  columns:
    name: Naam
    email: Email
    address: Adres
    postcode: Postcode
    city: Woonplaats
invoice:
  template_doc_id: template-abc
  target_folder_id: folder-xyz
  id_prefix: AMBUFFER
message:
  sender: bestuur@example.org
  subject: "Factuur {invoice_id}"
  body: "Beste {recipient_name},\n\nIn de bijlage de factuur voor {period}."
retry:
  max_retries: 2
  initial_delay_ms: 1
  max_delay_ms: 5
"#;
    let config: InvoicerConfig = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();
    config
}

fn record(name: &str, email: &str) -> RecipientRecord {
    RecipientRecord::from_pairs([
        ("Naam", name),
        ("Email", email),
        ("Adres", "Dorpsstraat 1"),
        ("Postcode", "1234 AB"),
        ("Woonplaats", "Utrecht"),
    ])
}

fn records(count: usize) -> Vec<RecipientRecord> {
    (0..count)
        .map(|i| record(&format!("R{i}"), &format!("r{i}@example.org")))
        .collect()
}

async fn run(
    config: &InvoicerConfig,
    workspace: &Arc<MemoryWorkspace>,
    recipients: Vec<RecipientRecord>,
    shutdown: watch::Receiver<bool>,
) -> invoicer::domain::Result<BatchResult> {
    InvoiceOrchestrator::new(config, workspace.backends(), shutdown)?
        .run(
            recipients,
            &TemplateId::new(TEMPLATE).unwrap(),
            &TargetLocation::new(FOLDER).unwrap(),
            &Period::new("2025-01").unwrap(),
        )
        .await
}

#[tokio::test]
async fn test_two_recipients_each_get_their_own_invoice() {
    let workspace = Arc::new(MemoryWorkspace::new());
    workspace.add_document(TEMPLATE, "Beste {{recipient_name}}, factuur {{invoice_id}}");
    workspace.add_folder(FOLDER);
    let (_tx, rx) = watch::channel(false);

    let result = run(
        &config(),
        &workspace,
        vec![record("A", "a@x.com"), record("B", "b@x.com")],
        rx,
    )
    .await
    .unwrap();

    assert_eq!(result.total(), 2);
    assert_eq!(result.delivered(), 2);
    assert!(result.is_successful());
    assert_eq!(result.reports[0].name, "A");
    assert_eq!(result.reports[1].name, "B");

    let texts: HashSet<String> = result
        .reports
        .iter()
        .map(|report| workspace.text_of(report.outcome.document().unwrap()).unwrap())
        .collect();
    assert!(texts.contains("Beste A, factuur AMBUFFER-2025-01-0"));
    assert!(texts.contains("Beste B, factuur AMBUFFER-2025-01-1"));

    let mut recipients: Vec<String> = workspace
        .sent()
        .iter()
        .map(|m| m.recipient().to_string())
        .collect();
    recipients.sort();
    assert_eq!(recipients, vec!["a@x.com", "b@x.com"]);

    // The template itself is never edited
    assert_eq!(
        workspace.text_of(&TemplateId::new(TEMPLATE).unwrap().as_document()),
        Some("Beste {{recipient_name}}, factuur {{invoice_id}}".to_string())
    );
    assert_eq!(workspace.documents_in(FOLDER).len(), 2);
}

#[tokio::test]
async fn test_export_failure_is_isolated_to_one_recipient() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    workspace.fail_export_for(
        "voor R2",
        JobError::Truncated {
            received: 0,
            reason: "stream closed before completion".to_string(),
        },
    );
    let (_tx, rx) = watch::channel(false);

    let result = run(&config(), &workspace, records(5), rx).await.unwrap();

    assert_eq!(result.delivered(), 4);
    assert_eq!(result.failed(), 1);
    match &result.reports[2].outcome {
        JobOutcome::FailedAt {
            stage,
            cause,
            document,
        } => {
            assert_eq!(*stage, JobStage::Exported);
            assert!(matches!(cause, JobError::Truncated { .. }));
            // The created document stays in place for review
            assert!(document.is_some());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(workspace.sent().len(), 4);
    assert!(!result.render().is_empty());
}

#[tokio::test]
async fn test_empty_source_fails_before_any_copy() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    let config = config();

    let header_only = MemoryRecipients::from_rows(&[&["Naam", "Email", "Adres", "Postcode", "Woonplaats"]]);
    let result = load_recipients(&header_only, &config.required_columns(), &config.retry).await;
    match result {
        Err(InvoicerError::EmptySource(msg)) => assert!(msg.contains("memory://recipients")),
        other => panic!("unexpected result: {other:?}"),
    }

    let nothing = MemoryRecipients::new(Vec::new());
    assert!(matches!(
        load_recipients(&nothing, &config.required_columns(), &config.retry).await,
        Err(InvoicerError::EmptySource(_))
    ));
    assert_eq!(workspace.counters().copy, 0);
}

#[tokio::test]
async fn test_loaded_recipients_run_end_to_end() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    let config = config();
    let source = MemoryRecipients::from_rows(&[
        &["Naam", "Email", "Adres", "Postcode", "Woonplaats"],
        &["Jan Jansen", "jan@example.org", "Dorpsstraat 1", "1234 AB", "Utrecht"],
    ]);
    let recipients = load_recipients(&source, &config.required_columns(), &config.retry)
        .await
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let result = run(&config, &workspace, recipients, rx).await.unwrap();

    let document = result.reports[0].outcome.document().unwrap().clone();
    let text = workspace.text_of(&document).unwrap();
    assert!(text.contains("Factuur AMBUFFER-2025-01-0"));
    assert!(text.contains("Jan Jansen\nDorpsstraat 1\n1234 AB Utrecht"));
    assert!(!text.contains("{{"));
    assert_eq!(
        workspace.name_of(&document).as_deref(),
        Some("Factuur id AMBUFFER-2025-01-0 voor Jan Jansen")
    );

    let sent = workspace.sent();
    assert_eq!(sent[0].subject(), "Factuur AMBUFFER-2025-01-0");
    assert_eq!(sent[0].attachment_name(), "invoice.pdf");
}

#[tokio::test]
async fn test_unknown_template_is_configuration_error() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    let (_tx, rx) = watch::channel(false);

    let result = InvoiceOrchestrator::new(&config(), workspace.backends(), rx)
        .unwrap()
        .run(
            records(2),
            &TemplateId::new("no-such-template").unwrap(),
            &TargetLocation::new(FOLDER).unwrap(),
            &Period::new("2025-01").unwrap(),
        )
        .await;

    assert!(matches!(result, Err(InvoicerError::Configuration(_))));
    assert_eq!(workspace.counters().copy, 0);
    assert!(workspace.sent().is_empty());
}

#[tokio::test]
async fn test_missing_target_folder_is_configuration_error() {
    let workspace = Arc::new(MemoryWorkspace::new());
    workspace.add_document(TEMPLATE, "{{recipient_name}}");
    let (_tx, rx) = watch::channel(false);

    let result = run(&config(), &workspace, records(2), rx).await;

    match result {
        Err(InvoicerError::Configuration(msg)) => assert!(msg.contains(FOLDER)),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(workspace.counters().copy, 0);
}

#[tokio::test]
async fn test_shutdown_stops_launching_new_jobs() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    let (tx, rx) = watch::channel(false);
    workspace.on_send(move |_| {
        let _ = tx.send(true);
    });
    let mut config = config();
    config.invoice.concurrency = 1;

    let result = run(&config, &workspace, records(3), rx).await.unwrap();

    assert!(result.interrupted);
    assert!(result.reports[0].outcome.is_delivered());
    assert!(matches!(result.reports[1].outcome, JobOutcome::Cancelled));
    assert!(matches!(result.reports[2].outcome, JobOutcome::Cancelled));
    assert_eq!(result.cancelled(), 2);
    // Work already done is kept
    assert_eq!(workspace.documents_in(FOLDER).len(), 1);
}

#[tokio::test]
async fn test_rejected_credential_stops_the_run() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    workspace.reject_credential_on_send_to("r1@example.org", "invalid_grant: token revoked");
    let (_tx, rx) = watch::channel(false);
    let mut config = config();
    config.invoice.concurrency = 1;

    let result = run(&config, &workspace, records(3), rx).await.unwrap();

    assert!(result.reports[0].outcome.is_delivered());
    match &result.reports[1].outcome {
        JobOutcome::FailedAt { cause, .. } => {
            assert!(matches!(cause, JobError::Unauthorized(_)))
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(result.reports[2].outcome, JobOutcome::Cancelled));
    assert!(result
        .auth_failure
        .as_deref()
        .is_some_and(|reason| reason.contains("token revoked")));
    assert!(!result.interrupted);
}

#[tokio::test]
async fn test_transient_errors_are_retried_within_the_stage() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    workspace.fail_transiently(Operation::Copy, 2);
    workspace.fail_transiently(Operation::OpenExport, 1);
    let (_tx, rx) = watch::channel(false);

    let result = run(&config(), &workspace, records(1), rx).await.unwrap();

    assert_eq!(result.delivered(), 1);
    let counters = workspace.counters();
    assert_eq!(counters.copy, 3);
    assert_eq!(counters.open_export, 2);
    // Failed copies leave nothing behind
    assert_eq!(workspace.documents_in(FOLDER).len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_job() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    workspace.fail_transiently(Operation::Send, 10);
    let (_tx, rx) = watch::channel(false);

    let result = run(&config(), &workspace, records(1), rx).await.unwrap();

    match &result.reports[0].outcome {
        JobOutcome::FailedAt { stage, cause, .. } => {
            assert_eq!(*stage, JobStage::Delivered);
            assert!(matches!(cause, JobError::RetriesExhausted { attempts: 3, .. }));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(workspace.counters().send, 3);
}

#[tokio::test]
async fn test_invoice_ids_are_distinct_within_a_run() {
    for scheme in [InvoiceIdScheme::Ordinal, InvoiceIdScheme::Timestamp] {
        let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
        let (_tx, rx) = watch::channel(false);
        let mut config = config();
        config.invoice.id_scheme = scheme;

        let recipients: Vec<RecipientRecord> = (0..20)
            .map(|i| {
                let name: String = Name().fake();
                record(&name, &format!("lid{i}@example.org"))
            })
            .collect();

        let result = run(&config, &workspace, recipients, rx).await.unwrap();

        let ids: HashSet<String> = result
            .reports
            .iter()
            .map(|r| r.invoice_id.to_string())
            .collect();
        assert_eq!(ids.len(), 20, "duplicate ids with {scheme:?}");
        assert_eq!(result.delivered(), 20);
    }
}

#[tokio::test]
async fn test_empty_recipient_list_is_a_no_op() {
    let workspace = Arc::new(MemoryWorkspace::with_defaults(TEMPLATE, FOLDER));
    let (_tx, rx) = watch::channel(false);

    let result = run(&config(), &workspace, Vec::new(), rx).await.unwrap();

    assert_eq!(result.total(), 0);
    assert!(result.is_successful());
    assert_eq!(workspace.counters(), Default::default());
}
