//! Send command implementation
//!
//! This module implements the `send` command: one invoice per recipient,
//! created from the template, exported and mailed.

use crate::adapters::google::GoogleWorkspace;
use crate::adapters::traits::{Backends, RecipientSource};
use crate::cli::{exit_code_for, resolve_period, EXIT_AUTH, EXIT_CONFIG, EXIT_INTERRUPTED};
use crate::config::{load_config, InvoicerConfig};
use crate::core::invoice::{load_recipients, InvoiceOrchestrator, PlannedInvoice};
use crate::domain::{InvoicerError, Period, TargetLocation, TemplateId};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the send command
#[derive(Args, Debug, Default)]
pub struct SendArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Compute invoice ids and document names without creating or sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// Override the billing period (e.g. 2025-03)
    #[arg(long)]
    pub period: Option<String>,
}

impl SendArgs {
    /// Execute the send command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting send command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Configuration could not be loaded");
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let workspace = match GoogleWorkspace::connect(&config).await {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to Google Workspace");
                eprintln!("Failed to connect: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let source = workspace.recipient_source(&config.recipients);
        self.execute_with(&config, source.as_ref(), workspace.backends(), shutdown_signal)
            .await
    }

    /// Runs the command against explicit backends
    pub async fn execute_with(
        &self,
        config: &InvoicerConfig,
        source: &dyn RecipientSource,
        backends: Backends,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        match self.run(config, source, backends, shutdown_signal).await {
            Ok(code) => Ok(code),
            Err(e) => {
                tracing::error!(error = %e, "Invoice run failed");
                eprintln!("Invoice run failed: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }

    async fn run(
        &self,
        config: &InvoicerConfig,
        source: &dyn RecipientSource,
        backends: Backends,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Result<i32, InvoicerError> {
        let period = resolve_period(self.period.as_deref(), config.invoice.period.as_deref())?;
        let template = TemplateId::new(config.invoice.template_doc_id.clone())
            .map_err(InvoicerError::Configuration)?;
        let target = TargetLocation::new(config.invoice.target_folder_id.clone())
            .map_err(InvoicerError::Configuration)?;

        let recipients = load_recipients(source, &config.required_columns(), &config.retry).await?;
        let orchestrator = InvoiceOrchestrator::new(config, backends, shutdown_signal)?;
        let plan = orchestrator.plan(&recipients, &period)?;

        if self.dry_run {
            tracing::info!(recipients = plan.len(), "Dry run mode enabled - nothing will be created or sent");
            println!("DRY RUN - no documents will be created and no mail will be sent");
            println!();
            print_plan(&period, &plan);

            let inspection = orchestrator
                .template_engine()
                .inspect(
                    &template,
                    orchestrator.settings().fields.iter().map(|f| f.placeholder.as_str()),
                )
                .await?;
            for token in &inspection.missing {
                println!("  warning: placeholder {token} does not occur in the template");
            }
            return Ok(0);
        }

        if !self.yes && !confirm(config, &period, &plan)? {
            println!("Send cancelled.");
            return Ok(0);
        }

        println!("Sending {} invoices for {period}...", plan.len());
        let result = orchestrator.run(recipients, &template, &target, &period).await?;

        println!();
        print!("{}", result.render());

        Ok(if result.auth_failure.is_some() {
            EXIT_AUTH
        } else if result.interrupted {
            println!();
            println!("Run interrupted. Recipients marked cancelled were not processed.");
            EXIT_INTERRUPTED
        } else {
            0
        })
    }
}

fn print_plan(period: &Period, plan: &[PlannedInvoice]) {
    println!("Invoices for {period}:");
    for invoice in plan {
        println!(
            "  {:>3}  {:<24} {:<32} {}",
            invoice.ordinal, invoice.invoice_id, invoice.email, invoice.document_name
        );
    }
    println!();
}

fn confirm(config: &InvoicerConfig, period: &Period, plan: &[PlannedInvoice]) -> Result<bool, InvoicerError> {
    use std::io::{self, Write};

    println!("Send Configuration:");
    println!("  Recipients: {} ({})", plan.len(), config.recipients.sheet_link());
    println!("  Template: {}", config.invoice.template_doc_id);
    println!("  Target folder: {}", config.invoice.target_folder_id);
    println!("  Period: {period}");
    println!("  Sender: {}", config.message.sender);
    println!();
    print!("Create and send {} invoices? [y/N]: ", plan.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
