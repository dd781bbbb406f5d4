//! Check template command implementation
//!
//! Reads the template document and reports which configured placeholders it
//! contains. Missing placeholders are a warning, not an error.

use crate::adapters::google::GoogleWorkspace;
use crate::adapters::traits::DocumentBackend;
use crate::cli::{exit_code_for, EXIT_CONFIG};
use crate::config::{load_config, InvoicerConfig};
use crate::core::template::{TemplateEngine, TemplateInspection};
use crate::domain::{InvoicerError, TemplateId};
use clap::Args;
use std::sync::Arc;

/// Arguments for the check-template command
#[derive(Args, Debug)]
pub struct CheckTemplateArgs {
    /// Inspect this document instead of the configured template
    #[arg(long)]
    pub template_id: Option<String>,
}

impl CheckTemplateArgs {
    /// Execute the check-template command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let workspace = match GoogleWorkspace::connect(&config).await {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Failed to connect: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        self.execute_with(&config, workspace.backends().documents).await
    }

    /// Runs the inspection against an explicit document backend
    pub async fn execute_with(
        &self,
        config: &InvoicerConfig,
        documents: Arc<dyn DocumentBackend>,
    ) -> anyhow::Result<i32> {
        match self.inspect(config, documents).await {
            Ok((template, inspection)) => {
                print_inspection(&template, &inspection);
                Ok(0)
            }
            Err(e) => {
                tracing::error!(error = %e, "Template inspection failed");
                eprintln!("Template inspection failed: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }

    async fn inspect(
        &self,
        config: &InvoicerConfig,
        documents: Arc<dyn DocumentBackend>,
    ) -> Result<(TemplateId, TemplateInspection), InvoicerError> {
        let id = self
            .template_id
            .clone()
            .unwrap_or_else(|| config.invoice.template_doc_id.clone());
        let template = TemplateId::new(id).map_err(InvoicerError::Configuration)?;

        let fields = config.field_mappings();
        let inspection = TemplateEngine::new(documents, config.retry.clone())
            .inspect(&template, fields.iter().map(|f| f.placeholder.as_str()))
            .await
            .map_err(|e| match e {
                InvoicerError::Job(cause) => InvoicerError::Configuration(format!(
                    "Template {template} is not readable: {cause}"
                )),
                other => other,
            })?;

        for token in &inspection.missing {
            tracing::warn!(placeholder = %token, template_id = %template, "Placeholder missing from template");
        }
        Ok((template, inspection))
    }
}

fn print_inspection(template: &TemplateId, inspection: &TemplateInspection) {
    println!("Template {template}");
    println!();
    println!("Placeholders found:");
    if inspection.present.is_empty() {
        println!("  (none)");
    }
    for token in &inspection.present {
        println!("  {token}");
    }
    if !inspection.missing.is_empty() {
        println!();
        println!("Configured but not in the template:");
        for token in &inspection.missing {
            println!("  {token}");
        }
    }
    if !inspection.unmapped.is_empty() {
        println!();
        println!("In the template but not configured (left as-is):");
        for token in &inspection.unmapped {
            println!("  {token}");
        }
    }
}
