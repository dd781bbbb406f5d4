//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the invoicer configuration file without contacting any backend.

use crate::cli::EXIT_CONFIG;
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Recipients: {} ({})", config.recipients.sheet_link(), config.recipients.a1_range());
        println!("  Template: {}", config.invoice.template_doc_id);
        println!("  Target Folder: {}", config.invoice.target_folder_id);
        println!(
            "  Period: {}",
            config.invoice.period.as_deref().unwrap_or("current month")
        );
        println!("  Invoice IDs: {} ({:?})", config.invoice.id_prefix, config.invoice.id_scheme);
        println!("  Export Format: {}", config.invoice.export_mime_type);
        println!("  Concurrency: {}", config.invoice.concurrency);
        println!("  Sender: {}", config.message.sender);
        println!("  Placeholders:");
        for field in config.field_mappings() {
            println!("    {}", field.placeholder);
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::tests::SAMPLE_YAML;
    use std::io::Write;

    #[tokio::test]
    async fn test_valid_config_exits_zero() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_missing_file_exits_with_config_code() {
        let code = ValidateArgs {}
            .execute("/nonexistent/invoicer.yaml")
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
