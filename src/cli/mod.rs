//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the invoicer using clap.

pub mod commands;

use crate::domain::{InvoicerError, Period};
use chrono::Utc;
use clap::{Parser, Subcommand};

/// Exit code for configuration errors, including an empty recipient source
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for credential failures
pub const EXIT_AUTH: i32 = 3;
/// Exit code for any other fatal error
pub const EXIT_FATAL: i32 = 5;
/// Exit code when a signal interrupted the run
pub const EXIT_INTERRUPTED: i32 = 130;

/// Invoicer - per-recipient invoices from a Google Docs template
#[derive(Parser, Debug)]
#[command(name = "invoicer")]
#[command(version, about, long_about = None)]
#[command(author = "Invoicer Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", env = "INVOICER_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "INVOICER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate and mail an invoice to every recipient in the sheet
    Send(commands::send::SendArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Report which configured placeholders occur in the template
    CheckTemplate(commands::check_template::CheckTemplateArgs),
}

/// Maps a run-level error onto the process exit code
pub fn exit_code_for(err: &InvoicerError) -> i32 {
    match err {
        InvoicerError::Configuration(_) | InvoicerError::EmptySource(_) => EXIT_CONFIG,
        InvoicerError::Authentication(_) => EXIT_AUTH,
        _ => EXIT_FATAL,
    }
}

/// The billing period: the CLI override, then the configured one, then the current month
pub fn resolve_period(cli: Option<&str>, configured: Option<&str>) -> Result<Period, InvoicerError> {
    match cli.or(configured) {
        Some(label) => Period::new(label)
            .map_err(|e| InvoicerError::Configuration(format!("Invalid period: {e}"))),
        None => Ok(Period::month_of(Utc::now())),
    }
}
