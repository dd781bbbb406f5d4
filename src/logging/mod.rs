//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output on stderr
//! - Configurable log levels (`--log-level`, `RUST_LOG`)
//! - Optional JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use invoicer::logging::init_logging;
//! use invoicer::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a job reaching a new stage
///
/// # Example
///
/// ```no_run
/// use invoicer::log_job_stage;
///
/// log_job_stage!(3, "INV-2025-01-3", "Templated");
/// ```
#[macro_export]
macro_rules! log_job_stage {
    ($ordinal:expr, $invoice_id:expr, $stage:expr) => {
        tracing::debug!(
            ordinal = $ordinal,
            invoice_id = %$invoice_id,
            stage = %$stage,
            "Job advanced"
        );
    };
}

/// Log a job that stopped before delivery
///
/// # Example
///
/// ```no_run
/// use invoicer::log_job_failure;
///
/// log_job_failure!(1, "INV-2025-01-1", "Exported", "export truncated");
/// ```
#[macro_export]
macro_rules! log_job_failure {
    ($ordinal:expr, $invoice_id:expr, $stage:expr, $cause:expr) => {
        tracing::warn!(
            ordinal = $ordinal,
            invoice_id = %$invoice_id,
            failed_at = %$stage,
            cause = %$cause,
            "Invoice job failed"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use invoicer::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
