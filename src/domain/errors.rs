//! Domain error types
//!
//! This module defines the error hierarchy for the invoicer. Run-level errors
//! (configuration, authentication) abort the whole batch; [`JobError`] is
//! scoped to a single recipient and is recorded in the batch result instead of
//! being propagated.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main invoicer error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum InvoicerError {
    /// Configuration-related errors (fatal before any job starts)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The recipient source returned no rows
    #[error("Recipient source is empty: {0}")]
    EmptySource(String),

    /// Authentication errors (fatal unless recovered interactively)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Errors scoped to one recipient's pipeline
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Network-level errors eligible for retry
    #[error("Transient error: {0}")]
    Transient(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl InvoicerError {
    /// Whether the error is network-level and worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, InvoicerError::Transient(_))
    }

    /// Whether the error must abort the run rather than a single job
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InvoicerError::Configuration(_)
                | InvoicerError::EmptySource(_)
                | InvoicerError::Authentication(_)
        )
    }
}

/// Per-recipient errors
///
/// A job error is caught at the job boundary and reported in the batch
/// summary; sibling jobs keep running.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// Template, document or file does not exist (or was invalidated)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The credential lacks access to the resource
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The export stream ended before the transfer completed
    #[error("Export truncated after {received} bytes: {reason}")]
    Truncated { received: u64, reason: String },

    /// The artifact or message could not be encoded
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// The messaging backend rejected the message
    #[error("Dispatch failure: {0}")]
    DispatchFailure(String),

    /// A transient error outlived the retry budget
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// The credential was rejected while the job was running
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unexpected backend response or local failure
    #[error("Backend error: {0}")]
    Backend(String),
}

// Collapses a run-level error raised inside a job into the job's cause
impl From<InvoicerError> for JobError {
    fn from(err: InvoicerError) -> Self {
        match err {
            InvoicerError::Job(job) => job,
            InvoicerError::Authentication(msg) => JobError::Unauthorized(msg),
            InvoicerError::Transient(msg) => JobError::Backend(msg),
            other => JobError::Backend(other.to_string()),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for InvoicerError {
    fn from(err: std::io::Error) -> Self {
        InvoicerError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for InvoicerError {
    fn from(err: serde_json::Error) -> Self {
        InvoicerError::Serialization(err.to_string())
    }
}

// Conversion from YAML parse errors
impl From<serde_yaml::Error> for InvoicerError {
    fn from(err: serde_yaml::Error) -> Self {
        InvoicerError::Configuration(format!("YAML parse error: {err}"))
    }
}
