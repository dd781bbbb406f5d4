//! Invoice runs
//!
//! This module provides the run-level logic:
//! - Recipient loading
//! - Per-recipient jobs and their stage machine
//! - Run orchestration on a bounded worker pool
//! - Batch result and reporting

pub mod job;
pub mod orchestrator;
pub mod summary;

pub use job::{InvoiceJob, JobOutcome, JobStage};
pub use orchestrator::{load_recipients, InvoiceOrchestrator, InvoiceSettings, PlannedInvoice};
pub use summary::{BatchResult, RecipientReport};
