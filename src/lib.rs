// Invoicer - per-recipient invoices from a Google Docs template
// Copyright (c) 2025 Invoicer Contributors
// Licensed under the MIT License

//! # Invoicer - template-driven invoices over Google Workspace
//!
//! Invoicer reads a recipient list from a Google Sheet and, for every
//! recipient, copies a Google Docs template, fills in the recipient's
//! placeholders, exports the copy as PDF and mails it as an attachment.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Loading** recipients from a sheet once per run
//! - **Instantiating** the template into one document per recipient
//! - **Exporting** each document with a bounded chunked download
//! - **Dispatching** a multipart message with the artifact attached
//! - **Reporting** one outcome per recipient, in input order
//!
//! ## Architecture
//!
//! Invoicer follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (orchestration, template, export, composition)
//! - [`adapters`] - External integrations (Google Workspace, in-memory)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoicer::adapters::memory::{MemoryRecipients, MemoryWorkspace};
//! use invoicer::config::load_config;
//! use invoicer::core::invoice::{load_recipients, InvoiceOrchestrator};
//! use invoicer::domain::{Period, TargetLocation, TemplateId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("config.yaml")?;
//!     let workspace = Arc::new(MemoryWorkspace::with_defaults("template", "folder"));
//!     let source = MemoryRecipients::from_rows(&[
//!         &["Naam", "Email", "Adres", "Postcode", "Woonplaats"],
//!         &["Jan", "jan@example.org", "Dorpsstraat 1", "1234 AB", "Utrecht"],
//!     ]);
//!
//!     let recipients = load_recipients(&source, &config.required_columns(), &config.retry).await?;
//!     let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!     let result = InvoiceOrchestrator::new(&config, workspace.backends(), shutdown)?
//!         .run(
//!             recipients,
//!             &TemplateId::new("template")?,
//!             &TargetLocation::new("folder")?,
//!             &Period::new("2025-01")?,
//!         )
//!         .await?;
//!
//!     println!("Delivered {} of {}", result.delivered(), result.total());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Run-level failures are [`domain::InvoicerError`]; failures scoped to one
//! recipient are [`domain::JobError`] and end up in the batch result instead
//! of aborting the run.
//!
//! ## Logging
//!
//! Invoicer uses structured logging with the `tracing` crate. Every job runs
//! in a span carrying its ordinal and invoice id:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(recipients = 12, "Recipients loaded");
//! warn!(invoice_id = "AMBUFFER-2025-01-003", "Recipient not delivered");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
