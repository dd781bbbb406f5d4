//! Core business logic for the invoicer.
//!
//! # Modules
//!
//! - [`invoice`] - Run orchestration, per-recipient jobs and the batch result
//! - [`template`] - Template instantiation, substitution and inspection
//! - [`exporter`] - Chunked document export
//! - [`composer`] - Multipart message composition
//! - [`retry`] - In-stage retry for transient backend errors
//!
//! # Invoice Workflow
//!
//! 1. **Load recipients**: read the sheet once, check the expected columns
//! 2. **Check**: the template must be readable and the target folder must exist
//! 3. **Per recipient**, on a bounded pool:
//!    copy → substitute → export → compose → dispatch
//! 4. **Report**: one outcome per recipient, in input order
//!
//! # Example
//!
//! ```rust,no_run
//! use invoicer::adapters::google::GoogleWorkspace;
//! use invoicer::config::load_config;
//! use invoicer::core::invoice::{load_recipients, InvoiceOrchestrator};
//! use invoicer::domain::{Period, TargetLocation, TemplateId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("config.yaml")?;
//! let workspace = GoogleWorkspace::connect(&config).await?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let recipients = load_recipients(
//!     workspace.recipient_source(&config.recipients).as_ref(),
//!     &config.required_columns(),
//!     &config.retry,
//! )
//! .await?;
//!
//! let orchestrator = InvoiceOrchestrator::new(&config, workspace.backends(), shutdown_rx)?;
//! let result = orchestrator
//!     .run(
//!         recipients,
//!         &TemplateId::new(config.invoice.template_doc_id.clone())?,
//!         &TargetLocation::new(config.invoice.target_folder_id.clone())?,
//!         &Period::new("2025-01")?,
//!     )
//!     .await?;
//!
//! println!("Delivered: {}/{}", result.delivered(), result.total());
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod exporter;
pub mod invoice;
pub mod retry;
pub mod template;
