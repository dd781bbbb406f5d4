//! Configuration management for the invoicer.
//!
//! This module provides YAML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! The invoicer reads a single YAML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `INVOICER_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation before any backend is contacted
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use invoicer::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("config.yaml")?;
//!
//! println!("Recipients: {}", config.recipients.sheet_link());
//! println!("Template: {}", config.invoice.template_doc_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`OAuthConfig`] - Client secrets and token locations
//! - [`RecipientsConfig`] - Recipient sheet, range and columns
//! - [`InvoiceConfig`] - Template, target folder, IDs, export and field set
//! - [`MessageConfig`] - Sender, subject and body
//! - [`RetryConfig`] - Backoff for transient backend errors
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```yaml
//! oauth:
//!   credentials_path: credentials.json
//!   token_path: token.json
//!
//! recipients:
//!   sheet_id: 1EhBqZ...
//!   tab: Leden
//!   columns:
//!     name: Naam
//!     email: Email
//!     address: Adres
//!     postcode: Postcode
//!     city: Woonplaats
//!
//! invoice:
//!   template_doc_id: 1W7uhf...
//!   target_folder_id: 1Hs0C...
//!   id_prefix: AMBUFFER
//!
//! message:
//!   sender: ${INVOICER_SENDER}
//!   subject: Eenmalige factuur huurbuffer
//!   body: |
//!     Beste {recipient_name},
//!
//!     In de bijlage vind je de factuur.
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_client_secrets, load_config};
pub use schema::{
    ApplicationConfig, ClientSecrets, InvoiceConfig, InvoicerConfig, LoggingConfig,
    MessageConfig, OAuthConfig, RecipientColumns, RecipientsConfig, RetryConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
