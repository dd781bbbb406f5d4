//! Domain models and types for the invoicer.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TemplateId`], [`DocumentId`], [`TargetLocation`],
//!   [`Period`], [`InvoiceId`])
//! - **Recipient data** ([`RecipientRecord`], [`RecipientTable`])
//! - **Substitution maps** ([`FieldSubstitutionMap`], [`FieldMapping`])
//! - **Messages** ([`ComposedMessage`], [`DispatchReceipt`])
//! - **Error types** ([`InvoicerError`], [`JobError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers are newtypes so a template handle cannot be passed where a
//! freshly created document is expected:
//!
//! ```rust
//! use invoicer::domain::{DocumentId, TemplateId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let template = TemplateId::new("1W7uhfDQ")?;
//! let copy = DocumentId::new("1Xk3pq")?;
//!
//! // let wrong: TemplateId = copy;  // Compile error!
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod fields;
pub mod ids;
pub mod message;
pub mod recipient;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{InvoicerError, JobError};
pub use fields::{build_substitution_map, FieldMapping, FieldSubstitutionMap, RunValue, RunValues};
pub use message::{ComposedMessage, DispatchReceipt};
pub use ids::{DocumentId, InvoiceId, InvoiceIdScheme, Period, TargetLocation, TemplateId};
pub use recipient::{RecipientRecord, RecipientTable};
pub use result::Result;
