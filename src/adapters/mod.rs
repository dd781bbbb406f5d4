//! External system integrations for the invoicer.
//!
//! - [`traits`] - the backend seams the invoice pipeline is written against
//! - [`google`] - Drive, Docs, Sheets and Gmail implementations
//! - [`memory`] - in-memory implementations for dry runs and tests
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate the Google APIs from the
//! pipeline. Every backend is a trait object, so a run can be driven against
//! the in-memory workspace without network access:
//!
//! ```rust
//! use invoicer::adapters::memory::MemoryWorkspace;
//! use std::sync::Arc;
//!
//! let workspace = Arc::new(MemoryWorkspace::with_defaults("template-1", "folder-1"));
//! let backends = workspace.backends();
//! # let _ = backends;
//! ```

pub mod google;
pub mod memory;
pub mod traits;
