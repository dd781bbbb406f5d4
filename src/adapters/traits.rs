//! Backend trait definitions
//!
//! The invoice pipeline talks to the outside world only through these traits.
//! Implementations map backend failures onto the domain errors:
//! a missing resource is [`JobError::NotFound`](crate::domain::JobError::NotFound),
//! a refused one [`JobError::PermissionDenied`](crate::domain::JobError::PermissionDenied),
//! a rejected credential [`InvoicerError::Authentication`](crate::domain::InvoicerError::Authentication),
//! and anything worth another attempt [`InvoicerError::Transient`](crate::domain::InvoicerError::Transient).

use crate::domain::{ComposedMessage, DispatchReceipt, DocumentId, Result, TargetLocation};
use async_trait::async_trait;
use std::sync::Arc;

/// Tabular source of recipient rows
#[async_trait]
pub trait RecipientSource: Send + Sync {
    /// Reads the raw cell grid, header row first
    ///
    /// An empty grid is a valid answer; the caller decides what it means.
    async fn read_rows(&self) -> Result<Vec<Vec<String>>>;

    /// Human-locatable reference to the source, used in error messages
    fn location(&self) -> String;
}

/// Document storage and editing
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Copies `source` into `parent` under `name` and returns the new handle
    ///
    /// Name collisions are allowed.
    async fn copy_document(
        &self,
        source: &DocumentId,
        name: &str,
        parent: &TargetLocation,
    ) -> Result<DocumentId>;

    /// Applies every (find, replace) pair to the document in one request
    ///
    /// Matching is literal and case-sensitive. Pairs that match nothing are
    /// not an error.
    async fn batch_replace(&self, document: &DocumentId, replacements: &[(String, String)])
        -> Result<()>;

    /// Plain-text content of the document
    async fn document_text(&self, document: &DocumentId) -> Result<String>;

    /// Whether `location` names an existing, usable folder
    async fn folder_exists(&self, location: &TargetLocation) -> Result<bool>;
}

/// One read of a chunked transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadChunk {
    pub bytes: Vec<u8>,

    /// Total size of the transfer when the backend reports it
    pub total: Option<u64>,

    /// Set on the read that completes the transfer
    pub done: bool,
}

/// A transfer in progress, pulled one chunk at a time
#[async_trait]
pub trait ChunkedDownload: Send {
    /// Reads the next chunk
    ///
    /// Returns `Ok(None)` when the stream closes without completing.
    async fn next_chunk(&mut self) -> Result<Option<DownloadChunk>>;
}

/// Conversion of documents into portable artifacts
#[async_trait]
pub trait ExportBackend: Send + Sync {
    /// Starts exporting `document` as `mime_type`
    async fn open_export(
        &self,
        document: &DocumentId,
        mime_type: &str,
    ) -> Result<Box<dyn ChunkedDownload>>;
}

/// Outgoing mail transport
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Sends a composed message and returns the backend's receipt
    async fn send(&self, message: &ComposedMessage) -> Result<DispatchReceipt>;
}

/// The backends one invoice run drives
#[derive(Clone)]
pub struct Backends {
    pub documents: Arc<dyn DocumentBackend>,
    pub exports: Arc<dyn ExportBackend>,
    pub dispatcher: Arc<dyn MessageDispatcher>,
}
