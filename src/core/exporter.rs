//! Artifact exporter
//!
//! Converts a document into bytes with a bounded pull loop over
//! [`ChunkedDownload`] reads. A transfer that never reports completion,
//! closes early, or disagrees with its announced size is
//! [`JobError::Truncated`].

use crate::adapters::traits::{ChunkedDownload, ExportBackend};
use crate::config::RetryConfig;
use crate::core::retry::retry_transient;
use crate::domain::{DocumentId, InvoicerError, JobError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stateless export service over an [`ExportBackend`]
#[derive(Clone)]
pub struct ArtifactExporter {
    backend: Arc<dyn ExportBackend>,
    retry: RetryConfig,
    max_chunks: usize,
}

impl ArtifactExporter {
    pub fn new(backend: Arc<dyn ExportBackend>, retry: RetryConfig, max_chunks: usize) -> Self {
        Self {
            backend,
            retry,
            max_chunks,
        }
    }

    /// Exports `document` as `mime_type` and returns the complete bytes
    ///
    /// Opening the export is retried on transient errors; a failure mid-stream
    /// fails the export since the chunks already read cannot be replayed.
    pub async fn export(&self, document: &DocumentId, mime_type: &str) -> Result<Vec<u8>> {
        let download = retry_transient(&self.retry, "open_export", || {
            self.backend.open_export(document, mime_type)
        })
        .await?;

        let bytes = pull_to_completion(download, self.max_chunks).await?;

        tracing::debug!(
            document_id = %document,
            mime_type,
            size = bytes.len(),
            "Document exported"
        );
        Ok(bytes)
    }

    /// Exports `document` and writes the artifact to `dir/file_name`
    ///
    /// The bytes are returned alongside the path so the caller does not read
    /// the file back.
    pub async fn export_to_file(
        &self,
        document: &DocumentId,
        mime_type: &str,
        dir: &Path,
        file_name: &str,
    ) -> Result<Artifact> {
        let bytes = self.export(document, mime_type).await?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, &bytes).await?;
        Ok(Artifact { path, bytes })
    }
}

/// An exported artifact on disk
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Reads chunks until the transfer completes or the chunk budget runs out
pub async fn pull_to_completion(
    mut download: Box<dyn ChunkedDownload>,
    max_chunks: usize,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut expected_total = None;

    for _ in 0..max_chunks {
        let chunk = match download.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                return Err(truncated(&buffer, "stream closed before completion"));
            }
            Err(e) => return Err(interrupted_read(e, &buffer)),
        };

        if chunk.total.is_some() {
            expected_total = chunk.total;
        }
        buffer.extend_from_slice(&chunk.bytes);

        if let Some(total) = expected_total {
            if buffer.len() as u64 > total {
                return Err(truncated(
                    &buffer,
                    &format!("received more than the announced {total} bytes"),
                ));
            }
        }

        if chunk.done {
            if let Some(total) = expected_total {
                if buffer.len() as u64 != total {
                    return Err(truncated(
                        &buffer,
                        &format!("completed with {} of {total} bytes", buffer.len()),
                    ));
                }
            }
            return Ok(buffer);
        }
    }

    Err(truncated(
        &buffer,
        &format!("no completion after {max_chunks} chunk reads"),
    ))
}

/// A failed chunk read ends the transfer as truncated, except when the
/// document or the credential itself is the problem
fn interrupted_read(err: InvoicerError, buffer: &[u8]) -> InvoicerError {
    match err {
        InvoicerError::Job(JobError::NotFound(_))
        | InvoicerError::Job(JobError::PermissionDenied(_))
        | InvoicerError::Job(JobError::Truncated { .. })
        | InvoicerError::Authentication(_) => err,
        other => truncated(buffer, &other.to_string()),
    }
}

fn truncated(buffer: &[u8], reason: &str) -> InvoicerError {
    JobError::Truncated {
        received: buffer.len() as u64,
        reason: reason.to_string(),
    }
    .into()
}
