//! In-memory workspace backend
//!
//! Implements every backend trait over plain in-process state, with call
//! counters and failure injection. Used by the test suites and handy for
//! exercising the pipeline without network access.

use super::traits::{
    Backends, ChunkedDownload, DocumentBackend, DownloadChunk, ExportBackend, MessageDispatcher,
    RecipientSource,
};
use crate::domain::{
    ComposedMessage, DispatchReceipt, DocumentId, InvoicerError, JobError, Result,
    TargetLocation,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Export formats the memory backend accepts
const SUPPORTED_EXPORTS: [&str; 3] = [
    "application/pdf",
    "text/plain",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Template text used by [`MemoryWorkspace::with_defaults`]
pub const DEFAULT_TEMPLATE_TEXT: &str = "Factuur {{invoice_id}}\n\
{{recipient_name}}\n{{address}}\n{{postcode}} {{city}}\nDatum: {{date}}";

/// Number of calls per backend operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    pub copy: usize,
    pub batch_replace: usize,
    pub document_text: usize,
    pub folder_exists: usize,
    pub open_export: usize,
    pub export_reads: usize,
    pub send: usize,
}

/// Backend operation, for transient failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Copy,
    BatchReplace,
    OpenExport,
    Send,
}

#[derive(Debug, Clone)]
struct MemoryDocument {
    name: String,
    parent: Option<String>,
    text: String,
}

type SendHook = Box<dyn Fn(&ComposedMessage) + Send + Sync>;

#[derive(Default)]
struct State {
    documents: HashMap<String, MemoryDocument>,
    folders: HashSet<String>,
    next_id: usize,
    counters: CallCounters,
    sent: Vec<ComposedMessage>,
    export_failures: Vec<(String, JobError)>,
    send_failures: HashMap<String, FailureKind>,
    transient: HashMap<Operation, usize>,
}

#[derive(Debug, Clone)]
enum FailureKind {
    Job(JobError),
    Unauthorized(String),
}

/// In-memory document store, exporter and mail outbox
pub struct MemoryWorkspace {
    state: Mutex<State>,
    chunk_size: usize,
    export_reads: Arc<AtomicUsize>,
    on_send: Mutex<Option<SendHook>>,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            chunk_size: 16,
            export_reads: Arc::new(AtomicUsize::new(0)),
            on_send: Mutex::new(None),
        }
    }

    /// A workspace holding a template with the default placeholders and a folder
    pub fn with_defaults(template_id: &str, folder_id: &str) -> Self {
        let workspace = Self::new();
        workspace.add_document(template_id, DEFAULT_TEMPLATE_TEXT);
        workspace.add_folder(folder_id);
        workspace
    }

    /// Sets the size of export chunks
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_document(&self, id: &str, text: &str) {
        self.state().documents.insert(
            id.to_string(),
            MemoryDocument {
                name: id.to_string(),
                parent: None,
                text: text.to_string(),
            },
        );
    }

    pub fn add_folder(&self, id: &str) {
        self.state().folders.insert(id.to_string());
    }

    /// Exports of documents whose name contains `name_fragment` fail with `error`
    pub fn fail_export_for(&self, name_fragment: &str, error: JobError) {
        self.state()
            .export_failures
            .push((name_fragment.to_string(), error));
    }

    /// Sending to `address` fails with `error`
    pub fn fail_send_to(&self, address: &str, error: JobError) {
        self.state()
            .send_failures
            .insert(address.to_string(), FailureKind::Job(error));
    }

    /// Sending to `address` fails as if the credential had been revoked
    pub fn reject_credential_on_send_to(&self, address: &str, reason: &str) {
        self.state().send_failures.insert(
            address.to_string(),
            FailureKind::Unauthorized(reason.to_string()),
        );
    }

    /// The next `times` calls of `operation` fail with a transient error
    pub fn fail_transiently(&self, operation: Operation, times: usize) {
        self.state().transient.insert(operation, times);
    }

    /// Runs `hook` after every accepted message
    pub fn on_send(&self, hook: impl Fn(&ComposedMessage) + Send + Sync + 'static) {
        *self.on_send.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn counters(&self) -> CallCounters {
        let mut counters = self.state().counters;
        counters.export_reads = self.export_reads.load(Ordering::SeqCst);
        counters
    }

    /// Messages accepted so far, in send order
    pub fn sent(&self) -> Vec<ComposedMessage> {
        self.state().sent.clone()
    }

    pub fn text_of(&self, document: &DocumentId) -> Option<String> {
        self.state()
            .documents
            .get(document.as_str())
            .map(|d| d.text.clone())
    }

    pub fn name_of(&self, document: &DocumentId) -> Option<String> {
        self.state()
            .documents
            .get(document.as_str())
            .map(|d| d.name.clone())
    }

    pub fn parent_of(&self, document: &DocumentId) -> Option<String> {
        self.state()
            .documents
            .get(document.as_str())
            .and_then(|d| d.parent.clone())
    }

    /// Documents created inside `folder`, sorted by name
    pub fn documents_in(&self, folder: &str) -> Vec<(String, String)> {
        let mut documents: Vec<(String, String)> = self
            .state()
            .documents
            .values()
            .filter(|d| d.parent.as_deref() == Some(folder))
            .map(|d| (d.name.clone(), d.text.clone()))
            .collect();
        documents.sort();
        documents
    }

    /// The backends of this workspace, ready for an orchestrator
    pub fn backends(self: &Arc<Self>) -> Backends {
        Backends {
            documents: self.clone(),
            exports: self.clone(),
            dispatcher: self.clone(),
        }
    }

    fn take_transient(state: &mut State, operation: Operation) -> Result<()> {
        if let Some(remaining) = state.transient.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(InvoicerError::Transient(format!(
                    "{operation:?}: 503 Service Unavailable"
                )));
            }
        }
        Ok(())
    }
}

fn not_found(what: &str, id: &str) -> InvoicerError {
    JobError::NotFound(format!("{what} {id}")).into()
}

#[async_trait]
impl DocumentBackend for MemoryWorkspace {
    async fn copy_document(
        &self,
        source: &DocumentId,
        name: &str,
        parent: &TargetLocation,
    ) -> Result<DocumentId> {
        let mut state = self.state();
        state.counters.copy += 1;
        Self::take_transient(&mut state, Operation::Copy)?;

        let text = state
            .documents
            .get(source.as_str())
            .map(|d| d.text.clone())
            .ok_or_else(|| not_found("Document", source.as_str()))?;
        if !state.folders.contains(parent.as_str()) {
            return Err(not_found("Folder", parent.as_str()));
        }

        state.next_id += 1;
        let id = format!("copy-{}", state.next_id);
        state.documents.insert(
            id.clone(),
            MemoryDocument {
                name: name.to_string(),
                parent: Some(parent.as_str().to_string()),
                text,
            },
        );
        DocumentId::new(id).map_err(InvoicerError::Other)
    }

    async fn batch_replace(
        &self,
        document: &DocumentId,
        replacements: &[(String, String)],
    ) -> Result<()> {
        let mut state = self.state();
        state.counters.batch_replace += 1;
        Self::take_transient(&mut state, Operation::BatchReplace)?;

        let doc = state
            .documents
            .get_mut(document.as_str())
            .ok_or_else(|| not_found("Document", document.as_str()))?;
        for (find, replace) in replacements {
            if !find.is_empty() {
                doc.text = doc.text.replace(find.as_str(), replace);
            }
        }
        Ok(())
    }

    async fn document_text(&self, document: &DocumentId) -> Result<String> {
        let mut state = self.state();
        state.counters.document_text += 1;
        state
            .documents
            .get(document.as_str())
            .map(|d| d.text.clone())
            .ok_or_else(|| not_found("Document", document.as_str()))
    }

    async fn folder_exists(&self, location: &TargetLocation) -> Result<bool> {
        let mut state = self.state();
        state.counters.folder_exists += 1;
        Ok(state.folders.contains(location.as_str()))
    }
}

#[async_trait]
impl ExportBackend for MemoryWorkspace {
    async fn open_export(
        &self,
        document: &DocumentId,
        mime_type: &str,
    ) -> Result<Box<dyn ChunkedDownload>> {
        let mut state = self.state();
        state.counters.open_export += 1;
        Self::take_transient(&mut state, Operation::OpenExport)?;

        let doc = state
            .documents
            .get(document.as_str())
            .ok_or_else(|| not_found("Document", document.as_str()))?;

        if let Some((_, error)) = state
            .export_failures
            .iter()
            .find(|(fragment, _)| doc.name.contains(fragment.as_str()))
        {
            return Err(error.clone().into());
        }
        if !SUPPORTED_EXPORTS.contains(&mime_type) {
            return Err(JobError::Backend(format!("Export to {mime_type} is not supported")).into());
        }

        let bytes = format!("%PDF-memory\n{}", doc.text).into_bytes();
        let total = bytes.len() as u64;
        let pieces: Vec<&[u8]> = bytes.chunks(self.chunk_size).collect();
        let last = pieces.len().saturating_sub(1);
        let chunks = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| DownloadChunk {
                bytes: piece.to_vec(),
                total: Some(total),
                done: i == last,
            })
            .collect();

        Ok(Box::new(ScriptedDownload::with_counter(
            chunks,
            self.export_reads.clone(),
        )))
    }
}

#[async_trait]
impl MessageDispatcher for MemoryWorkspace {
    async fn send(&self, message: &ComposedMessage) -> Result<DispatchReceipt> {
        let receipt = {
            let mut state = self.state();
            state.counters.send += 1;
            Self::take_transient(&mut state, Operation::Send)?;

            match state.send_failures.get(message.recipient()) {
                Some(FailureKind::Job(error)) => return Err(error.clone().into()),
                Some(FailureKind::Unauthorized(reason)) => {
                    return Err(InvoicerError::Authentication(reason.clone()))
                }
                None => {}
            }

            state.sent.push(message.clone());
            DispatchReceipt {
                message_id: format!("msg-{}", state.sent.len()),
            }
        };

        if let Some(hook) = self
            .on_send
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook(message);
        }
        Ok(receipt)
    }
}

/// Recipient source over a fixed cell grid
pub struct MemoryRecipients {
    rows: Vec<Vec<String>>,
}

impl MemoryRecipients {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Builds the grid from string slices, header first
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }
}

#[async_trait]
impl RecipientSource for MemoryRecipients {
    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.rows.clone())
    }

    fn location(&self) -> String {
        "memory://recipients".to_string()
    }
}

/// A download that replays a fixed list of chunks, then closes
pub struct ScriptedDownload {
    chunks: std::vec::IntoIter<DownloadChunk>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedDownload {
    pub fn new(chunks: Vec<DownloadChunk>) -> Self {
        Self::with_counter(chunks, Arc::new(AtomicUsize::new(0)))
    }

    fn with_counter(chunks: Vec<DownloadChunk>, reads: Arc<AtomicUsize>) -> Self {
        Self {
            chunks: chunks.into_iter(),
            reads,
        }
    }

    /// Counter of `next_chunk` calls
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

#[async_trait]
impl ChunkedDownload for ScriptedDownload {
    async fn next_chunk(&mut self) -> Result<Option<DownloadChunk>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.chunks.next())
    }
}
