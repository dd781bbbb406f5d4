//! Google Docs adapter

use super::drive::DriveClient;
use super::http::{endpoint, AuthorizedClient};
use crate::adapters::traits::DocumentBackend;
use crate::domain::{DocumentId, Result, TargetLocation};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Docs v1 client
#[derive(Clone)]
pub struct DocsClient {
    api: AuthorizedClient,
    base: String,
}

impl DocsClient {
    pub fn new(api: AuthorizedClient, base: impl Into<String>) -> Self {
        Self {
            api,
            base: base.into(),
        }
    }

    /// Sends every pair as a `replaceAllText` request in one batch update
    pub async fn batch_replace(
        &self,
        document: &DocumentId,
        replacements: &[(String, String)],
    ) -> Result<()> {
        if replacements.is_empty() {
            return Ok(());
        }

        let requests: Vec<Value> = replacements
            .iter()
            .map(|(find, replace)| {
                json!({
                    "replaceAllText": {
                        "containsText": { "text": find, "matchCase": true },
                        "replaceText": replace,
                    }
                })
            })
            .collect();

        let url = endpoint(
            &self.base,
            &["documents", &format!("{}:batchUpdate", document.as_str())],
        )?;
        let request = self
            .api
            .http()
            .post(url)
            .json(&json!({ "requests": requests }));
        self.api.send(request, "Docs batch update").await?;

        tracing::debug!(
            document_id = %document,
            replacements = replacements.len(),
            "Placeholders replaced"
        );
        Ok(())
    }

    /// Concatenated text runs of the document body
    pub async fn document_text(&self, document: &DocumentId) -> Result<String> {
        let url = endpoint(&self.base, &["documents", document.as_str()])?;
        let body: Value = self
            .api
            .send_json(self.api.http().get(url), "Docs get")
            .await?;

        let mut text = String::new();
        if let Some(content) = body["body"]["content"].as_array() {
            collect_text(content, &mut text);
        }
        Ok(text)
    }
}

/// Walks structural elements, descending into tables and tables of contents
fn collect_text(elements: &[Value], out: &mut String) {
    for element in elements {
        if let Some(runs) = element["paragraph"]["elements"].as_array() {
            for run in runs {
                if let Some(content) = run["textRun"]["content"].as_str() {
                    out.push_str(content);
                }
            }
        }
        if let Some(rows) = element["table"]["tableRows"].as_array() {
            for cell in rows.iter().filter_map(|row| row["tableCells"].as_array()).flatten() {
                if let Some(content) = cell["content"].as_array() {
                    collect_text(content, out);
                }
            }
        }
        if let Some(content) = element["tableOfContents"]["content"].as_array() {
            collect_text(content, out);
        }
    }
}

/// [`DocumentBackend`] over Drive (copies, folders) and Docs (content)
#[derive(Clone)]
pub struct GoogleDocuments {
    drive: DriveClient,
    docs: DocsClient,
}

impl GoogleDocuments {
    pub fn new(drive: DriveClient, docs: DocsClient) -> Self {
        Self { drive, docs }
    }
}

#[async_trait]
impl DocumentBackend for GoogleDocuments {
    async fn copy_document(
        &self,
        source: &DocumentId,
        name: &str,
        parent: &TargetLocation,
    ) -> Result<DocumentId> {
        self.drive.copy_file(source, name, parent).await
    }

    async fn batch_replace(
        &self,
        document: &DocumentId,
        replacements: &[(String, String)],
    ) -> Result<()> {
        self.docs.batch_replace(document, replacements).await
    }

    async fn document_text(&self, document: &DocumentId) -> Result<String> {
        self.docs.document_text(document).await
    }

    async fn folder_exists(&self, location: &TargetLocation) -> Result<bool> {
        self.drive.folder_exists(location).await
    }
}
