//! Google Drive adapter
//!
//! Copies the template, checks the target folder and exports documents.
//! Exports are read with `Range` requests so large artifacts arrive in
//! bounded chunks.

use super::http::{endpoint, AuthorizedClient};
use crate::adapters::traits::{ChunkedDownload, DownloadChunk, ExportBackend};
use crate::domain::{DocumentId, InvoicerError, JobError, Result, TargetLocation};
use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Bytes requested per export read
const EXPORT_CHUNK_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    id: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    trashed: bool,
}

/// Drive v3 client
#[derive(Clone)]
pub struct DriveClient {
    api: AuthorizedClient,
    base: String,
    chunk_bytes: u64,
}

impl DriveClient {
    pub fn new(api: AuthorizedClient, base: impl Into<String>) -> Self {
        Self {
            api,
            base: base.into(),
            chunk_bytes: EXPORT_CHUNK_BYTES,
        }
    }

    /// Overrides the export read size
    pub fn with_chunk_bytes(mut self, chunk_bytes: u64) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Copies `source` into `parent` under `name`
    pub async fn copy_file(
        &self,
        source: &DocumentId,
        name: &str,
        parent: &TargetLocation,
    ) -> Result<DocumentId> {
        let url = endpoint(&self.base, &["files", source.as_str(), "copy"])?;
        let request = self
            .api
            .http()
            .post(url)
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({ "name": name, "parents": [parent.as_str()] }));

        let file: FileMetadata = self.api.send_json(request, "Drive copy").await?;
        tracing::debug!(source = %source, copy = %file.id, name, "Template copied");
        DocumentId::new(file.id)
            .map_err(|e| JobError::Backend(format!("Drive copy returned an unusable id: {e}")).into())
    }

    /// Whether `location` is an existing folder that is not in the trash
    pub async fn folder_exists(&self, location: &TargetLocation) -> Result<bool> {
        let url = endpoint(&self.base, &["files", location.as_str()])?;
        let request = self
            .api
            .http()
            .get(url)
            .query(&[("supportsAllDrives", "true"), ("fields", "id,mimeType,trashed")]);

        match self.api.send_json::<FileMetadata>(request, "Drive folder lookup").await {
            Ok(file) => Ok(!file.trashed && file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)),
            Err(InvoicerError::Job(JobError::NotFound(_))) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn export_url(&self, document: &DocumentId, mime_type: &str) -> Result<Url> {
        let mut url = endpoint(&self.base, &["files", document.as_str(), "export"])?;
        url.query_pairs_mut().append_pair("mimeType", mime_type);
        Ok(url)
    }
}

#[async_trait]
impl ExportBackend for DriveClient {
    /// Issues the first range request before returning
    ///
    /// Failures of the first read therefore surface from `open_export`, where
    /// the caller can still retry them.
    async fn open_export(
        &self,
        document: &DocumentId,
        mime_type: &str,
    ) -> Result<Box<dyn ChunkedDownload>> {
        let mut download = DriveExport {
            api: self.api.clone(),
            url: self.export_url(document, mime_type)?,
            chunk_bytes: self.chunk_bytes,
            offset: 0,
            pending: None,
            finished: false,
        };
        let first = download.fetch().await?;
        download.pending = Some(first);
        Ok(Box::new(download))
    }
}

/// Export in progress
struct DriveExport {
    api: AuthorizedClient,
    url: Url,
    chunk_bytes: u64,
    offset: u64,
    pending: Option<DownloadChunk>,
    finished: bool,
}

impl DriveExport {
    async fn fetch(&mut self) -> Result<DownloadChunk> {
        let last = self.offset + self.chunk_bytes - 1;
        let request = self
            .api
            .http()
            .get(self.url.clone())
            .header(RANGE, format!("bytes={}-{last}", self.offset));

        let response = self.api.execute(request, "Drive export").await?;
        let status = response.status();

        let chunk = match status {
            StatusCode::PARTIAL_CONTENT => {
                let range = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range)
                    .ok_or_else(|| {
                        JobError::Backend("Drive export: missing or invalid Content-Range".into())
                    })?;
                if range.start != self.offset {
                    return Err(JobError::Truncated {
                        received: self.offset,
                        reason: format!(
                            "range restarted at byte {} instead of {}",
                            range.start, self.offset
                        ),
                    }
                    .into());
                }
                let bytes = read_body(response).await?;
                let done = range.total.is_some_and(|total| range.end + 1 >= total);
                DownloadChunk {
                    bytes,
                    total: range.total,
                    done,
                }
            }
            // Served without range support: the body is the whole artifact
            StatusCode::OK => {
                let bytes = read_body(response).await?;
                DownloadChunk {
                    total: Some(self.offset + bytes.len() as u64),
                    bytes,
                    done: true,
                }
            }
            // An empty artifact cannot satisfy any range
            StatusCode::RANGE_NOT_SATISFIABLE if self.offset == 0 => DownloadChunk {
                bytes: Vec::new(),
                total: Some(0),
                done: true,
            },
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(super::http::status_error(status, "Drive export", &body));
            }
        };

        self.offset += chunk.bytes.len() as u64;
        self.finished = chunk.done;
        Ok(chunk)
    }
}

#[async_trait]
impl ChunkedDownload for DriveExport {
    async fn next_chunk(&mut self) -> Result<Option<DownloadChunk>> {
        if let Some(chunk) = self.pending.take() {
            return Ok(Some(chunk));
        }
        if self.finished {
            return Ok(None);
        }
        self.fetch().await.map(Some)
    }
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| InvoicerError::Transient(format!("Drive export body: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    end: u64,
    total: Option<u64>,
}

/// Parses `bytes <start>-<end>/<total|*>`
fn parse_content_range(value: &str) -> Option<ContentRange> {
    let spec = value.trim().strip_prefix("bytes ")?;
    let (range, total) = spec.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        n => Some(n.parse().ok()?),
    };
    Some(ContentRange { start, end, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::google::http::tests::test_client;
    use crate::core::exporter::pull_to_completion;
    use mockito::Matcher;

    fn drive(server: &mockito::Server) -> DriveClient {
        DriveClient::new(test_client(), format!("{}/drive/v3", server.url()))
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(
            parse_content_range("bytes 0-99/1234"),
            Some(ContentRange {
                start: 0,
                end: 99,
                total: Some(1234)
            })
        );
        assert_eq!(parse_content_range("bytes 5-9/*").unwrap().total, None);
        assert!(parse_content_range("bytes 9-5/10").is_none());
        assert!(parse_content_range("items 0-1/2").is_none());
    }

    #[tokio::test]
    async fn test_copy_file_posts_name_and_parent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/drive/v3/files/template-abc/copy")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({
                "name": "Factuur id INV-1 voor Jan",
                "parents": ["folder-xyz"]
            })))
            .with_status(200)
            .with_body(r#"{"id":"copy-1"}"#)
            .create_async()
            .await;

        let copy = drive(&server)
            .copy_file(
                &DocumentId::new("template-abc").unwrap(),
                "Factuur id INV-1 voor Jan",
                &TargetLocation::new("folder-xyz").unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(copy.as_str(), "copy-1");
    }

    #[tokio::test]
    async fn test_copy_missing_template_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/drive/v3/files/gone/copy")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"File not found: gone."}}"#)
            .create_async()
            .await;

        let result = drive(&server)
            .copy_file(
                &DocumentId::new("gone").unwrap(),
                "x",
                &TargetLocation::new("folder").unwrap(),
            )
            .await;

        match result {
            Err(InvoicerError::Job(JobError::NotFound(msg))) => {
                assert!(msg.contains("File not found"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_folder_exists() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/folder-xyz")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"id":"folder-xyz","mimeType":"{FOLDER_MIME_TYPE}","trashed":false}}"#
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/drive/v3/files/a-document")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"a-document","mimeType":"application/vnd.google-apps.document"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/drive/v3/files/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = drive(&server);
        let exists = |id: &str| {
            let client = client.clone();
            let location = TargetLocation::new(id).unwrap();
            async move { client.folder_exists(&location).await.unwrap() }
        };
        assert!(exists("folder-xyz").await);
        assert!(!exists("a-document").await);
        assert!(!exists("missing").await);
    }

    #[tokio::test]
    async fn test_export_reads_ranges_until_complete() {
        let mut server = mockito::Server::new_async().await;
        let path = "/drive/v3/files/copy-1/export";
        let first = server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded("mimeType".into(), "application/pdf".into()))
            .match_header("range", "bytes=0-3")
            .with_status(206)
            .with_header("content-range", "bytes 0-3/10")
            .with_body("%PDF")
            .create_async()
            .await;
        let second = server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .match_header("range", "bytes=4-7")
            .with_status(206)
            .with_header("content-range", "bytes 4-7/10")
            .with_body("-1.7")
            .create_async()
            .await;
        let third = server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .match_header("range", "bytes=8-11")
            .with_status(206)
            .with_header("content-range", "bytes 8-9/10")
            .with_body("\n%")
            .create_async()
            .await;

        let download = drive(&server)
            .with_chunk_bytes(4)
            .open_export(&DocumentId::new("copy-1").unwrap(), "application/pdf")
            .await
            .unwrap();
        let bytes = pull_to_completion(download, 8).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
        assert_eq!(bytes, b"%PDF-1.7\n%");
    }

    #[tokio::test]
    async fn test_export_without_range_support() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/copy-1/export")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("whole artifact")
            .create_async()
            .await;

        let download = drive(&server)
            .open_export(&DocumentId::new("copy-1").unwrap(), "application/pdf")
            .await
            .unwrap();
        let bytes = pull_to_completion(download, 2).await.unwrap();
        assert_eq!(bytes, b"whole artifact");
    }

    #[tokio::test]
    async fn test_export_open_failure_surfaces_immediately() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/copy-1/export")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let result = drive(&server)
            .open_export(&DocumentId::new("copy-1").unwrap(), "application/pdf")
            .await;
        assert!(matches!(result, Err(InvoicerError::Transient(_))));
    }

    #[tokio::test]
    async fn test_unsupported_export_format_is_backend_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/copy-1/export")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"The requested conversion is not supported."}}"#)
            .create_async()
            .await;

        let result = drive(&server)
            .open_export(&DocumentId::new("copy-1").unwrap(), "image/gif")
            .await;
        assert!(matches!(
            result,
            Err(InvoicerError::Job(JobError::Backend(_)))
        ));
    }
}
