//! Google Workspace backends
//!
//! - [`drive`] - template copies, folder checks and exports
//! - [`docs`] - placeholder replacement and document text
//! - [`sheets`] - the recipient sheet
//! - [`gmail`] - message dispatch
//! - [`auth`] - OAuth credentials shared by all of the above
//!
//! ```rust,no_run
//! use invoicer::adapters::google::GoogleWorkspace;
//! use invoicer::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("config.yaml")?;
//! let workspace = GoogleWorkspace::connect(&config).await?;
//! let rows = workspace.recipient_source(&config.recipients).read_rows().await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod docs;
pub mod drive;
pub mod gmail;
pub mod http;
pub mod sheets;

pub use auth::{Credential, CredentialProvider, OAuthRefresher, SharedCredential, TokenRefresher};
pub use docs::{DocsClient, GoogleDocuments};
pub use drive::DriveClient;
pub use gmail::GmailClient;
pub use http::{build_client, AuthorizedClient, GoogleEndpoints};
pub use sheets::SheetsClient;

use crate::adapters::traits::{Backends, RecipientSource};
use crate::config::{InvoicerConfig, RecipientsConfig};
use crate::domain::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Authorized access to the Google APIs of one account
pub struct GoogleWorkspace {
    api: AuthorizedClient,
    endpoints: GoogleEndpoints,
    user_id: String,
}

impl GoogleWorkspace {
    /// Obtains a credential (interactively if needed) and connects
    pub async fn connect(config: &InvoicerConfig) -> Result<Self> {
        let http = build_client(REQUEST_TIMEOUT)?;
        let credential = CredentialProvider::new(http.clone())
            .get_credentials(&config.oauth)
            .await?;

        let shared = SharedCredential::new(
            credential,
            Arc::new(OAuthRefresher::new(http.clone())),
            Some(PathBuf::from(&config.oauth.token_path)),
        );
        tracing::info!(user_id = %config.message.user_id, "Connected to Google Workspace");

        Ok(Self {
            api: AuthorizedClient::new(http, Arc::new(shared)),
            endpoints: GoogleEndpoints::default(),
            user_id: config.message.user_id.clone(),
        })
    }

    /// Workspace over an existing credential and custom endpoints
    pub fn with_credential(
        http: reqwest::Client,
        credential: Arc<SharedCredential>,
        endpoints: GoogleEndpoints,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            api: AuthorizedClient::new(http, credential),
            endpoints,
            user_id: user_id.into(),
        }
    }

    pub fn drive(&self) -> DriveClient {
        DriveClient::new(self.api.clone(), &self.endpoints.drive)
    }

    pub fn docs(&self) -> DocsClient {
        DocsClient::new(self.api.clone(), &self.endpoints.docs)
    }

    /// Document, export and dispatch backends for an invoice run
    pub fn backends(&self) -> Backends {
        let drive = self.drive();
        Backends {
            documents: Arc::new(GoogleDocuments::new(drive.clone(), self.docs())),
            exports: Arc::new(drive),
            dispatcher: Arc::new(GmailClient::new(
                self.api.clone(),
                &self.endpoints.gmail,
                &self.user_id,
            )),
        }
    }

    pub fn recipient_source(&self, config: &RecipientsConfig) -> Box<dyn RecipientSource> {
        Box::new(SheetsClient::new(self.api.clone(), &self.endpoints.sheets, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::tests::sample_config;
    use crate::config::secret_string;
    use crate::domain::TargetLocation;
    use mockito::Matcher;

    fn workspace(server: &mockito::Server) -> GoogleWorkspace {
        let http = reqwest::Client::new();
        let credential = Credential {
            token: Some(secret_string("test-token".to_string())),
            refresh_token: None,
            token_uri: format!("{}/token", server.url()),
            client_id: "client".to_string(),
            client_secret: secret_string("secret".to_string()),
            scopes: Vec::new(),
            expiry: None,
        };
        let shared = SharedCredential::new(credential, Arc::new(OAuthRefresher::new(http.clone())), None);
        GoogleWorkspace::with_credential(
            http,
            Arc::new(shared),
            GoogleEndpoints::uniform(&server.url()),
            "me",
        )
    }

    #[tokio::test]
    async fn test_backends_share_endpoints_and_bearer() {
        let mut server = mockito::Server::new_async().await;
        let sheet = server
            .mock("GET", "/v4/spreadsheets/sheet-123/values/Leden!A1:F")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"{"values":[["Naam","Email"],["Jan","jan@example.org"]]}"#)
            .create_async()
            .await;
        let folder = server
            .mock("GET", "/drive/v3/files/folder-xyz")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"{"id":"folder-xyz","mimeType":"application/vnd.google-apps.folder","trashed":false}"#)
            .create_async()
            .await;

        let workspace = workspace(&server);
        let rows = workspace
            .recipient_source(&sample_config().recipients)
            .read_rows()
            .await
            .unwrap();
        let exists = workspace
            .backends()
            .documents
            .folder_exists(&TargetLocation::new("folder-xyz").unwrap())
            .await
            .unwrap();

        sheet.assert_async().await;
        folder.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert!(exists);
    }
}
