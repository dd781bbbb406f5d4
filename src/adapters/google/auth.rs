//! OAuth credentials for the Google APIs
//!
//! The credential is persisted in the authorized-user JSON layout
//! (`token`, `refresh_token`, `token_uri`, `client_id`, `client_secret`,
//! `scopes`, `expiry`). [`SharedCredential`] hands out bearer tokens to every
//! adapter and refreshes at most once for all concurrent callers.

use super::http::{ensure_success, send_error};
use crate::config::schema::default_token_uri;
use crate::config::{load_client_secrets, secret_string, ClientSecrets, OAuthConfig, SecretString};
use crate::domain::{InvoicerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use url::Url;

/// Tokens expiring within this window are refreshed ahead of use
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// How long the loopback flow waits for the browser redirect
const AUTHORIZATION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Authorized-user credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Current access token
    #[serde(default)]
    pub token: Option<SecretString>,

    #[serde(default)]
    pub refresh_token: Option<SecretString>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    pub client_id: String,

    pub client_secret: SecretString,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Access token expiry; `None` means the token does not expire
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the access token is missing or about to expire
    pub fn expired(&self) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(_), Some(expiry)) => expiry - Utc::now() < Duration::seconds(EXPIRY_SKEW_SECONDS),
        }
    }

    /// Whether the credential was granted every scope in `scopes`
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Reads a credential from the token file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            InvoicerError::Authentication(format!(
                "Token file {} is not a valid credential: {e}",
                path.display()
            ))
        })
    }

    /// Writes the credential to the token file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "Credential saved");
        Ok(())
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Folds the response into `base`, keeping the old refresh token if none was issued
    fn apply(self, mut base: Credential) -> Credential {
        base.token = Some(secret_string(self.access_token));
        if let Some(refresh_token) = self.refresh_token {
            base.refresh_token = Some(secret_string(refresh_token));
        }
        base.expiry = self
            .expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds));
        if let Some(scope) = self.scope {
            base.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
        base
    }
}

async fn token_request(client: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| send_error(e, "Token request"))?;

    // The token endpoint answers 400 invalid_grant for revoked refresh tokens
    let status = response.status();
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(InvoicerError::Authentication(format!(
            "Token request rejected with status {status}: {body}"
        )));
    }
    let response = ensure_success(response, "Token request").await?;

    response.json().await.map_err(|e| {
        InvoicerError::Authentication(format!("Invalid token response: {e}"))
    })
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

/// [`TokenRefresher`] against the credential's `token_uri`
pub struct OAuthRefresher {
    client: Client,
}

impl OAuthRefresher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential.refresh_token.as_ref().ok_or_else(|| {
            InvoicerError::Authentication("Credential has no refresh token".to_string())
        })?;

        tracing::debug!(token_uri = %credential.token_uri, "Refreshing access token");

        let response = token_request(
            &self.client,
            &credential.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.expose_secret().as_ref()),
                ("refresh_token", refresh_token.expose_secret().as_ref()),
            ],
        )
        .await?;

        let refreshed = response.apply(credential.clone());
        tracing::info!(
            expires_at = ?refreshed.expiry,
            "Access token refreshed"
        );
        Ok(refreshed)
    }
}

/// Credential shared by every adapter of a run
///
/// Callers wait on one lock while a refresh is in flight, so concurrent jobs
/// trigger a single refresh.
pub struct SharedCredential {
    state: Mutex<Credential>,
    refresher: Arc<dyn TokenRefresher>,
    token_path: Option<PathBuf>,
}

impl SharedCredential {
    pub fn new(
        credential: Credential,
        refresher: Arc<dyn TokenRefresher>,
        token_path: Option<PathBuf>,
    ) -> Self {
        Self {
            state: Mutex::new(credential),
            refresher,
            token_path,
        }
    }

    /// `Authorization` header value, refreshing first when the token is stale
    pub async fn bearer(&self) -> Result<String> {
        let mut credential = self.state.lock().await;

        if credential.expired() {
            let refreshed = self.refresher.refresh(&credential).await?;
            if let Some(path) = &self.token_path {
                refreshed.save(path)?;
            }
            *credential = refreshed;
        }

        credential
            .token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret().as_ref()))
            .ok_or_else(|| InvoicerError::Authentication("No access token available".to_string()))
    }
}

/// Produces a usable credential at startup
pub struct CredentialProvider {
    client: Client,
}

impl CredentialProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Loads, refreshes or interactively obtains a credential
    ///
    /// 1. A stored credential covering the scopes is used as-is when fresh,
    ///    or refreshed when stale.
    /// 2. A missing, insufficient or unrefreshable credential falls back to
    ///    the interactive loopback flow with the installed-app client secrets.
    ///
    /// The credential is persisted to `oauth.token_path` whenever it changes.
    pub async fn get_credentials(&self, config: &OAuthConfig) -> Result<Credential> {
        let token_path = Path::new(&config.token_path);

        if token_path.exists() {
            match self.try_stored(token_path, &config.scopes).await {
                Ok(credential) => return Ok(credential),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Stored credential unusable, falling back to interactive authorization"
                ),
            }
        }

        let secrets = load_client_secrets(&config.credentials_path).map_err(|e| {
            InvoicerError::Authentication(format!("Cannot authorize interactively: {e}"))
        })?;
        let credential = authorize_interactively(&self.client, &secrets, &config.scopes).await?;
        credential.save(token_path)?;
        Ok(credential)
    }

    async fn try_stored(&self, token_path: &Path, scopes: &[String]) -> Result<Credential> {
        let credential = Credential::load(token_path)?;
        if !credential.covers(scopes) {
            return Err(InvoicerError::Authentication(
                "Stored credential lacks required scopes".to_string(),
            ));
        }
        if !credential.expired() {
            return Ok(credential);
        }

        let refreshed = OAuthRefresher::new(self.client.clone())
            .refresh(&credential)
            .await?;
        refreshed.save(token_path)?;
        Ok(refreshed)
    }
}

/// Runs the installed-app loopback flow
///
/// Prints the consent URL, waits for the browser redirect on a local port and
/// exchanges the code for tokens.
pub async fn authorize_interactively(
    client: &Client,
    secrets: &ClientSecrets,
    scopes: &[String],
) -> Result<Credential> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();

    let consent_url = consent_url(secrets, scopes, &redirect_uri, &state)?;
    eprintln!("Authorize the invoicer by opening this URL in a browser:\n\n  {consent_url}\n");

    let (stream, _) = tokio::time::timeout(AUTHORIZATION_TIMEOUT, listener.accept())
        .await
        .map_err(|_| InvoicerError::Authentication("Timed out waiting for authorization".into()))??;

    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let outcome = parse_callback(&request_line, &state);

    let reply = match &outcome {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. Check the terminal for details.",
    };
    let mut stream = reader.into_inner();
    stream
        .write_all(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            )
            .as_bytes(),
        )
        .await?;
    stream.shutdown().await.ok();

    let code = outcome?;
    let response = token_request(
        client,
        &secrets.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.expose_secret().as_ref()),
            ("redirect_uri", redirect_uri.as_str()),
        ],
    )
    .await?;

    let base = Credential {
        token: None,
        refresh_token: None,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: scopes.to_vec(),
        expiry: None,
    };
    tracing::info!("Interactive authorization completed");
    Ok(response.apply(base))
}

fn consent_url(secrets: &ClientSecrets, scopes: &[String], redirect_uri: &str, state: &str) -> Result<Url> {
    let mut url = Url::parse(&secrets.auth_uri).map_err(|e| {
        InvoicerError::Configuration(format!("Invalid auth_uri '{}': {e}", secrets.auth_uri))
    })?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", state);
    Ok(url)
}

/// Extracts the authorization code from the redirect's request line
fn parse_callback(request_line: &str, expected_state: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| InvoicerError::Authentication("Malformed authorization redirect".into()))?;
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| InvoicerError::Authentication(format!("Malformed authorization redirect: {e}")))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(InvoicerError::Authentication(format!(
            "Authorization was denied: {error}"
        )));
    }
    if param("state").as_deref() != Some(expected_state) {
        return Err(InvoicerError::Authentication(
            "Authorization redirect carried an unexpected state".into(),
        ));
    }
    param("code").ok_or_else(|| {
        InvoicerError::Authentication("Authorization redirect carried no code".into())
    })
}
