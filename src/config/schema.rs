//! Configuration schema types
//!
//! This module defines the configuration structure that maps to `config.yaml`.

use crate::config::SecretString;
use crate::domain::{FieldMapping, InvoiceIdScheme, RunValue};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

/// Main invoicer configuration
///
/// This is the root configuration structure that maps to the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicerConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// OAuth client and token locations
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Recipient spreadsheet
    pub recipients: RecipientsConfig,

    /// Invoice template, destination and field set
    pub invoice: InvoiceConfig,

    /// Outgoing message settings
    pub message: MessageConfig,

    /// Retry policy for transient backend errors
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InvoicerConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.oauth.validate()?;
        self.recipients.validate()?;
        self.invoice.validate()?;
        self.message.validate()?;
        self.retry.validate()?;
        self.logging.validate()?;

        // Every column-bound placeholder must name a configured or known column
        for field in &self.invoice.fields {
            if let Some(column) = &field.column {
                if column.trim().is_empty() {
                    return Err(format!(
                        "Field '{}' names an empty column",
                        field.placeholder
                    ));
                }
            }
        }
        Ok(())
    }

    /// The effective field set: configured fields, or the default set bound
    /// to the configured recipient columns
    pub fn field_mappings(&self) -> Vec<FieldMapping> {
        if !self.invoice.fields.is_empty() {
            return self.invoice.fields.clone();
        }
        let columns = &self.recipients.columns;
        vec![
            FieldMapping::column("{{recipient_name}}", columns.name.clone()),
            FieldMapping::column("{{address}}", columns.address.clone()),
            FieldMapping::column("{{postcode}}", columns.postcode.clone()),
            FieldMapping::column("{{city}}", columns.city.clone()),
            FieldMapping::run_value("{{date}}", RunValue::Date),
            FieldMapping::run_value("{{invoice_id}}", RunValue::InvoiceId),
        ]
    }

    /// Columns the recipient source must provide
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = self.recipients.columns.all();
        for field in self.field_mappings() {
            if let Some(column) = field.column {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        columns
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Installed-app client secrets JSON downloaded from the cloud console
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    /// Where the authorized-user token is persisted between runs
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// OAuth scopes requested during authorization
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    fn validate(&self) -> Result<(), String> {
        if self.credentials_path.is_empty() {
            return Err("oauth.credentials_path cannot be empty".to_string());
        }
        if self.token_path.is_empty() {
            return Err("oauth.token_path cannot be empty".to_string());
        }
        if self.scopes.is_empty() {
            return Err("oauth.scopes cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            scopes: default_scopes(),
        }
    }
}

/// Recipient spreadsheet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientsConfig {
    /// Spreadsheet ID
    pub sheet_id: String,

    /// Tab (sheet) name
    pub tab: String,

    /// A1 range within the tab, header row included
    #[serde(default = "default_range")]
    pub range: String,

    /// Header names of the expected columns
    pub columns: RecipientColumns,
}

impl RecipientsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sheet_id.trim().is_empty() {
            return Err("recipients.sheet_id cannot be empty".to_string());
        }
        if self.tab.trim().is_empty() {
            return Err("recipients.tab cannot be empty".to_string());
        }
        if self.range.trim().is_empty() {
            return Err("recipients.range cannot be empty".to_string());
        }
        self.columns.validate()
    }

    /// `tab!range` reference used by the values API
    pub fn a1_range(&self) -> String {
        format!("{}!{}", self.tab, self.range)
    }

    /// Human-locatable link to the sheet
    pub fn sheet_link(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.sheet_id)
    }
}

/// Header names of the columns every recipient row must have
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientColumns {
    pub name: String,
    pub email: String,
    pub address: String,
    pub postcode: String,
    pub city: String,
}

impl RecipientColumns {
    fn validate(&self) -> Result<(), String> {
        for (key, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("address", &self.address),
            ("postcode", &self.postcode),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(format!("recipients.columns.{key} cannot be empty"));
            }
        }
        Ok(())
    }

    /// All expected column names
    pub fn all(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.email.clone(),
            self.address.clone(),
            self.postcode.clone(),
            self.city.clone(),
        ]
    }
}

/// Invoice generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceConfig {
    /// Template document ID
    pub template_doc_id: String,

    /// Destination folder ID (must already exist)
    pub target_folder_id: String,

    /// Period label; defaults to the current month (`YYYY-MM`)
    #[serde(default)]
    pub period: Option<String>,

    /// Invoice ID derivation scheme
    #[serde(default)]
    pub id_scheme: InvoiceIdScheme,

    /// Prefix of every invoice ID
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Name of the created documents; `{invoice_id}` and `{recipient_name}` are interpolated
    #[serde(default = "default_document_name")]
    pub document_name: String,

    /// Export format of the attachment
    #[serde(default = "default_export_mime_type")]
    pub export_mime_type: String,

    /// File name of the attachment
    #[serde(default = "default_attachment_name")]
    pub attachment_name: String,

    /// chrono format of the `date` run value
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Number of recipients processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound on chunk reads per export
    #[serde(default = "default_max_export_chunks")]
    pub max_export_chunks: usize,

    /// Placeholder bindings; empty means the default set
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

impl InvoiceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.template_doc_id.trim().is_empty() {
            return Err("invoice.template_doc_id cannot be empty".to_string());
        }
        if self.target_folder_id.trim().is_empty() {
            return Err("invoice.target_folder_id cannot be empty".to_string());
        }
        if let Some(period) = &self.period {
            crate::domain::Period::new(period.clone())
                .map_err(|e| format!("invoice.period: {e}"))?;
        }
        if self.id_prefix.trim().is_empty() {
            return Err("invoice.id_prefix cannot be empty".to_string());
        }
        if !self.export_mime_type.contains('/') {
            return Err(format!(
                "invoice.export_mime_type '{}' is not a MIME type",
                self.export_mime_type
            ));
        }
        if self.attachment_name.trim().is_empty() {
            return Err("invoice.attachment_name cannot be empty".to_string());
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(format!(
                "invoice.date_format '{}' is not a valid date format",
                self.date_format
            ));
        }
        if self.concurrency == 0 || self.concurrency > 16 {
            return Err(format!(
                "invoice.concurrency must be between 1 and 16, got {}",
                self.concurrency
            ));
        }
        if self.max_export_chunks == 0 {
            return Err("invoice.max_export_chunks must be > 0".to_string());
        }
        for field in &self.fields {
            field.validate()?;
        }
        Ok(())
    }
}

/// Outgoing message configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Sender address
    pub sender: String,

    /// Optional sender display name
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Mailbox the messaging backend sends as
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Subject; `{recipient_name}`, `{period}` and `{invoice_id}` are interpolated
    pub subject: String,

    /// Plain-text body; same interpolation as the subject
    pub body: String,
}

impl MessageConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.sender.contains('@') {
            return Err(format!(
                "message.sender '{}' is not an e-mail address",
                self.sender
            ));
        }
        if self.subject.trim().is_empty() {
            return Err("message.subject cannot be empty".to_string());
        }
        if self.body.trim().is_empty() {
            return Err("message.body cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries > 10 {
            return Err(format!(
                "retry.max_retries must be <= 10, got {}",
                self.max_retries
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// OAuth client secrets as downloaded for an installed app
///
/// Only the fields the authorization flow needs are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: SecretString,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_credentials_path() -> String {
    "credentials.json".to_string()
}

fn default_token_path() -> String {
    "token.json".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/drive".to_string(),
        "https://www.googleapis.com/auth/documents".to_string(),
        "https://www.googleapis.com/auth/spreadsheets.readonly".to_string(),
        "https://www.googleapis.com/auth/gmail.send".to_string(),
    ]
}

fn default_range() -> String {
    "A1:Z".to_string()
}

fn default_id_prefix() -> String {
    "INV".to_string()
}

fn default_document_name() -> String {
    "Factuur id {invoice_id} voor {recipient_name}".to_string()
}

fn default_export_mime_type() -> String {
    "application/pdf".to_string()
}

fn default_attachment_name() -> String {
    "invoice.pdf".to_string()
}

fn default_date_format() -> String {
    "%-d-%-m-%Y".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_max_export_chunks() -> usize {
    1024
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

pub(crate) fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

pub(crate) fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
