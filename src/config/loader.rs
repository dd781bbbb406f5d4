//! Configuration loader with YAML parsing and environment variable overrides

use super::schema::{ClientSecrets, InvoicerConfig};
use crate::domain::errors::InvoicerError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a YAML file
///
/// This function:
/// 1. Reads the YAML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the YAML into InvoicerConfig
/// 4. Applies environment variable overrides (INVOICER_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`InvoicerError::Configuration`] if the file cannot be read or
/// parsed, a referenced variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use invoicer::config::loader::load_config;
///
/// let config = load_config("config.yaml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<InvoicerConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(InvoicerError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        InvoicerError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: InvoicerConfig = serde_yaml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        InvoicerError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Loads the installed-app client secrets JSON
///
/// Accepts both the `{"installed": {...}}` and `{"web": {...}}` layouts.
pub fn load_client_secrets(path: impl AsRef<Path>) -> Result<ClientSecrets> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        InvoicerError::Configuration(format!(
            "Failed to read OAuth client secrets {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut document: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
        InvoicerError::Configuration(format!(
            "Invalid OAuth client secrets {}: {}",
            path.display(),
            e
        ))
    })?;

    let section = ["installed", "web"]
        .iter()
        .find_map(|key| document.get_mut(*key).map(serde_json::Value::take))
        .ok_or_else(|| {
            InvoicerError::Configuration(format!(
                "OAuth client secrets {} have no 'installed' section",
                path.display()
            ))
        })?;

    serde_json::from_value(section).map_err(|e| {
        InvoicerError::Configuration(format!(
            "Invalid OAuth client secrets {}: {}",
            path.display(),
            e
        ))
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| InvoicerError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|m| m == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(InvoicerError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using INVOICER_* prefix
///
/// Environment variables follow the pattern: INVOICER_<SECTION>_<KEY>,
/// for example INVOICER_INVOICE_PERIOD or INVOICER_RECIPIENTS_SHEET_ID.
/// Unparseable numeric values are ignored.
fn apply_env_overrides(config: &mut InvoicerConfig) {
    if let Ok(val) = std::env::var("INVOICER_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // OAuth overrides
    if let Ok(val) = std::env::var("INVOICER_OAUTH_CREDENTIALS_PATH") {
        config.oauth.credentials_path = val;
    }
    if let Ok(val) = std::env::var("INVOICER_OAUTH_TOKEN_PATH") {
        config.oauth.token_path = val;
    }

    // Recipient overrides
    if let Ok(val) = std::env::var("INVOICER_RECIPIENTS_SHEET_ID") {
        config.recipients.sheet_id = val;
    }
    if let Ok(val) = std::env::var("INVOICER_RECIPIENTS_TAB") {
        config.recipients.tab = val;
    }

    // Invoice overrides
    if let Ok(val) = std::env::var("INVOICER_INVOICE_TEMPLATE_DOC_ID") {
        config.invoice.template_doc_id = val;
    }
    if let Ok(val) = std::env::var("INVOICER_INVOICE_TARGET_FOLDER_ID") {
        config.invoice.target_folder_id = val;
    }
    if let Ok(val) = std::env::var("INVOICER_INVOICE_PERIOD") {
        config.invoice.period = Some(val);
    }
    if let Ok(val) = std::env::var("INVOICER_INVOICE_ID_SCHEME") {
        if let Ok(scheme) = val.parse() {
            config.invoice.id_scheme = scheme;
        }
    }
    if let Ok(val) = std::env::var("INVOICER_INVOICE_CONCURRENCY") {
        if let Ok(concurrency) = val.parse() {
            config.invoice.concurrency = concurrency;
        }
    }

    // Message overrides
    if let Ok(val) = std::env::var("INVOICER_MESSAGE_SENDER") {
        config.message.sender = val;
    }
    if let Ok(val) = std::env::var("INVOICER_MESSAGE_SUBJECT") {
        config.message.subject = val;
    }

    // Retry overrides
    if let Ok(val) = std::env::var("INVOICER_RETRY_MAX_RETRIES") {
        if let Ok(retries) = val.parse() {
            config.retry.max_retries = retries;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("INVOICER_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("INVOICER_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
