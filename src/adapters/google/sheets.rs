//! Google Sheets recipient source

use super::http::{endpoint, AuthorizedClient};
use crate::adapters::traits::RecipientSource;
use crate::config::RecipientsConfig;
use crate::domain::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ValueRange {
    /// Omitted by the API when the range holds no data
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the recipient grid from one tab of a spreadsheet
pub struct SheetsClient {
    api: AuthorizedClient,
    base: String,
    sheet_id: String,
    range: String,
    link: String,
}

impl SheetsClient {
    pub fn new(api: AuthorizedClient, base: impl Into<String>, config: &RecipientsConfig) -> Self {
        Self {
            api,
            base: base.into(),
            sheet_id: config.sheet_id.clone(),
            range: config.a1_range(),
            link: config.sheet_link(),
        }
    }
}

#[async_trait]
impl RecipientSource for SheetsClient {
    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        let url = endpoint(
            &self.base,
            &["spreadsheets", &self.sheet_id, "values", &self.range],
        )?;
        let request = self
            .api
            .http()
            .get(url)
            .query(&[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")]);

        let range: ValueRange = self.api.send_json(request, "Sheets values").await?;
        tracing::debug!(
            sheet = %self.link,
            range = %self.range,
            rows = range.values.len(),
            "Recipient rows read"
        );

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    fn location(&self) -> String {
        format!("{} ({})", self.link, self.range)
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
