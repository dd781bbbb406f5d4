//! Gmail message dispatcher

use super::http::{endpoint, AuthorizedClient};
use crate::adapters::traits::MessageDispatcher;
use crate::domain::{ComposedMessage, DispatchReceipt, InvoicerError, JobError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Sends composed messages through `users.messages.send`
pub struct GmailClient {
    api: AuthorizedClient,
    base: String,
    user_id: String,
}

impl GmailClient {
    pub fn new(api: AuthorizedClient, base: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            api,
            base: base.into(),
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl MessageDispatcher for GmailClient {
    async fn send(&self, message: &ComposedMessage) -> Result<DispatchReceipt> {
        let url = endpoint(&self.base, &["users", &self.user_id, "messages", "send"])?;
        let request = self
            .api
            .http()
            .post(url)
            .json(&json!({ "raw": message.encode_for_transport() }));

        let sent: SentMessage = self
            .api
            .send_json(request, "Gmail send")
            .await
            .map_err(|e| match e {
                InvoicerError::Job(JobError::Backend(msg)) => {
                    JobError::DispatchFailure(msg).into()
                }
                other => other,
            })?;

        tracing::debug!(
            recipient = %message.recipient(),
            message_id = %sent.id,
            "Message sent"
        );
        Ok(DispatchReceipt { message_id: sent.id })
    }
}
