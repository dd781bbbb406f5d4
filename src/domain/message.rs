//! Composed messages and dispatch receipts

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

/// A fully assembled MIME message, ready for the messaging backend
///
/// Only the message composer builds these, so every instance carries its
/// attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    recipient: String,
    subject: String,
    attachment_name: String,
    raw: Vec<u8>,
}

impl ComposedMessage {
    pub(crate) fn new(
        recipient: String,
        subject: String,
        attachment_name: String,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            recipient,
            subject,
            attachment_name,
            raw,
        }
    }

    /// Destination address
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// File name of the attached artifact
    pub fn attachment_name(&self) -> &str {
        &self.attachment_name
    }

    /// RFC 5322 bytes of the message
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The message as base64url, the form the messaging API expects
    pub fn encode_for_transport(&self) -> String {
        URL_SAFE.encode(&self.raw)
    }
}

/// Acknowledgement returned by the messaging backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub message_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_for_transport_is_url_safe() {
        // 0xfb 0xff encodes to "-_8=" in the URL-safe alphabet
        let message = ComposedMessage::new(
            "a@x.com".into(),
            "s".into(),
            "invoice.pdf".into(),
            vec![0xfb, 0xff],
        );
        let encoded = message.encode_for_transport();
        assert_eq!(encoded, "-_8=");
        assert_eq!(URL_SAFE.decode(encoded).unwrap(), message.raw());
    }
}
