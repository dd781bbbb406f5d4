//! Message composer
//!
//! Builds a `multipart/mixed` message with one UTF-8 text part and one
//! base64-encoded attachment part. Composition never sends.

use crate::config::MessageConfig;
use crate::domain::{ComposedMessage, InvoicerError, JobError, Result};
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};

/// Interpolates `{key}` markers in a subject or body template
///
/// Unknown markers are left as they are.
pub fn interpolate(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), value)
    })
}

/// Composes invoice messages from a fixed sender and attachment type
#[derive(Debug, Clone)]
pub struct MessageComposer {
    sender: Mailbox,
    attachment_type: ContentType,
}

impl MessageComposer {
    /// Creates a composer, validating the sender and attachment MIME type
    ///
    /// # Errors
    ///
    /// Returns a configuration error when either value does not parse.
    pub fn new(sender: &str, sender_name: Option<String>, attachment_mime: &str) -> Result<Self> {
        let address: Address = sender.parse().map_err(|e| {
            InvoicerError::Configuration(format!("Invalid sender address '{sender}': {e}"))
        })?;
        let attachment_type = ContentType::parse(attachment_mime).map_err(|e| {
            InvoicerError::Configuration(format!(
                "Invalid attachment MIME type '{attachment_mime}': {e}"
            ))
        })?;

        Ok(Self {
            sender: Mailbox::new(sender_name, address),
            attachment_type,
        })
    }

    /// Creates a composer from the message section and the run's export format
    pub fn from_config(config: &MessageConfig, attachment_mime: &str) -> Result<Self> {
        Self::new(&config.sender, config.sender_name.clone(), attachment_mime)
    }

    /// Builds the message
    ///
    /// # Errors
    ///
    /// [`JobError::EncodingFailure`] when the recipient address is invalid or
    /// the message cannot be assembled.
    pub fn compose(
        &self,
        recipient_address: &str,
        subject: &str,
        body_text: &str,
        attachment: Vec<u8>,
        attachment_name: &str,
    ) -> Result<ComposedMessage> {
        let to: Mailbox = recipient_address.trim().parse().map_err(|e| {
            JobError::EncodingFailure(format!(
                "Invalid recipient address '{recipient_address}': {e}"
            ))
        })?;

        let body = Body::new_with_encoding(attachment, ContentTransferEncoding::Base64)
            .map_err(|_| JobError::EncodingFailure("Attachment cannot be base64 encoded".into()))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body_text.to_string()))
                    .singlepart(
                        Attachment::new(attachment_name.to_string())
                            .body(body, self.attachment_type.clone()),
                    ),
            )
            .map_err(|e| JobError::EncodingFailure(format!("Failed to build message: {e}")))?;

        Ok(ComposedMessage::new(
            recipient_address.trim().to_string(),
            subject.to_string(),
            attachment_name.to_string(),
            message.formatted(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use test_case::test_case;

    fn composer() -> MessageComposer {
        MessageComposer::new("bestuur@example.org", Some("Atelier".into()), "application/pdf")
            .unwrap()
    }

    /// Pulls the attachment bytes back out of a formatted message
    fn decode_attachment(raw: &[u8]) -> Vec<u8> {
        let text = String::from_utf8_lossy(raw);
        let lower = text.to_lowercase();
        let start = lower
            .find("content-disposition: attachment")
            .expect("attachment part");
        let body_start = start + text[start..].find("\r\n\r\n").expect("part body") + 4;
        let body_end = body_start + text[body_start..].find("--").expect("closing boundary");
        let encoded: String = text[body_start..body_end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        STANDARD.decode(encoded).expect("valid base64")
    }

    #[test_case(Vec::new() ; "empty")]
    #[test_case(vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xff, 0xfe, 0x80] ; "non utf8")]
    #[test_case((0..=255u8).cycle().take(4000).collect() ; "multi line")]
    fn test_attachment_bytes_survive_encoding(bytes: Vec<u8>) {
        let message = composer()
            .compose("a@x.com", "Factuur", "Beste A", bytes.clone(), "invoice.pdf")
            .unwrap();
        assert_eq!(decode_attachment(message.raw()), bytes);
    }

    #[test]
    fn test_message_has_text_and_attachment_parts() {
        let message = composer()
            .compose(
                "a@x.com",
                "Eenmalige factuur",
                "Beste A,\n\nIn de bijlage vind je de factuur.",
                b"%PDF".to_vec(),
                "invoice.pdf",
            )
            .unwrap();

        let text = String::from_utf8_lossy(message.raw()).to_lowercase();
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("text/plain; charset=utf-8"));
        assert!(text.contains("content-type: application/pdf"));
        assert!(text.contains("filename=\"invoice.pdf\""));
        assert!(text.contains("to: a@x.com"));
        assert_eq!(message.recipient(), "a@x.com");
        assert_eq!(message.attachment_name(), "invoice.pdf");
    }

    #[test]
    fn test_invalid_recipient_is_encoding_failure() {
        let result = composer().compose("not an address", "s", "b", vec![], "invoice.pdf");
        assert!(matches!(
            result,
            Err(InvoicerError::Job(JobError::EncodingFailure(_)))
        ));
    }

    #[test]
    fn test_invalid_sender_is_configuration_error() {
        let result = MessageComposer::new("nobody", None, "application/pdf");
        assert!(matches!(result, Err(InvoicerError::Configuration(_))));
    }

    #[test]
    fn test_interpolate() {
        let text = interpolate(
            "Beste {recipient_name}, factuur {invoice_id} voor {period} {unknown}",
            &[
                ("recipient_name", "A"),
                ("invoice_id", "INV-2025-01-0"),
                ("period", "2025-01"),
            ],
        );
        assert_eq!(text, "Beste A, factuur INV-2025-01-0 voor 2025-01 {unknown}");
    }
}
