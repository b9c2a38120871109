//! Inbox access for reply reconciliation. Only `From` and `Subject` matter.

pub mod imap;

use async_trait::async_trait;
use chrono::NaiveDate;
use mail_parser::MessageParser;
use thiserror::Error;

pub use imap::{ImapConfig, ImapInbox};

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Inbox operation timed out after {0}s")]
    Timeout(u64),
}

/// Decoded headers of one message. Empty strings when headers were unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxMessage {
    pub from: String,
    pub subject: String,
}

#[async_trait]
pub trait Inbox: Send + Sync {
    /// Every message received on or after `since`.
    async fn fetch_since(&self, since: NaiveDate) -> Result<Vec<InboxMessage>, InboxError>;
}

/// Decodes a raw RFC 5322 header block, including RFC 2047 encoded words.
pub fn parse_header_block(raw: &[u8]) -> InboxMessage {
    let Some(message) = MessageParser::default().parse(raw) else {
        return InboxMessage::default();
    };

    InboxMessage {
        from: message
            .from()
            .and_then(|addr| addr.first().map(format_address))
            .unwrap_or_default(),
        subject: message.subject().unwrap_or_default().to_string(),
    }
}

fn format_address(addr: &mail_parser::Addr) -> String {
    if let Some(name) = addr.name() {
        format!("{} <{}>", name, addr.address().unwrap_or_default())
    } else {
        addr.address().unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_headers() {
        let raw = b"From: hr@acme.com\r\nSubject: Interview\r\n\r\n";
        let message = parse_header_block(raw);
        assert_eq!(message.from, "hr@acme.com");
        assert_eq!(message.subject, "Interview");
    }

    #[test]
    fn test_display_name_and_encoded_subject() {
        let raw = b"From: Acme Recruiting <jobs@acme.com>\r\n\
            Subject: =?UTF-8?B?SW50ZXJ2aWV3IGludml0YXRpb24=?=\r\n\r\n";
        let message = parse_header_block(raw);
        assert_eq!(message.from, "Acme Recruiting <jobs@acme.com>");
        assert_eq!(message.subject, "Interview invitation");
    }

    #[test]
    fn test_missing_headers_become_empty_strings() {
        let message = parse_header_block(b"X-Other: 1\r\n\r\n");
        assert_eq!(message, InboxMessage::default());

        let message = parse_header_block(b"");
        assert_eq!(message, InboxMessage::default());
    }
}
