//! Normalizes a raw mail message into the fields an entry is built from.

use chrono::{DateTime, Utc};
use letterfeed_mime::{Message, Part};
use tracing::{debug, warn};

/// A message reduced to the fields ingestion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Sender address, exactly as written in `From`.
    pub sender: String,
    /// Decoded sender display name.
    pub sender_name: Option<String>,
    /// Decoded subject. Empty when the header is missing.
    pub subject: String,
    /// HTML body if any, else the plain-text body, else empty.
    pub body: String,
    /// `Message-ID` header.
    pub message_id: String,
    /// Parsed `Date` header.
    pub received_at: Option<DateTime<Utc>>,
}

/// Reasons a message cannot be ingested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No `Message-ID`, so the message cannot be deduplicated.
    #[error("message from {sender:?} with subject {subject:?} has no Message-ID")]
    MissingMessageId {
        /// Sender address, if one was found.
        sender: Option<String>,
        /// Decoded subject, if any.
        subject: Option<String>,
    },

    /// No usable `From` address.
    #[error("message {message_id} has no sender address")]
    MissingSender {
        /// The message's `Message-ID`.
        message_id: String,
    },
}

/// Decodes a raw RFC 5322 message.
///
/// Broken body parts are logged and treated as empty. A missing or
/// unparsable `Date` leaves `received_at` unset.
///
/// # Errors
///
/// Returns an error if the message has no `Message-ID` or no sender.
pub fn decode_message(raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let message = Message::parse(raw);
    let from = message.from();

    let Some(message_id) = message.message_id() else {
        return Err(DecodeError::MissingMessageId {
            sender: from.map(|mailbox| mailbox.address),
            subject: message.subject(),
        });
    };
    let message_id = message_id.to_string();

    let Some(from) = from.filter(|mailbox| !mailbox.address.is_empty()) else {
        return Err(DecodeError::MissingSender { message_id });
    };

    let received_at = match message.raw_date() {
        Some(raw_date) => {
            let parsed = message.date();
            if parsed.is_none() {
                warn!(%message_id, date = raw_date, "Ignoring unparsable Date header");
            }
            parsed.map(|date| date.with_timezone(&Utc))
        }
        None => None,
    };

    Ok(DecodedMessage {
        sender_name: from.decoded_name(),
        sender: from.address,
        subject: message.subject().unwrap_or_default(),
        body: best_body(&message, &message_id),
        message_id,
        received_at,
    })
}

/// Picks the last decodable HTML part, falling back to the last plain part.
fn best_body(message: &Message, message_id: &str) -> String {
    let mut html = String::new();
    let mut text = String::new();

    for part in message.parts().filter(|part| is_inline_leaf(part)) {
        let content_type = part.content_type();
        let slot = if content_type.is("text", "html") {
            &mut html
        } else if content_type.is("text", "plain") {
            &mut text
        } else {
            continue;
        };

        match part.body_text() {
            Ok(decoded) => *slot = decoded,
            Err(e) => debug!(message_id, %content_type, error = %e, "Skipping undecodable part"),
        }
    }

    if html.is_empty() { text } else { html }
}

fn is_inline_leaf(part: &Part) -> bool {
    part.children.is_empty() && !part.is_attachment()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_message() {
        let raw = b"From: =?utf-8?B?w4lkaXRpb24=?= <n@ex.com>\r\n\
Subject: =?utf-8?Q?Caf=C3=A9_news?=\r\n\
Message-ID: <x@y>\r\n\
Date: Tue, 1 Jul 2025 10:52:37 +0200\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hello</p>";
        let decoded = decode_message(raw).unwrap();
        assert_eq!(decoded.sender, "n@ex.com");
        assert_eq!(decoded.sender_name.as_deref(), Some("Édition"));
        assert_eq!(decoded.subject, "Café news");
        assert_eq!(decoded.message_id, "<x@y>");
        assert_eq!(decoded.body, "<p>Hello</p>");
        assert_eq!(
            decoded.received_at.unwrap().to_rfc3339(),
            "2025-07-01T08:52:37+00:00"
        );
    }

    #[test]
    fn test_missing_message_id() {
        let raw = b"From: n@ex.com\r\nSubject: Hi\r\n\r\nbody";
        let err = decode_message(raw).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingMessageId {
                sender: Some("n@ex.com".to_string()),
                subject: Some("Hi".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_sender() {
        let raw = b"Message-ID: <x@y>\r\n\r\nbody";
        assert!(matches!(
            decode_message(raw),
            Err(DecodeError::MissingSender { .. })
        ));
    }

    #[test]
    fn test_prefers_html_and_skips_attachments() {
        let raw = b"From: n@ex.com\n\
Message-ID: <x@y>\n\
Content-Type: multipart/mixed; boundary=b\n\
\n\
--b\n\
Content-Type: text/plain\n\
\n\
plain\n\
--b\n\
Content-Type: text/html\n\
\n\
<p>html</p>\n\
--b\n\
Content-Type: text/html\n\
Content-Disposition: attachment; filename=a.html\n\
\n\
<p>attached</p>\n\
--b--\n";
        let decoded = decode_message(raw).unwrap();
        assert_eq!(decoded.body, "<p>html</p>");
    }

    #[test]
    fn test_falls_back_to_plain_text() {
        let raw = b"From: n@ex.com\n\
Message-ID: <x@y>\n\
Content-Type: multipart/alternative; boundary=b\n\
\n\
--b\n\
Content-Type: text/plain; charset=iso-8859-1\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
caf=E9\n\
--b\n\
Content-Type: text/html; charset=x-unknown\n\
\n\
<p>broken</p>\n\
--b--\n";
        let decoded = decode_message(raw).unwrap();
        assert_eq!(decoded.body, "café");
    }

    #[test]
    fn test_bad_date_is_tolerated() {
        let raw = b"From: n@ex.com\nMessage-ID: <x@y>\nDate: someday\n\nbody";
        let decoded = decode_message(raw).unwrap();
        assert!(decoded.received_at.is_none());
        assert_eq!(decoded.subject, "");
        assert_eq!(decoded.body, "body");
    }

    #[test]
    fn test_body_without_content_type_is_utf8() {
        let raw = "From: n@ex.com\r\nMessage-ID: <x@y>\r\n\r\nCafé crème";
        let decoded = decode_message(raw.as_bytes()).unwrap();
        assert_eq!(decoded.body, "Café crème");
    }
}
