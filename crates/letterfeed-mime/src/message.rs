//! MIME message structure and handling.

use chrono::{DateTime, FixedOffset};

use crate::address::Mailbox;
use crate::charset::decode_charset;
use crate::content_type::{ContentType, Disposition};
use crate::date::parse_date;
use crate::encoding::{decode_base64, decode_quoted_printable_lossy};
use crate::error::Result;
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// MIME body part, possibly containing nested parts.
#[derive(Debug, Clone, Default)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Raw, still transfer-encoded body. Empty for containers.
    pub body: Vec<u8>,
    /// Nested parts of a multipart or `message/rfc822` container.
    pub children: Vec<Part>,
}

impl Part {
    /// Parses a part (or a whole message) from raw bytes.
    ///
    /// Parsing is lenient: a missing header block yields an empty header
    /// set, an unterminated multipart keeps the parts read so far, and an
    /// invalid `Content-Type` is treated as `text/plain`.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_head(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(head));
        let mut part = Self {
            headers,
            body: Vec::new(),
            children: Vec::new(),
        };

        let content_type = part.content_type();
        if content_type.is_multipart()
            && let Some(boundary) = content_type.boundary()
        {
            part.children = split_multipart(body, boundary)
                .into_iter()
                .map(Self::parse)
                .collect();
        } else if content_type.is_message() && part.transfer_encoding() != TransferEncoding::Base64
        {
            part.children = vec![Self::parse(body)];
        } else {
            part.body = body.to_vec();
        }

        part
    }

    /// Gets the content type, defaulting to `text/plain`.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the content disposition.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.headers
            .get("content-disposition")
            .map_or(Disposition::Inline, Disposition::parse)
    }

    /// Returns true if the part is marked as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition() == Disposition::Attachment
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 body is malformed. Quoted-Printable
    /// bodies never fail; malformed escapes are kept verbatim.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable_lossy(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as text using the declared charset.
    ///
    /// Parts without a charset are read as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails or the charset is unknown.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        let content_type = self.content_type();
        decode_charset(&decoded, content_type.charset().unwrap_or("utf-8"))
    }

    /// Iterates over this part and all nested parts, depth first.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Depth-first iterator over a part tree, see [`Part::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}

/// A complete MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: Part::parse(raw),
        }
    }

    /// Message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// The top-level part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Gets the first mailbox of the From header.
    #[must_use]
    pub fn from(&self) -> Option<Mailbox> {
        self.headers().get("from").and_then(Mailbox::parse)
    }

    /// Gets the Subject header with encoded words decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers().get_decoded("subject")
    }

    /// Gets the raw Subject header.
    #[must_use]
    pub fn raw_subject(&self) -> Option<&str> {
        self.headers().get("subject")
    }

    /// Gets the Message-ID header, if present and not blank.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers()
            .get("message-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Gets the raw Date header.
    #[must_use]
    pub fn raw_date(&self) -> Option<&str> {
        self.headers().get("date")
    }

    /// Gets the parsed Date header.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.raw_date().and_then(parse_date)
    }

    /// Iterates over every part of the message, depth first.
    #[must_use]
    pub fn parts(&self) -> Walk<'_> {
        self.root.walk()
    }
}

/// Splits raw bytes at the blank line ending the header block.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&[], rest);
    }

    match (find(raw, b"\r\n\r\n"), find(raw, b"\n\n")) {
        (Some(crlf), Some(lf)) if lf < crlf => (&raw[..lf], &raw[lf + 2..]),
        (Some(crlf), _) => (&raw[..crlf], &raw[crlf + 4..]),
        (None, Some(lf)) => (&raw[..lf], &raw[lf + 2..]),
        (None, None) => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Splits a multipart body into the raw bytes of each part.
///
/// The preamble and epilogue are discarded. A missing close delimiter keeps
/// the last part.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = line.trim_ascii_end();
        if let Some(rest) = trimmed.strip_prefix(delimiter) {
            let is_close = rest.starts_with(b"--");
            if is_close || rest.is_empty() {
                if let Some(start) = current.take() {
                    parts.push(strip_line_break(&body[start..offset]));
                }
                if is_close {
                    return parts;
                }
                current = Some(offset + line.len());
            }
        }
        offset += line.len();
    }

    if let Some(start) = current {
        parts.push(&body[start..]);
    }
    parts
}

/// Drops the line break that belongs to the following delimiter.
fn strip_line_break(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALTERNATIVE: &[u8] = b"From: Weekly <weekly@example.com>\r\n\
Subject: =?utf-8?B?SMOpbGxv?=\r\n\
Message-ID: <abc@example.com>\r\n\
Date: Tue, 1 Jul 2025 10:52:37 +0200\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
This is a preamble.\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain body\r\n\
--b1\r\n\
Content-Type: text/html; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<p>caf=E9</p>\r\n\
--b1--\r\n\
epilogue\r\n";

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_message_headers() {
        let message = Message::parse(ALTERNATIVE);
        let from = message.from().unwrap();
        assert_eq!(from.address, "weekly@example.com");
        assert_eq!(from.decoded_name().as_deref(), Some("Weekly"));
        assert_eq!(message.subject().as_deref(), Some("Héllo"));
        assert_eq!(message.message_id(), Some("<abc@example.com>"));
        assert!(message.date().is_some());
    }

    #[test]
    fn test_multipart_alternative() {
        let message = Message::parse(ALTERNATIVE);
        let parts: Vec<&Part> = message.parts().collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].content_type().is_multipart());
        assert_eq!(parts[1].body_text().unwrap(), "Plain body");
        assert_eq!(parts[2].body_text().unwrap(), "<p>café</p>");
    }

    #[test]
    fn test_nested_multipart_and_attachment() {
        let raw = b"Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/html\n\
\n\
<b>hi</b>\n\
--inner--\n\
--outer\n\
Content-Type: text/html\n\
Content-Disposition: attachment; filename=\"page.html\"\n\
\n\
<i>attached</i>\n\
--outer--\n";
        let message = Message::parse(raw);
        let leaves: Vec<&Part> = message.parts().filter(|p| p.children.is_empty()).collect();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].body_text().unwrap(), "<b>hi</b>");
        assert!(!leaves[0].is_attachment());
        assert!(leaves[1].is_attachment());
    }

    #[test]
    fn test_single_part_base64() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
SMOpbGxv\r\n";
        let message = Message::parse(raw);
        assert_eq!(message.root().body_text().unwrap(), "Héllo");
    }

    #[test]
    fn test_bad_base64_is_an_error() {
        let raw = b"Content-Transfer-Encoding: base64\n\n***\n";
        let message = Message::parse(raw);
        assert!(message.root().body_text().is_err());
    }

    #[test]
    fn test_embedded_message() {
        let raw = b"Content-Type: message/rfc822\n\
\n\
Subject: inner\n\
Content-Type: text/html\n\
\n\
<p>forwarded</p>\n";
        let message = Message::parse(raw);
        let parts: Vec<&Part> = message.parts().collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].headers.get("subject"), Some("inner"));
        assert_eq!(parts[1].body_text().unwrap(), "<p>forwarded</p>\n");
    }

    #[test]
    fn test_unterminated_multipart_keeps_last_part() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\n\n--x\n\nonly part";
        let message = Message::parse(raw);
        assert_eq!(message.root().children.len(), 1);
        assert_eq!(message.root().children[0].body, b"only part");
    }

    #[test]
    fn test_missing_headers() {
        let message = Message::parse(b"no header block at all");
        assert!(message.message_id().is_none());
        assert!(message.from().is_none());
    }

    #[test]
    fn test_blank_message_id_is_missing() {
        let message = Message::parse(b"Message-ID:   \n\nbody");
        assert!(message.message_id().is_none());
    }

    #[test]
    fn test_undeclared_charset_reads_as_utf8() {
        let message = Message::parse("From: n@ex.com\r\nMessage-ID: <x@y>\r\n\r\nCafé".as_bytes());
        assert_eq!(message.root().body_text().unwrap(), "Café");

        let raw = "Content-Type: multipart/alternative; boundary=b\r\n\
\r\n\
--b\r\n\
\r\n\
Café plain\r\n\
--b--\r\n";
        let message = Message::parse(raw.as_bytes());
        let leaf = message.parts().find(|part| part.children.is_empty()).unwrap();
        assert!(leaf.content_type().charset().is_none());
        assert_eq!(leaf.body_text().unwrap(), "Café plain");
    }

    #[test]
    fn test_declared_charset_is_used() {
        let message = Message::parse(b"Content-Type: text/plain; charset=iso-8859-1\n\ncaf\xe9");
        assert_eq!(message.root().body_text().unwrap(), "café");
    }
}
