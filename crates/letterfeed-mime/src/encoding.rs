//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::charset::decode_charset;
use crate::error::{Error, Result};

/// Base64 engine that tolerates missing padding and trailing bits, both
/// common in mail produced by bulk senders.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes Base64 data, ignoring embedded whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains an `=` that is neither a soft
/// line break nor followed by two hex digits.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    decode_qp(data, true)
}

/// Decodes Quoted-Printable data, keeping malformed escapes verbatim.
#[must_use]
pub fn decode_quoted_printable_lossy(data: &[u8]) -> Vec<u8> {
    // Non-strict decoding never reports an error.
    decode_qp(data, false).unwrap_or_else(|_| data.to_vec())
}

fn decode_qp(data: &[u8], strict: bool) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly with trailing whitespace before the newline
        let mut j = i + 1;
        while j < data.len() && matches!(data[j], b' ' | b'\t') {
            j += 1;
        }
        if j == data.len() {
            i = j;
            continue;
        }
        if data[j] == b'\n' {
            i = j + 1;
            continue;
        }
        if data[j] == b'\r' && data.get(j + 1) == Some(&b'\n') {
            i = j + 2;
            continue;
        }

        match (
            data.get(i + 1).copied().and_then(hex_value),
            data.get(i + 2).copied().and_then(hex_value),
        ) {
            (Some(high), Some(low)) => {
                result.push((high << 4) | low);
                i += 3;
            }
            _ if strict => {
                return Err(Error::InvalidEncoding(format!(
                    "Invalid quoted-printable escape at byte {i}"
                )));
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    Ok(result)
}

fn hex_value(byte: u8) -> Option<u8> {
    char::from(byte)
        .to_digit(16)
        .and_then(|digit| u8::try_from(digit).ok())
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Format of a word: `=?charset?encoding?encoded-text?=`. Whitespace between
/// two adjacent encoded words is dropped, plain text is kept as is, and words
/// that cannot be decoded are left verbatim.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_encoded_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(after_encoded_word && before.chars().all(char::is_whitespace)) {
                result.push_str(before);
            }
            result.push_str(&decoded);
            rest = &candidate[consumed..];
            after_encoded_word = true;
        } else {
            result.push_str(before);
            result.push_str("=?");
            rest = &candidate[2..];
            after_encoded_word = false;
        }
    }

    result.push_str(rest);
    result
}

/// Decodes one encoded word at the start of `word`.
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_encoded_word(word: &str) -> Option<(String, usize)> {
    let inner = word.strip_prefix("=?")?;
    let (charset, inner) = inner.split_once('?')?;
    let (encoding, inner) = inner.split_once('?')?;
    let end = inner.find("?=")?;
    let payload = &inner[..end];

    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }
    if payload.contains(char::is_whitespace) {
        return None;
    }

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()).ok()?,
        _ => return None,
    };

    // RFC 2231 allows a language suffix: `utf-8*en`
    let charset = charset.split_once('*').map_or(charset, |(name, _)| name);
    let decoded = decode_charset(&bytes, charset).ok()?;

    Some((decoded, consumed))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_decode() {
        assert_eq!(decode_base64(b"SGVsbG8sIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ").unwrap(), b"Hello, World!");
        assert!(decode_base64(b"not*base64").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!").unwrap(), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo").unwrap(),
            "Héllo".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=  \nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=").unwrap(), b"Hello");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable(b"<a href=\"x\">").is_err());
        assert_eq!(
            decode_quoted_printable_lossy(b"<a href=\"x\">"),
            b"<a href=\"x\">"
        );
    }

    #[test]
    fn test_rfc2047_plain_text_unchanged() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("a =? b"), "a =? b");
    }

    #[test]
    fn test_rfc2047_base64() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_World?="), "Héllo World");
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?H=C3=A9?= \r\n =?utf-8?Q?llo?="),
            "Héllo"
        );
    }

    #[test]
    fn test_rfc2047_mixed_with_plain_text() {
        assert_eq!(
            decode_rfc2047("Re: =?iso-8859-1?Q?caf=E9?= today"),
            "Re: café today"
        );
    }

    #[test]
    fn test_rfc2047_language_suffix() {
        assert_eq!(decode_rfc2047("=?utf-8*en?Q?Hi?="), "Hi");
    }

    #[test]
    fn test_rfc2047_undecodable_word_kept() {
        assert_eq!(
            decode_rfc2047("=?x-unknown?Q?abc?= ok"),
            "=?x-unknown?Q?abc?= ok"
        );
    }

    proptest! {
        #[test]
        fn rfc2047_never_panics(input in ".*") {
            let _ = decode_rfc2047(&input);
        }

        #[test]
        fn lossy_qp_keeps_plain_ascii(input in "[a-zA-Z0-9 <>/\"]*") {
            prop_assert_eq!(decode_quoted_printable_lossy(input.as_bytes()), input.as_bytes());
        }
    }
}
