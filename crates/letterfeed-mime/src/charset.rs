//! Charset decoding.

use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Decodes `bytes` using the charset named by `label`.
///
/// Labels are matched the way browsers match them (`latin1`, `iso-8859-1`,
/// `windows-1252`, `utf8`, ...). Byte sequences that are invalid in the
/// charset are dropped rather than replaced.
///
/// # Errors
///
/// Returns [`Error::UnknownCharset`] if the label names no known encoding.
pub fn decode_charset(bytes: &[u8], label: &str) -> Result<String> {
    let label = label.trim().trim_matches('"');
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::UnknownCharset(label.to_string()))?;

    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Ok(text
            .chars()
            .filter(|&c| c != char::REPLACEMENT_CHARACTER)
            .collect())
    } else {
        Ok(text.into_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_charset("Héllo".as_bytes(), "utf-8").unwrap(), "Héllo");
        assert_eq!(decode_charset("Héllo".as_bytes(), "UTF8").unwrap(), "Héllo");
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_charset(&[0x48, 0xE9], "iso-8859-1").unwrap(), "Hé");
        assert_eq!(decode_charset(&[0x48, 0xE9], "\"latin1\"").unwrap(), "Hé");
    }

    #[test]
    fn test_invalid_bytes_are_dropped() {
        let bytes = [b'a', 0xFF, 0xFE, b'b'];
        assert_eq!(decode_charset(&bytes, "utf-8").unwrap(), "ab");
    }

    #[test]
    fn test_unknown_charset() {
        assert!(matches!(
            decode_charset(b"abc", "x-no-such-charset"),
            Err(Error::UnknownCharset(_))
        ));
    }
}
