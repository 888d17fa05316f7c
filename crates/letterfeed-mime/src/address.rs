//! Mailbox (`Name <local@domain>`) parsing.

use crate::encoding::decode_rfc2047;

/// A single mailbox taken from an address header such as `From`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Raw display name, still RFC 2047 encoded and unquoted.
    pub name: Option<String>,
    /// Address exactly as written (`local@domain`).
    pub address: String,
}

impl Mailbox {
    /// Parses the first mailbox of an address header value.
    ///
    /// Accepts `Name <addr>`, `"Quoted, Name" <addr>`, `<addr>`, bare
    /// `addr` and the legacy `addr (Name)` form. Returns `None` when no
    /// address can be found.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let first = first_mailbox(value).trim();

        if let Some(open) = find_unquoted(first, '<') {
            let after = &first[open + 1..];
            let address = after.split('>').next().unwrap_or_default().trim();
            if address.is_empty() {
                return None;
            }
            let name = unquote(first[..open].trim());
            return Some(Self {
                name: (!name.is_empty()).then_some(name),
                address: address.to_string(),
            });
        }

        let (address, comment) = match first.split_once('(') {
            Some((address, comment)) => (address.trim(), Some(comment.trim_end_matches(')').trim())),
            None => (first, None),
        };
        if address.is_empty() || address.contains(char::is_whitespace) {
            return None;
        }

        Some(Self {
            name: comment.filter(|c| !c.is_empty()).map(ToString::to_string),
            address: address.to_string(),
        })
    }

    /// Display name with encoded words decoded, if any.
    #[must_use]
    pub fn decoded_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(decode_rfc2047)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

/// Cuts an address list at the first comma outside quotes and angle brackets.
fn first_mailbox(value: &str) -> &str {
    let mut in_quotes = false;
    let mut in_angle = false;
    for (idx, ch) in value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => return &value[..idx],
            _ => {}
        }
    }
    value
}

fn find_unquoted(value: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    value.char_indices().find_map(|(idx, ch)| {
        if ch == '"' {
            in_quotes = !in_quotes;
            None
        } else if ch == needle && !in_quotes {
            Some(idx)
        } else {
            None
        }
    })
}

fn unquote(name: &str) -> String {
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .map_or_else(|| name.to_string(), |n| n.replace("\\\"", "\"").replace("\\\\", "\\"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_address() {
        let mailbox = Mailbox::parse("Newsletter <n@ex.com>").unwrap();
        assert_eq!(mailbox.address, "n@ex.com");
        assert_eq!(mailbox.name.as_deref(), Some("Newsletter"));
    }

    #[test]
    fn test_parse_quoted_name_with_comma() {
        let mailbox = Mailbox::parse("\"Doe, Jane\" <jane@ex.com>, other@ex.com").unwrap();
        assert_eq!(mailbox.address, "jane@ex.com");
        assert_eq!(mailbox.name.as_deref(), Some("Doe, Jane"));
    }

    #[test]
    fn test_parse_bare_address() {
        let mailbox = Mailbox::parse("  test@example.com ").unwrap();
        assert_eq!(mailbox.address, "test@example.com");
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_parse_angle_only() {
        let mailbox = Mailbox::parse("<test@example.com>").unwrap();
        assert_eq!(mailbox.address, "test@example.com");
        assert!(mailbox.name.is_none());
    }

    #[test]
    fn test_parse_legacy_comment_form() {
        let mailbox = Mailbox::parse("test@example.com (Test Sender)").unwrap();
        assert_eq!(mailbox.address, "test@example.com");
        assert_eq!(mailbox.name.as_deref(), Some("Test Sender"));
    }

    #[test]
    fn test_parse_preserves_case() {
        let mailbox = Mailbox::parse("News <News@Example.COM>").unwrap();
        assert_eq!(mailbox.address, "News@Example.COM");
    }

    #[test]
    fn test_parse_empty() {
        assert!(Mailbox::parse("").is_none());
        assert!(Mailbox::parse("Nobody <>").is_none());
        assert!(Mailbox::parse("just some words").is_none());
    }

    #[test]
    fn test_decoded_name() {
        let mailbox = Mailbox::parse("=?utf-8?B?w4lkaXRpb24=?= <e@ex.com>").unwrap();
        assert_eq!(mailbox.decoded_name().as_deref(), Some("Édition"));

        let mailbox = Mailbox::parse("\"=?utf-8?Q?Caf=C3=A9?=\" <c@ex.com>").unwrap();
        assert_eq!(mailbox.decoded_name().as_deref(), Some("Café"));
    }
}
