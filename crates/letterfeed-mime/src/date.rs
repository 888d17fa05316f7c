//! RFC 2822 `Date` header parsing.

use chrono::{DateTime, FixedOffset};

/// Parses a `Date` header value.
///
/// Trailing comments such as `(UTC)` or `(PST)` are ignored. Returns `None`
/// for values that are not valid RFC 2822 dates.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.split('(').next().unwrap_or_default().trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("Tue, 1 Jul 2025 10:52:37 +0200").unwrap();
        assert_eq!(date.to_rfc3339(), "2025-07-01T10:52:37+02:00");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let date = parse_date("Tue, 01 Jul 2025 08:52:37 +0000 (UTC)").unwrap();
        assert_eq!(date.timestamp(), 1_751_359_957);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday").is_none());
    }
}
