//! URL slug sanitization.

/// Normalizes a user-supplied slug.
///
/// Lowercases, turns runs of whitespace and underscores into a single
/// hyphen, drops everything outside `[a-z0-9-]` and trims hyphens from both
/// ends. Returns `None` when nothing is left.
#[must_use]
pub fn sanitize_slug(raw: &str) -> Option<String> {
    let mut slug = String::with_capacity(raw.len());
    let mut in_gap = false;

    for ch in raw.to_lowercase().chars() {
        if ch.is_whitespace() || ch == '_' {
            if !in_gap {
                slug.push('-');
                in_gap = true;
            }
            continue;
        }
        in_gap = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            slug.push(ch);
        }
    }

    let slug = slug.trim_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("My Newsletter").as_deref(), Some("my-newsletter"));
        assert_eq!(sanitize_slug("  tech__news  ").as_deref(), Some("tech-news"));
        assert_eq!(sanitize_slug("Ünïcode & Co!").as_deref(), Some("ncode--co"));
        assert_eq!(sanitize_slug("a - b").as_deref(), Some("a---b"));
        assert_eq!(sanitize_slug("--edge--").as_deref(), Some("edge"));
    }

    #[test]
    fn test_sanitize_slug_empty() {
        assert!(sanitize_slug("").is_none());
        assert!(sanitize_slug("   ").is_none());
        assert!(sanitize_slug("!!!").is_none());
        assert!(sanitize_slug("_-_").is_none());
    }

    proptest! {
        #[test]
        fn sanitized_slug_is_url_safe(raw in ".*") {
            if let Some(slug) = sanitize_slug(&raw) {
                prop_assert!(!slug.is_empty());
                prop_assert!(!slug.starts_with('-'));
                prop_assert!(!slug.ends_with('-'));
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            }
        }

        #[test]
        fn sanitize_slug_is_idempotent(raw in ".*") {
            if let Some(slug) = sanitize_slug(&raw) {
                prop_assert_eq!(sanitize_slug(&slug), Some(slug.clone()));
            }
        }
    }
}
