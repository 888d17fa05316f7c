//! Main-content extraction and sanitization for newsletter HTML.
//!
//! Extraction follows the readability approach: paragraphs award points to
//! their parent and grandparent blocks, class and id names nudge the score,
//! link-heavy blocks are penalized, and the best block is returned together
//! with related siblings. The result is then cleaned against a fixed
//! allow-list of tags and attributes.

use std::collections::{HashMap, HashSet};

use letterfeed_mime::decode_charset;
use letterfeed_mime::encoding::decode_quoted_printable;
use scraper::{ElementRef, Html, Node};

/// Title used when the document offers none.
pub const FALLBACK_TITLE: &str = "Newsletter";

const ALLOWED_TAGS: [&str; 16] = [
    "p",
    "strong",
    "em",
    "u",
    "h3",
    "h4",
    "ul",
    "ol",
    "li",
    "a",
    "img",
    "br",
    "div",
    "span",
    "figure",
    "figcaption",
];

const POSITIVE_HINTS: [&str; 11] = [
    "article", "body", "content", "entry", "hentry", "main", "page", "post", "text", "blog",
    "story",
];

const NEGATIVE_HINTS: [&str; 18] = [
    "hidden", "combx", "comment", "contact", "foot", "footer", "footnote", "masthead", "media",
    "meta", "outbrain", "promo", "related", "scroll", "shoutbox", "sidebar", "sponsor",
    "widget",
];

const MIN_PARAGRAPH_LEN: usize = 25;

/// Extracted article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Document title, first heading, or [`FALLBACK_TITLE`].
    pub title: String,
    /// Sanitized HTML fragment.
    pub body: String,
}

/// Extracts and sanitizes the main content of an HTML body.
///
/// The input may still be quoted-printable encoded; if it does not decode
/// cleanly it is used as is.
#[must_use]
pub fn extract_content(raw_html: &str) -> Extracted {
    let html = decode_transfer_artifacts(raw_html);
    let document = Html::parse_document(&html);

    let fragment = main_content(&document);
    let body = sanitize(&fragment);

    let title = document_title(&document)
        .or_else(|| first_heading(&body))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    Extracted { title, body }
}

fn decode_transfer_artifacts(raw_html: &str) -> String {
    match decode_quoted_printable(raw_html.as_bytes()) {
        Ok(bytes) => decode_charset(&bytes, "utf-8")
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned()),
        Err(_) => raw_html.to_string(),
    }
}

/// Cleans HTML against the feed allow-list. Disallowed tags are removed,
/// `script` and `style` together with their content.
#[must_use]
pub fn sanitize(html: &str) -> String {
    let tag_attributes = HashMap::from([
        ("a", HashSet::from(["href", "title"])),
        ("img", HashSet::from(["src", "alt", "width", "height"])),
    ]);

    ammonia::Builder::default()
        .tags(HashSet::from(ALLOWED_TAGS))
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::from(["style"]))
        .clean(html)
        .to_string()
}

fn document_title(document: &Html) -> Option<String> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "title")
        .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

fn first_heading(fragment: &str) -> Option<String> {
    let fragment = Html::parse_fragment(fragment);
    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| matches!(element.value().name(), "h1" | "h2" | "h3"))
        .map(|heading| collapse_whitespace(&heading.text().collect::<String>()))
        .filter(|heading| !heading.is_empty())
}

struct Candidate<'a> {
    element: ElementRef<'a>,
    score: f64,
}

fn main_content(document: &Html) -> String {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();

    for paragraph in document.root_element().descendants().filter_map(ElementRef::wrap) {
        if !matches!(paragraph.value().name(), "p" | "pre" | "td" | "blockquote") {
            continue;
        }
        if class_weight(paragraph) < 0.0 {
            continue;
        }

        let text = inner_text(paragraph);
        let length = text.trim().chars().count();
        if length < MIN_PARAGRAPH_LEN {
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        let points = 1.0 + text.matches(',').count() as f64 + (length / 100).min(3) as f64;

        let parent = paragraph.parent().and_then(ElementRef::wrap);
        let grandparent = parent.and_then(|p| p.parent()).and_then(ElementRef::wrap);

        if let Some(parent) = parent {
            add_score(&mut candidates, parent, points);
        }
        if let Some(grandparent) = grandparent {
            add_score(&mut candidates, grandparent, points / 2.0);
        }
    }

    for candidate in &mut candidates {
        candidate.score *= 1.0 - link_density(candidate.element);
    }

    let Some(top) = candidates
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|candidate| (candidate.element, candidate.score))
    else {
        return fallback_content(document);
    };

    let (top, top_score) = top;
    let threshold = (top_score * 0.2).max(10.0);
    let mut content = String::from("<div>");

    let siblings: Vec<ElementRef<'_>> = match top.parent() {
        Some(parent) => parent.children().filter_map(ElementRef::wrap).collect(),
        None => vec![top],
    };

    for sibling in siblings {
        if sibling.id() == top.id() || is_related(sibling, &candidates, threshold) {
            content.push_str(&sibling.html());
        }
    }

    content.push_str("</div>");
    content
}

fn is_related(sibling: ElementRef<'_>, candidates: &[Candidate<'_>], threshold: f64) -> bool {
    let scored = candidates
        .iter()
        .find(|candidate| candidate.element.id() == sibling.id())
        .is_some_and(|candidate| candidate.score >= threshold);
    if scored {
        return true;
    }

    if sibling.value().name() != "p" {
        return false;
    }

    let text = inner_text(sibling);
    let length = text.trim().chars().count();
    let density = link_density(sibling);
    (length > 80 && density < 0.25) || (length > 0 && density < f64::EPSILON && text.contains(". "))
}

fn add_score<'a>(candidates: &mut Vec<Candidate<'a>>, element: ElementRef<'a>, points: f64) {
    if let Some(candidate) = candidates
        .iter_mut()
        .find(|candidate| candidate.element.id() == element.id())
    {
        candidate.score += points;
        return;
    }

    candidates.push(Candidate {
        element,
        score: tag_weight(element.value().name()) + class_weight(element) + points,
    });
}

fn tag_weight(name: &str) -> f64 {
    match name {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

fn class_weight(element: ElementRef<'_>) -> f64 {
    let value = element.value();
    [value.attr("class"), value.id()]
        .into_iter()
        .flatten()
        .map(|names| {
            let names = names.to_lowercase();
            let mut weight = 0.0;
            if NEGATIVE_HINTS.iter().any(|hint| names.contains(hint)) {
                weight -= 25.0;
            }
            if POSITIVE_HINTS.iter().any(|hint| names.contains(hint)) {
                weight += 25.0;
            }
            weight
        })
        .sum()
}

fn link_density(element: ElementRef<'_>) -> f64 {
    let total = inner_text(element).chars().count();
    if total == 0 {
        return 0.0;
    }

    let linked: usize = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "a")
        .map(|link| inner_text(link).chars().count())
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let density = linked as f64 / total as f64;
    density.min(1.0)
}

/// Text content without `script` and `style` bodies.
fn inner_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(element, &mut text);
    text
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) if !matches!(inner.name(), "script" | "style" | "noscript") => {
                if let Some(inner) = ElementRef::wrap(child) {
                    collect_text(inner, out);
                }
            }
            _ => {}
        }
    }
}

fn fallback_content(document: &Html) -> String {
    let root = document.root_element();
    let body = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "body")
        .unwrap_or(root);
    format!("<div>{}</div>", body.inner_html())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head><title>Weekly Digest</title>
<script>alert("x")</script></head>
<body>
<div id="nav"><a href="/a">Home</a> <a href="/b">Archive</a></div>
<div class="content">
<p>The first paragraph of the issue has plenty of words, commas, and detail to score well.</p>
<p>A second paragraph continues the story, adding context, numbers, and a few more clauses.</p>
<script>track()</script>
<img src="https://ex.com/a.png" alt="chart" onerror="steal()">
</div>
<div class="footer"><p>Unsubscribe from this list at any time, or update your preferences.</p></div>
</body></html>"#;

    #[test]
    fn test_extracts_main_block() {
        let extracted = extract_content(ARTICLE);
        assert_eq!(extracted.title, "Weekly Digest");
        assert!(extracted.body.contains("first paragraph"));
        assert!(extracted.body.contains("second paragraph"));
        assert!(!extracted.body.contains("Unsubscribe"));
        assert!(!extracted.body.contains("Archive"));
    }

    #[test]
    fn test_sanitizes_output() {
        let extracted = extract_content(ARTICLE);
        assert!(!extracted.body.contains("<script"));
        assert!(!extracted.body.contains("track()"));
        assert!(!extracted.body.contains("onerror"));
        assert!(extracted.body.contains(r#"src="https://ex.com/a.png""#));
    }

    #[test]
    fn test_sanitize_allow_list() {
        let cleaned = sanitize(
            r#"<h1>Big</h1><h3 class="x" style="color:red">Small</h3><a href="https://ex.com" target="_blank">link</a><table><tr><td>cell</td></tr></table>"#,
        );
        assert!(!cleaned.contains("<h1"));
        assert!(cleaned.contains("Big"));
        assert!(cleaned.contains(r#"<h3 style="color:red">Small</h3>"#));
        assert!(cleaned.contains(r#"href="https://ex.com""#));
        assert!(!cleaned.contains("target"));
        assert!(!cleaned.contains("<table"));
        assert!(cleaned.contains("cell"));
    }

    #[test]
    fn test_decodes_quoted_printable() {
        let raw = "<html><body><div class=3D\"content\"><p>Caf=C3=A9 society is back this week, wi=\nth news, notes, and more.</p></div></body></html>";
        let extracted = extract_content(raw);
        assert!(extracted.body.contains("Café society"));
        assert!(extracted.body.contains("with news"));
    }

    #[test]
    fn test_invalid_quoted_printable_is_used_as_is() {
        let raw = r#"<p style="margin:0">Plain HTML that was never encoded, so it stays, as written.</p>"#;
        let extracted = extract_content(raw);
        assert!(extracted.body.contains(r#"style="margin:0""#));
    }

    #[test]
    fn test_title_from_heading() {
        let raw = "<html><body><div><h3>Issue 42</h3><p>Enough text here to be a paragraph, really.</p></div></body></html>";
        let extracted = extract_content(raw);
        assert_eq!(extracted.title, "Issue 42");
    }

    #[test]
    fn test_title_fallback() {
        let extracted = extract_content("<p>short</p>");
        assert_eq!(extracted.title, FALLBACK_TITLE);
        assert!(extracted.body.contains("short"));
    }
}
