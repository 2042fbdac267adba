use std::collections::BTreeSet;
use std::sync::LazyLock;

use ammonia;
use pulldown_cmark::{Options, Parser, html};
use regex::Regex;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@])@([\w.+-]{1,50})").expect("valid mention regex"));

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive, dangerous tags (like <script>,
/// <iframe>) and attributes (like onclick) are stripped along with script content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Renders post markdown to sanitized HTML.
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options);
    let mut rendered = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut rendered, parser);

    clean_html(&rendered)
}

/// Drops every tag and keeps the (escaped) text content.
pub fn strip_tags(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}

/// Plain-text summary of rendered HTML, at most `max_chars` characters.
pub fn summarize(html: &str, max_chars: usize) -> String {
    let text = strip_tags(html);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Usernames mentioned as `@name`, deduplicated and in sorted order.
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_is_rendered_and_sanitized() {
        let html = markdown_to_html("**bold** <script>alert(1)</script>");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn summary_is_truncated_on_char_boundary() {
        let s = summarize("<p>héllo   wörld</p>", 7);
        assert_eq!(s, "héllo w...");
        assert_eq!(summarize("<p>short</p>", 300), "short");
    }

    #[test]
    fn mentions_skip_emails_and_dedupe() {
        let names = extract_mentions("thanks @alice and @bob. mail me at x@example.com, @alice");
        assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
    }
}
