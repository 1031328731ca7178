use serde::Serialize;

use crate::span::{Span, find_containing};
use crate::text::{char_at, starts_with_ignore_case_at};

const PROTOCOLS: &[&str] = &[
    "http://", "https://", "ftp://", "ftps://", "mailto:", "news:", "irc://",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalLink {
    pub span: Span,
    pub url: String,
    pub text: Option<String>,
    /// Offset of the displayed text relative to the link start.
    pub text_offset: Option<usize>,
    /// Written as `[url text]` rather than a bare URL.
    pub has_square: bool,
}

/// Bracketed links and bare URLs, disjoint and in document order.
pub fn extract_external_links(contents: &str, regions: &[Span]) -> Vec<ExternalLink> {
    let bytes = contents.as_bytes();
    let mut output = Vec::new();
    let mut index = 0usize;

    while index < bytes.len() {
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if bytes[index] == b'[' && bytes.get(index + 1).copied() != Some(b'[') {
            if let Some(link) = parse_bracketed(contents, index) {
                index = link.span.end;
                output.push(link);
                continue;
            }
        } else if bytes[index] == b'[' {
            index += 2;
            continue;
        } else if protocol_at(contents, index, false).is_some() && is_word_boundary(contents, index) {
            let end = bare_url_end(contents, index);
            if end > index {
                output.push(ExternalLink {
                    span: Span::new(index, end),
                    url: contents[index..end].to_string(),
                    text: None,
                    text_offset: None,
                    has_square: false,
                });
                index = end;
                continue;
            }
        }
        index += 1;
    }

    output
}

fn protocol_at(contents: &str, index: usize, bracketed: bool) -> Option<usize> {
    if bracketed && contents[index..].starts_with("//") {
        return Some(2);
    }
    PROTOCOLS
        .iter()
        .find(|protocol| starts_with_ignore_case_at(contents, index, protocol))
        .map(|protocol| protocol.len())
}

fn is_word_boundary(contents: &str, index: usize) -> bool {
    contents[..index]
        .chars()
        .next_back()
        .is_none_or(|previous| !previous.is_alphanumeric() && previous != '/' && previous != '_')
}

fn is_url_terminator(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '[' | ']' | '<' | '>' | '"' | '{' | '}' | '|')
}

fn bare_url_end(contents: &str, begin: usize) -> usize {
    let mut end = begin;
    while let Some(ch) = char_at(contents, end) {
        if is_url_terminator(ch) {
            break;
        }
        end += ch.len_utf8();
    }

    let url = &contents[begin..end];
    let has_open_paren = url.contains('(');
    let trimmed = url.trim_end_matches(|ch: char| {
        matches!(ch, '.' | ',' | ';' | ':' | '!' | '?' | '\'') || (ch == ')' && !has_open_paren)
    });
    begin + trimmed.len()
}

fn parse_bracketed(contents: &str, begin: usize) -> Option<ExternalLink> {
    let url_begin = begin + 1;
    let protocol_len = protocol_at(contents, url_begin, true)?;

    let mut url_end = url_begin + protocol_len;
    while let Some(ch) = char_at(contents, url_end) {
        if is_url_terminator(ch) {
            break;
        }
        url_end += ch.len_utf8();
    }
    if url_end == url_begin + protocol_len {
        return None;
    }

    let mut text_begin = url_end;
    while char_at(contents, text_begin).is_some_and(|ch| ch == ' ' || ch == '\t') {
        text_begin += 1;
    }
    let close = text_begin + contents[text_begin..].find(|ch: char| ch == ']' || ch == '\n')?;
    if contents.as_bytes()[close] != b']' {
        return None;
    }

    let text = &contents[text_begin..close];
    let has_text = !text.trim().is_empty();
    Some(ExternalLink {
        span: Span::new(begin, close + 1),
        url: contents[url_begin..url_end].to_string(),
        text: has_text.then(|| text.to_string()),
        text_offset: has_text.then_some(text_begin - begin),
        has_square: true,
    })
}

#[cfg(test)]
mod tests {
    use super::extract_external_links;
    use crate::span::Span;

    #[test]
    fn parses_bracketed_links_with_text() {
        let text = "see [https://example.org/a?b=1 Example site] now";
        let links = extract_external_links(text, &[]);
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert!(link.has_square);
        assert_eq!(link.span, Span::new(4, 44));
        assert_eq!(link.url, "https://example.org/a?b=1");
        assert_eq!(link.text.as_deref(), Some("Example site"));
        let offset = link.text_offset.expect("text offset");
        assert!(text[link.span.begin + offset..].starts_with("Example site"));
    }

    #[test]
    fn bracketed_link_without_text() {
        let links = extract_external_links("[//example.org]", &[]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "//example.org");
        assert_eq!(links[0].text, None);
    }

    #[test]
    fn bare_urls_drop_trailing_punctuation() {
        let text = "Read http://a.org/x. Or (see https://b.org/y) or https://c.org/(z).";
        let urls = extract_external_links(text, &[])
            .into_iter()
            .map(|link| link.url)
            .collect::<Vec<_>>();
        assert_eq!(urls, vec!["http://a.org/x", "https://b.org/y", "https://c.org/(z)"]);
    }

    #[test]
    fn ignores_internal_links_and_regions() {
        let text = "[[Page]] <!-- http://x.org --> [mailto:a@b.c mail]";
        let links = extract_external_links(text, &[Span::new(9, 30)]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "mailto:a@b.c");
    }

    #[test]
    fn unclosed_bracket_falls_back_to_bare_url() {
        let links = extract_external_links("[http://x.org text\nmore", &[]);
        assert_eq!(links.len(), 1);
        assert!(!links[0].has_square);
        assert_eq!(links[0].url, "http://x.org");
    }
}
