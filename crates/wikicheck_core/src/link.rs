use serde::Serialize;

use crate::span::{Span, find_containing};
use crate::text::{starts_with_at, trim_span};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalLink {
    pub span: Span,
    pub target: String,
    pub anchor: Option<String>,
    pub text: Option<String>,
    /// Offset of the displayed text relative to the link start.
    pub text_offset: Option<usize>,
}

impl InternalLink {
    pub fn displayed_text(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageParameter {
    pub pipe_offset: usize,
    pub value_span: Span,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub span: Span,
    /// Namespace as written (`File`, `image`, ...).
    pub namespace: String,
    pub name: String,
    /// Offset of the first top-level `|` relative to the image start.
    pub first_pipe_offset: Option<usize>,
    pub parameters: Vec<ImageParameter>,
}

impl Image {
    /// Last parameter that is not a layout keyword, which MediaWiki shows as
    /// the caption.
    pub fn caption(&self) -> Option<&ImageParameter> {
        self.parameters
            .iter()
            .rev()
            .find(|parameter| !is_image_option(&parameter.value))
    }
}

fn is_image_option(value: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "thumb",
        "thumbnail",
        "frame",
        "framed",
        "frameless",
        "border",
        "left",
        "right",
        "center",
        "centre",
        "none",
        "upright",
        "baseline",
        "middle",
        "sub",
        "super",
        "top",
        "text-top",
        "bottom",
        "text-bottom",
    ];
    let lower = value.trim().to_ascii_lowercase();
    if KEYWORDS.contains(&lower.as_str()) {
        return true;
    }
    if let Some(size) = lower.strip_suffix("px") {
        return !size.is_empty() && size.chars().all(|ch| ch.is_ascii_digit() || ch == 'x');
    }
    ["alt=", "link=", "upright=", "page=", "lang=", "class="]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Plain `[[target|text]]` links. Links whose target is in an image
/// namespace are reported by [`extract_images`] instead.
pub fn extract_internal_links(contents: &str, regions: &[Span], image_namespaces: &[String]) -> Vec<InternalLink> {
    let bytes = contents.as_bytes();
    let mut output = Vec::new();
    let mut index = 0usize;

    while index + 1 < bytes.len() {
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if !starts_with_at(contents, index, "[[") {
            index += 1;
            continue;
        }
        let begin = index;
        index += 2;
        if image_prefix(contents, index, image_namespaces).is_some() {
            continue;
        }
        let Some(close) = find_link_close(contents, index, regions) else {
            continue;
        };

        let inner = &contents[begin + 2..close];
        let (target_part, text) = match inner.find('|') {
            Some(pipe) => (&inner[..pipe], Some((pipe, &inner[pipe + 1..]))),
            None => (inner, None),
        };
        if !is_valid_target(target_part) {
            continue;
        }
        let target_part = target_part.trim();
        let (target, anchor) = match target_part.split_once('#') {
            Some((target, anchor)) => (target.trim().to_string(), Some(anchor.trim().to_string())),
            None => (target_part.to_string(), None),
        };
        output.push(InternalLink {
            span: Span::new(begin, close + 2),
            target,
            anchor,
            text: text.map(|(_, text)| text.to_string()),
            text_offset: text.map(|(pipe, _)| pipe + 3),
        });
        index = close + 2;
    }

    output
}

/// `[[File:name|options|caption]]`, with links and images allowed inside the
/// caption. Nested images are listed after the image containing them.
pub fn extract_images(contents: &str, regions: &[Span], image_namespaces: &[String]) -> Vec<Image> {
    let mut output = Vec::new();
    let mut index = 0usize;

    while index + 1 < contents.len() {
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if starts_with_at(contents, index, "[[")
            && let Some(image) = parse_image_at(contents, index, regions, image_namespaces)
        {
            output.push(image);
        }
        index += 1;
    }

    output
}

fn parse_image_at(contents: &str, begin: usize, regions: &[Span], image_namespaces: &[String]) -> Option<Image> {
    let name_start = begin + 2;
    let (namespace, colon) = image_prefix(contents, name_start, image_namespaces)?;

    let mut index = colon + 1;
    let mut depth = 0usize;
    let mut template_depth = 0usize;
    let mut pipes = Vec::new();
    let close = loop {
        if index + 1 >= contents.len() {
            return None;
        }
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if starts_with_at(contents, index, "[[") {
            depth += 1;
            index += 2;
        } else if starts_with_at(contents, index, "]]") {
            if depth == 0 {
                break index;
            }
            depth -= 1;
            index += 2;
        } else if starts_with_at(contents, index, "{{") {
            template_depth += 1;
            index += 2;
        } else if starts_with_at(contents, index, "}}") {
            template_depth = template_depth.saturating_sub(1);
            index += 2;
        } else {
            if contents.as_bytes()[index] == b'|' && depth == 0 && template_depth == 0 {
                pipes.push(index);
            }
            index += 1;
        }
    };

    let name_end = pipes.first().copied().unwrap_or(close);
    let name = contents[colon + 1..name_end].trim();
    if name.is_empty() || name.contains('\n') {
        return None;
    }

    let parameters = pipes
        .iter()
        .enumerate()
        .map(|(position, &pipe)| {
            let segment_end = pipes.get(position + 1).copied().unwrap_or(close);
            let (value_begin, value_end) = trim_span(contents, pipe + 1, segment_end);
            ImageParameter {
                pipe_offset: pipe,
                value_span: Span::new(value_begin, value_end),
                value: contents[value_begin..value_end].to_string(),
            }
        })
        .collect();

    Some(Image {
        span: Span::new(begin, close + 2),
        namespace,
        name: name.to_string(),
        first_pipe_offset: pipes.first().map(|pipe| pipe - begin),
        parameters,
    })
}

/// Namespace name and colon offset when the link target at `start` is in an
/// image namespace.
fn image_prefix(contents: &str, start: usize, image_namespaces: &[String]) -> Option<(String, usize)> {
    let rest = &contents[start..];
    let colon = rest.find(':')?;
    let prefix = &rest[..colon];
    if prefix.contains(['|', '[', ']', '\n']) {
        return None;
    }
    let prefix = prefix.trim();
    image_namespaces
        .iter()
        .any(|namespace| namespace.replace('_', " ").eq_ignore_ascii_case(&prefix.replace('_', " ")))
        .then(|| (prefix.to_string(), start + colon))
}

fn find_link_close(contents: &str, from: usize, regions: &[Span]) -> Option<usize> {
    let mut index = from;
    while index + 1 < contents.len() {
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if starts_with_at(contents, index, "]]") {
            return Some(index);
        }
        if starts_with_at(contents, index, "[[") {
            return None;
        }
        index += 1;
    }
    None
}

fn is_valid_target(target: &str) -> bool {
    let trimmed = target.trim();
    !trimmed.is_empty()
        && !trimmed
            .chars()
            .any(|ch| matches!(ch, '\n' | '{' | '}' | '<' | '>' | '['))
}

#[cfg(test)]
mod tests {
    use super::{extract_images, extract_internal_links};
    use crate::span::Span;

    fn namespaces() -> Vec<String> {
        vec!["File".to_string(), "Image".to_string()]
    }

    #[test]
    fn parses_target_anchor_and_text() {
        let text = "see [[Foo bar#History|the history]] and [[Baz]]";
        let links = extract_internal_links(text, &[], &namespaces());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].span, Span::new(4, 35));
        assert_eq!(links[0].target, "Foo bar");
        assert_eq!(links[0].anchor.as_deref(), Some("History"));
        assert_eq!(links[0].displayed_text(), "the history");
        let text_offset = links[0].text_offset.expect("text offset");
        assert!(text[links[0].span.begin + text_offset..].starts_with("the history"));
        assert_eq!(links[1].displayed_text(), "Baz");
        assert_eq!(links[1].text_offset, None);
    }

    #[test]
    fn rejects_broken_links() {
        let text = "[[a\nb]] [[{{x}}]] [[ ]] [[unclosed";
        assert!(extract_internal_links(text, &[], &namespaces()).is_empty());
    }

    #[test]
    fn images_hold_nested_links() {
        let text = "[[File:Map.png|thumb|200px|A [[Map]] of [[Paris|the city]]]] end";
        let images = extract_images(text, &[], &namespaces());
        assert_eq!(images.len(), 1);
        let image = &images[0];
        assert_eq!(image.namespace, "File");
        assert_eq!(image.name, "Map.png");
        assert_eq!(image.span, Span::new(0, text.len() - 4));
        assert_eq!(image.first_pipe_offset, Some(14));
        assert_eq!(image.parameters.len(), 3);
        assert_eq!(
            image.caption().map(|caption| caption.value.as_str()),
            Some("A [[Map]] of [[Paris|the city]]")
        );

        let links = extract_internal_links(text, &[], &namespaces());
        let targets = links.iter().map(|link| link.target.as_str()).collect::<Vec<_>>();
        assert_eq!(targets, vec!["Map", "Paris"]);
    }

    #[test]
    fn image_namespace_is_case_insensitive() {
        let images = extract_images("[[image:A b.jpg]]", &[], &namespaces());
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].first_pipe_offset, None);
        assert!(extract_images("[[Category:X]]", &[], &namespaces()).is_empty());
    }

    #[test]
    fn regions_hide_links() {
        let text = "<!-- [[Hidden]] --> [[Shown]]";
        let links = extract_internal_links(text, &[Span::new(0, 19)], &namespaces());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Shown");
    }
}
