use serde::Serialize;

use crate::comment::Comment;
use crate::span::{Span, find_containing};
use crate::text::index_of_ignore_case;

pub const TAG_NOWIKI: &str = "nowiki";
pub const TAG_PRE: &str = "pre";
pub const TAG_REF: &str = "ref";

/// Tags whose content is not parsed as wikitext: nothing inside them is a
/// tag, template, link or identifier.
pub const UNPARSED_CONTENT_TAGS: &[&str] = &[
    TAG_NOWIKI,
    TAG_PRE,
    "math",
    "source",
    "syntaxhighlight",
    "score",
    "chem",
    "ce",
    "hiero",
    "timeline",
    "templatedata",
    "graph",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Open,
    Close,
    /// Self-closing tag such as `<nowiki/>` or `<references />`.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    /// Lowercased tag name.
    pub name: String,
    pub kind: TagKind,
    /// The tag itself, from `<` to `>`.
    pub span: Span,
    /// Index of the paired open/close tag in the tag list.
    pub matching: Option<usize>,
    /// Open tag through close tag when paired, otherwise the tag itself.
    pub complete_span: Span,
    /// Text between the paired tags.
    pub value_span: Option<Span>,
}

impl Tag {
    pub fn is_full_tag(&self) -> bool {
        self.kind == TagKind::Full
    }

    pub fn is_closing(&self) -> bool {
        self.kind == TagKind::Close
    }

    pub fn is_complete(&self) -> bool {
        self.kind == TagKind::Full || self.matching.is_some()
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

pub fn is_unparsed_content_tag(name: &str) -> bool {
    UNPARSED_CONTENT_TAGS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Tags in document order, with open and close tags paired. Tags inside
/// comments and inside unparsed-content tags are ignored.
pub fn extract_tags(contents: &str, comments: &[Comment]) -> Vec<Tag> {
    let mut output = Vec::new();
    let mut index = 0usize;

    while index < contents.len() {
        let Some(lt) = contents[index..].find('<') else {
            break;
        };
        let at = index + lt;
        if let Some(comment) = find_containing(comments, at, |comment| comment.span) {
            index = comments[comment].span.end.max(at + 1);
            continue;
        }
        let Some(tag) = parse_tag_at(contents, at) else {
            index = at + 1;
            continue;
        };
        index = tag.span.end;
        let skip_content = tag.kind == TagKind::Open && is_unparsed_content_tag(&tag.name);
        let name = tag.name.clone();
        output.push(tag);
        if skip_content && let Some(close) = find_closing_tag(contents, index, &name) {
            index = close.span.end;
            output.push(close);
        }
    }

    pair_tags(&mut output);
    output
}

/// Sorted, merged spans that scanners must step over: comments and the
/// whole extent of unparsed-content tags.
pub fn opaque_regions(comments: &[Comment], tags: &[Tag]) -> Vec<Span> {
    let mut regions = comments
        .iter()
        .map(|comment| comment.span)
        .chain(
            tags.iter()
                .filter(|tag| !tag.is_closing() && is_unparsed_content_tag(&tag.name))
                .map(|tag| tag.complete_span),
        )
        .collect::<Vec<_>>();
    regions.sort();

    let mut merged = Vec::<Span>::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last) if region.begin <= last.end => last.end = last.end.max(region.end),
            _ => merged.push(region),
        }
    }
    merged
}

fn parse_tag_at(contents: &str, at: usize) -> Option<Tag> {
    let bytes = contents.as_bytes();
    let mut index = at + 1;
    let closing = bytes.get(index).copied() == Some(b'/');
    if closing {
        index += 1;
    }

    let name_start = index;
    if !bytes.get(index).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes.get(index).is_some_and(u8::is_ascii_alphanumeric) {
        index += 1;
    }
    let name = contents[name_start..index].to_ascii_lowercase();
    if !matches!(
        bytes.get(index).copied(),
        Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'>') | Some(b'/')
    ) {
        return None;
    }

    let end = find_tag_end(contents, index)?;
    let kind = if closing {
        TagKind::Close
    } else if bytes[end - 1] == b'/' {
        TagKind::Full
    } else {
        TagKind::Open
    };
    let span = Span::new(at, end + 1);
    Some(Tag {
        name,
        kind,
        span,
        matching: None,
        complete_span: span,
        value_span: None,
    })
}

/// Index of the `>` closing a tag. Quotes only count after `=`, and a
/// newline ends a runaway quoted value.
fn find_tag_end(contents: &str, start: usize) -> Option<usize> {
    let bytes = contents.as_bytes();
    let mut index = start;
    let mut quote = None::<u8>;
    let mut after_equals = false;
    while index < bytes.len() {
        let byte = bytes[index];
        if let Some(active) = quote {
            if byte == active || byte == b'\n' {
                quote = None;
            }
            index += 1;
            continue;
        }
        match byte {
            b'>' => return Some(index),
            b'<' => return None,
            b'=' => after_equals = true,
            b'"' | b'\'' if after_equals => {
                quote = Some(byte);
                after_equals = false;
            }
            byte if byte.is_ascii_whitespace() => {}
            _ => after_equals = false,
        }
        index += 1;
    }
    None
}

fn find_closing_tag(contents: &str, from: usize, name: &str) -> Option<Tag> {
    let bytes = contents.as_bytes();
    let pattern = format!("</{name}");
    let mut cursor = from;
    while let Some(at) = index_of_ignore_case(contents, &pattern, cursor) {
        let mut index = at + pattern.len();
        while bytes.get(index).is_some_and(u8::is_ascii_whitespace) {
            index += 1;
        }
        if bytes.get(index).copied() == Some(b'>') {
            let span = Span::new(at, index + 1);
            return Some(Tag {
                name: name.to_string(),
                kind: TagKind::Close,
                span,
                matching: None,
                complete_span: span,
                value_span: None,
            });
        }
        cursor = at + 1;
    }
    None
}

fn pair_tags(tags: &mut [Tag]) {
    let mut open = Vec::<usize>::new();
    for index in 0..tags.len() {
        match tags[index].kind {
            TagKind::Open => open.push(index),
            TagKind::Close => {
                let Some(position) = open
                    .iter()
                    .rposition(|&candidate| tags[candidate].name == tags[index].name)
                else {
                    continue;
                };
                let opening = open.remove(position);
                let complete = Span::new(tags[opening].span.begin, tags[index].span.end);
                let value = Span::new(tags[opening].span.end, tags[index].span.begin);
                for (current, other) in [(opening, index), (index, opening)] {
                    tags[current].matching = Some(other);
                    tags[current].complete_span = complete;
                    tags[current].value_span = Some(value);
                }
            }
            TagKind::Full => {}
        }
    }
}
