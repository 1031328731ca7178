use serde::Serialize;

use crate::span::Span;

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub span: Span,
    /// False when the comment runs to the end of the text without `-->`.
    pub closed: bool,
}

impl Comment {
    pub fn value_span(&self) -> Span {
        let begin = self.span.begin + COMMENT_OPEN.len();
        let end = if self.closed {
            self.span.end - COMMENT_CLOSE.len()
        } else {
            self.span.end
        };
        Span::new(begin, end.max(begin))
    }
}

/// Comments in document order. An unterminated comment swallows the rest of
/// the text, matching how MediaWiki renders it.
pub fn extract_comments(contents: &str) -> Vec<Comment> {
    let mut output = Vec::new();
    let mut index = 0usize;

    while let Some(found) = contents[index..].find(COMMENT_OPEN) {
        let begin = index + found;
        let body = begin + COMMENT_OPEN.len();
        match contents[body..].find(COMMENT_CLOSE) {
            Some(close) => {
                let end = body + close + COMMENT_CLOSE.len();
                output.push(Comment {
                    span: Span::new(begin, end),
                    closed: true,
                });
                index = end;
            }
            None => {
                output.push(Comment {
                    span: Span::new(begin, contents.len()),
                    closed: false,
                });
                break;
            }
        }
    }

    output
}
