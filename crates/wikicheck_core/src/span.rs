use serde::Serialize;

/// Half-open `[begin, end)` byte range into one page's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end, "span begins after it ends: {begin}..{end}");
        Self {
            begin,
            end: end.max(begin),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.begin <= offset && offset < self.end
    }

    pub fn contains_span(&self, other: Span) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Overlap where neither span contains the other.
    pub fn crosses(&self, other: Span) -> bool {
        self.overlaps(other) && !self.contains_span(other) && !other.contains_span(*self)
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.begin..self.end).unwrap_or("")
    }

    /// True when the span fits inside `text` and both ends sit on character
    /// boundaries.
    pub fn is_valid_for(&self, text: &str) -> bool {
        self.begin <= self.end
            && self.end <= text.len()
            && text.is_char_boundary(self.begin)
            && text.is_char_boundary(self.end)
    }
}

/// Index of the element whose span contains `offset`, for disjoint spans
/// sorted by `begin`.
pub(crate) fn find_containing<T>(items: &[T], offset: usize, span: impl Fn(&T) -> Span) -> Option<usize> {
    let index = items.partition_point(|item| span(item).begin <= offset);
    if index == 0 {
        return None;
    }
    let candidate = index - 1;
    span(&items[candidate]).contains(offset).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::{Span, find_containing};

    #[test]
    fn spans_order_by_begin_then_end() {
        let mut spans = vec![Span::new(4, 9), Span::new(0, 3), Span::new(4, 5)];
        spans.sort();
        assert_eq!(spans, vec![Span::new(0, 3), Span::new(4, 5), Span::new(4, 9)]);
    }

    #[test]
    fn crossing_excludes_nesting() {
        let outer = Span::new(0, 10);
        assert!(!outer.crosses(Span::new(2, 5)));
        assert!(outer.crosses(Span::new(8, 12)));
        assert!(!outer.overlaps(Span::new(10, 12)));
    }

    #[test]
    fn find_containing_uses_half_open_ranges() {
        let spans = vec![Span::new(0, 3), Span::new(5, 8)];
        assert_eq!(find_containing(&spans, 2, |span| *span), Some(0));
        assert_eq!(find_containing(&spans, 3, |span| *span), None);
        assert_eq!(find_containing(&spans, 5, |span| *span), Some(1));
        assert_eq!(find_containing(&spans, 8, |span| *span), None);
    }

    #[test]
    fn slice_is_empty_outside_text() {
        assert_eq!(Span::new(2, 4).slice("abcdef"), "cd");
        assert_eq!(Span::new(2, 40).slice("abcdef"), "");
        assert!(!Span::new(0, 1).is_valid_for("é"));
    }
}
