//! Byte-offset helpers shared by the element scanners.

pub fn starts_with_at(text: &str, index: usize, sequence: &str) -> bool {
    text.as_bytes()
        .get(index..index + sequence.len())
        .is_some_and(|slice| slice == sequence.as_bytes())
}

pub fn starts_with_ignore_case_at(text: &str, index: usize, sequence: &str) -> bool {
    text.as_bytes()
        .get(index..index + sequence.len())
        .is_some_and(|slice| slice.eq_ignore_ascii_case(sequence.as_bytes()))
}

pub fn index_of_ignore_case(text: &str, search: &str, start: usize) -> Option<usize> {
    if search.is_empty() {
        return Some(start);
    }
    let text_bytes = text.as_bytes();
    let search_bytes = search.as_bytes();
    if search_bytes.len() > text_bytes.len() || start >= text_bytes.len() {
        return None;
    }

    let last_start = text_bytes.len().saturating_sub(search_bytes.len());
    (start..=last_start).find(|&index| {
        text_bytes[index..index + search_bytes.len()].eq_ignore_ascii_case(search_bytes)
    })
}

pub fn char_at(text: &str, index: usize) -> Option<char> {
    text.get(index..).and_then(|rest| rest.chars().next())
}

/// Byte length of the character starting at `index`, at least 1 so loops
/// always advance.
pub fn char_len_at(text: &str, index: usize) -> usize {
    char_at(text, index).map_or(1, char::len_utf8)
}

pub fn byte_at(text: &str, index: usize) -> Option<u8> {
    text.as_bytes().get(index).copied()
}

pub fn is_ascii_digit_at(text: &str, index: usize) -> bool {
    byte_at(text, index).is_some_and(|byte| byte.is_ascii_digit())
}

pub fn trim_span(text: &str, begin: usize, end: usize) -> (usize, usize) {
    let slice = &text[begin..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return (begin, begin);
    }
    (begin + leading, end - trailing)
}
