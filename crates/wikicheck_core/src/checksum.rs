//! Check characters for ISBN-10, ISBN-13 and ISSN.
//!
//! Every function cleans its input first, so raw captured text and cleaned
//! values give the same answer.

use crate::comment::extract_comments;
use crate::span::find_containing;
use crate::tag::{TAG_REF, extract_tags};

pub const ISBN10_LENGTH: usize = 10;
pub const ISBN13_LENGTH: usize = 13;
pub const ISSN_LENGTH: usize = 8;

/// Byte offsets in `raw` of the characters kept by [`clean_identifier`].
pub fn significant_offsets(raw: &str) -> Vec<usize> {
    let comments = extract_comments(raw);
    let tags = if raw.contains('<') {
        extract_tags(raw, &comments)
    } else {
        Vec::new()
    };

    let mut output = Vec::new();
    let mut index = 0usize;
    while let Some(ch) = raw[index..].chars().next() {
        if ch == '<' {
            if let Some(comment) = find_containing(&comments, index, |comment| comment.span)
                && comments[comment].span.begin == index
            {
                index = comments[comment].span.end;
                continue;
            }
            if let Some(tag) = tags
                .iter()
                .find(|tag| tag.is_named(TAG_REF) && !tag.is_closing() && tag.span.begin == index)
            {
                index = tag.complete_span.end;
                continue;
            }
        } else if ch.is_ascii_digit() || ch == 'X' || ch == 'x' {
            output.push(index);
        }
        index += ch.len_utf8();
    }
    output
}

/// Uppercased digits and `X` of an identifier, skipping embedded comments
/// and `<ref>` tags.
pub fn clean_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    significant_offsets(trimmed)
        .into_iter()
        .map(|offset| char::from(trimmed.as_bytes()[offset].to_ascii_uppercase()))
        .collect()
}

fn digit(byte: u8) -> Option<u32> {
    byte.is_ascii_digit().then(|| u32::from(byte - b'0'))
}

fn check_character(value: u32) -> char {
    char::from_digit(value, 10).unwrap_or('X')
}

/// Weights 10 down to 2 over the first nine digits, modulus 11; 10 is `X`.
pub fn isbn10_checksum(value: &str) -> Option<char> {
    let cleaned = clean_identifier(value);
    if cleaned.len() != ISBN10_LENGTH {
        return None;
    }
    let mut check = 0u32;
    for (position, byte) in cleaned.bytes().take(9).enumerate() {
        check += (10 - position as u32) * digit(byte)?;
    }
    Some(check_character((11 - check % 11) % 11))
}

/// Alternating weights 1 and 3 over the first twelve digits, modulus 10.
pub fn isbn13_checksum(value: &str) -> Option<char> {
    let cleaned = clean_identifier(value);
    if cleaned.len() != ISBN13_LENGTH {
        return None;
    }
    let mut check = 0u32;
    for (position, byte) in cleaned.bytes().take(12).enumerate() {
        let weight = if position % 2 == 0 { 1 } else { 3 };
        check += weight * digit(byte)?;
    }
    Some(check_character((10 - check % 10) % 10))
}

pub fn isbn_checksum(value: &str) -> Option<char> {
    match clean_identifier(value).len() {
        ISBN10_LENGTH => isbn10_checksum(value),
        ISBN13_LENGTH => isbn13_checksum(value),
        _ => None,
    }
}

/// Weights 8 down to 2 over the first seven digits, modulus 11; 10 is `X`.
pub fn issn_checksum(value: &str) -> Option<char> {
    let cleaned = clean_identifier(value);
    if cleaned.len() != ISSN_LENGTH {
        return None;
    }
    let mut check = 0u32;
    for (position, byte) in cleaned.bytes().take(7).enumerate() {
        check += (8 - position as u32) * digit(byte)?;
    }
    Some(check_character((11 - check % 11) % 11))
}

fn last_matches(cleaned: &str, checksum: Option<char>) -> bool {
    checksum.is_some_and(|checksum| cleaned.ends_with(checksum))
}

pub fn is_valid_isbn(value: &str) -> bool {
    let cleaned = clean_identifier(value);
    matches!(cleaned.len(), ISBN10_LENGTH | ISBN13_LENGTH) && last_matches(&cleaned, isbn_checksum(&cleaned))
}

pub fn is_valid_issn(value: &str) -> bool {
    let cleaned = clean_identifier(value);
    cleaned.len() == ISSN_LENGTH && last_matches(&cleaned, issn_checksum(&cleaned))
}
