//! Wikitext analysis and check-error detection: element extraction over a
//! page, ISBN/ISSN identifier scanning, and numbered check algorithms that
//! report findings with candidate replacements.

pub mod analysis;
pub mod check;
pub mod checksum;
pub mod comment;
pub mod config;
pub mod diagnostics;
pub mod external_link;
pub mod identifier;
pub mod isbn_range;
pub mod link;
pub mod message;
pub mod namespace;
pub mod span;
pub mod tag;
pub mod template;
pub mod text;
