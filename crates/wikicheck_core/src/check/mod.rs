//! Check algorithms: independent rules run over a [`PageAnalysis`], each
//! reporting findings with candidate replacements.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::analysis::PageAnalysis;
use crate::isbn_range::IsbnRangeLookup;
use crate::message::{MessageFormatter, PositionalFormatter};
use crate::span::Span;

mod algorithm070;
mod algorithm072;
mod algorithm073;
mod algorithm108;
mod algorithm518;
mod catalog;
mod identifier;

pub use algorithm070::IsbnWrongLength;
pub use algorithm072::IsbnChecksum10;
pub use algorithm073::IsbnChecksum13;
pub use algorithm108::IssnChecksum;
pub use algorithm518::NowikiTags;
pub use catalog::{AlgorithmCatalog, AlgorithmReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub description: String,
    /// Text replacing the finding's span; `None` for information only.
    pub replacement: Option<String>,
    /// Safe to apply without review.
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckErrorResult {
    pub error_number: u32,
    pub span: Span,
    pub actions: Vec<Action>,
}

impl CheckErrorResult {
    pub fn new(error_number: u32, span: Span) -> Self {
        Self {
            error_number,
            span,
            actions: Vec::new(),
        }
    }

    pub fn add_possible_action(&mut self, description: impl Into<String>) {
        self.actions.push(Action {
            description: description.into(),
            replacement: None,
            automatic: false,
        });
    }

    /// Add a replacement unless the same text is already offered. Returns
    /// whether it was added.
    pub fn add_replacement(
        &mut self,
        replacement: impl Into<String>,
        description: impl Into<String>,
        automatic: bool,
    ) -> bool {
        let replacement = replacement.into();
        if self
            .actions
            .iter()
            .any(|action| action.replacement.as_deref() == Some(replacement.as_str()))
        {
            return false;
        }
        self.actions.push(Action {
            description: description.into(),
            replacement: Some(replacement),
            automatic,
        });
        true
    }

    pub fn replacements(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| action.replacement.as_deref())
            .collect()
    }

    pub fn first_replacement(&self) -> Option<&str> {
        self.actions
            .iter()
            .find_map(|action| action.replacement.as_deref())
    }

    pub fn is_automatic(&self) -> bool {
        self.actions.iter().any(|action| action.automatic)
    }
}

/// Collaborators handed to the built-in algorithms.
#[derive(Clone)]
pub struct CheckContext {
    pub formatter: Arc<dyn MessageFormatter>,
    /// Without a table, range classification is skipped.
    pub isbn_ranges: Option<Arc<dyn IsbnRangeLookup>>,
}

impl Default for CheckContext {
    fn default() -> Self {
        Self {
            formatter: Arc::new(PositionalFormatter),
            isbn_ranges: None,
        }
    }
}

impl CheckContext {
    pub fn with_isbn_ranges(mut self, ranges: Arc<dyn IsbnRangeLookup>) -> Self {
        self.isbn_ranges = Some(ranges);
        self
    }

    pub(crate) fn format(&self, template: &str, args: &[&str]) -> String {
        self.formatter.format(template, args)
    }
}

pub trait CheckErrorAlgorithm: Send + Sync {
    fn error_number(&self) -> u32;

    fn short_description(&self) -> &str;

    /// Configurable parameters: name to description.
    fn parameters(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::new()
    }

    /// Configured explanation for the finding at `span`, if any.
    fn reason(&self, _analysis: &PageAnalysis<'_>, _span: Span) -> Option<String> {
        None
    }

    /// Look for errors. With `errors` set to `None` the algorithm may stop at
    /// the first finding; otherwise every finding is pushed with its
    /// candidate replacements. `only_automatic` keeps findings whose fix can
    /// be applied without review.
    fn analyze(
        &self,
        analysis: &PageAnalysis<'_>,
        errors: Option<&mut Vec<CheckErrorResult>>,
        only_automatic: bool,
    ) -> bool;
}

/// Configured parameter of an algorithm, read through the analysis.
pub(crate) fn parameter<'c>(analysis: &PageAnalysis<'c>, number: u32, name: &str) -> Option<&'c str> {
    analysis.config().algorithm_parameter(number, name)
}

#[cfg(test)]
mod tests {
    use super::CheckErrorResult;
    use crate::span::Span;

    #[test]
    fn replacements_are_unique_and_ordered() {
        let mut result = CheckErrorResult::new(73, Span::new(0, 4));
        result.add_possible_action("message");
        assert!(result.add_replacement("b", "first", false));
        assert!(result.add_replacement("a", "second", true));
        assert!(!result.add_replacement("b", "again", false));
        assert_eq!(result.replacements(), vec!["b", "a"]);
        assert_eq!(result.first_replacement(), Some("b"));
        assert!(result.is_automatic());
        assert_eq!(result.actions.len(), 3);
    }
}
