use std::collections::BTreeMap;

use crate::analysis::PageAnalysis;
use crate::check::identifier::{CHECKSUM_MESSAGE, Candidates, Finding, checksum_reason, suggested_forms};
use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult};
use crate::checksum::{ISBN10_LENGTH, isbn_checksum, isbn10_checksum};
use crate::identifier::Identifier;
use crate::span::Span;

const NUMBER: u32 = 72;

/// ISBN-10 whose check character does not match.
pub struct IsbnChecksum10 {
    context: CheckContext,
}

impl IsbnChecksum10 {
    pub fn new(context: CheckContext) -> Self {
        Self { context }
    }

    /// `(found, computed)` check characters when they differ.
    fn mismatch(number: &str) -> Option<(char, char)> {
        if number.len() != ISBN10_LENGTH {
            return None;
        }
        let found = number.chars().last()?.to_ascii_uppercase();
        let computed = isbn10_checksum(number)?;
        (computed != found).then_some((found, computed))
    }

    fn finding<'i>(&self, analysis: &PageAnalysis<'_>, isbn: &'i Identifier, found: char, computed: char) -> Finding<'i> {
        let number = isbn.value.as_str();
        let corrected = format!("{}{computed}", &number[..ISBN10_LENGTH - 1]);

        let mut candidates = Candidates::new(number, isbn_checksum);
        candidates.add(corrected.clone());
        candidates.add_transpositions();
        candidates.add_substitutions();

        let extra = suggested_forms(analysis, isbn, &corrected)
            .into_iter()
            .map(|form| (form.clone(), form))
            .collect();

        Finding {
            identifier: isbn,
            message: self
                .context
                .format(CHECKSUM_MESSAGE, &[found.to_string().as_str(), computed.to_string().as_str()]),
            corrected: Some(corrected),
            candidates: candidates.values().to_vec(),
            extra,
            reason: checksum_reason(analysis, &self.context, NUMBER, computed, found),
        }
    }
}

impl CheckErrorAlgorithm for IsbnChecksum10 {
    fn error_number(&self) -> u32 {
        NUMBER
    }

    fn short_description(&self) -> &str {
        "ISBN wrong checksum in ISBN-10"
    }

    fn parameters(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            ("reason", "An explanation of the problem"),
            ("reason_checksum", "An explanation of the problem (incorrect checksum)"),
        ])
    }

    fn reason(&self, analysis: &PageAnalysis<'_>, span: Span) -> Option<String> {
        let isbn = analysis.isbns().iter().find(|isbn| isbn.span == span)?;
        let (found, computed) = Self::mismatch(&isbn.value)?;
        checksum_reason(analysis, &self.context, NUMBER, computed, found)
    }

    fn analyze(
        &self,
        analysis: &PageAnalysis<'_>,
        mut errors: Option<&mut Vec<CheckErrorResult>>,
        only_automatic: bool,
    ) -> bool {
        let mut found_any = false;
        for isbn in analysis.isbns() {
            let Some((found, computed)) = Self::mismatch(&isbn.value) else {
                continue;
            };
            let finding = self.finding(analysis, isbn, found, computed);
            if only_automatic && !finding.is_automatic() {
                continue;
            }
            found_any = true;
            let Some(errors) = errors.as_deref_mut() else {
                return true;
            };
            errors.push(finding.into_result(analysis, NUMBER));
        }
        found_any
    }
}

#[cfg(test)]
mod tests {
    use super::IsbnChecksum10;
    use crate::analysis::PageAnalysis;
    use crate::check::{CheckContext, CheckErrorAlgorithm};
    use crate::config::WikiConfig;

    #[test]
    fn reports_wrong_check_character() {
        let config = WikiConfig::default();
        let text = "ISBN 0-306-40615-3 and ISBN 0-306-40615-2";
        let analysis = PageAnalysis::new(text, &config);
        let algorithm = IsbnChecksum10::new(CheckContext::default());
        let mut errors = Vec::new();
        assert!(algorithm.analyze(&analysis, Some(&mut errors), false));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.slice(text), "ISBN 0-306-40615-3");
        assert_eq!(errors[0].actions[0].description, "The checksum is 3 instead of 2");
        assert_eq!(errors[0].actions[1].description, "Original number 0306406153");
        assert_eq!(errors[0].first_replacement(), Some("ISBN 0-306-40615-2"));
        assert!(!errors[0].replacements().contains(&"ISBN 0-306-40615-3"));
    }

    #[test]
    fn x_check_character() {
        let config = WikiConfig::default();
        let analysis = PageAnalysis::new("ISBN 0-8044-2957-5", &config);
        let algorithm = IsbnChecksum10::new(CheckContext::default());
        let mut errors = Vec::new();
        assert!(algorithm.analyze(&analysis, Some(&mut errors), false));
        assert_eq!(errors[0].first_replacement(), Some("ISBN 0-8044-2957-X"));

        let analysis = PageAnalysis::new("ISBN 0-8044-2957-x", &config);
        assert!(!algorithm.analyze(&analysis, None, false));
    }

    #[test]
    fn only_automatic_fixes_the_check_character() {
        let config = WikiConfig::default();
        let analysis = PageAnalysis::new("ISBN 0-306-40615-3", &config);
        let algorithm = IsbnChecksum10::new(CheckContext::default());
        let mut errors = Vec::new();
        assert!(algorithm.analyze(&analysis, Some(&mut errors), true));
        let automatic = errors[0]
            .actions
            .iter()
            .filter(|action| action.automatic)
            .filter_map(|action| action.replacement.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(automatic, vec!["ISBN 0-306-40615-2"]);

        let analysis = PageAnalysis::new("ISBN: 0-306-40615-3", &config);
        assert!(!algorithm.analyze(&analysis, None, true));
        assert!(algorithm.analyze(&analysis, None, false));
    }

    #[test]
    fn other_lengths_are_ignored() {
        let config = WikiConfig::default();
        let analysis = PageAnalysis::new("ISBN 978-0-306-40615-1 ISBN 12345", &config);
        let algorithm = IsbnChecksum10::new(CheckContext::default());
        assert!(!algorithm.analyze(&analysis, None, false));
    }
}
