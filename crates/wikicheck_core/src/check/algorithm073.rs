use std::collections::BTreeMap;

use crate::analysis::PageAnalysis;
use crate::check::identifier::{CHECKSUM_MESSAGE, Candidates, Finding, checksum_reason, suggested_forms};
use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult, parameter};
use crate::checksum::{ISBN13_LENGTH, isbn_checksum, isbn13_checksum, issn_checksum};
use crate::identifier::Identifier;
use crate::isbn_range::RangeStatus;
use crate::span::Span;

const NUMBER: u32 = 73;
const ISSN_PREFIX: &str = "977";

/// ISBN-13 whose check digit is wrong or whose prefix is in no assigned range.
pub struct IsbnChecksum13 {
    context: CheckContext,
}

enum Problem {
    Checksum { found: char, computed: char },
    Range(RangeStatus),
}

impl IsbnChecksum13 {
    pub fn new(context: CheckContext) -> Self {
        Self { context }
    }

    fn problem(&self, number: &str) -> Option<Problem> {
        if number.len() != ISBN13_LENGTH {
            return None;
        }
        let found = number.chars().last()?.to_ascii_uppercase();
        if let Some(computed) = isbn13_checksum(number)
            && computed.is_ascii_digit()
            && computed != found
        {
            return Some(Problem::Checksum { found, computed });
        }
        let information = self.context.isbn_ranges.as_ref()?.information(number)?;
        match information.status {
            RangeStatus::Valid => None,
            status => Some(Problem::Range(status)),
        }
    }

    fn finding<'i>(&self, analysis: &PageAnalysis<'_>, isbn: &'i Identifier, problem: &Problem) -> Finding<'i> {
        let number = isbn.value.as_str();
        let (message, corrected) = match problem {
            Problem::Checksum { found, computed } => (
                self.context
                    .format(CHECKSUM_MESSAGE, &[found.to_string().as_str(), computed.to_string().as_str()]),
                Some(format!("{}{computed}", &number[..ISBN13_LENGTH - 1])),
            ),
            Problem::Range(RangeStatus::Reserved) => ("This ISBN is inside a reserved range".to_string(), None),
            Problem::Range(_) => ("There's no existing range for this ISBN".to_string(), None),
        };

        let mut candidates = Candidates::new(number, isbn_checksum);
        if let Some(corrected) = &corrected {
            candidates.add(corrected.clone());
        }
        if !number.starts_with("978") && !number.starts_with("979") {
            let bytes = number.as_bytes();
            let count = usize::from(bytes[0] == b'9')
                + usize::from(bytes[1] == b'7')
                + usize::from(bytes[2] == b'8')
                + usize::from(bytes[2] == b'9');
            if count == 2 {
                let prefix = if bytes[2] == b'9' { "979" } else { "978" };
                candidates.add(format!("{prefix}{}", &number[3..]));
            }
        }
        if let Some(isbn10) = number.strip_prefix("978") {
            candidates.add(isbn10.to_string());
        }
        candidates.add_transpositions();
        candidates.add_substitutions();

        let mut extra = Vec::new();
        if number.starts_with(ISSN_PREFIX) {
            let value = &number[3..10];
            if let Some(check) = issn_checksum(&format!("{value}0")) {
                let issn = format!("{value}{check}");
                let formatted = format!("{}-{}", &issn[..4], &issn[4..]);
                let replacement = if isbn.is_template_parameter() {
                    formatted
                } else {
                    format!("ISSN {formatted}")
                };
                extra.push((replacement, format!("ISSN {issn}")));
            }
        }
        if let Some(corrected) = &corrected {
            for form in suggested_forms(analysis, isbn, corrected) {
                extra.push((form.clone(), form));
            }
        }

        Finding {
            identifier: isbn,
            message,
            corrected,
            candidates: candidates.values().to_vec(),
            extra,
            reason: self.reason_for(analysis, problem),
        }
    }

    fn reason_for(&self, analysis: &PageAnalysis<'_>, problem: &Problem) -> Option<String> {
        match problem {
            Problem::Checksum { found, computed } => checksum_reason(analysis, &self.context, NUMBER, *computed, *found),
            Problem::Range(RangeStatus::Reserved) => parameter(analysis, NUMBER, "reason_reserved").map(str::to_string),
            Problem::Range(_) => parameter(analysis, NUMBER, "reason_no_range").map(str::to_string),
        }
    }
}

impl CheckErrorAlgorithm for IsbnChecksum13 {
    fn error_number(&self) -> u32 {
        NUMBER
    }

    fn short_description(&self) -> &str {
        "ISBN wrong checksum in ISBN-13"
    }

    fn parameters(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            ("reason", "An explanation of the problem"),
            ("reason_checksum", "An explanation of the problem (incorrect checksum)"),
            ("reason_no_range", "An explanation of the problem (non-existing range of ISBN numbers)"),
            ("reason_reserved", "An explanation of the problem (reserved range of ISBN numbers)"),
        ])
    }

    fn reason(&self, analysis: &PageAnalysis<'_>, span: Span) -> Option<String> {
        let isbn = analysis.isbns().iter().find(|isbn| isbn.span == span)?;
        let problem = self.problem(&isbn.value)?;
        self.reason_for(analysis, &problem)
    }

    fn analyze(
        &self,
        analysis: &PageAnalysis<'_>,
        mut errors: Option<&mut Vec<CheckErrorResult>>,
        only_automatic: bool,
    ) -> bool {
        let mut found = false;
        for isbn in analysis.isbns() {
            let Some(problem) = self.problem(&isbn.value) else {
                continue;
            };
            let finding = self.finding(analysis, isbn, &problem);
            if only_automatic && !finding.is_automatic() {
                continue;
            }
            found = true;
            let Some(errors) = errors.as_deref_mut() else {
                return true;
            };
            errors.push(finding.into_result(analysis, NUMBER));
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::IsbnChecksum13;
    use crate::analysis::PageAnalysis;
    use crate::check::{CheckContext, CheckErrorAlgorithm};
    use crate::checksum::is_valid_isbn;
    use crate::config::{AlgorithmSettings, HelpNeededTemplate, IdentifierTemplate, WikiConfig};
    use crate::isbn_range::{IsbnRangeTable, RangeGroup, RangeRule};

    fn run(text: &str, config: &WikiConfig, context: CheckContext) -> (bool, Vec<crate::check::CheckErrorResult>) {
        let analysis = PageAnalysis::new(text, config);
        let algorithm = IsbnChecksum13::new(context);
        let mut errors = Vec::new();
        let found = algorithm.analyze(&analysis, Some(&mut errors), false);
        (found, errors)
    }

    #[test]
    fn valid_isbn_is_not_reported() {
        let config = WikiConfig::default();
        let (found, errors) = run("ISBN 978-0-306-40615-7", &config, CheckContext::default());
        assert!(!found);
        assert!(errors.is_empty());
    }

    #[test]
    fn wrong_checksum_suggests_corrected_number_first() {
        let config = WikiConfig::default();
        let text = "Book, ISBN 978-0-306-40615-1.";
        let (found, errors) = run(text, &config, CheckContext::default());
        assert!(found);
        assert_eq!(errors.len(), 1);
        let error = &errors[0];
        assert_eq!(error.span.slice(text), "ISBN 978-0-306-40615-1");
        assert_eq!(error.first_replacement(), Some("ISBN 978-0-306-40615-7"));
        assert_eq!(error.actions[0].description, "The checksum is 1 instead of 7");

        let replacements = error.replacements();
        let mut unique = replacements.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), replacements.len());
        assert!(!replacements.contains(&"ISBN 978-0-306-40615-1"));
        assert!(replacements.iter().all(|replacement| is_valid_isbn(replacement)));
        assert!(error.is_automatic());
        let automatic = error
            .actions
            .iter()
            .filter(|action| action.automatic)
            .filter_map(|action| action.replacement.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(automatic, vec!["ISBN 978-0-306-40615-7"]);
    }

    #[test]
    fn detection_only_stops_early() {
        let config = WikiConfig::default();
        let analysis = PageAnalysis::new("ISBN 9780306406151 ISBN 9780306406152", &config);
        let algorithm = IsbnChecksum13::new(CheckContext::default());
        assert!(algorithm.analyze(&analysis, None, false));
        let mut errors = Vec::new();
        assert!(algorithm.analyze(&analysis, Some(&mut errors), false));
        assert_eq!(errors.len(), 2);
        assert!(algorithm.analyze(&analysis, None, true));
    }

    #[test]
    fn only_automatic_keeps_well_written_checksum_fixes() {
        let config = WikiConfig::default();
        let analysis = PageAnalysis::new("ISBN 978-0-306-40615-1 and ISBN: 978-0-306-40615-2", &config);
        let algorithm = IsbnChecksum13::new(CheckContext::default());
        let mut errors = Vec::new();
        assert!(algorithm.analyze(&analysis, Some(&mut errors), true));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].first_replacement(), Some("ISBN 978-0-306-40615-7"));
        assert!(errors[0].actions.iter().any(|action| action.automatic));
    }

    #[test]
    fn prefix_repair_and_issn_companion() {
        let config = WikiConfig::default();
        let (_, errors) = run("ISBN 9880306406157", &config, CheckContext::default());
        let replacements = errors[0].replacements();
        assert!(replacements.contains(&"ISBN 9780306406157"));

        let (_, errors) = run("ISBN 9770378595004", &config, CheckContext::default());
        assert!(errors[0].replacements().contains(&"ISSN 0378-5955"));
    }

    #[test]
    fn issn_companion_in_template_parameter() {
        let config = WikiConfig::default();
        let text = "{{Cite journal|isbn=9770378595004}}";
        let (found, errors) = run(text, &config, CheckContext::default());
        assert!(found);
        assert_eq!(errors.len(), 1);
        let replacements = errors[0].replacements();
        assert!(replacements.contains(&"0378-5955"));
        assert!(!replacements.iter().any(|replacement| replacement.starts_with("ISSN")));
    }

    #[test]
    fn template_forms_and_help_requests() {
        let mut config = WikiConfig::default();
        config.isbn.templates.push(IdentifierTemplate {
            name: "ISBN".to_string(),
            parameters: vec!["1".to_string()],
            suggested: true,
        });
        config.isbn.help_needed_templates.push(HelpNeededTemplate {
            name: "ISBN?".to_string(),
            parameter: None,
            reason_parameter: Some("reason".to_string()),
            extra: vec!["date=2024".to_string()],
        });
        config.isbn.help_needed_comment = Some("please check".to_string());
        let mut settings = AlgorithmSettings::default();
        settings
            .parameters
            .insert("reason_checksum".to_string(), "checksum should be {0}, not {1}".to_string());
        config.algorithms.insert("73".to_string(), settings);

        let (_, errors) = run("ISBN 978-0-306-40615-1", &config, CheckContext::default());
        let replacements = errors[0].replacements();
        assert!(replacements.contains(&"{{ISBN|9780306406157}}"));
        assert!(replacements.contains(
            &"{{ISBN?|978-0-306-40615-1|reason=checksum should be 7, not 1|date=2024}}"
        ));
        assert_eq!(
            replacements.last().copied(),
            Some("ISBN 978-0-306-40615-1<!-- please check - checksum should be 7, not 1 -->")
        );

        let analysis = PageAnalysis::new("ISBN 978-0-306-40615-1", &config);
        let algorithm = IsbnChecksum13::new(CheckContext::default());
        assert_eq!(
            algorithm.reason(&analysis, errors[0].span).as_deref(),
            Some("checksum should be 7, not 1")
        );
    }

    #[test]
    fn template_parameter_keeps_surrounding_text() {
        let config = WikiConfig::default();
        let text = "{{Cite book|isbn=978-0-306-40615-1}}";
        let (_, errors) = run(text, &config, CheckContext::default());
        assert_eq!(errors[0].span.slice(text), "978-0-306-40615-1");
        assert_eq!(errors[0].first_replacement(), Some("978-0-306-40615-7"));
    }

    #[test]
    fn range_classification() {
        let config = WikiConfig::default();
        let table = IsbnRangeTable {
            groups: vec![RangeGroup {
                prefix: "978-0".to_string(),
                agency: None,
                rules: vec![RangeRule {
                    range: "0000000-1999999".to_string(),
                    length: 0,
                }],
            }],
        };
        let context = CheckContext::default().with_isbn_ranges(Arc::new(table));
        let (found, errors) = run("ISBN 978-0-00-000000-2 ISBN 979-8-00-000000-7", &config, context);
        assert!(found);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].actions[0].description, "This ISBN is inside a reserved range");
        assert_eq!(errors[1].actions[0].description, "There's no existing range for this ISBN");
    }
}
