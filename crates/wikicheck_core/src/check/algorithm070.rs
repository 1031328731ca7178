use std::collections::BTreeMap;

use crate::analysis::PageAnalysis;
use crate::check::identifier::{add_help_actions, suggested_forms};
use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult, parameter};
use crate::checksum::{ISBN10_LENGTH, ISBN13_LENGTH, is_valid_isbn};
use crate::identifier::Identifier;
use crate::span::Span;

const NUMBER: u32 = 70;

/// ISBN whose number has neither 10 nor 13 characters.
pub struct IsbnWrongLength {
    context: CheckContext,
}

/// A replacement text and the bare number it carries.
struct Correction {
    text: String,
    number: String,
}

impl IsbnWrongLength {
    pub fn new(context: CheckContext) -> Self {
        Self { context }
    }

    fn is_wrong_length(isbn: &Identifier) -> bool {
        !isbn.value.is_empty()
            && !isbn.help_requested
            && isbn.value.len() != ISBN10_LENGTH
            && isbn.value.len() != ISBN13_LENGTH
    }

    fn corrections(analysis: &PageAnalysis<'_>, isbn: &Identifier) -> Vec<Correction> {
        let mut output = Vec::new();

        if let Some(template) = isbn.template
            && isbn.span.begin < template.begin
        {
            if let Some(text) = isbn.full_text.get(template.begin - isbn.span.begin..) {
                push_correction(&mut output, isbn, text.to_string(), isbn.value.clone());
            }
            return output;
        }

        let prefix = if isbn.is_template_parameter() { "" } else { "ISBN " };
        let cleaned = normalize(&isbn.raw);
        let mut add = |number: &str| {
            push_correction(&mut output, isbn, format!("{prefix}{number}"), number.to_string());
            for form in suggested_forms(analysis, isbn, number) {
                push_correction(&mut output, isbn, form, number.to_string());
            }
        };

        for (length, marker) in [(12, "10"), (15, "13")] {
            if isbn.value.len() == length
                && isbn.value.starts_with(marker)
                && let Some(rest) = strip_length_marker(&cleaned, marker)
            {
                add(rest);
            }
        }
        add(&cleaned);
        add(&cleaned.replace('O', "0").replace('I', "1").replace('B', "8"));
        output
    }
}

fn push_correction(output: &mut Vec<Correction>, isbn: &Identifier, text: String, number: String) {
    if text == isbn.full_text || output.iter().any(|existing| existing.text == text) {
        return;
    }
    output.push(Correction { text, number });
}

/// Typographic dashes and dots become `-`, tabs become spaces.
fn normalize(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            '\u{2010}' | '\u{2013}' | '.' => '-',
            '\t' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// The number after a leading `10` / `13` marker, whose digits may be
/// separated by blanks or dashes.
fn strip_length_marker<'c>(cleaned: &'c str, marker: &str) -> Option<&'c str> {
    let mut rest = cleaned;
    for expected in marker.chars() {
        rest = rest.trim_start_matches(|ch: char| ch.is_whitespace() || ch == '-');
        rest = rest.strip_prefix(expected)?;
    }
    let rest = rest.trim_start_matches(|ch: char| !ch.is_ascii_digit() && ch != 'X');
    (!rest.is_empty()).then_some(rest)
}

impl CheckErrorAlgorithm for IsbnWrongLength {
    fn error_number(&self) -> u32 {
        NUMBER
    }

    fn short_description(&self) -> &str {
        "ISBN wrong length"
    }

    fn parameters(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([("reason", "An explanation of the problem")])
    }

    fn reason(&self, analysis: &PageAnalysis<'_>, span: Span) -> Option<String> {
        let isbn = analysis.isbns().iter().find(|isbn| isbn.span == span)?;
        if !Self::is_wrong_length(isbn) {
            return None;
        }
        parameter(analysis, NUMBER, "reason").map(str::to_string)
    }

    fn analyze(
        &self,
        analysis: &PageAnalysis<'_>,
        mut errors: Option<&mut Vec<CheckErrorResult>>,
        only_automatic: bool,
    ) -> bool {
        let mut found = false;
        for isbn in analysis.isbns() {
            if !Self::is_wrong_length(isbn) {
                continue;
            }
            let corrections = Self::corrections(analysis, isbn);
            let automatic = matches!(corrections.as_slice(), [only] if is_valid_isbn(&only.number));
            if only_automatic && !automatic {
                continue;
            }
            found = true;
            let Some(errors) = errors.as_deref_mut() else {
                return true;
            };

            let mut result = CheckErrorResult::new(NUMBER, isbn.span);
            result.add_possible_action(self.context.format(
                "The ISBN has {0} characters instead of 10 or 13",
                &[isbn.value.len().to_string().as_str()],
            ));
            for correction in corrections {
                let description = correction.text.clone();
                result.add_replacement(correction.text, description, automatic);
            }
            let reason = parameter(analysis, NUMBER, "reason");
            add_help_actions(&mut result, analysis, isbn, reason);
            errors.push(result);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::{IsbnWrongLength, normalize, strip_length_marker};
    use crate::analysis::PageAnalysis;
    use crate::check::{CheckContext, CheckErrorAlgorithm, CheckErrorResult};
    use crate::config::{IdentifierTemplate, WikiConfig};

    fn run(text: &str, config: &WikiConfig) -> Vec<CheckErrorResult> {
        let analysis = PageAnalysis::new(text, config);
        let mut errors = Vec::new();
        IsbnWrongLength::new(CheckContext::default()).analyze(&analysis, Some(&mut errors), false);
        errors
    }

    #[test]
    fn normalization_and_markers() {
        assert_eq!(normalize(" 0.306\u{2013}40615-2\t"), "0-306-40615-2");
        assert_eq!(strip_length_marker("10 0306406152", "10"), Some("0306406152"));
        assert_eq!(strip_length_marker("1-3: 978", "13"), Some("978"));
        assert_eq!(strip_length_marker("978", "13"), None);
    }

    #[test]
    fn length_marker_inside_number_is_automatic() {
        let config = WikiConfig::default();
        let text = "ISBN 10 0306406152";
        let errors = run(text, &config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.slice(text), text);
        assert_eq!(errors[0].replacements(), vec!["ISBN 0306406152"]);
        assert!(errors[0].is_automatic());
        assert_eq!(errors[0].actions[0].description, "The ISBN has 12 characters instead of 10 or 13");
    }

    #[test]
    fn mistyped_letters_in_template_parameter() {
        let config = WikiConfig::default();
        let text = "{{Cite book|isbn=0-306-4O615-2}}";
        let errors = run(text, &config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.slice(text), "0-306-4O615-2");
        assert_eq!(errors[0].replacements(), vec!["0-306-40615-2"]);
        assert!(errors[0].is_automatic());

        let analysis = PageAnalysis::new(text, &config);
        let algorithm = IsbnWrongLength::new(CheckContext::default());
        assert!(algorithm.analyze(&analysis, None, true));
    }

    #[test]
    fn correct_lengths_and_empty_values_are_ignored() {
        let config = WikiConfig::default();
        assert!(run("ISBN 0306406152 ISBN 9780306406157 {{Cite book|isbn=}}", &config).is_empty());
    }

    #[test]
    fn prefix_outside_template() {
        let mut config = WikiConfig::default();
        config.isbn.templates.push(IdentifierTemplate {
            name: "ISBN".to_string(),
            parameters: vec!["1".to_string()],
            suggested: true,
        });
        let text = "see 13 - {{ISBN|978-0-306-4061}}";
        let errors = run(text, &config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].replacements(), vec!["{{ISBN|978-0-306-4061}}"]);
        assert!(!errors[0].is_automatic());
    }

    #[test]
    fn plain_text_gets_template_forms() {
        let mut config = WikiConfig::default();
        config.isbn.templates.push(IdentifierTemplate {
            name: "ISBN".to_string(),
            parameters: vec!["1".to_string()],
            suggested: true,
        });
        let errors = run("ISBN 0-306-4061", &config);
        assert_eq!(errors[0].replacements(), vec!["{{ISBN|0-306-4061}}"]);
        assert!(!errors[0].is_automatic());
    }
}
