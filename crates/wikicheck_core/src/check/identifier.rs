//! Candidate numbers and replacement texts shared by the ISBN and ISSN
//! checks.

use crate::analysis::PageAnalysis;
use crate::check::{CheckContext, CheckErrorResult, parameter};
use crate::checksum::significant_offsets;
use crate::identifier::Identifier;

pub(crate) const CHECKSUM_MESSAGE: &str = "The checksum is {0} instead of {1}";

/// Distinct candidate numbers, each passing its own checksum and differing
/// from the number as found.
pub(crate) struct Candidates {
    original: String,
    checksum: fn(&str) -> Option<char>,
    values: Vec<String>,
}

impl Candidates {
    pub(crate) fn new(original: &str, checksum: fn(&str) -> Option<char>) -> Self {
        Self {
            original: original.to_string(),
            checksum,
            values: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, value: String) {
        if value == self.original || self.values.contains(&value) {
            return;
        }
        let valid = (self.checksum)(&value).is_some_and(|checksum| value.ends_with(checksum));
        if valid {
            self.values.push(value);
        }
    }

    /// Swap every pair of neighbouring digits; a non-digit between them is
    /// left in place.
    pub(crate) fn add_transpositions(&mut self) {
        let chars = self.original.chars().collect::<Vec<_>>();
        let mut previous = None::<usize>;
        for current in 0..chars.len() {
            if !chars[current].is_ascii_digit() {
                continue;
            }
            if let Some(previous) = previous {
                let mut swapped = chars.clone();
                swapped.swap(previous, current);
                self.add(swapped.into_iter().collect());
            }
            previous = Some(current);
        }
    }

    /// Replace each digit by every other digit.
    pub(crate) fn add_substitutions(&mut self) {
        let chars = self.original.chars().collect::<Vec<_>>();
        for position in 0..chars.len() {
            if !chars[position].is_ascii_digit() {
                continue;
            }
            for digit in '0'..='9' {
                let mut changed = chars.clone();
                changed[position] = digit;
                self.add(changed.into_iter().collect());
            }
        }
    }

    pub(crate) fn values(&self) -> &[String] {
        &self.values
    }
}

/// `number` written back in the layout of `raw`: separators kept when the
/// digit count is unchanged.
pub(crate) fn reformat(raw: &str, number: &str) -> String {
    let offsets = significant_offsets(raw);
    if offsets.len() != number.chars().count() {
        return number.to_string();
    }
    let mut output = raw.as_bytes().to_vec();
    for (offset, digit) in offsets.into_iter().zip(number.bytes()) {
        output[offset] = digit;
    }
    String::from_utf8(output).unwrap_or_else(|_| number.to_string())
}

/// Text replacing the identifier's whole span with `number`. Plain-text
/// identifiers get a clean `ISBN `/`ISSN ` prefix.
pub(crate) fn replacement_text(identifier: &Identifier, number: &str) -> String {
    let formatted = reformat(&identifier.raw, number);
    if !identifier.is_template_parameter() {
        return format!("{} {formatted}", identifier.kind.prefix());
    }
    let before = identifier.raw_span.begin.saturating_sub(identifier.span.begin);
    let after = identifier.raw_span.end.saturating_sub(identifier.span.begin);
    match (identifier.full_text.get(..before), identifier.full_text.get(after..)) {
        (Some(head), Some(tail)) => format!("{head}{formatted}{tail}"),
        _ => formatted,
    }
}

/// `{{Template|number}}` forms for plain-text identifiers, from the
/// templates configured as suggestions.
pub(crate) fn suggested_forms(analysis: &PageAnalysis<'_>, identifier: &Identifier, number: &str) -> Vec<String> {
    if identifier.is_template_parameter() {
        return Vec::new();
    }
    identifier
        .kind
        .section(analysis.config())
        .templates
        .iter()
        .filter(|template| template.suggested)
        .filter_map(|template| {
            let parameter = template.parameters.first()?;
            let name = if parameter == "1" {
                String::new()
            } else {
                format!("{parameter}=")
            };
            Some(format!("{{{{{}|{name}{number}}}}}", template.name))
        })
        .collect()
}

/// Replacements asking for help: wrapping in a help template (plain text
/// only) and appending a help comment.
pub(crate) fn add_help_actions(
    result: &mut CheckErrorResult,
    analysis: &PageAnalysis<'_>,
    identifier: &Identifier,
    reason: Option<&str>,
) {
    let section = identifier.kind.section(analysis.config());
    if !identifier.is_template_parameter() {
        for help in &section.help_needed_templates {
            let mut text = format!("{{{{{}|", help.name);
            if let Some(parameter) = help.parameter.as_deref().filter(|value| !value.is_empty()) {
                text.push_str(parameter);
                text.push('=');
            }
            text.push_str(&identifier.raw);
            if let (Some(reason), Some(reason_parameter)) = (
                reason,
                help.reason_parameter.as_deref().filter(|value| !value.is_empty()),
            ) {
                text.push_str(&format!("|{reason_parameter}={reason}"));
            }
            for extra in &help.extra {
                text.push('|');
                text.push_str(extra);
            }
            text.push_str("}}");
            result.add_replacement(text, format!("Ask for help using {{{{{}}}}}", help.name), false);
        }
    }

    if let Some(comment) = section
        .help_needed_comment
        .as_deref()
        .filter(|comment| !comment.trim().is_empty())
    {
        let mut text = format!("<!-- {comment}");
        if let Some(reason) = reason.filter(|reason| !reason.trim().is_empty()) {
            text.push_str(" - ");
            text.push_str(reason);
        }
        text.push_str(" -->");
        result.add_replacement(
            format!("{}{text}", identifier.full_text),
            "Add a comment asking for help",
            false,
        );
    }
}

/// Configured checksum explanation: `reason_checksum`, else `reason`, with
/// `{0}` the computed and `{1}` the found check character.
pub(crate) fn checksum_reason(
    analysis: &PageAnalysis<'_>,
    context: &CheckContext,
    number: u32,
    computed: char,
    found: char,
) -> Option<String> {
    let template = parameter(analysis, number, "reason_checksum").or_else(|| parameter(analysis, number, "reason"))?;
    Some(context.format(template, &[computed.to_string().as_str(), found.to_string().as_str()]))
}

/// A checksum-style finding before it becomes a [`CheckErrorResult`].
pub(crate) struct Finding<'i> {
    pub(crate) identifier: &'i Identifier,
    pub(crate) message: String,
    /// The number with only its check character fixed.
    pub(crate) corrected: Option<String>,
    pub(crate) candidates: Vec<String>,
    /// Further `(replacement, description)` pairs offered after the
    /// candidates.
    pub(crate) extra: Vec<(String, String)>,
    pub(crate) reason: Option<String>,
}

impl Finding<'_> {
    /// The candidate differing from the number as found in its check
    /// character alone, when the identifier is otherwise well written.
    fn automatic_candidate(&self) -> Option<&str> {
        if !self.identifier.correct {
            return None;
        }
        let corrected = self.corrected.as_deref()?;
        let original = self.identifier.value.as_str();
        let stem = original.get(..original.len().checked_sub(1)?)?;
        let mut check_only = self
            .candidates
            .iter()
            .filter(|candidate| candidate.len() == original.len() && candidate.starts_with(stem));
        match (check_only.next(), check_only.next()) {
            (Some(only), None) if only == corrected => Some(corrected),
            _ => None,
        }
    }

    /// Automatic when the check character alone can be fixed.
    pub(crate) fn is_automatic(&self) -> bool {
        self.automatic_candidate().is_some()
    }

    /// The message and the original number come first, then the candidates
    /// in order, then the extra replacements, then help requests.
    pub(crate) fn into_result(self, analysis: &PageAnalysis<'_>, error_number: u32) -> CheckErrorResult {
        let identifier = self.identifier;
        let automatic = self.automatic_candidate().map(str::to_string);
        let mut result = CheckErrorResult::new(error_number, identifier.span);
        result.add_possible_action(self.message);
        result.add_possible_action(format!("Original number {}", identifier.value));
        for candidate in &self.candidates {
            let replacement = replacement_text(identifier, candidate);
            if replacement == identifier.full_text {
                continue;
            }
            result.add_replacement(
                replacement,
                format!("Similar {} {candidate}", identifier.kind.prefix()),
                automatic.as_ref() == Some(candidate),
            );
        }
        for (replacement, description) in self.extra {
            if replacement != identifier.full_text {
                result.add_replacement(replacement, description, false);
            }
        }
        add_help_actions(&mut result, analysis, identifier, self.reason.as_deref());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{Candidates, reformat};
    use crate::checksum::{isbn_checksum, issn_checksum};

    #[test]
    fn candidates_skip_original_and_invalid_values() {
        let mut candidates = Candidates::new("9780306406151", isbn_checksum);
        candidates.add("9780306406157".to_string());
        candidates.add("9780306406157".to_string());
        candidates.add("9780306406151".to_string());
        candidates.add("9780306406158".to_string());
        assert_eq!(candidates.values(), ["9780306406157".to_string()]);
    }

    #[test]
    fn transpositions_and_substitutions_pass_checksum() {
        let mut candidates = Candidates::new("03785954", issn_checksum);
        candidates.add_transpositions();
        candidates.add_substitutions();
        assert!(!candidates.values().is_empty());
        assert!(candidates.values().iter().all(|value| issn_checksum(value).is_some_and(|check| value.ends_with(check))));
        assert!(candidates.values().contains(&"03785955".to_string()));
        assert!(!candidates.values().contains(&"03785954".to_string()));
    }

    #[test]
    fn reformat_keeps_separators() {
        assert_eq!(reformat("978-0-306-40615-1", "9780306406157"), "978-0-306-40615-7");
        assert_eq!(reformat("0-306-40615-2", "9780306406157"), "9780306406157");
    }
}
