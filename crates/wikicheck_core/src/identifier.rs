//! ISBN and ISSN tokens, found in configured templates, in `ISBN=` style
//! template parameters and in plain text after an `ISBN`/`ISSN` prefix.

use serde::Serialize;

use crate::analysis::PageAnalysis;
use crate::checksum::clean_identifier;
use crate::config::{IdentifierSection, WikiConfig};
use crate::span::Span;
use crate::tag::TAG_NOWIKI;
use crate::template::Template;
use crate::text::{byte_at, char_at, starts_with_at, starts_with_ignore_case_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Isbn,
    Issn,
}

struct Syntax {
    /// Characters forming the number.
    possible: &'static str,
    /// Separators allowed inside the number.
    extra: &'static str,
    /// Separators tolerated but flagged as incorrect.
    incorrect: &'static str,
    /// Characters flagged as incorrect between the prefix and the number.
    incorrect_begin: &'static str,
    /// Length markers written before the prefix (`10-ISBN`).
    length_prefixes: &'static [&'static str],
}

const ISBN_SYNTAX: Syntax = Syntax {
    possible: "0123456789Xx",
    extra: "- \u{a0}",
    incorrect: ":\u{2010}\t\u{2014}=\u{2013}#",
    incorrect_begin: ":;\u{2010}\t\u{2014}=\u{2013}#",
    length_prefixes: &["10-", "13-"],
};

const ISSN_SYNTAX: Syntax = Syntax {
    possible: "0123456789Xx",
    extra: "-",
    incorrect: ":\u{2010}\t\u{2014}=\u{2013}#",
    incorrect_begin: ":;\u{2010}\t\u{2014}=\u{2013}#",
    length_prefixes: &[],
};

impl IdentifierKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdentifierKind::Isbn => "ISBN",
            IdentifierKind::Issn => "ISSN",
        }
    }

    pub fn section(self, config: &WikiConfig) -> &IdentifierSection {
        match self {
            IdentifierKind::Isbn => &config.isbn,
            IdentifierKind::Issn => &config.issn,
        }
    }

    fn syntax(self) -> &'static Syntax {
        match self {
            IdentifierKind::Isbn => &ISBN_SYNTAX,
            IdentifierKind::Issn => &ISSN_SYNTAX,
        }
    }

    /// Characters kept by the lenient normalization offered as a fix: the
    /// number itself and its allowed separators.
    pub fn is_number_or_separator(self, ch: char) -> bool {
        let syntax = self.syntax();
        syntax.possible.contains(ch) || syntax.extra.contains(ch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub kind: IdentifierKind,
    /// Everything the finding covers, including a misplaced prefix.
    pub span: Span,
    pub full_text: String,
    /// The number as written.
    pub raw: String,
    pub raw_span: Span,
    /// Uppercase digits and `X` only.
    pub value: String,
    /// Located where an identifier is expected (not a bare link target).
    pub valid: bool,
    /// Written with correct prefix and separators.
    pub correct: bool,
    pub help_requested: bool,
    /// Span of the template this identifier is a parameter of.
    pub template: Option<Span>,
}

impl Identifier {
    fn new(
        analysis: &PageAnalysis<'_>,
        kind: IdentifierKind,
        span: Span,
        raw_span: Span,
        flags: Flags,
        template: Option<Span>,
    ) -> Self {
        let contents = analysis.contents();
        let raw = raw_span.slice(contents).to_string();
        Self {
            kind,
            span,
            full_text: span.slice(contents).to_string(),
            value: clean_identifier(&raw),
            raw,
            raw_span,
            valid: flags.valid,
            correct: flags.correct,
            help_requested: flags.help_requested,
            template,
        }
    }

    pub fn is_template_parameter(&self) -> bool {
        self.template.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct Flags {
    valid: bool,
    correct: bool,
    help_requested: bool,
}

#[derive(Debug, Clone, Copy)]
struct ParameterMatch {
    ignore_case: bool,
    /// Also accept the name followed by digits (`isbn2`).
    accept_numbers: bool,
    /// Keep values even when they are not number-like.
    accept_all: bool,
    help_requested: bool,
}

/// All identifiers of one kind, sorted by span and pairwise disjoint.
pub fn extract_identifiers(analysis: &PageAnalysis<'_>, kind: IdentifierKind) -> Vec<Identifier> {
    let mut output = Vec::new();
    let section = kind.section(analysis.config());

    for configured in &section.templates {
        for template in analysis.templates_named(&configured.name) {
            for parameter in configured.parameters.iter().filter(|name| !name.is_empty()) {
                scan_template_parameters(
                    analysis,
                    kind,
                    &mut output,
                    template,
                    parameter,
                    ParameterMatch {
                        ignore_case: false,
                        accept_numbers: false,
                        accept_all: true,
                        help_requested: false,
                    },
                );
            }
        }
    }

    for help in &section.help_needed_templates {
        for template in analysis.templates_named(&help.name) {
            scan_template_parameters(
                analysis,
                kind,
                &mut output,
                template,
                help.identifier_parameter(),
                ParameterMatch {
                    ignore_case: false,
                    accept_numbers: false,
                    accept_all: false,
                    help_requested: true,
                },
            );
        }
    }

    for template in analysis.templates() {
        scan_template_parameters(
            analysis,
            kind,
            &mut output,
            template,
            kind.prefix(),
            ParameterMatch {
                ignore_case: true,
                accept_numbers: true,
                accept_all: true,
                help_requested: false,
            },
        );
    }

    scan_plain_text(analysis, kind, &mut output);

    output.sort_by_key(|identifier| identifier.span);
    output
}

fn push_disjoint(output: &mut Vec<Identifier>, identifier: Identifier) {
    if output
        .iter()
        .any(|existing| existing.span.overlaps(identifier.span) || existing.span == identifier.span)
    {
        return;
    }
    output.push(identifier);
}

fn parameter_name_matches(expected: &str, actual: &str, matching: ParameterMatch) -> bool {
    let equal = |left: &str, right: &str| {
        if matching.ignore_case {
            left.eq_ignore_ascii_case(right)
        } else {
            left == right
        }
    };
    if equal(expected, actual) {
        return true;
    }
    if !matching.accept_numbers || actual.len() <= expected.len() {
        return false;
    }
    let Some((head, tail)) = actual
        .get(..expected.len())
        .zip(actual.get(expected.len()..))
    else {
        return false;
    };
    equal(expected, head) && tail.chars().all(|ch| ch.is_ascii_digit())
}

fn scan_template_parameters(
    analysis: &PageAnalysis<'_>,
    kind: IdentifierKind,
    output: &mut Vec<Identifier>,
    template: &Template,
    expected_name: &str,
    matching: ParameterMatch,
) {
    let syntax = kind.syntax();
    let contents = analysis.contents();
    let names = template.effective_parameter_names();

    for (parameter, name) in template.parameters.iter().zip(&names) {
        if !parameter_name_matches(expected_name, name, matching) {
            continue;
        }
        let value = parameter.value.as_str();
        let delta = parameter.value_span.begin;

        let mut ok = true;
        let mut has_digit = false;
        let mut correct = true;
        let mut begin = None::<usize>;
        let mut end = None::<usize>;
        let mut index = 0usize;
        while ok && index < value.len() {
            let Some(ch) = char_at(value, index) else {
                break;
            };
            if syntax.possible.contains(ch) {
                if ch.is_ascii_digit() {
                    begin.get_or_insert(index);
                    has_digit = true;
                }
                end = Some(index + 1);
                index += 1;
            } else if syntax.extra.contains(ch) {
                index += ch.len_utf8();
            } else if syntax.incorrect.contains(ch) {
                index += ch.len_utf8();
                correct = false;
            } else {
                ok = false;
            }
        }

        if !ok && has_digit && byte_at(value, index) == Some(b'<') {
            ok = skip_trailing_comments(analysis, delta, value, index);
        }

        if ok {
            if value.is_empty() {
                continue;
            }
            // A value made of separators only gives an empty number.
            let raw_begin = delta + begin.unwrap_or(0);
            let raw_end = (delta + end.unwrap_or(0)).max(raw_begin);
            let raw_span = Span::new(raw_begin, raw_end);

            let mut span = raw_span;
            if correct
                && let Some(prefix_begin) = length_prefix_before(contents, template.span.begin, syntax)
            {
                correct = false;
                span = Span::new(prefix_begin, template.span.end);
            }
            push_disjoint(
                output,
                Identifier::new(
                    analysis,
                    kind,
                    span,
                    raw_span,
                    Flags {
                        valid: true,
                        correct,
                        help_requested: matching.help_requested,
                    },
                    Some(template.span),
                ),
            );
        } else if matching.accept_all && !value.is_empty() {
            push_disjoint(
                output,
                Identifier::new(
                    analysis,
                    kind,
                    parameter.value_span,
                    parameter.value_span,
                    Flags {
                        valid: true,
                        correct: false,
                        help_requested: false,
                    },
                    Some(template.span),
                ),
            );
        }
    }
}

/// After the number, only comments and blank space may follow for the value
/// to stay acceptable.
fn skip_trailing_comments(analysis: &PageAnalysis<'_>, delta: usize, value: &str, start: usize) -> bool {
    let Some(first) = analysis.is_in_comment(delta + start) else {
        return false;
    };
    if first.span.begin != delta + start {
        return false;
    }
    let mut index = first.span.end - delta;
    while index < value.len() {
        match value.as_bytes()[index] {
            b'<' => match analysis.is_in_comment(delta + index) {
                Some(comment) => index = comment.span.end - delta,
                None => return false,
            },
            b' ' | b'\n' => index += 1,
            _ => return false,
        }
    }
    true
}

/// Start of a `10-` / `13-` marker written just before a template, allowing
/// spaces around the dash.
fn length_prefix_before(contents: &str, template_begin: usize, syntax: &Syntax) -> Option<usize> {
    if syntax.length_prefixes.is_empty() {
        return None;
    }
    let bytes = contents.as_bytes();
    let mut index = template_begin;
    while index > 0 && bytes[index - 1] == b' ' {
        index -= 1;
    }
    if index == 0 || bytes[index - 1] != b'-' {
        return None;
    }
    index -= 1;
    while index > 0 && bytes[index - 1] == b' ' {
        index -= 1;
    }
    if index < 2 {
        return None;
    }
    let marker = &bytes[index - 2..index];
    let is_marker = syntax
        .length_prefixes
        .iter()
        .any(|prefix| prefix.as_bytes().starts_with(marker));
    let digit_before = index > 2 && bytes[index - 3].is_ascii_digit();
    (is_marker && !digit_before).then_some(index - 2)
}

/// Whether plain-text scanning may start an identifier at `index`, and
/// whether its location is valid.
fn plain_text_candidate(analysis: &PageAnalysis<'_>, index: usize, found: &[Identifier]) -> Option<bool> {
    if analysis.is_in_comment(index).is_some()
        || analysis.is_in_tag(index).is_some()
        || analysis.surrounding_tag(TAG_NOWIKI, index).is_some()
        || found.iter().any(|identifier| identifier.span.contains(index))
    {
        return None;
    }

    let mut valid = true;
    if let Some(link) = analysis.is_in_external_link(index) {
        let in_text = link
            .text_offset
            .is_some_and(|offset| index >= link.span.begin + offset);
        if !link.has_square || !in_text || link.text.is_none() {
            valid = false;
        }
    }
    if let Some(template) = analysis.is_in_template(index) {
        match template.first_pipe_offset() {
            Some(pipe) if index > pipe => {}
            _ => return None,
        }
    }
    if let Some(image) = analysis.is_in_image(index) {
        match image.first_pipe_offset {
            Some(pipe) if index >= image.span.begin + pipe => {}
            _ => return None,
        }
    }
    Some(valid)
}

fn scan_plain_text(analysis: &PageAnalysis<'_>, kind: IdentifierKind, output: &mut Vec<Identifier>) {
    let contents = analysis.contents();
    let syntax = kind.syntax();
    let prefix = kind.prefix();
    let mut index = 0usize;

    while index + prefix.len() < contents.len() {
        if !starts_with_ignore_case_at(contents, index, prefix) {
            index += 1;
            continue;
        }
        let Some(valid) = plain_text_candidate(analysis, index, output) else {
            index += 1;
            continue;
        };

        let in_parameter_name = analysis
            .is_in_template(index)
            .is_some_and(|template| template.is_in_parameter_name(index));
        let mut begin = index;
        index += prefix.len();
        if in_parameter_name {
            continue;
        }

        let mut correct = true;
        if begin >= 2
            && index + 2 < contents.len()
            && starts_with_at(contents, begin - 2, "[[")
            && starts_with_at(contents, index, "]]")
        {
            correct = false;
            begin -= 2;
            index += 2;
        }
        if begin >= 3
            && syntax
                .length_prefixes
                .iter()
                .any(|marker| starts_with_at(contents, begin - 3, marker))
        {
            correct = false;
            begin -= 3;
        }

        let mut space_found = false;
        if analysis.is_in_comment(index).is_none() {
            while byte_at(contents, index) == Some(b' ') {
                index += 1;
                space_found = true;
            }
            while let Some(ch) = char_at(contents, index)
                && syntax.incorrect_begin.contains(ch)
            {
                index += ch.len_utf8();
                correct = false;
            }
        }

        correct &= space_found;
        let mut next_correct = correct;
        let mut number_begin = None::<usize>;
        let mut number_end = None::<usize>;
        while let Some(ch) = char_at(contents, index) {
            if syntax.possible.contains(ch) {
                number_begin.get_or_insert(index);
                index += ch.len_utf8();
                number_end = Some(index);
                correct = next_correct;
            } else if syntax.extra.contains(ch) {
                if number_begin.is_none() {
                    next_correct = false;
                }
                index += ch.len_utf8();
            } else if syntax.incorrect.contains(ch) {
                index += ch.len_utf8();
                next_correct = false;
            } else {
                if number_end == Some(index) && ch.is_alphabetic() {
                    correct = false;
                }
                break;
            }
        }

        if let (Some(number_begin), Some(number_end)) = (number_begin, number_end) {
            push_disjoint(
                output,
                Identifier::new(
                    analysis,
                    kind,
                    Span::new(begin, number_end),
                    Span::new(number_begin, number_end),
                    Flags {
                        valid,
                        correct,
                        help_requested: false,
                    },
                    None,
                ),
            );
            index = number_end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IdentifierKind;
    use crate::analysis::PageAnalysis;
    use crate::config::{HelpNeededTemplate, IdentifierTemplate, WikiConfig};
    use crate::span::Span;

    fn isbns(text: &str, config: &WikiConfig) -> Vec<super::Identifier> {
        PageAnalysis::new(text, config).isbns().to_vec()
    }

    #[test]
    fn plain_text_isbn_is_correct() {
        let config = WikiConfig::default();
        let found = isbns("See ISBN 978-0-306-40615-7 here.", &config);
        assert_eq!(found.len(), 1);
        let isbn = &found[0];
        assert_eq!(isbn.kind, IdentifierKind::Isbn);
        assert_eq!(isbn.span, Span::new(4, 26));
        assert_eq!(isbn.full_text, "ISBN 978-0-306-40615-7");
        assert_eq!(isbn.raw, "978-0-306-40615-7");
        assert_eq!(isbn.value, "9780306406157");
        assert!(isbn.valid);
        assert!(isbn.correct);
        assert!(!isbn.is_template_parameter());
    }

    #[test]
    fn miswritten_prefixes_are_incorrect() {
        let config = WikiConfig::default();
        let found = isbns("a ISBN: 0-306-40615-2 b [[ISBN]] 0306406152 c 10-ISBN 0306406152 d ISBN0306406152", &config);
        assert_eq!(found.len(), 4);
        assert!(found.iter().all(|isbn| !isbn.correct));
        assert!(found[1].full_text.starts_with("[[ISBN]]"));
        assert!(found[2].full_text.starts_with("10-ISBN"));
        assert!(found.iter().all(|isbn| isbn.value.len() == 10));
    }

    #[test]
    fn trailing_letter_marks_incorrect() {
        let config = WikiConfig::default();
        let found = isbns("ISBN 0306406152abc", &config);
        assert_eq!(found.len(), 1);
        assert!(!found[0].correct);
        assert_eq!(found[0].raw, "0306406152");
    }

    #[test]
    fn hidden_locations_are_skipped() {
        let config = WikiConfig::default();
        let text = "<!-- ISBN 0306406152 --> <nowiki>ISBN 0306406152</nowiki> \
<ref name=\"ISBN 0306406152\">x</ref> {{ISBN 0306406152|a}} [[File:ISBN 0306406152.png]]";
        assert!(isbns(text, &config).is_empty());
    }

    #[test]
    fn bare_external_link_makes_location_invalid() {
        let config = WikiConfig::default();
        let found = isbns("http://example.org/ISBN_0306406152 and [http://x.org ISBN 0306406152]", &config);
        assert_eq!(found.len(), 1);
        assert!(found[0].valid);
        let found = isbns("[http://example.org/ISBN 0306406152]", &config);
        assert_eq!(found.len(), 1);
        assert!(!found[0].valid);
    }

    #[test]
    fn template_parameters_are_scanned() {
        let config = WikiConfig::default();
        let text = "{{Cite book|title=ISBN guide|ISBN2=0-306-40615-2<!-- checked -->|isbn = n/a}}";
        let found = isbns(text, &config);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].raw, "0-306-40615-2");
        assert!(found[0].correct);
        assert!(found[0].is_template_parameter());
        assert_eq!(found[1].raw, "n/a");
        assert!(!found[1].correct);
        assert_eq!(found[1].value, "");
    }

    #[test]
    fn separator_only_values_give_empty_numbers() {
        let config = WikiConfig::default();
        let text = "{{Cite book|isbn= - |title=x}} {{Cite book|isbn=}}";
        let found = isbns(text, &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "");
        assert!(found[0].span.is_empty());
        assert_eq!(found[0].span.begin, text.find('-').expect("dash"));
        assert!(found[0].is_template_parameter());
    }

    #[test]
    fn configured_and_help_templates() {
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
            extra: Vec::new(),
        });
        let text = "{{ISBN|978-0-306-40615-7}} and {{ISBN?|0-306-40615-3|reason=x}}";
        let found = isbns(text, &config);
        assert_eq!(found.len(), 2);
        assert!(!found[0].help_requested);
        assert_eq!(found[0].value, "9780306406157");
        assert!(found[1].help_requested);
        assert_eq!(found[1].template.map(|span| span.slice(text)), Some("{{ISBN?|0-306-40615-3|reason=x}}"));
    }

    #[test]
    fn length_marker_before_template() {
        let mut config = WikiConfig::default();
        config.isbn.templates.push(IdentifierTemplate {
            name: "ISBN".to_string(),
            parameters: vec!["1".to_string()],
            suggested: false,
        });
        let text = "see 13 - {{ISBN|978-0-306-40615-7}}";
        let found = isbns(text, &config);
        assert_eq!(found.len(), 1);
        assert!(!found[0].correct);
        assert_eq!(found[0].full_text, "13 - {{ISBN|978-0-306-40615-7}}");
        assert_eq!(found[0].raw, "978-0-306-40615-7");
    }

    #[test]
    fn issn_stops_at_spaces() {
        let config = WikiConfig::default();
        let issns = PageAnalysis::new("ISSN 0378-5955 1234 and issn 2049-3630", &config)
            .issns()
            .to_vec();
        assert_eq!(issns.len(), 2);
        assert_eq!(issns[0].raw, "0378-5955");
        assert_eq!(issns[1].value, "20493630");
    }
}
