use serde::Serialize;

use crate::span::{Span, find_containing};
use crate::text::{starts_with_at, trim_span};

/// Parser functions written like templates (`{{lc:...}}`); not templates.
const MAGIC_FUNCTIONS: &[&str] = &[
    "anchorencode",
    "defaultsort",
    "displaytitle",
    "formatnum",
    "fullurl",
    "grammar",
    "int",
    "lc",
    "lcfirst",
    "localurl",
    "ns",
    "padleft",
    "padright",
    "plural",
    "tag",
    "uc",
    "ucfirst",
    "urlencode",
];

const TRANSCLUSION_MODIFIERS: &[&str] = &["subst:", "safesubst:", "msgnw:", "template:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParameter {
    /// Offset of the `|` introducing the parameter.
    pub pipe_offset: usize,
    /// Trimmed explicit name; `None` for positional parameters.
    pub name: Option<String>,
    /// Trimmed value.
    pub value_span: Span,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    /// Name as written, trimmed and without `subst:`/`Template:` prefixes.
    pub name: String,
    pub span: Span,
    pub parameters: Vec<TemplateParameter>,
}

impl Template {
    pub fn normalized_name(&self) -> String {
        normalize_template_name(&self.name)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.normalized_name() == normalize_template_name(name)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn first_pipe_offset(&self) -> Option<usize> {
        self.parameters.first().map(|parameter| parameter.pipe_offset)
    }

    /// Names as MediaWiki resolves them: positional parameters are numbered
    /// from 1 in order of appearance.
    pub fn effective_parameter_names(&self) -> Vec<String> {
        let mut next_position = 1usize;
        self.parameters
            .iter()
            .map(|parameter| match &parameter.name {
                Some(name) => name.clone(),
                None => {
                    let name = next_position.to_string();
                    next_position += 1;
                    name
                }
            })
            .collect()
    }

    pub fn parameter_value(&self, name: &str) -> Option<&str> {
        self.effective_parameter_names()
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| self.parameters[index].value.as_str())
    }

    /// The parameter whose name area (between its pipe and its value) holds
    /// `offset`.
    pub fn is_in_parameter_name(&self, offset: usize) -> bool {
        self.parameters
            .iter()
            .any(|parameter| parameter.pipe_offset < offset && offset < parameter.value_span.begin)
    }
}

/// Canonical form for comparing template names: underscores as spaces,
/// collapsed whitespace, uppercase first letter.
pub fn normalize_template_name(name: &str) -> String {
    let collapsed = name
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Templates in order of their opening braces. Nested templates are listed
/// after the template containing them. `regions` are skipped entirely.
pub fn extract_templates(contents: &str, regions: &[Span]) -> Vec<Template> {
    let mut output = Vec::new();
    let mut index = 0usize;

    while index + 1 < contents.len() {
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if starts_with_at(contents, index, "{{{") {
            index += 3;
            continue;
        }
        if starts_with_at(contents, index, "{{") {
            if let Some(template) = parse_template_at(contents, index, regions) {
                output.push(template);
            }
            index += 2;
            continue;
        }
        index += 1;
    }

    output
}

fn parse_template_at(contents: &str, begin: usize, regions: &[Span]) -> Option<Template> {
    let bytes = contents.as_bytes();
    let mut index = begin + 2;
    let mut template_depth = 0usize;
    let mut parameter_depth = 0usize;
    let mut link_depth = 0usize;
    let mut pipes = Vec::<usize>::new();
    let mut equals = Vec::<Option<usize>>::new();

    while index < bytes.len() {
        if let Some(region) = find_containing(regions, index, |region| *region) {
            index = regions[region].end;
            continue;
        }
        if starts_with_at(contents, index, "{{{") {
            parameter_depth += 1;
            index += 3;
            continue;
        }
        if parameter_depth > 0 && starts_with_at(contents, index, "}}}") {
            parameter_depth -= 1;
            index += 3;
            continue;
        }
        if starts_with_at(contents, index, "{{") {
            template_depth += 1;
            index += 2;
            continue;
        }
        if starts_with_at(contents, index, "}}") {
            if template_depth == 0 && parameter_depth == 0 {
                return build_template(contents, begin, index, &pipes, &equals);
            }
            template_depth = template_depth.saturating_sub(1);
            index += 2;
            continue;
        }
        if starts_with_at(contents, index, "[[") {
            link_depth += 1;
            index += 2;
            continue;
        }
        if starts_with_at(contents, index, "]]") {
            link_depth = link_depth.saturating_sub(1);
            index += 2;
            continue;
        }
        if template_depth == 0 && parameter_depth == 0 && link_depth == 0 {
            match bytes[index] {
                b'|' => {
                    pipes.push(index);
                    equals.push(None);
                }
                b'=' => {
                    if let Some(last) = equals.last_mut()
                        && last.is_none()
                    {
                        *last = Some(index);
                    }
                }
                _ => {}
            }
        }
        index += 1;
    }

    None
}

fn build_template(
    contents: &str,
    begin: usize,
    close: usize,
    pipes: &[usize],
    equals: &[Option<usize>],
) -> Option<Template> {
    let name_end = pipes.first().copied().unwrap_or(close);
    let name = template_name(&contents[begin + 2..name_end])?;

    let mut parameters = Vec::with_capacity(pipes.len());
    for (position, &pipe) in pipes.iter().enumerate() {
        let segment_end = pipes.get(position + 1).copied().unwrap_or(close);
        let (name, value_begin) = match equals[position] {
            Some(equal) => {
                let (name_begin, name_end) = trim_span(contents, pipe + 1, equal);
                let name = (name_begin < name_end).then(|| contents[name_begin..name_end].to_string());
                (name, equal + 1)
            }
            None => (None, pipe + 1),
        };
        let (value_begin, value_end) = trim_span(contents, value_begin, segment_end);
        parameters.push(TemplateParameter {
            pipe_offset: pipe,
            name,
            value_span: Span::new(value_begin, value_end),
            value: contents[value_begin..value_end].to_string(),
        });
    }

    Some(Template {
        name,
        span: Span::new(begin, close + 2),
        parameters,
    })
}

fn template_name(raw: &str) -> Option<String> {
    let mut name = raw.trim();
    loop {
        let Some(modifier) = TRANSCLUSION_MODIFIERS.iter().find(|modifier| {
            name.get(..modifier.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(modifier))
        }) else {
            break;
        };
        name = name.get(modifier.len()..).unwrap_or_default().trim_start();
    }

    if name.is_empty()
        || name.starts_with('#')
        || name
            .chars()
            .any(|ch| matches!(ch, '{' | '}' | '[' | ']' | '<' | '>' | '\n' | '|'))
    {
        return None;
    }
    if let Some((prefix, _)) = name.split_once(':') {
        let prefix = prefix.trim().to_ascii_lowercase();
        if MAGIC_FUNCTIONS.contains(&prefix.as_str()) {
            return None;
        }
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::{extract_templates, normalize_template_name};
    use crate::comment::extract_comments;
    use crate::span::Span;
    use crate::tag::{extract_tags, opaque_regions};

    fn templates(text: &str) -> Vec<super::Template> {
        let comments = extract_comments(text);
        let tags = extract_tags(text, &comments);
        extract_templates(text, &opaque_regions(&comments, &tags))
    }

    #[test]
    fn parses_named_and_positional_parameters() {
        let text = "x {{Cite book | title = A [[B|C]] | 978 | isbn=123 }} y";
        let found = templates(text);
        assert_eq!(found.len(), 1);
        let template = &found[0];
        assert_eq!(template.name, "Cite book");
        assert_eq!(template.span, Span::new(2, text.len() - 2));
        assert_eq!(template.parameter_count(), 3);
        assert_eq!(template.parameters[0].name.as_deref(), Some("title"));
        assert_eq!(template.parameters[0].value, "A [[B|C]]");
        assert_eq!(template.parameters[1].name, None);
        assert_eq!(template.parameter_value("1"), Some("978"));
        assert_eq!(template.parameter_value("isbn"), Some("123"));
        assert_eq!(template.parameters[2].value_span.slice(text), "123");
        assert_eq!(template.first_pipe_offset(), Some(14));
    }

    #[test]
    fn accented_names_are_kept() {
        let found = templates("{{Thérèse}} {{Ségolène|a}} {{subst:Émile}}");
        let names = found.iter().map(|template| template.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Thérèse", "Ségolène", "Émile"]);
    }

    #[test]
    fn nested_templates_are_both_listed() {
        let text = "{{Cite|isbn={{ISBN|0-306-40615-2}}|x=1}}";
        let found = templates(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Cite");
        assert_eq!(found[0].parameter_count(), 2);
        assert_eq!(found[0].parameter_value("isbn"), Some("{{ISBN|0-306-40615-2}}"));
        assert_eq!(found[1].name, "ISBN");
        assert!(found[0].span.contains_span(found[1].span));
    }

    #[test]
    fn comments_and_parameters_do_not_split() {
        let text = "{{T|a<!-- | -->b|{{{1|x}}}|c}}";
        let found = templates(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].parameter_count(), 3);
        assert_eq!(found[0].parameters[0].value, "a<!-- | -->b");
        assert_eq!(found[0].parameters[1].value, "{{{1|x}}}");
    }

    #[test]
    fn skips_parser_functions_and_nowiki() {
        let text = "{{#if:x|y}} {{DEFAULTSORT:Foo}} <nowiki>{{A}}</nowiki> {{subst:B}} {{C";
        let found = templates(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "B");
    }

    #[test]
    fn names_compare_normalized() {
        assert_eq!(normalize_template_name(" isbn_number  x "), "Isbn number x");
        let found = templates("{{isbn|1}}");
        assert!(found[0].is_named("ISBN"));
        assert!(!found[0].is_named("ISSN"));
    }

    #[test]
    fn parameter_name_area_is_detected() {
        let text = "{{Cite|isbn = 1}}";
        let found = templates(text);
        assert!(found[0].is_in_parameter_name(8));
        assert!(!found[0].is_in_parameter_name(14));
    }
}
